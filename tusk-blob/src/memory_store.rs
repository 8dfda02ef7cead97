use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::store::validate_name;
use crate::{BlobBackend, BlobError, BlobRef, BlobResult};

/// In-process blob backend. Contents are lost when the process exits.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    blobs: Arc<RwLock<HashMap<BlobRef, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs across both namespaces
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobBackend for MemoryBackend {
    async fn create_empty(&self, blob: &BlobRef) -> BlobResult<()> {
        validate_name(&blob.name)?;
        self.blobs.write().await.insert(blob.clone(), Vec::new());
        Ok(())
    }

    async fn append(&self, blob: &BlobRef, data: Bytes) -> BlobResult<u64> {
        let mut blobs = self.blobs.write().await;
        let content = blobs
            .get_mut(blob)
            .ok_or_else(|| BlobError::not_found(blob.to_string()))?;
        content.extend_from_slice(&data);
        Ok(content.len() as u64)
    }

    async fn read_all(&self, blob: &BlobRef) -> BlobResult<Bytes> {
        let blobs = self.blobs.read().await;
        blobs
            .get(blob)
            .map(|content| Bytes::copy_from_slice(content))
            .ok_or_else(|| BlobError::not_found(blob.to_string()))
    }

    async fn size(&self, blob: &BlobRef) -> BlobResult<u64> {
        let blobs = self.blobs.read().await;
        blobs
            .get(blob)
            .map(|content| content.len() as u64)
            .ok_or_else(|| BlobError::not_found(blob.to_string()))
    }

    async fn truncate(&self, blob: &BlobRef, len: u64) -> BlobResult<()> {
        let mut blobs = self.blobs.write().await;
        let content = blobs
            .get_mut(blob)
            .ok_or_else(|| BlobError::not_found(blob.to_string()))?;
        content.truncate(usize::try_from(len).unwrap_or(usize::MAX));
        Ok(())
    }

    async fn rename(&self, src: &BlobRef, dst: &BlobRef) -> BlobResult<()> {
        validate_name(&dst.name)?;
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(dst) {
            return Err(BlobError::already_exists(dst.to_string()));
        }
        let content = blobs
            .remove(src)
            .ok_or_else(|| BlobError::not_found(src.to_string()))?;
        blobs.insert(dst.clone(), content);
        Ok(())
    }

    async fn delete(&self, blob: &BlobRef) -> BlobResult<bool> {
        Ok(self.blobs.write().await.remove(blob).is_some())
    }

    async fn exists(&self, blob: &BlobRef) -> BlobResult<bool> {
        Ok(self.blobs.read().await.contains_key(blob))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Namespace;

    #[tokio::test]
    async fn append_requires_existing_blob() {
        let backend = MemoryBackend::new();
        let blob = BlobRef::new(Namespace::Temp, "upl_1");

        let err = backend.append(&blob, Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound { .. }));

        backend.create_empty(&blob).await.unwrap();
        assert_eq!(backend.append(&blob, Bytes::from_static(b"abc")).await.unwrap(), 3);
        assert_eq!(backend.append(&blob, Bytes::from_static(b"de")).await.unwrap(), 5);
        assert_eq!(&backend.read_all(&blob).await.unwrap()[..], b"abcde");
    }

    #[tokio::test]
    async fn rename_never_clobbers() {
        let backend = MemoryBackend::new();
        let src = BlobRef::new(Namespace::Temp, "upl_1");
        let dst = BlobRef::file("a.txt");

        backend.create_empty(&src).await.unwrap();
        backend.create_empty(&dst).await.unwrap();

        let err = backend.rename(&src, &dst).await.unwrap_err();
        assert!(matches!(err, BlobError::AlreadyExists { .. }));
        assert!(backend.exists(&src).await.unwrap());

        backend.delete(&dst).await.unwrap();
        backend.rename(&src, &dst).await.unwrap();
        assert!(!backend.exists(&src).await.unwrap());
        assert!(backend.exists(&dst).await.unwrap());
    }
}
