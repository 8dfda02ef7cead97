use async_trait::async_trait;
use bytes::Bytes;

use crate::{BlobError, BlobRef, BlobResult, ByteStream};

/// Blob storage primitives - must be implemented by all storage backends.
///
/// One interface serves both the temporary and the permanent namespace;
/// a [`BlobRef`] carries which one it addresses.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Create an empty blob, truncating any previous content
    async fn create_empty(&self, blob: &BlobRef) -> BlobResult<()>;

    /// Append bytes and return the blob's new length.
    ///
    /// All-or-nothing: when this returns an error the blob keeps its
    /// previous length. Fails with `NotFound` if the blob does not exist.
    async fn append(&self, blob: &BlobRef, data: Bytes) -> BlobResult<u64>;

    /// Read the whole blob
    async fn read_all(&self, blob: &BlobRef) -> BlobResult<Bytes>;

    /// Read the blob as a stream
    async fn read_stream(&self, blob: &BlobRef) -> BlobResult<ByteStream> {
        let data = self.read_all(blob).await?;
        Ok(Box::pin(futures_util::stream::once(async move { Ok(data) })))
    }

    /// Current blob length
    async fn size(&self, blob: &BlobRef) -> BlobResult<u64>;

    /// Cut the blob back to `len` bytes. Never extends it.
    async fn truncate(&self, blob: &BlobRef, len: u64) -> BlobResult<()>;

    /// Move `src` to `dst` without ever overwriting `dst`.
    ///
    /// Fails with `AlreadyExists` if `dst` is occupied and with `NotFound`
    /// if `src` is missing.
    async fn rename(&self, src: &BlobRef, dst: &BlobRef) -> BlobResult<()>;

    /// Delete a blob, returning whether it existed
    async fn delete(&self, blob: &BlobRef) -> BlobResult<bool>;

    /// Check whether a blob exists
    async fn exists(&self, blob: &BlobRef) -> BlobResult<bool>;
}

/// Reject blob names that could escape their namespace.
pub fn validate_name(name: &str) -> BlobResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(BlobError::invalid(format!("invalid blob name: {name:?}")));
    }
    Ok(())
}
