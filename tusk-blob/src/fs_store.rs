//! Local filesystem blob backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument, warn};

use crate::store::validate_name;
use crate::{BlobBackend, BlobError, BlobRef, BlobResult, ByteStream, Namespace};

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Stores each namespace in its own directory, one file per blob.
///
/// Appends are fsynced before they are acknowledged. `rename` uses a hard
/// link (which refuses to overwrite) followed by removing the source, and
/// falls back to an exclusive-create copy when linking is not possible,
/// e.g. across devices.
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    temp_dir: PathBuf,
    files_dir: PathBuf,
}

impl FilesystemBackend {
    /// Create the backend, creating both directories if needed.
    pub async fn new(temp_dir: impl AsRef<Path>, files_dir: impl AsRef<Path>) -> BlobResult<Self> {
        let temp_dir = temp_dir.as_ref().to_path_buf();
        let files_dir = files_dir.as_ref().to_path_buf();
        fs::create_dir_all(&temp_dir).await?;
        fs::create_dir_all(&files_dir).await?;
        Ok(Self { temp_dir, files_dir })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    fn path(&self, blob: &BlobRef) -> BlobResult<PathBuf> {
        validate_name(&blob.name)?;
        let root = match blob.namespace {
            Namespace::Temp => &self.temp_dir,
            Namespace::Files => &self.files_dir,
        };
        Ok(root.join(&blob.name))
    }

    async fn copy_then_delete(&self, src: &BlobRef, src_path: &Path, dst: &BlobRef, dst_path: &Path) -> BlobResult<()> {
        let mut target = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dst_path)
            .await
            .map_err(|e| map_io(e, dst))?;

        let copied = async {
            let mut source = fs::File::open(src_path).await?;
            tokio::io::copy(&mut source, &mut target).await?;
            target.flush().await?;
            target.sync_all().await
        }
        .await;

        if let Err(e) = copied {
            // Never leave a half-copied file under a public name.
            if let Err(cleanup) = fs::remove_file(dst_path).await {
                warn!(blob = %dst, error = %cleanup, "failed to remove partial copy");
            }
            return Err(map_io(e, src));
        }

        if let Err(e) = fs::remove_file(src_path).await {
            warn!(src = %src, dst = %dst, error = %e, "copied but failed to remove source");
        }
        Ok(())
    }
}

fn map_io(err: std::io::Error, blob: &BlobRef) -> BlobError {
    match err.kind() {
        std::io::ErrorKind::NotFound => BlobError::not_found(blob.to_string()),
        std::io::ErrorKind::AlreadyExists => BlobError::already_exists(blob.to_string()),
        _ => BlobError::from(err),
    }
}

#[async_trait]
impl BlobBackend for FilesystemBackend {
    async fn create_empty(&self, blob: &BlobRef) -> BlobResult<()> {
        let path = self.path(blob)?;
        let file = fs::File::create(&path).await?;
        file.sync_all().await?;
        Ok(())
    }

    #[instrument(skip(self, data), fields(blob = %blob, len = data.len()))]
    async fn append(&self, blob: &BlobRef, data: Bytes) -> BlobResult<u64> {
        let path = self.path(blob)?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(|e| map_io(e, blob))?;

        let before = file.metadata().await?.len();

        let written = async {
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        match written {
            Ok(()) => Ok(before + data.len() as u64),
            Err(e) => {
                if let Err(rollback) = file.set_len(before).await {
                    warn!(error = %rollback, "failed to roll back partial append");
                }
                Err(e.into())
            }
        }
    }

    async fn read_all(&self, blob: &BlobRef) -> BlobResult<Bytes> {
        let path = self.path(blob)?;
        let content = fs::read(&path).await.map_err(|e| map_io(e, blob))?;
        Ok(Bytes::from(content))
    }

    async fn read_stream(&self, blob: &BlobRef) -> BlobResult<ByteStream> {
        let path = self.path(blob)?;
        let mut file = fs::File::open(&path).await.map_err(|e| map_io(e, blob))?;

        let stream = async_stream::stream! {
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                match file.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => yield Ok(Bytes::copy_from_slice(&buf[..n])),
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn size(&self, blob: &BlobRef) -> BlobResult<u64> {
        let path = self.path(blob)?;
        let meta = fs::metadata(&path).await.map_err(|e| map_io(e, blob))?;
        Ok(meta.len())
    }

    async fn truncate(&self, blob: &BlobRef, len: u64) -> BlobResult<()> {
        let path = self.path(blob)?;
        let file = fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|e| map_io(e, blob))?;

        if file.metadata().await?.len() > len {
            file.set_len(len).await?;
            file.sync_data().await?;
        }
        Ok(())
    }

    async fn rename(&self, src: &BlobRef, dst: &BlobRef) -> BlobResult<()> {
        let src_path = self.path(src)?;
        let dst_path = self.path(dst)?;

        match fs::hard_link(&src_path, &dst_path).await {
            Ok(()) => {
                // `dst` already holds the content; a leftover source is only
                // an orphaned temp file.
                if let Err(e) = fs::remove_file(&src_path).await {
                    warn!(src = %src, dst = %dst, error = %e, "renamed but failed to remove source");
                }
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(BlobError::already_exists(dst.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::not_found(src.to_string()))
            }
            Err(e) => {
                debug!(src = %src, dst = %dst, error = %e, "hard link failed, copying instead");
                self.copy_then_delete(src, &src_path, dst, &dst_path).await
            }
        }
    }

    async fn delete(&self, blob: &BlobRef) -> BlobResult<bool> {
        let path = self.path(blob)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, blob: &BlobRef) -> BlobResult<bool> {
        let path = self.path(blob)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
