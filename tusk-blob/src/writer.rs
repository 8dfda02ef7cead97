use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::protocol::{is_offset_stream, is_supported_version};
use crate::{
    AppendReceipt, BlobBackend, BlobError, BlobResult, ChunkAppend, Finalizer, SessionLocks,
    SessionStore, UploadConfig, UploadSession,
};

/// Applies chunks to upload sessions.
///
/// Each append runs the full load, validate, write, advance and finalize
/// sequence while holding the session's lock. The sequence runs on its own
/// task: once started it completes even if the caller goes away, so a
/// dropped request can never leave bytes written but the offset unadvanced.
#[derive(Clone)]
pub struct ChunkWriter {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn BlobBackend>,
    finalizer: Finalizer,
    locks: SessionLocks,
    config: UploadConfig,
}

impl ChunkWriter {
    pub fn new(
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn BlobBackend>,
        locks: SessionLocks,
        config: UploadConfig,
    ) -> Self {
        let finalizer = Finalizer::new(backend.clone(), config.finalize_attempts);
        Self {
            store,
            backend,
            finalizer,
            locks,
            config,
        }
    }

    /// Append one chunk and return the session's new position.
    ///
    /// Fails with `Timeout` when the sequence does not finish within the
    /// configured I/O timeout. The sequence itself is not aborted; clients
    /// re-query the offset before retrying.
    pub async fn append_chunk(&self, chunk: ChunkAppend) -> BlobResult<AppendReceipt> {
        let writer = self.clone();
        let task = tokio::spawn(async move {
            let _guard = writer.locks.acquire(&chunk.upload_id).await;
            writer.append_locked(chunk).await
        });

        let joined = match self.config.io_timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| BlobError::Timeout {
                    millis: limit.as_millis() as u64,
                })?,
            None => task.await,
        };

        joined.map_err(BlobError::backend)?
    }

    async fn append_locked(&self, chunk: ChunkAppend) -> BlobResult<AppendReceipt> {
        let session = self.store.get(&chunk.upload_id).await?;

        if !is_supported_version(chunk.protocol_version.as_deref()) {
            return Err(BlobError::precondition_failed(
                chunk.protocol_version.unwrap_or_default(),
            ));
        }
        if !is_offset_stream(chunk.content_type.as_deref()) {
            return Err(BlobError::unsupported_media_type(
                chunk.content_type.unwrap_or_default(),
            ));
        }
        if chunk.offset != session.offset {
            debug!(upload_id = %session.id, client = chunk.offset, server = session.offset, "offset mismatch");
            return Err(BlobError::conflict(chunk.offset, session.offset));
        }

        let len = chunk.data.len() as u64;
        if len > session.remaining() {
            return Err(BlobError::too_large(format!(
                "chunk of {} bytes at offset {} exceeds declared length {}",
                len, chunk.offset, session.declared_length
            )));
        }

        // Only an empty chunk at the final offset reaches a completed session.
        if session.is_complete() {
            return Ok(AppendReceipt::from_session(&session));
        }

        let start = session.offset;
        let end = start + len;
        if len > 0 {
            self.write(&session, chunk.data).await?;
        }

        if end == session.declared_length {
            return self.complete(session, start).await;
        }
        if len == 0 {
            return Ok(AppendReceipt::from_session(&session));
        }
        self.advance(session, start, end).await
    }

    /// Append to the temporary blob, first discarding any bytes a failed
    /// completion left behind past `session.offset`.
    async fn write(&self, session: &UploadSession, data: Bytes) -> BlobResult<()> {
        let start = session.offset;
        let len = data.len() as u64;

        let before = self.backend.size(&session.temp_ref).await?;
        if before > start {
            warn!(upload_id = %session.id, stored = before, offset = start, "discarding bytes past the offset");
            self.backend.truncate(&session.temp_ref, start).await?;
        } else if before < start {
            return Err(std::io::Error::other(format!(
                "temporary blob holds {before} bytes but the offset is {start}"
            ))
            .into());
        }

        let stored = self.backend.append(&session.temp_ref, data).await?;
        if stored != start + len {
            warn!(upload_id = %session.id, stored, expected = start + len, "temporary blob length diverged from offset");
        }
        Ok(())
    }

    // Only a durable write moves the offset.
    async fn advance(&self, session: UploadSession, start: u64, end: u64) -> BlobResult<AppendReceipt> {
        let session = self
            .store
            .update(
                &session.id,
                Box::new(move |s: &mut UploadSession| {
                    if s.offset != start {
                        return Err(BlobError::conflict(start, s.offset));
                    }
                    s.offset = end;
                    Ok(())
                }),
            )
            .await?;

        debug!(upload_id = %session.id, offset = session.offset, length = session.declared_length, "chunk appended");
        Ok(AppendReceipt::from_session(&session))
    }

    /// Finalize, then publish the final offset and reference together. On
    /// failure the last chunk is cut off again and the offset stays at
    /// `start`, so the client resends it and that retry finalizes.
    async fn complete(&self, session: UploadSession, start: u64) -> BlobResult<AppendReceipt> {
        let final_ref = match self.finalizer.finalize(&session).await {
            Ok(final_ref) => final_ref,
            Err(e) => {
                warn!(upload_id = %session.id, offset = start, error = %e, "finalization failed, last chunk rolled back");
                if let Err(rollback) = self.backend.truncate(&session.temp_ref, start).await {
                    warn!(upload_id = %session.id, error = %rollback, "failed to roll back temporary blob");
                }
                return Err(e);
            }
        };

        let end = session.declared_length;
        let session = self
            .store
            .update(
                &session.id,
                Box::new(move |s: &mut UploadSession| {
                    if s.offset != start {
                        return Err(BlobError::conflict(start, s.offset));
                    }
                    s.offset = end;
                    s.final_ref = Some(final_ref);
                    Ok(())
                }),
            )
            .await?;

        info!(upload_id = %session.id, length = session.declared_length, "upload completed");
        Ok(AppendReceipt::from_session(&session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{OFFSET_OCTET_STREAM, TUS_RESUMABLE};
    use crate::{MemoryBackend, MemorySessionStore, Metadata, UploadId};

    fn chunk(id: &UploadId, offset: u64, data: &'static [u8]) -> ChunkAppend {
        ChunkAppend::new(id.clone(), offset, Bytes::from_static(data))
            .with_protocol_version(TUS_RESUMABLE)
            .with_content_type(OFFSET_OCTET_STREAM)
    }

    #[tokio::test]
    async fn lock_table_does_not_grow() {
        let store = Arc::new(MemorySessionStore::new(1024));
        let backend = Arc::new(MemoryBackend::new());
        let locks = SessionLocks::new();
        let writer = ChunkWriter::new(store.clone(), backend.clone(), locks.clone(), UploadConfig::default());

        for i in 0..200 {
            let unknown = UploadId::from_string(format!("bogus{i}"));
            let err = writer.append_chunk(chunk(&unknown, 0, b"x")).await.unwrap_err();
            assert!(matches!(err, BlobError::NotFound { .. }));
        }
        assert!(locks.is_empty());

        for _ in 0..50 {
            let session = store.create(2, Metadata::new()).await.unwrap();
            backend.create_empty(&session.temp_ref).await.unwrap();
            writer.append_chunk(chunk(&session.id, 0, b"a")).await.unwrap();
            let done = writer.append_chunk(chunk(&session.id, 1, b"b")).await.unwrap();
            assert!(done.is_complete());
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn stale_bytes_past_the_offset_are_discarded() {
        let store = Arc::new(MemorySessionStore::new(1024));
        let backend = Arc::new(MemoryBackend::new());
        let writer = ChunkWriter::new(store.clone(), backend.clone(), SessionLocks::new(), UploadConfig::default());

        let session = store.create(4, Metadata::new()).await.unwrap();
        backend.create_empty(&session.temp_ref).await.unwrap();
        backend.append(&session.temp_ref, Bytes::from_static(b"zz")).await.unwrap();

        let receipt = writer.append_chunk(chunk(&session.id, 0, b"ab")).await.unwrap();
        assert_eq!(receipt.offset, 2);
        assert_eq!(&backend.read_all(&session.temp_ref).await.unwrap()[..], b"ab");
    }
}
