use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::protocol::{OFFSET_OCTET_STREAM, TUS_RESUMABLE};
use crate::store::validate_name;
use crate::{
    AppendReceipt, BlobBackend, BlobError, BlobRef, BlobResult, ChunkAppend, ChunkWriter,
    MemoryBackend, MemorySessionStore, Metadata, OpenedFile, SessionLocks, SessionStore,
    UploadConfig, UploadId, UploadSession,
};

/// The upload adapter - what the HTTP layer (or any other transport) embeds.
///
/// Ties the session store, the blob backend, the chunk writer and the
/// finalizer together behind the five protocol operations: create, status,
/// append, terminate and fetch.
#[derive(Clone)]
pub struct UploadAdapter {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn BlobBackend>,
    writer: ChunkWriter,
    locks: SessionLocks,
    config: UploadConfig,
}

impl UploadAdapter {
    /// Create a new upload adapter
    pub fn new<S, B>(store: S, backend: B, config: UploadConfig) -> Self
    where
        S: SessionStore + 'static,
        B: BlobBackend + 'static,
    {
        Self::from_arcs(Arc::new(store), Arc::new(backend), config)
    }

    pub fn from_arcs(
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn BlobBackend>,
        config: UploadConfig,
    ) -> Self {
        let locks = SessionLocks::new();
        let writer = ChunkWriter::new(store.clone(), backend.clone(), locks.clone(), config.clone());
        Self {
            store,
            backend,
            writer,
            locks,
            config,
        }
    }

    /// Fully in-process adapter: memory session store and memory backend
    pub fn in_memory(config: UploadConfig) -> Self {
        let store = MemorySessionStore::new(config.max_size);
        Self::new(store, MemoryBackend::new(), config)
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn max_size(&self) -> u64 {
        self.config.max_size
    }

    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    /// Start a new upload of `declared_length` bytes.
    ///
    /// A zero-length upload is finalized immediately; if that fails the
    /// upload is discarded and the error returned.
    pub async fn create(&self, declared_length: u64, metadata: Metadata) -> BlobResult<UploadSession> {
        if declared_length > self.config.max_size {
            return Err(BlobError::too_large(format!(
                "declared length {} exceeds maximum {}",
                declared_length, self.config.max_size
            )));
        }

        let session = self.store.create(declared_length, metadata).await?;

        if let Err(e) = self.backend.create_empty(&session.temp_ref).await {
            if let Err(cleanup) = self.store.delete(&session.id).await {
                warn!(upload_id = %session.id, error = %cleanup, "failed to drop session after temp blob error");
            }
            return Err(e);
        }

        info!(upload_id = %session.id, length = declared_length, "upload created");

        if declared_length > 0 {
            return Ok(session);
        }

        let empty = ChunkAppend::new(session.id.clone(), 0, Bytes::new())
            .with_protocol_version(TUS_RESUMABLE)
            .with_content_type(OFFSET_OCTET_STREAM);
        if let Err(e) = self.writer.append_chunk(empty).await {
            warn!(upload_id = %session.id, error = %e, "finalizing empty upload failed");
            if let Err(cleanup) = self.terminate(&session.id).await {
                warn!(upload_id = %session.id, error = %cleanup, "failed to discard empty upload");
            }
            return Err(e);
        }
        self.store.get(&session.id).await
    }

    /// Current state of an upload
    pub async fn status(&self, id: &UploadId) -> BlobResult<UploadSession> {
        self.store.get(id).await
    }

    /// Apply one chunk
    pub async fn append(&self, chunk: ChunkAppend) -> BlobResult<AppendReceipt> {
        self.writer.append_chunk(chunk).await
    }

    /// Delete an upload's temporary blob and its session record.
    ///
    /// A finalized file stays reachable under its public name.
    pub async fn terminate(&self, id: &UploadId) -> BlobResult<()> {
        self.terminate_if(id, |_| true).await.map(|_| ())
    }

    /// Terminate `id` if `still_wanted` holds for its state as seen under
    /// the session lock. Returns whether it was removed.
    async fn terminate_if<F>(&self, id: &UploadId, still_wanted: F) -> BlobResult<bool>
    where
        F: FnOnce(&UploadSession) -> bool,
    {
        let _guard = self.locks.acquire(id).await;

        let session = self.store.get(id).await?;
        if !still_wanted(&session) {
            return Ok(false);
        }
        let removed_blob = self.backend.delete(&session.temp_ref).await?;
        self.store.delete(id).await?;

        info!(upload_id = %id, removed_blob, "upload terminated");
        Ok(true)
    }

    /// Open a finalized file by its public name
    pub async fn fetch(&self, name: &str) -> BlobResult<OpenedFile> {
        validate_name(name)?;
        let blob = BlobRef::file(name);
        let size_bytes = self.backend.size(&blob).await?;
        let stream = self.backend.read_stream(&blob).await?;
        Ok(OpenedFile {
            blob,
            size_bytes,
            stream,
        })
    }

    /// Read a finalized file fully into memory
    pub async fn read_file(&self, name: &str) -> BlobResult<Bytes> {
        validate_name(name)?;
        self.backend.read_all(&BlobRef::file(name)).await
    }

    /// Every known session, oldest first
    pub async fn list(&self) -> BlobResult<Vec<UploadSession>> {
        self.store.list().await
    }

    /// Terminate incomplete uploads idle for longer than the configured
    /// `expire_after`. Returns how many were removed.
    pub async fn sweep_expired(&self) -> BlobResult<usize> {
        match self.config.expire_after {
            Some(max_age) => self.sweep_older_than(max_age).await,
            None => Ok(0),
        }
    }

    /// Terminate incomplete uploads idle for longer than `max_age`
    pub async fn sweep_older_than(&self, max_age: Duration) -> BlobResult<usize> {
        let mut removed = 0;

        for session in self.store.list().await? {
            if !is_expired(&session, max_age) {
                continue;
            }

            // The listing is a snapshot; an append may land before the lock
            // is ours, so expiry is decided again under it.
            match self
                .terminate_if(&session.id, |current| is_expired(current, max_age))
                .await
            {
                Ok(true) => removed += 1,
                Ok(false) => {
                    debug!(upload_id = %session.id, "upload resumed, not swept");
                }
                Err(BlobError::NotFound { .. }) => {
                    debug!(upload_id = %session.id, "already gone before sweep");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(removed)
    }
}

/// Incomplete and idle for longer than `max_age`
fn is_expired(session: &UploadSession, max_age: Duration) -> bool {
    if session.is_complete() {
        return false;
    }
    let idle = (Utc::now() - session.updated_at).to_std().unwrap_or_default();
    idle > max_age
}
