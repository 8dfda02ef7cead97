use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use crate::{
    BlobError, BlobResult, Metadata, SessionMutator, SessionStore, UploadId, UploadSession,
};

/// In-memory upload session store.
///
/// Records live for the lifetime of the process: a restart drops every
/// in-flight and completed session. Implement [`SessionStore`] over a
/// durable key-value store when that matters.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<UploadId, UploadSession>>,
    max_size: u64,
}

impl MemorySessionStore {
    pub fn new(max_size: u64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_size,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, declared_length: u64, metadata: Metadata) -> BlobResult<UploadSession> {
        if declared_length > self.max_size {
            return Err(BlobError::too_large(format!(
                "declared length {} exceeds maximum {}",
                declared_length, self.max_size
            )));
        }

        // Ids are random; a collision would silently alias two uploads.
        loop {
            let session = UploadSession::new(UploadId::new(), declared_length, metadata.clone());
            match self.sessions.entry(session.id.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(session.clone());
                    return Ok(session);
                }
            }
        }
    }

    async fn get(&self, id: &UploadId) -> BlobResult<UploadSession> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BlobError::not_found(id.to_string()))
    }

    async fn update(&self, id: &UploadId, mutator: SessionMutator<'_>) -> BlobResult<UploadSession> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| BlobError::not_found(id.to_string()))?;

        let mut draft = entry.value().clone();
        mutator(&mut draft)?;
        draft.updated_at = Utc::now();
        *entry.value_mut() = draft.clone();
        Ok(draft)
    }

    async fn delete(&self, id: &UploadId) -> BlobResult<bool> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn list(&self) -> BlobResult<Vec<UploadSession>> {
        let mut sessions: Vec<UploadSession> =
            self.sessions.iter().map(|entry| entry.value().clone()).collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}
