use async_trait::async_trait;

use crate::{BlobResult, Metadata, UploadId, UploadSession};

/// Mutation applied to a session record by [`SessionStore::update`].
///
/// Returning an error aborts the update and leaves the record untouched.
pub type SessionMutator<'a> = Box<dyn FnOnce(&mut UploadSession) -> BlobResult<()> + Send + 'a>;

/// Storage for upload session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocate a new session.
    ///
    /// Fails with `PayloadTooLarge` when `declared_length` is above the
    /// store's configured maximum.
    async fn create(&self, declared_length: u64, metadata: Metadata) -> BlobResult<UploadSession>;

    /// Get a session, or `NotFound`
    async fn get(&self, id: &UploadId) -> BlobResult<UploadSession>;

    /// Apply `mutator` atomically with respect to other updates of the same id
    async fn update(&self, id: &UploadId, mutator: SessionMutator<'_>) -> BlobResult<UploadSession>;

    /// Delete a session, returning whether it existed
    async fn delete(&self, id: &UploadId) -> BlobResult<bool>;

    /// Snapshot of every known session
    async fn list(&self) -> BlobResult<Vec<UploadSession>>;
}
