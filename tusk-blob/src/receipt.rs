use serde::{Deserialize, Serialize};

use crate::{BlobRef, ByteStream, UploadId, UploadSession};

/// Outcome of an accepted append
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendReceipt {
    pub upload_id: UploadId,
    /// Offset after the chunk was applied
    pub offset: u64,
    pub declared_length: u64,
    /// Permanent reference, present once the upload is finalized
    pub final_ref: Option<BlobRef>,
}

impl AppendReceipt {
    pub fn from_session(session: &UploadSession) -> Self {
        Self {
            upload_id: session.id.clone(),
            offset: session.offset,
            declared_length: session.declared_length,
            final_ref: session.final_ref.clone(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.final_ref.is_some()
    }
}

/// A finalized file opened for reading
pub struct OpenedFile {
    pub blob: BlobRef,
    pub size_bytes: u64,
    pub stream: ByteStream,
}

impl OpenedFile {
    /// Public name the file is served under
    pub fn name(&self) -> &str {
        &self.blob.name
    }
}

impl std::fmt::Debug for OpenedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedFile")
            .field("blob", &self.blob)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}
