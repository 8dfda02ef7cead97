use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;
use uuid::Uuid;

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Client-supplied key/value pairs attached to an upload at creation
pub type Metadata = BTreeMap<String, String>;

/// Unique identifier for an upload session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UploadId(pub String);

impl UploadId {
    /// Generate a new random upload ID
    pub fn new() -> Self {
        Self(format!("upl_{}", Uuid::new_v4().simple()))
    }

    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical namespace a blob lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// In-flight upload bytes, keyed by upload id
    Temp,
    /// Finalized files, keyed by their public name
    Files,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Temp => "temp",
            Namespace::Files => "files",
        }
    }
}

/// Backend-independent reference to a named blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobRef {
    pub namespace: Namespace,
    pub name: String,
}

impl BlobRef {
    pub fn new<S: Into<String>>(namespace: Namespace, name: S) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Temporary blob backing an in-flight upload
    pub fn temp(id: &UploadId) -> Self {
        Self::new(Namespace::Temp, id.as_str())
    }

    /// Permanent blob under its public name
    pub fn file<S: Into<String>>(name: S) -> Self {
        Self::new(Namespace::Files, name)
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace.as_str(), self.name)
    }
}

/// Observable protocol state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// No bytes yet
    Created,
    /// Some bytes, not all
    InProgress,
    /// Finalized under a permanent name
    Completed,
}

/// Upload session state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: UploadId,
    pub declared_length: u64,
    pub offset: u64,
    pub temp_ref: BlobRef,
    pub metadata: Metadata,
    pub final_ref: Option<BlobRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(id: UploadId, declared_length: u64, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            temp_ref: BlobRef::temp(&id),
            id,
            declared_length,
            offset: 0,
            metadata,
            final_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> UploadState {
        if self.final_ref.is_some() {
            UploadState::Completed
        } else if self.offset == 0 {
            UploadState::Created
        } else {
            UploadState::InProgress
        }
    }

    pub fn is_complete(&self) -> bool {
        self.final_ref.is_some()
    }

    /// Bytes still expected from the client
    pub fn remaining(&self) -> u64 {
        self.declared_length.saturating_sub(self.offset)
    }

    /// Filename requested by the client, if any
    pub fn filename(&self) -> Option<&str> {
        self.metadata.get("filename").map(|s| s.as_str())
    }
}

/// One append request against an upload
#[derive(Debug, Clone)]
pub struct ChunkAppend {
    pub upload_id: UploadId,
    pub offset: u64,
    pub protocol_version: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl ChunkAppend {
    pub fn new(upload_id: UploadId, offset: u64, data: Bytes) -> Self {
        Self {
            upload_id,
            offset,
            protocol_version: None,
            content_type: None,
            data,
        }
    }

    pub fn with_protocol_version<S: Into<String>>(mut self, version: S) -> Self {
        self.protocol_version = Some(version.into());
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_offset_and_final_ref() {
        let mut session = UploadSession::new(UploadId::new(), 10, Metadata::new());
        assert_eq!(session.state(), UploadState::Created);

        session.offset = 4;
        assert_eq!(session.state(), UploadState::InProgress);
        assert_eq!(session.remaining(), 6);

        session.offset = 10;
        session.final_ref = Some(BlobRef::file("a.bin"));
        assert_eq!(session.state(), UploadState::Completed);
        assert!(session.is_complete());
    }

    #[test]
    fn temp_ref_is_derived_from_id() {
        let id = UploadId::from_string("upl_abc".to_string());
        let session = UploadSession::new(id, 1, Metadata::new());
        assert_eq!(session.temp_ref, BlobRef::new(Namespace::Temp, "upl_abc"));
        assert_eq!(session.temp_ref.to_string(), "temp/upl_abc");
    }
}
