use thiserror::Error;

/// Result type for blob and upload operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob and upload operations
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Not found: {id}")]
    NotFound { id: String },

    #[error("Invalid request: {message}")]
    InvalidArgument { message: String },

    #[error("Unsupported protocol version: {version}")]
    PreconditionFailed { version: String },

    #[error("Unsupported content type: {content_type}")]
    UnsupportedMediaType { content_type: String },

    #[error("Offset mismatch: client sent {client_offset}, server is at {server_offset}")]
    Conflict {
        client_offset: u64,
        server_offset: u64,
    },

    #[error("Payload too large: {message}")]
    PayloadTooLarge { message: String },

    #[error("Blob already exists: {key}")]
    AlreadyExists { key: String },

    #[error("Resource exhausted: {message}")]
    ResourceExhausted { message: String },

    #[error("Operation timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid argument error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn precondition_failed<S: Into<String>>(version: S) -> Self {
        Self::PreconditionFailed {
            version: version.into(),
        }
    }

    pub fn unsupported_media_type<S: Into<String>>(content_type: S) -> Self {
        Self::UnsupportedMediaType {
            content_type: content_type.into(),
        }
    }

    pub fn conflict(client_offset: u64, server_offset: u64) -> Self {
        Self::Conflict {
            client_offset,
            server_offset,
        }
    }

    pub fn too_large<S: Into<String>>(message: S) -> Self {
        Self::PayloadTooLarge {
            message: message.into(),
        }
    }

    pub fn already_exists<S: Into<String>>(key: S) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    pub fn exhausted<S: Into<String>>(message: S) -> Self {
        Self::ResourceExhausted {
            message: message.into(),
        }
    }
}
