//! # tusk-blob: resumable upload engine
//!
//! `tusk-blob` implements the server side of resumable uploads: sessions that
//! accept a file in offset-validated chunks, survive client disconnects, and
//! end with the bytes moved under a collision-free permanent name.
//!
//! It knows nothing about HTTP. `tusk-axum` maps the TUS wire protocol onto
//! [`UploadAdapter`]; any other transport can do the same.
//!
//! ## Quick Start
//!
//! ```rust
//! use tusk_blob::prelude::*;
//! use tusk_blob::protocol::{OFFSET_OCTET_STREAM, TUS_RESUMABLE};
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let uploads = UploadAdapter::in_memory(UploadConfig::default());
//!
//! let mut metadata = Metadata::new();
//! metadata.insert("filename".to_string(), "hello.txt".to_string());
//! let session = uploads.create(13, metadata).await?;
//!
//! let chunk = ChunkAppend::new(session.id.clone(), 0, bytes::Bytes::from_static(b"Hello, world!"))
//!     .with_protocol_version(TUS_RESUMABLE)
//!     .with_content_type(OFFSET_OCTET_STREAM);
//! let receipt = uploads.append(chunk).await?;
//!
//! assert_eq!(receipt.final_ref, Some(BlobRef::file("hello.txt")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  UploadAdapter  │  ← create / status / append / terminate / fetch
//! ├─────────────────┤
//! │   ChunkWriter   │  ← per-session lock, offset checks, Finalizer
//! ├────────┬────────┤
//! │Sessions│ Blobs  │  ← SessionStore + BlobBackend
//! └────────┴────────┘
//! ```

pub mod adapter;
mod config;
mod error;
mod finalizer;
mod fs_store;
mod lock;
mod memory_store;
pub mod protocol;
mod receipt;
mod session_store;
pub mod store;
mod types;
mod upload;
mod writer;

// Re-export main types for clean API
pub use adapter::UploadAdapter;
pub use config::UploadConfig;
pub use error::{BlobError, BlobResult};
pub use finalizer::{candidate_name, sanitize_filename, Finalizer};
pub use fs_store::FilesystemBackend;
pub use lock::{SessionGuard, SessionLocks};
pub use memory_store::MemoryBackend;
pub use receipt::{AppendReceipt, OpenedFile};
pub use session_store::MemorySessionStore;
pub use store::BlobBackend;
pub use types::{
    BlobRef, ByteStream, ChunkAppend, Metadata, Namespace, UploadId, UploadSession, UploadState,
};
pub use upload::{SessionMutator, SessionStore};
pub use writer::ChunkWriter;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AppendReceipt, BlobBackend, BlobError, BlobRef, BlobResult, ChunkAppend, Metadata,
        SessionStore, UploadAdapter, UploadConfig, UploadId, UploadSession, UploadState,
    };
}
