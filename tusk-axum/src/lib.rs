//! tusk-axum: TUS 1.0.0 over axum.
//!
//! Maps the resumable upload protocol onto a `tusk_blob::UploadAdapter`
//! and produces protocol-correct status codes and headers.

pub mod app;
pub mod headers;
pub mod middlewares;
pub mod routes;
pub mod settings;
pub mod state;
mod error;
pub use error::TuskAxumError;
pub use settings::TusSettings;
pub use state::TuskAxumState;

pub use app::{tusk, TuskAxumApp};
pub use routes::UploadSummary;
