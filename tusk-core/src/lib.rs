//! tusk-core: transport-agnostic errors and configuration shared by the
//! tusk crates.

pub mod config;
pub mod errors;

pub use config::{TuskConfig, TuskConfigSnapshot};
pub use errors::{ErrorKind, TuskError};
