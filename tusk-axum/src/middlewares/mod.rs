pub mod tus_headers;

pub use tus_headers::{TusHeaders, TusHeadersService};
