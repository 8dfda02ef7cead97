use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use tusk_blob::BlobError;
use tusk_core::errors::TuskError;

use crate::headers::UPLOAD_OFFSET;

#[derive(Debug)]
pub struct TuskAxumError(pub anyhow::Error);

impl From<anyhow::Error> for TuskAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<TuskError> for TuskAxumError {
    fn from(e: TuskError) -> Self {
        Self(e.into_anyhow())
    }
}

impl From<BlobError> for TuskAxumError {
    fn from(e: BlobError) -> Self {
        Self(anyhow::Error::new(e))
    }
}

/// Translate an upload error into its protocol-level status
fn from_blob(err: &BlobError) -> TuskError {
    match err {
        BlobError::NotFound { .. } => TuskError::not_found(err.to_string()),
        BlobError::InvalidArgument { message } => TuskError::bad_request(message.clone()),
        BlobError::PreconditionFailed { .. } => TuskError::precondition_failed(err.to_string()),
        BlobError::UnsupportedMediaType { .. } => {
            TuskError::unsupported_media_type(err.to_string())
        }
        BlobError::Conflict { server_offset, .. } => {
            TuskError::conflict(err.to_string()).with_data(json!({ "offset": server_offset }))
        }
        BlobError::PayloadTooLarge { message } => TuskError::payload_too_large(message.clone()),
        BlobError::Timeout { .. } => TuskError::unavailable(err.to_string()),
        BlobError::ResourceExhausted { message } => TuskError::general_error(message.clone()),
        BlobError::AlreadyExists { .. } | BlobError::Backend { .. } | BlobError::Io { .. } => {
            TuskError::general_error("Storage failure")
        }
    }
}

impl IntoResponse for TuskAxumError {
    fn into_response(self) -> Response {
        // Upload errors first, then TuskError (even if wrapped by anyhow contexts)
        let blob = self.0.chain().find_map(|e| e.downcast_ref::<BlobError>());
        let tusk = match blob {
            Some(blob) => from_blob(blob),
            None => match TuskError::find_in(&self.0) {
                Some(tusk) => tusk.clone(),
                None => TuskError::general_error(self.0.to_string()),
            },
        };

        let status = StatusCode::from_u16(tusk.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        }

        let mut res = (status, Json(tusk.to_json())).into_response();
        if let Some(BlobError::Conflict { server_offset, .. }) = blob {
            res.headers_mut()
                .insert(UPLOAD_OFFSET, HeaderValue::from(*server_offset));
        }
        res
    }
}
