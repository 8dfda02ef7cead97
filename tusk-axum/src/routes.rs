//! TUS 1.0.0 routes (core protocol plus the creation and termination
//! extensions), file serving, and the upload listing.

use std::time::Duration;

use axum::{
    body::Body,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, options},
    Json, Router,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};
use tusk_blob::{protocol, ChunkAppend, Metadata, UploadId, UploadSession, UploadState};
use tusk_core::TuskError;

use crate::headers::{
    self, METHOD_OVERRIDE, TUS_RESUMABLE, UPLOAD_DEFER_LENGTH, UPLOAD_LENGTH, UPLOAD_LOCATION,
    UPLOAD_METADATA, UPLOAD_OFFSET,
};
use crate::middlewares::TusHeaders;
use crate::{TusSettings, TuskAxumError, TuskAxumState};

/// JSON view of one upload session
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub id: String,
    pub filename: Option<String>,
    pub length: u64,
    pub offset: u64,
    pub state: UploadState,
    pub metadata: Metadata,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadSummary {
    pub fn new(session: &UploadSession, settings: &TusSettings) -> Self {
        Self {
            id: session.id.to_string(),
            filename: session.filename().map(str::to_string),
            length: session.declared_length,
            offset: session.offset,
            state: session.state(),
            metadata: session.metadata.clone(),
            file_url: session
                .final_ref
                .as_ref()
                .map(|blob| settings.file_url(&blob.name)),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

pub fn router(state: TuskAxumState) -> Router<()> {
    let settings = state.settings.clone();
    let base = settings.base_path.as_str();
    let cors = cors_layer(&settings);

    let uploads = Router::new()
        .route(base, options(capabilities).post(create).get(list))
        .route(&format!("{base}/"), options(capabilities).post(create).get(list))
        .route(
            &format!("{base}/{{id}}"),
            options(capabilities)
                .head(status)
                .get(summary)
                .patch(append)
                .post(post_override)
                .delete(terminate),
        )
        .layer(DefaultBodyLimit::max(settings.max_chunk_size))
        .layer(cors.clone())
        .with_state(state.clone());

    let files = Router::new()
        .route(&format!("{}/{{name}}", settings.files_path), get(serve_file))
        .route(&format!("{}/{{name}}", settings.download_path), get(download_file))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state.clone());

    uploads
        .merge(files)
        .layer(TusHeaders::new(state.uploads.max_size()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn cors_layer(settings: &TusSettings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers(headers::exposed())
        .max_age(Duration::from_secs(24 * 60 * 60));

    if settings.cors_origins.is_empty() || settings.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

fn map_body_rejection(rejection: BytesRejection) -> TuskError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        TuskError::payload_too_large(rejection.body_text())
    } else {
        TuskError::bad_request(rejection.body_text())
    }
}

async fn capabilities() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health() -> &'static str {
    "ok"
}

#[instrument(skip_all)]
async fn create(
    State(state): State<TuskAxumState>,
    headers: HeaderMap,
) -> Result<Response, TuskAxumError> {
    headers::require_version(&headers)?;

    if headers.contains_key(UPLOAD_DEFER_LENGTH) {
        return Err(TuskError::bad_request("Deferred upload length is not supported").into());
    }
    let length = headers::require_u64(&headers, &UPLOAD_LENGTH)?;

    let metadata = match headers.get(UPLOAD_METADATA) {
        Some(raw) => {
            let raw = raw
                .to_str()
                .map_err(|_| TuskError::bad_request("Invalid Upload-Metadata header"))?;
            protocol::parse_metadata(raw)?
        }
        None => Metadata::new(),
    };

    let session = state.uploads.create(length, metadata).await?;
    let location = HeaderValue::from_str(&state.settings.upload_url(session.id.as_str()))
        .map_err(|e| TuskError::general_error(e.to_string()))?;

    info!(upload_id = %session.id, length, "created upload");
    Ok((
        StatusCode::CREATED,
        [
            (LOCATION, location.clone()),
            (UPLOAD_LOCATION, location),
            (UPLOAD_OFFSET, HeaderValue::from(session.offset)),
        ],
    )
        .into_response())
}

#[instrument(skip_all, fields(upload_id = %id))]
async fn status(
    State(state): State<TuskAxumState>,
    Path(id): Path<String>,
) -> Result<Response, TuskAxumError> {
    let session = state.uploads.status(&UploadId::from_string(id)).await?;

    let mut res = StatusCode::OK.into_response();
    let headers = res.headers_mut();
    headers.insert(UPLOAD_LENGTH, HeaderValue::from(session.declared_length));
    headers.insert(UPLOAD_OFFSET, HeaderValue::from(session.offset));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if !session.metadata.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&protocol::encode_metadata(&session.metadata)) {
            headers.insert(UPLOAD_METADATA, value);
        }
    }
    Ok(res)
}

#[instrument(skip_all, fields(upload_id = %id))]
async fn append(
    State(state): State<TuskAxumState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, TuskAxumError> {
    apply_chunk(&state, id, &headers, body).await
}

/// `POST` on an item, for clients that cannot send `PATCH` or `DELETE`
#[instrument(skip_all, fields(upload_id = %id))]
async fn post_override(
    State(state): State<TuskAxumState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, TuskAxumError> {
    let method = headers::text(&headers, &METHOD_OVERRIDE)
        .map(str::trim)
        .unwrap_or_default();

    if method.eq_ignore_ascii_case("PATCH") {
        apply_chunk(&state, id, &headers, body).await
    } else if method.eq_ignore_ascii_case("DELETE") {
        remove(&state, id, &headers).await
    } else {
        Err(TuskError::method_not_allowed(
            "POST on an upload requires X-HTTP-Method-Override: PATCH or DELETE",
        )
        .into())
    }
}

#[instrument(skip_all, fields(upload_id = %id))]
async fn terminate(
    State(state): State<TuskAxumState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, TuskAxumError> {
    remove(&state, id, &headers).await
}

async fn apply_chunk(
    state: &TuskAxumState,
    id: String,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, TuskAxumError> {
    headers::require_version(headers)?;
    let offset = headers::require_u64(headers, &UPLOAD_OFFSET)?;
    // A body that did not arrive completely is never applied.
    let data = body.map_err(map_body_rejection)?;

    let mut chunk = ChunkAppend::new(UploadId::from_string(id), offset, data);
    if let Some(version) = headers::text(headers, &TUS_RESUMABLE) {
        chunk = chunk.with_protocol_version(version);
    }
    if let Some(content_type) = headers::text(headers, &CONTENT_TYPE) {
        chunk = chunk.with_content_type(content_type);
    }

    let receipt = state.uploads.append(chunk).await?;
    Ok((
        StatusCode::NO_CONTENT,
        [(UPLOAD_OFFSET, HeaderValue::from(receipt.offset))],
    )
        .into_response())
}

async fn remove(
    state: &TuskAxumState,
    id: String,
    headers: &HeaderMap,
) -> Result<Response, TuskAxumError> {
    headers::require_version(headers)?;
    state.uploads.terminate(&UploadId::from_string(id)).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn summary(
    State(state): State<TuskAxumState>,
    Path(id): Path<String>,
) -> Result<Json<UploadSummary>, TuskAxumError> {
    let session = state.uploads.status(&UploadId::from_string(id)).await?;
    Ok(Json(UploadSummary::new(&session, &state.settings)))
}

async fn list(State(state): State<TuskAxumState>) -> Result<Json<Vec<UploadSummary>>, TuskAxumError> {
    let sessions = state.uploads.list().await?;
    Ok(Json(
        sessions
            .iter()
            .map(|session| UploadSummary::new(session, &state.settings))
            .collect(),
    ))
}

async fn serve_file(
    State(state): State<TuskAxumState>,
    Path(name): Path<String>,
) -> Result<Response, TuskAxumError> {
    file_response(&state, &name, false).await
}

async fn download_file(
    State(state): State<TuskAxumState>,
    Path(name): Path<String>,
) -> Result<Response, TuskAxumError> {
    file_response(&state, &name, true).await
}

async fn file_response(
    state: &TuskAxumState,
    name: &str,
    attachment: bool,
) -> Result<Response, TuskAxumError> {
    let opened = state.uploads.fetch(name).await?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_LENGTH, opened.size_bytes);
    if attachment {
        builder = builder.header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", opened.name()),
        );
    }

    builder
        .body(Body::from_stream(opened.stream))
        .map_err(|e| TuskError::general_error(e.to_string()).into())
}
