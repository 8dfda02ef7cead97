//! TUS header names and request header parsing.

use axum::http::{HeaderMap, HeaderName};
use tusk_core::TuskError;

pub const TUS_RESUMABLE: HeaderName = HeaderName::from_static("tus-resumable");
pub const TUS_VERSION: HeaderName = HeaderName::from_static("tus-version");
pub const TUS_EXTENSION: HeaderName = HeaderName::from_static("tus-extension");
pub const TUS_MAX_SIZE: HeaderName = HeaderName::from_static("tus-max-size");
pub const UPLOAD_LENGTH: HeaderName = HeaderName::from_static("upload-length");
pub const UPLOAD_OFFSET: HeaderName = HeaderName::from_static("upload-offset");
pub const UPLOAD_METADATA: HeaderName = HeaderName::from_static("upload-metadata");
pub const UPLOAD_DEFER_LENGTH: HeaderName = HeaderName::from_static("upload-defer-length");
/// Mirror of `Location` for clients that cannot read `Location` itself
pub const UPLOAD_LOCATION: HeaderName = HeaderName::from_static("upload-location");
pub const METHOD_OVERRIDE: HeaderName = HeaderName::from_static("x-http-method-override");
pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Headers browser clients must be able to read
pub fn exposed() -> [HeaderName; 10] {
    [
        axum::http::header::LOCATION,
        UPLOAD_LOCATION,
        UPLOAD_OFFSET,
        UPLOAD_LENGTH,
        UPLOAD_METADATA,
        TUS_RESUMABLE,
        TUS_VERSION,
        TUS_EXTENSION,
        TUS_MAX_SIZE,
        REQUEST_ID,
    ]
}

/// Header value as text; non-UTF-8 values count as absent
pub fn text<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parse a non-negative integer header, `None` when absent
pub fn parse_u64(headers: &HeaderMap, name: &HeaderName) -> Result<Option<u64>, TuskError> {
    let Some(raw) = headers.get(name) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| TuskError::bad_request(format!("Invalid {} header", name.as_str())))
}

/// Parse a required non-negative integer header
pub fn require_u64(headers: &HeaderMap, name: &HeaderName) -> Result<u64, TuskError> {
    parse_u64(headers, name)?
        .ok_or_else(|| TuskError::bad_request(format!("{} header required", name.as_str())))
}

/// Reject requests that do not speak the supported protocol revision
pub fn require_version(headers: &HeaderMap) -> Result<(), TuskError> {
    let version = text(headers, &TUS_RESUMABLE);
    if tusk_blob::protocol::is_supported_version(version) {
        Ok(())
    } else {
        Err(TuskError::precondition_failed("Unsupported TUS version"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn integers_are_strict() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_u64(&headers, &UPLOAD_OFFSET).unwrap(), None);
        assert_eq!(require_u64(&headers, &UPLOAD_OFFSET).unwrap_err().code(), 400);

        headers.insert(UPLOAD_OFFSET, HeaderValue::from_static(" 42 "));
        assert_eq!(require_u64(&headers, &UPLOAD_OFFSET).unwrap(), 42);

        for bad in ["-1", "4.2", "abc", ""] {
            headers.insert(UPLOAD_OFFSET, HeaderValue::from_static(bad));
            assert_eq!(parse_u64(&headers, &UPLOAD_OFFSET).unwrap_err().code(), 400);
        }
    }

    #[test]
    fn version_must_match() {
        let mut headers = HeaderMap::new();
        assert_eq!(require_version(&headers).unwrap_err().code(), 412);

        headers.insert(TUS_RESUMABLE, HeaderValue::from_static("0.2.2"));
        assert_eq!(require_version(&headers).unwrap_err().code(), 412);

        headers.insert(TUS_RESUMABLE, HeaderValue::from_static("1.0.0"));
        assert!(require_version(&headers).is_ok());
    }
}
