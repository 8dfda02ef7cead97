//! TUS 1.0.0 protocol constants and the `Upload-Metadata` codec.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{BlobError, BlobResult, Metadata};

/// The only protocol revision this server speaks
pub const TUS_RESUMABLE: &str = "1.0.0";

/// Comma-separated list of supported revisions
pub const TUS_VERSION: &str = "1.0.0";

/// Supported protocol extensions
pub const TUS_EXTENSIONS: &str = "creation,termination";

/// Required body type for append requests
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Whether `version` names the supported protocol revision
pub fn is_supported_version(version: Option<&str>) -> bool {
    version.map(str::trim) == Some(TUS_RESUMABLE)
}

/// Whether a `Content-Type` value denotes an offset octet stream.
///
/// Media type parameters and letter case are ignored.
pub fn is_offset_stream(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().eq_ignore_ascii_case(OFFSET_OCTET_STREAM))
        .unwrap_or(false)
}

/// Parse an `Upload-Metadata` header: comma-separated `key base64(value)`
/// pairs. A key without a value maps to the empty string.
pub fn parse_metadata(header: &str) -> BlobResult<Metadata> {
    let mut metadata = Metadata::new();

    for pair in header.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        let mut parts = pair.splitn(2, ' ');
        let key = parts.next().unwrap_or_default().trim();
        if key.is_empty() {
            return Err(BlobError::invalid(format!("metadata pair without key: {pair:?}")));
        }

        let value = match parts.next().map(str::trim) {
            None | Some("") => String::new(),
            Some(encoded) => {
                let raw = STANDARD.decode(encoded).map_err(|e| {
                    BlobError::invalid(format!("metadata value for {key:?} is not base64: {e}"))
                })?;
                String::from_utf8(raw).map_err(|_| {
                    BlobError::invalid(format!("metadata value for {key:?} is not UTF-8"))
                })?
            }
        };

        metadata.insert(key.to_string(), value);
    }

    Ok(metadata)
}

/// Render metadata back into header form.
pub fn encode_metadata(metadata: &Metadata) -> String {
    metadata
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{} {}", key, STANDARD.encode(value.as_bytes()))
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_bare_keys() {
        // "world.txt" and "text/plain"
        let md = parse_metadata("filename d29ybGQudHh0, filetype dGV4dC9wbGFpbg==,is_confidential")
            .unwrap();
        assert_eq!(md.get("filename").map(String::as_str), Some("world.txt"));
        assert_eq!(md.get("filetype").map(String::as_str), Some("text/plain"));
        assert_eq!(md.get("is_confidential").map(String::as_str), Some(""));
    }

    #[test]
    fn rejects_bad_base64() {
        let err = parse_metadata("filename not*base64").unwrap_err();
        assert!(matches!(err, BlobError::InvalidArgument { .. }));
    }

    #[test]
    fn rejects_non_utf8_values() {
        let encoded = STANDARD.encode([0xff, 0xfe]);
        let err = parse_metadata(&format!("filename {encoded}")).unwrap_err();
        assert!(matches!(err, BlobError::InvalidArgument { .. }));
    }

    #[test]
    fn encode_is_accepted_by_parse() {
        let mut md = Metadata::new();
        md.insert("filename".into(), "résumé final.pdf".into());
        md.insert("flag".into(), String::new());

        let header = encode_metadata(&md);
        assert_eq!(parse_metadata(&header).unwrap(), md);
    }

    #[test]
    fn content_type_check_ignores_params_and_case() {
        assert!(is_offset_stream(Some("application/offset+octet-stream")));
        assert!(is_offset_stream(Some("Application/Offset+Octet-Stream; charset=binary")));
        assert!(!is_offset_stream(Some("application/octet-stream")));
        assert!(!is_offset_stream(None));
    }

    #[test]
    fn version_check_is_exact() {
        assert!(is_supported_version(Some("1.0.0")));
        assert!(!is_supported_version(Some("0.2.2")));
        assert!(!is_supported_version(None));
    }
}
