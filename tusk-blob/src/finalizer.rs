use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{BlobBackend, BlobError, BlobRef, BlobResult, UploadSession};

/// Longest public name the finalizer produces, in bytes.
const MAX_NAME_BYTES: usize = 200;

/// Moves completed uploads into the permanent namespace under a
/// collision-free public name.
#[derive(Clone)]
pub struct Finalizer {
    backend: Arc<dyn BlobBackend>,
    max_attempts: u32,
}

impl Finalizer {
    pub fn new(backend: Arc<dyn BlobBackend>, max_attempts: u32) -> Self {
        Self {
            backend,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Finalize `session` and return its permanent reference.
    ///
    /// Already finalized sessions return their existing reference untouched.
    pub async fn finalize(&self, session: &UploadSession) -> BlobResult<BlobRef> {
        if let Some(existing) = &session.final_ref {
            return Ok(existing.clone());
        }

        let base = public_name(session);

        for attempt in 0..self.max_attempts {
            let candidate = BlobRef::file(candidate_name(&base, attempt));

            if self.backend.exists(&candidate).await? {
                continue;
            }

            match self.backend.rename(&session.temp_ref, &candidate).await {
                Ok(()) => {
                    info!(upload_id = %session.id, final_ref = %candidate, "upload finalized");
                    return Ok(candidate);
                }
                Err(BlobError::AlreadyExists { .. }) => {
                    debug!(upload_id = %session.id, candidate = %candidate, "lost naming race, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(upload_id = %session.id, base = %base, attempts = self.max_attempts, "no free file name");
        Err(BlobError::exhausted(format!(
            "no free name for {:?} after {} attempts",
            base, self.max_attempts
        )))
    }
}

/// Base public name for a session: its sanitized `filename` metadata, or
/// the session id.
fn public_name(session: &UploadSession) -> String {
    let sanitized = sanitize_filename(session.filename().unwrap_or_default());
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        session.id.to_string()
    } else {
        sanitized
    }
}

/// Keep alphanumerics, `.`, `-`, `_` and space; trim surrounding whitespace.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect();
    let kept = kept.trim();

    if kept.len() <= MAX_NAME_BYTES {
        return kept.to_string();
    }

    let (stem, ext) = split_extension(kept);
    let budget = MAX_NAME_BYTES.saturating_sub(ext.len());
    let mut end = budget.min(stem.len());
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", stem[..end].trim_end(), ext)
}

/// `report.pdf`, `report_1.pdf`, `report_2.pdf`, ...
pub fn candidate_name(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    let (stem, ext) = split_extension(base);
    format!("{stem}_{attempt}{ext}")
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => name.split_at(idx),
        _ => (name, ""),
    }
}
