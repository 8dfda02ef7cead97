/// HTTP-level settings of the upload routes
#[derive(Debug, Clone)]
pub struct TusSettings {
    /// Collection endpoint; items live at `{base_path}/{id}`
    pub base_path: String,
    /// Inline file endpoint, `{files_path}/{name}`
    pub files_path: String,
    /// Attachment download endpoint, `{download_path}/{name}`
    pub download_path: String,
    /// Largest request body accepted by one append
    pub max_chunk_size: usize,
    /// Allowed CORS origins; empty or `*` allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for TusSettings {
    fn default() -> Self {
        Self {
            base_path: "/uploads".to_string(),
            files_path: "/files".to_string(),
            download_path: "/download".to_string(),
            max_chunk_size: 64 * 1024 * 1024, // 64MB
            cors_origins: Vec::new(),
        }
    }
}

impl TusSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_path<S: Into<String>>(mut self, path: S) -> Self {
        self.base_path = normalize(path.into());
        self
    }

    pub fn with_files_path<S: Into<String>>(mut self, path: S) -> Self {
        self.files_path = normalize(path.into());
        self
    }

    pub fn with_download_path<S: Into<String>>(mut self, path: S) -> Self {
        self.download_path = normalize(path.into());
        self
    }

    pub fn with_max_chunk_size(mut self, bytes: usize) -> Self {
        self.max_chunk_size = bytes;
        self
    }

    pub fn with_cors_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Item endpoint of an upload
    pub fn upload_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_path, id)
    }

    /// Where a finalized file is served
    pub fn file_url(&self, name: &str) -> String {
        format!("{}/{}", self.files_path, name)
    }
}

/// `uploads/` -> `/uploads`
fn normalize(path: String) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
