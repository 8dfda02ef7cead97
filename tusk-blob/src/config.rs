use std::time::Duration;

/// Configuration for the upload subsystem
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Largest `Upload-Length` a client may declare
    pub max_size: u64,

    /// How many candidate names the finalizer tries before giving up
    pub finalize_attempts: u32,

    /// Upper bound for one append (backend write + finalization)
    pub io_timeout: Option<Duration>,

    /// Incomplete sessions idle for longer than this are swept
    pub expire_after: Option<Duration>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size: 1024 * 1024 * 1024, // 1GB
            finalize_attempts: 256,
            io_timeout: Some(Duration::from_secs(30)),
            expire_after: None,
        }
    }
}

impl UploadConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max declared upload size
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Set how many names the finalizer may try
    pub fn with_finalize_attempts(mut self, attempts: u32) -> Self {
        self.finalize_attempts = attempts.max(1);
        self
    }

    /// Bound each append by a timeout
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Never time out appends
    pub fn without_io_timeout(mut self) -> Self {
        self.io_timeout = None;
        self
    }

    /// Sweep incomplete sessions idle for longer than `age`
    pub fn with_expire_after(mut self, age: Duration) -> Self {
        self.expire_after = Some(age);
        self
    }
}
