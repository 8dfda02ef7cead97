use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};
use tusk_blob::{BlobResult, UploadAdapter};

/// Periodically terminates incomplete uploads that stopped making progress
pub struct ExpirySweeper {
    uploads: Arc<UploadAdapter>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(uploads: Arc<UploadAdapter>, interval: Duration) -> Self {
        Self { uploads, interval }
    }

    /// Run forever; meant for `tokio::spawn`
    pub async fn start(self) {
        let mut ticker = interval(self.interval);

        info!(interval = ?self.interval, "starting upload expiry sweeper");

        loop {
            ticker.tick().await;

            match self.sweep_once().await {
                Ok(0) => debug!("no expired uploads"),
                Ok(removed) => info!(removed, "swept expired uploads"),
                Err(e) => warn!(error = %e, "upload sweep failed"),
            }
        }
    }

    /// Run one sweep cycle
    pub async fn sweep_once(&self) -> BlobResult<usize> {
        self.uploads.sweep_expired().await
    }
}
