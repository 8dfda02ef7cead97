use std::sync::Arc;

use tusk_blob::UploadAdapter;

use crate::TusSettings;

#[derive(Clone)]
pub struct TuskAxumState {
    pub uploads: Arc<UploadAdapter>,
    pub settings: Arc<TusSettings>,
}

impl TuskAxumState {
    pub fn new(uploads: UploadAdapter, settings: TusSettings) -> Self {
        Self {
            uploads: Arc::new(uploads),
            settings: Arc::new(settings),
        }
    }
}
