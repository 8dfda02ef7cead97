mod app;
mod sweeper;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tusk_axum::{TusSettings, TuskAxumApp};
use tusk_blob::{BlobBackend, FilesystemBackend, MemoryBackend, MemorySessionStore, UploadAdapter, UploadConfig};
use tusk_core::TuskConfigSnapshot;

pub use app::{defaults, tusk_config};
pub use sweeper::ExpirySweeper;

/// Build the HTTP app from configuration
pub async fn build(config: &TuskConfigSnapshot) -> Result<TuskAxumApp> {
    let upload_config = upload_config(config)?;
    let backend = backend(config).await?;
    let store = MemorySessionStore::new(upload_config.max_size);

    let uploads = UploadAdapter::from_arcs(Arc::new(store), backend, upload_config);
    Ok(tusk_axum::tusk(uploads, tus_settings(config)?))
}

/// The expiry sweeper for `ax`, when `upload.expire_after_secs` is set
pub fn sweeper(ax: &TuskAxumApp, config: &TuskConfigSnapshot) -> Result<Option<ExpirySweeper>> {
    if ax.uploads().config().expire_after.is_none() {
        return Ok(None);
    }
    let every = u64_key(config, "upload.sweep_interval_secs")?.unwrap_or(300).max(1);
    Ok(Some(ExpirySweeper::new(
        Arc::clone(ax.uploads()),
        Duration::from_secs(every),
    )))
}

pub fn upload_config(config: &TuskConfigSnapshot) -> Result<UploadConfig> {
    let mut upload = UploadConfig::new();

    if let Some(max_size) = u64_key(config, "upload.max_size")? {
        upload = upload.with_max_size(max_size);
    }
    if let Some(attempts) = u64_key(config, "upload.finalize_attempts")? {
        let attempts = u32::try_from(attempts).context("upload.finalize_attempts is too large")?;
        upload = upload.with_finalize_attempts(attempts);
    }
    upload = match u64_key(config, "upload.io_timeout_ms")? {
        Some(0) => upload.without_io_timeout(),
        Some(ms) => upload.with_io_timeout(Duration::from_millis(ms)),
        None => upload,
    };
    if let Some(secs) = u64_key(config, "upload.expire_after_secs")? {
        upload = upload.with_expire_after(Duration::from_secs(secs));
    }

    Ok(upload)
}

pub fn tus_settings(config: &TuskConfigSnapshot) -> Result<TusSettings> {
    let mut settings = TusSettings::new();

    if let Some(path) = config.get("upload.base_path") {
        settings = settings.with_base_path(path);
    }
    if let Some(path) = config.get("upload.files_path") {
        settings = settings.with_files_path(path);
    }
    if let Some(path) = config.get("upload.download_path") {
        settings = settings.with_download_path(path);
    }
    if let Some(bytes) = u64_key(config, "upload.max_chunk_size")? {
        let bytes = usize::try_from(bytes).context("upload.max_chunk_size is too large")?;
        settings = settings.with_max_chunk_size(bytes);
    }
    if let Some(origins) = config.get("cors.origins") {
        settings = settings.with_cors_origins(
            origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty()),
        );
    }

    Ok(settings)
}

async fn backend(config: &TuskConfigSnapshot) -> Result<Arc<dyn BlobBackend>> {
    match config.get("storage.backend").unwrap_or("filesystem") {
        "filesystem" => {
            let temp_dir = config.get("storage.temp_dir").unwrap_or("./temp");
            let files_dir = config.get("storage.files_dir").unwrap_or("./uploads");
            let backend = FilesystemBackend::new(temp_dir, files_dir)
                .await
                .with_context(|| format!("failed to prepare {temp_dir} and {files_dir}"))?;
            Ok(Arc::new(backend))
        }
        "memory" => Ok(Arc::new(MemoryBackend::new())),
        other => bail!("unknown storage.backend {other:?}, expected filesystem or memory"),
    }
}

fn u64_key(config: &TuskConfigSnapshot, key: &str) -> Result<Option<u64>> {
    config.get_u64(key).with_context(|| {
        let raw = config.get(key).unwrap_or_default();
        format!("{key} must be a non-negative integer, got {raw:?}")
    })
}
