use tusk_core::TuskConfig;

/// Server configuration: `TUSK__*` environment variables, with built-in
/// defaults for every key they leave unset.
pub fn tusk_config() -> TuskConfig {
    let mut config = TuskConfig::new();
    config.load_env();
    apply_defaults(&mut config);
    config
}

pub fn defaults() -> TuskConfig {
    let mut config = TuskConfig::new();
    apply_defaults(&mut config);
    config
}

fn apply_defaults(config: &mut TuskConfig) {
    config.set_default("http.host", "127.0.0.1");
    config.set_default("http.port", "8000");
    config.set_default("upload.base_path", "/uploads");
    config.set_default("upload.files_path", "/files");
    config.set_default("upload.download_path", "/download");
    config.set_default("upload.max_size", (1024u64 * 1024 * 1024).to_string()); // 1GB
    config.set_default("upload.max_chunk_size", (64usize * 1024 * 1024).to_string()); // 64MB
    config.set_default("upload.finalize_attempts", "256");
    config.set_default("upload.io_timeout_ms", "30000");
    config.set_default("upload.sweep_interval_secs", "300");
    config.set_default("storage.backend", "filesystem");
    config.set_default("storage.temp_dir", "./temp");
    config.set_default("storage.files_dir", "./uploads");
    config.set_default("cors.origins", "*");
}
