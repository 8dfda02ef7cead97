//! # tusk Configuration
//!
//! A minimal string key/value store. Applications seed it with
//! defaults, then layer environment overrides on top:
//!
//! ```rust
//! use tusk_core::TuskConfig;
//! let mut config = TuskConfig::new();
//!
//! config.set("upload.max_size", "1073741824");
//! config.set("http.port", "8000");
//!
//! assert_eq!(config.get("http.port"), Some("8000"));
//! assert_eq!(config.snapshot().get_u64("upload.max_size"), Ok(Some(1073741824)));
//! ```
//!
//! ## Environment overrides
//!
//! `load_env` maps prefixed variables onto dotted keys:
//!
//! ```bash
//! export TUSK__UPLOAD__MAX_SIZE=5368709120   # upload.max_size
//! ```

use std::collections::HashMap;
use std::num::ParseIntError;

/// Prefix understood by [`TuskConfig::load_env`].
pub const ENV_PREFIX: &str = "TUSK__";

#[derive(Debug, Default)]
pub struct TuskConfig {
    values: HashMap<String, String>,
}

impl TuskConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    ///
    /// Example: config.set("upload.max_size", "1024")
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Set a key only when it has no value yet.
    pub fn set_default<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Get a configuration value by key.
    ///
    /// Returns None if the key is not present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Apply every `TUSK__A__B=value` variable of the process environment
    /// as `a.b = value`.
    pub fn load_env(&mut self) {
        self.load_vars(std::env::vars());
    }

    /// Same as [`load_env`](Self::load_env) over an explicit variable list.
    pub fn load_vars<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if !normalized.is_empty() {
                    self.set(normalized, value);
                }
            }
        }
    }

    pub fn snapshot(&self) -> TuskConfigSnapshot {
        TuskConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TuskConfigSnapshot {
    map: HashMap<String, String>,
}

impl TuskConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    /// Parse an integer value. Missing or blank keys are `Ok(None)`; a
    /// value that is present but not a number is an error.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, ParseIntError> {
        match self.get(key).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse::<u64>().map(Some),
        }
    }
}
