//! # Config - Record Store Construction Parameters
//!
//! A store instance is identified by a base directory and a name. The pair
//! determines both backing files:
//!
//! ```text
//! <base_dir>/<name>.bin    data file (concatenated encoded records)
//! <base_dir>/<name>.json   sidecar (offset index + counters)
//! ```
//!
//! ## Environment
//!
//! [`StoreConfig::from_env`] reads:
//!
//! ```text
//! RETSTORE_DIR       base directory                  (default: "data")
//! RETSTORE_NAME      store name                      (default: "store")
//! RETSTORE_RECOVER   recover existing file pair      (default: "true")
//! RETSTORE_DEBUG     per-operation debug logging     (default: "false")
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of the binary data file.
pub const DATA_EXTENSION: &str = "bin";
/// Extension of the metadata sidecar.
pub const SIDECAR_EXTENSION: &str = "json";

/// Errors from [`StoreConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("store name must not be empty")]
    EmptyName,

    #[error("store name {0:?} must be a plain file stem (no separators or '..')")]
    InvalidName(String),
}

/// Parameters for opening a record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the file pair. Created on open if missing.
    pub base_dir: PathBuf,
    /// Store name; also stored in the sidecar and checked on recovery.
    pub name: String,
    /// Load the existing file pair instead of starting fresh when both exist.
    pub recover_if_exists: bool,
    /// Emit a `debug!` event for every append and read.
    pub debug: bool,
}

impl StoreConfig {
    /// Config for `name` under `base_dir`, recovering existing files, with
    /// per-operation logging off.
    pub fn new<P: AsRef<Path>>(base_dir: P, name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            name: name.into(),
            recover_if_exists: true,
            debug: false,
        }
    }

    #[must_use]
    pub fn recover_if_exists(mut self, recover: bool) -> Self {
        self.recover_if_exists = recover;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Reads the config from `RETSTORE_*` environment variables, falling
    /// back to the defaults listed in the crate docs. Unparseable booleans
    /// fall back to their default.
    pub fn from_env() -> Self {
        let base_dir = env_or("RETSTORE_DIR", "data");
        let name = env_or("RETSTORE_NAME", "store");
        let recover = env_or("RETSTORE_RECOVER", "true").parse().unwrap_or(true);
        let debug = env_or("RETSTORE_DEBUG", "false").parse().unwrap_or(false);

        Self::new(base_dir, name)
            .recover_if_exists(recover)
            .debug(debug)
    }

    /// Checks that `name` can be used as a file stem inside `base_dir`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.name.contains(|c: char| c == '/' || c == '\\') || self.name == "." || self.name.contains("..") {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }
        Ok(())
    }

    /// Path of the binary data file.
    pub fn data_path(&self) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", self.name, DATA_EXTENSION))
    }

    /// Path of the metadata sidecar.
    pub fn sidecar_path(&self) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", self.name, SIDECAR_EXTENSION))
    }
}

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
