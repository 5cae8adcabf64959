//! Session configuration
//!
//! Loaded from TOML; every field is optional.
//!
//! ```toml
//! sync_writes = true
//! reconcile_on_attach = false
//! ```

use crate::error::{FsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Call `sync_all` on the image after every mutating operation
    pub sync_writes: bool,

    /// Resynchronise both capacity counters right after attach
    pub reconcile_on_attach: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sync_writes: false,
            reconcile_on_attach: true,
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FsError::Config(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Serialize to a TOML document
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| FsError::Config(e.to_string()))
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn with_reconcile_on_attach(mut self, reconcile: bool) -> Self {
        self.reconcile_on_attach = reconcile;
        self
    }
}
