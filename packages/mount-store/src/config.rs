//! JSON configuration for a mount table.
//!
//! ```json
//! {
//!   "mounts": {
//!     "/data": {"backend": "local", "args": {"path": "/srv/data"}},
//!     "/tmp": {"backend": "memory"}
//!   },
//!   "wrappers": {"read_only": ["/data"], "audit": true, "quota": 1048576}
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use storewrap_core::{wrappers, BackendBuilder, MountPointKey, StorageFactory};

use crate::error::ConfigError;
use crate::mount_table::{normalize_mount_path, MountConfig};

pub const QUOTA_WRAPPER: &str = "quota";
pub const READ_ONLY_WRAPPER: &str = "read_only";
pub const AUDIT_WRAPPER: &str = "audit";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MountTableConfig {
    #[serde(default)]
    pub mounts: BTreeMap<String, MountConfig>,
    #[serde(default)]
    pub wrappers: WrapperConfig,
}

impl MountTableConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}

/// Which reference wrappers to register.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WrapperConfig {
    /// Mount paths to expose read-only.
    #[serde(default)]
    pub read_only: Vec<String>,
    #[serde(default)]
    pub audit: bool,
    /// Per-mount byte limit.
    #[serde(default)]
    pub quota: Option<u64>,
}

impl WrapperConfig {
    /// Register the configured wrappers: quota, then read-only, then audit.
    ///
    /// Quota sits closest to the backend and audit is outermost.
    /// Mount paths that fail to normalize are skipped with a warning.
    pub fn register_into<B: BackendBuilder>(&self, factory: &StorageFactory<B>) {
        if let Some(limit) = self.quota {
            factory.add_storage_wrapper(QUOTA_WRAPPER, wrappers::quota(limit));
        }
        if !self.read_only.is_empty() {
            let mut mounts = Vec::with_capacity(self.read_only.len());
            for path in &self.read_only {
                match normalize_mount_path(path) {
                    Ok(path) => mounts.push(MountPointKey::Path(path)),
                    Err(e) => tracing::warn!(path = %path, error = %e, "ignoring read-only entry"),
                }
            }
            factory.add_storage_wrapper(READ_ONLY_WRAPPER, wrappers::read_only(mounts));
        }
        if self.audit {
            factory.add_storage_wrapper(AUDIT_WRAPPER, wrappers::audit());
        }
    }
}
