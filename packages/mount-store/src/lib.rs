//! Mount table for storewrap.
//!
//! Storages are built from a [`MountConfig`] (or handed over ready-made),
//! wrapped by the shared `StorageFactory`, and addressed by absolute paths
//! routed to the longest matching mount:
//! - Read and write through [`MountTable::read`] / [`MountTable::write`]
//! - Load a layout with [`MountTableConfig::from_path`]
//! - Register the reference wrappers with [`WrapperConfig::register_into`]

pub mod config;
mod error;
pub mod mount_table;

pub use config::{MountTableConfig, WrapperConfig};
pub use error::{ConfigError, MountError};
pub use mount_table::{normalize_mount_path, MountConfig, MountInfo, MountTable};
