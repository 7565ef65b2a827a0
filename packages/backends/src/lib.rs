//! Reference storage backends.
//!
//! - [`InMemoryStorage`]: objects in a map, gone with the process
//! - [`LocalDiskStorage`]: one file per object under a root directory
//!
//! [`default_builders`] registers both under the descriptors `"memory"` and
//! `"local"` for use with a `StorageFactory`.

pub mod in_memory;
pub mod local_disk;

use std::sync::Arc;

use storewrap_core::{
    BackendDescriptor, BuilderTable, ConstructionError, ConstructorArgs, StorageHandle,
};

pub use in_memory::InMemoryStorage;
pub use local_disk::LocalDiskStorage;

pub const MEMORY: &str = "memory";
pub const LOCAL: &str = "local";

/// Builder table with the `memory` and `local` backends.
///
/// `local` requires a `path` argument naming an existing directory.
pub fn default_builders() -> BuilderTable {
    BuilderTable::new()
        .with(MEMORY, |_: &ConstructorArgs| {
            let storage: StorageHandle = Arc::new(InMemoryStorage::new());
            Ok(storage)
        })
        .with(LOCAL, |args: &ConstructorArgs| {
            let root = args.get("path").and_then(|v| v.as_str()).ok_or_else(|| {
                ConstructionError::InvalidArguments {
                    descriptor: BackendDescriptor::new(LOCAL),
                    message: "expected a string 'path' argument".to_string(),
                }
            })?;
            let storage: StorageHandle = Arc::new(LocalDiskStorage::new(root)?);
            Ok(storage)
        })
}
