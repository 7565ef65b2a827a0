//! Storewrap core: storage wrapper registry and factory.
//!
//! Storages mounted into the tree get decorated with cross-cutting behavior
//! (quota, auditing, read-only views, encryption) without the backend
//! knowing about it:
//! - `WrapperRegistry`: named wrapper transforms in registration order
//! - `MountWrapTracker`: which wrappers each mount point already has
//! - `StorageFactory`: builds backends and applies wrappers, at most once
//!   per mount point and wrapper name
//!
//! # Example
//!
//! ```rust
//! use storewrap_core::{wrappers, BackendBuilder, MountPointKey, StorageFactory, StorageHandle};
//!
//! fn mount_scratch(
//!     factory: &StorageFactory<impl BackendBuilder>,
//!     storage: StorageHandle,
//! ) -> StorageHandle {
//!     factory.add_storage_wrapper("audit", wrappers::audit());
//!     factory.wrap(&MountPointKey::from("/scratch"), storage).unwrap()
//! }
//! ```

pub use bytes::Bytes;

mod builder;
mod error;
mod factory;
mod key;
mod path;
mod registry;
mod storage;
mod tracker;
pub mod wrappers;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use builder::{BackendBuilder, BackendDescriptor, BuilderTable, ConstructorArgs};
pub use error::{BoxError, ConstructionError, Error, StorageError, WrapperError};
pub use factory::StorageFactory;
pub use key::MountPointKey;
pub use path::{is_within, normalize_path};
pub use registry::{WrapperEntry, WrapperFn, WrapperRegistry};
pub use storage::{usage, Storage, StorageHandle};
pub use tracker::{AppliedList, MountWrapTracker};
