//! Named wrapper transforms, kept in registration order.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::BoxError;
use crate::key::MountPointKey;
use crate::storage::StorageHandle;

/// A wrapper transform: decorate the storage mounted at a mount point.
pub type WrapperFn =
    Arc<dyn Fn(&MountPointKey, StorageHandle) -> Result<StorageHandle, BoxError> + Send + Sync>;

/// One registered wrapper.
#[derive(Clone)]
pub struct WrapperEntry {
    name: String,
    transform: WrapperFn,
}

impl WrapperEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> &WrapperFn {
        &self.transform
    }

    /// Run the transform.
    pub fn apply(
        &self,
        mount_point: &MountPointKey,
        storage: StorageHandle,
    ) -> Result<StorageHandle, BoxError> {
        (self.transform)(mount_point, storage)
    }
}

impl fmt::Debug for WrapperEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered registry of wrapper transforms.
///
/// Registration order is application order. Registering a name a second
/// time swaps in the new transform but keeps the slot of the first
/// registration.
///
/// # Example
///
/// ```rust
/// use storewrap_core::{MountPointKey, StorageHandle, WrapperRegistry};
///
/// let registry = WrapperRegistry::new();
/// registry.register("noop", |_mount: &MountPointKey, storage: StorageHandle| Ok(storage));
/// assert!(registry.is_registered("noop"));
/// assert_eq!(registry.names(), vec!["noop".to_string()]);
/// ```
#[derive(Default)]
pub struct WrapperRegistry {
    entries: RwLock<Vec<WrapperEntry>>,
}

impl WrapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `transform` under `name`.
    pub fn register<F>(&self, name: impl Into<String>, transform: F)
    where
        F: Fn(&MountPointKey, StorageHandle) -> Result<StorageHandle, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.register_arc(name, Arc::new(transform));
    }

    /// Register an already shared transform under `name`.
    pub fn register_arc(&self, name: impl Into<String>, transform: WrapperFn) {
        let name = name.into();
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => {
                tracing::debug!(wrapper = %name, "replacing storage wrapper");
                entry.transform = transform;
            }
            None => {
                tracing::debug!(wrapper = %name, position = entries.len(), "registering storage wrapper");
                entries.push(WrapperEntry { name, transform });
            }
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.read().iter().any(|entry| entry.name == name)
    }

    /// Snapshot of all entries in application order.
    pub fn ordered_entries(&self) -> Vec<WrapperEntry> {
        self.entries.read().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for WrapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperRegistry")
            .field("wrappers", &self.names())
            .finish()
    }
}
