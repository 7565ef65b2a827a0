//! Storage factory: build a backend, then apply the registered wrappers.

use std::fmt;
use std::sync::Arc;

use crate::builder::{BackendBuilder, BackendDescriptor, ConstructorArgs};
use crate::error::{BoxError, Error, WrapperError};
use crate::key::MountPointKey;
use crate::registry::WrapperRegistry;
use crate::storage::StorageHandle;
use crate::tracker::MountWrapTracker;

/// Creates storages and applies registered wrappers to them.
///
/// Every wrapper is applied at most once per mount point. Wrapping the
/// same mount point again only applies wrappers registered since the last
/// pass, so callers can re-wrap a storage they already hold whenever they
/// look it up.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use storewrap_core::{
///     BackendDescriptor, ConstructorArgs, MountPointKey, StorageFactory, StorageHandle,
/// };
/// # use storewrap_core::{Bytes, ConstructionError, Storage, StorageError};
/// # struct Empty;
/// # impl Storage for Empty {
/// #     fn id(&self) -> String { "empty".into() }
/// #     fn read(&self, _: &str) -> Result<Option<Bytes>, StorageError> { Ok(None) }
/// #     fn write(&self, _: &str, _: Bytes) -> Result<(), StorageError> { Ok(()) }
/// #     fn remove(&self, _: &str) -> Result<bool, StorageError> { Ok(false) }
/// #     fn list(&self, _: &str) -> Result<Vec<String>, StorageError> { Ok(vec![]) }
/// # }
///
/// let factory = StorageFactory::new(|_: &BackendDescriptor, _: &ConstructorArgs| {
///     Ok::<StorageHandle, ConstructionError>(Arc::new(Empty))
/// });
/// factory.add_storage_wrapper("noop", |_: &MountPointKey, s: StorageHandle| Ok(s));
///
/// let mount = MountPointKey::from("/mnt/x");
/// let storage = factory
///     .get_instance(&mount, &BackendDescriptor::new("empty"), &ConstructorArgs::new())
///     .unwrap();
/// assert_eq!(storage.id(), "empty");
/// assert_eq!(factory.tracker().applied(&mount), vec!["noop"]);
/// ```
pub struct StorageFactory<B: BackendBuilder> {
    builder: B,
    registry: Arc<WrapperRegistry>,
    tracker: Arc<MountWrapTracker>,
}

impl<B: BackendBuilder> StorageFactory<B> {
    /// Factory with a fresh registry and tracker.
    pub fn new(builder: B) -> Self {
        Self::with_state(
            builder,
            Arc::new(WrapperRegistry::new()),
            Arc::new(MountWrapTracker::new()),
        )
    }

    /// Factory sharing an existing registry and tracker.
    pub fn with_state(
        builder: B,
        registry: Arc<WrapperRegistry>,
        tracker: Arc<MountWrapTracker>,
    ) -> Self {
        Self {
            builder,
            registry,
            tracker,
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn registry(&self) -> &Arc<WrapperRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<MountWrapTracker> {
        &self.tracker
    }

    /// Register a wrapper. See [`WrapperRegistry::register`].
    pub fn add_storage_wrapper<F>(&self, name: impl Into<String>, transform: F)
    where
        F: Fn(&MountPointKey, StorageHandle) -> Result<StorageHandle, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register(name, transform);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.is_registered(name)
    }

    /// Build a storage for `descriptor` and wrap it for `mount_point`.
    ///
    /// Construction errors come back untouched and leave no trace in the
    /// tracker.
    pub fn get_instance(
        &self,
        mount_point: &MountPointKey,
        descriptor: &BackendDescriptor,
        args: &ConstructorArgs,
    ) -> Result<StorageHandle, Error> {
        let storage = self.builder.build(descriptor, args)?;
        tracing::debug!(%mount_point, %descriptor, id = %storage.id(), "constructed storage");
        Ok(self.wrap(mount_point, storage)?)
    }

    /// Apply every wrapper not yet applied to `mount_point`, in
    /// registration order.
    ///
    /// A wrapper is only recorded once its transform succeeds. On failure
    /// the returned error holds the storage as wrapped up to that point;
    /// passing it back to `wrap` resumes with the failed wrapper.
    ///
    /// The mount point's record stays locked for the whole pass. Transforms
    /// must not wrap the same mount point themselves.
    pub fn wrap(
        &self,
        mount_point: &MountPointKey,
        storage: StorageHandle,
    ) -> Result<StorageHandle, WrapperError> {
        self.wrap_with(&self.tracker, mount_point, storage)
    }

    /// [`wrap`](Self::wrap) against a caller-owned tracker.
    ///
    /// For owners that need a record scoped to one storage rather than to
    /// the process, e.g. a mount table where a path can be unmounted and
    /// mounted again with a different backend.
    pub fn wrap_with(
        &self,
        tracker: &MountWrapTracker,
        mount_point: &MountPointKey,
        storage: StorageHandle,
    ) -> Result<StorageHandle, WrapperError> {
        let entries = self.registry.ordered_entries();
        let slot = tracker.lock_mount(mount_point);
        let mut applied = slot.lock();

        let mut storage = storage;
        for entry in entries {
            if applied.contains(entry.name()) {
                tracing::debug!(%mount_point, wrapper = entry.name(), "wrapper already applied");
                continue;
            }

            match entry.apply(mount_point, storage.clone()) {
                Ok(wrapped) => {
                    tracing::debug!(%mount_point, wrapper = entry.name(), "applied wrapper");
                    storage = wrapped;
                    applied.insert(entry.name());
                }
                Err(source) => {
                    tracing::warn!(%mount_point, wrapper = entry.name(), error = %source, "wrapper failed");
                    return Err(WrapperError::new(
                        entry.name(),
                        mount_point.clone(),
                        source,
                        storage,
                    ));
                }
            }
        }

        Ok(storage)
    }
}

impl<B: BackendBuilder> fmt::Debug for StorageFactory<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageFactory")
            .field("registry", &self.registry)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}
