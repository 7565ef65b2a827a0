//! Test helpers: tagging wrappers, plus a minimal storage for this crate's
//! unit tests.
//!
//! The tagging helpers are exported through the `test-utils` feature.
//! Downstream crates use `storewrap_backends::InMemoryStorage` as their
//! base storage. Unit tests here cannot: a dev-dependency on the backends
//! crate links a second copy of this crate, whose `Storage` trait is not
//! the one under test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{BoxError, StorageError};
use crate::key::MountPointKey;
use crate::storage::{Storage, StorageHandle};

#[cfg(test)]
pub(crate) use memory::MemoryStorage;

/// Wrapper that records a tag in the storage id: `tag(inner)`.
///
/// Lets tests read the composition order straight off `id()`.
pub struct Tagged {
    tag: String,
    inner: StorageHandle,
}

impl Tagged {
    pub fn new(tag: impl Into<String>, inner: StorageHandle) -> Self {
        Self {
            tag: tag.into(),
            inner,
        }
    }
}

impl Storage for Tagged {
    fn id(&self) -> String {
        format!("{}({})", self.tag, self.inner.id())
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        self.inner.read(path)
    }

    fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        self.inner.write(path, data)
    }

    fn remove(&self, path: &str) -> Result<bool, StorageError> {
        self.inner.remove(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(prefix)
    }
}

/// Transform that wraps in [`Tagged`] and counts its invocations.
pub fn tag_wrapper(
    tag: &str,
    calls: Arc<AtomicUsize>,
) -> impl Fn(&MountPointKey, StorageHandle) -> Result<StorageHandle, BoxError> + Send + Sync + 'static
{
    let tag = tag.to_string();
    move |_mount_point: &MountPointKey, storage: StorageHandle| {
        calls.fetch_add(1, Ordering::SeqCst);
        let wrapped: StorageHandle = Arc::new(Tagged::new(tag.clone(), storage));
        Ok::<_, BoxError>(wrapped)
    }
}

#[cfg(test)]
mod memory {
    use std::collections::BTreeMap;

    use bytes::Bytes;
    use parking_lot::RwLock;

    use crate::error::StorageError;
    use crate::path::{is_within, normalize_path};
    use crate::storage::Storage;

    /// Bare map-backed storage.
    pub struct MemoryStorage {
        id: String,
        objects: RwLock<BTreeMap<String, Bytes>>,
    }

    impl MemoryStorage {
        pub fn new(id: impl Into<String>) -> Self {
            Self {
                id: id.into(),
                objects: RwLock::new(BTreeMap::new()),
            }
        }
    }

    impl Storage for MemoryStorage {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
            let path = normalize_path(path)?;
            Ok(self.objects.read().get(&path).cloned())
        }

        fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
            let path = normalize_path(path)?;
            self.objects.write().insert(path, data);
            Ok(())
        }

        fn remove(&self, path: &str) -> Result<bool, StorageError> {
            let path = normalize_path(path)?;
            Ok(self.objects.write().remove(&path).is_some())
        }

        fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            let prefix = normalize_path(prefix)?;
            Ok(self
                .objects
                .read()
                .keys()
                .filter(|path| is_within(path, &prefix))
                .cloned()
                .collect())
        }
    }
}
