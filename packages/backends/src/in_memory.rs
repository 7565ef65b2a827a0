//! In-memory storage.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use storewrap_core::{is_within, normalize_path, Storage, StorageError};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Storage keeping objects in a sorted map.
///
/// # Example
///
/// ```rust
/// use storewrap_backends::InMemoryStorage;
/// use storewrap_core::{Bytes, Storage};
///
/// let storage = InMemoryStorage::new();
/// storage.write("users/alice", Bytes::from_static(b"Alice")).unwrap();
///
/// let data = storage.read("/users/alice").unwrap().unwrap();
/// assert_eq!(data, Bytes::from_static(b"Alice"));
/// ```
pub struct InMemoryStorage {
    id: String,
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl InMemoryStorage {
    /// Create an empty storage with a process-unique id.
    pub fn new() -> Self {
        Self::with_id(format!("memory::{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for InMemoryStorage {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        let path = normalize_path(path)?;
        Ok(self.objects.read().get(&path).cloned())
    }

    fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Err(StorageError::InvalidPath {
                message: "cannot write to the storage root".to_string(),
            });
        }
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
