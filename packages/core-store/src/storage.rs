//! The storage interface seen by wrappers.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::StorageError;

/// A storage backend mounted somewhere in the tree.
///
/// The wrapper layer never looks inside a storage; it only hands handles to
/// wrapper transforms. The operations here are what decorators intercept.
///
/// Paths are relative to the storage root. Implementations should run them
/// through [`normalize_path`](crate::normalize_path).
///
/// # Object Safety
///
/// This trait is object-safe: storages travel as [`StorageHandle`].
pub trait Storage: Send + Sync {
    /// Stable identifier of the underlying backend.
    fn id(&self) -> String;

    /// Read an object.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - Nothing stored at the path.
    /// * `Ok(Some(bytes))` - The object contents.
    /// * `Err(StorageError)` - An error occurred.
    fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError>;

    /// Write an object, replacing any previous contents.
    fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError>;

    /// Remove an object. Returns `true` if something was removed.
    fn remove(&self, path: &str) -> Result<bool, StorageError>;

    /// List object paths under a prefix, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Shared handle to a (possibly wrapped) storage.
pub type StorageHandle = Arc<dyn Storage>;

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn id(&self) -> String {
        self.as_ref().id()
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        self.as_ref().read(path)
    }

    fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        self.as_ref().write(path, data)
    }

    fn remove(&self, path: &str) -> Result<bool, StorageError> {
        self.as_ref().remove(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.as_ref().list(prefix)
    }
}

impl<T: Storage + ?Sized> Storage for Box<T> {
    fn id(&self) -> String {
        self.as_ref().id()
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        self.as_ref().read(path)
    }

    fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        self.as_ref().write(path, data)
    }

    fn remove(&self, path: &str) -> Result<bool, StorageError> {
        self.as_ref().remove(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.as_ref().list(prefix)
    }
}

/// Total size in bytes of everything stored under `prefix`.
pub fn usage(storage: &dyn Storage, prefix: &str) -> Result<u64, StorageError> {
    let mut total = 0u64;
    for path in storage.list(prefix)? {
        if let Some(data) = storage.read(&path)? {
            total += data.len() as u64;
        }
    }
    Ok(total)
}
