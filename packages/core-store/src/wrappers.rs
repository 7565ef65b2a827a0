//! Reference storage decorators and the transforms that install them.
//!
//! Each decorator delegates `id()` to the storage it wraps, so a wrapped
//! storage still identifies as its backend.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{BoxError, StorageError};
use crate::key::MountPointKey;
use crate::path::normalize_path;
use crate::storage::{usage, Storage, StorageHandle};

/// Rejects all writes and removals.
pub struct ReadOnly<S> {
    inner: S,
}

impl<S> ReadOnly<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Storage> Storage for ReadOnly<S> {
    fn id(&self) -> String {
        self.inner.id()
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        self.inner.read(path)
    }

    fn write(&self, path: &str, _data: Bytes) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly {
            path: path.to_string(),
        })
    }

    fn remove(&self, path: &str) -> Result<bool, StorageError> {
        Err(StorageError::ReadOnly {
            path: path.to_string(),
        })
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(prefix)
    }
}

/// Emits a tracing event for every operation.
pub struct Audited<S> {
    inner: S,
    mount_point: MountPointKey,
}

impl<S> Audited<S> {
    pub fn new(inner: S, mount_point: MountPointKey) -> Self {
        Self { inner, mount_point }
    }
}

impl<S: Storage> Storage for Audited<S> {
    fn id(&self) -> String {
        self.inner.id()
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        let result = self.inner.read(path);
        tracing::info!(mount_point = %self.mount_point, path, ok = result.is_ok(), "read");
        result
    }

    fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let size = data.len();
        let result = self.inner.write(path, data);
        tracing::info!(mount_point = %self.mount_point, path, size, ok = result.is_ok(), "write");
        result
    }

    fn remove(&self, path: &str) -> Result<bool, StorageError> {
        let result = self.inner.remove(path);
        tracing::info!(mount_point = %self.mount_point, path, ok = result.is_ok(), "remove");
        result
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let result = self.inner.list(prefix);
        tracing::info!(mount_point = %self.mount_point, prefix, ok = result.is_ok(), "list");
        result
    }
}

/// Caps the total size of stored objects.
///
/// Usage is recomputed from the wrapped storage on each write, so objects
/// written around the decorator are still counted. Writes are serialized
/// to keep the check and the write together.
pub struct Quota<S> {
    inner: S,
    limit: u64,
    write_lock: Mutex<()>,
}

impl<S> Quota<S> {
    pub fn new(inner: S, limit: u64) -> Self {
        Self {
            inner,
            limit,
            write_lock: Mutex::new(()),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl<S: Storage> Storage for Quota<S> {
    fn id(&self) -> String {
        self.inner.id()
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        self.inner.read(path)
    }

    fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let normalized = normalize_path(path)?;
        let used = usage(&self.inner, "")?;
        // Overwriting frees the old object's bytes.
        let replaced = match self.inner.read(&normalized)? {
            Some(existing) => existing.len() as u64,
            None => 0,
        };
        let requested = data.len() as u64;
        if used.saturating_sub(replaced) + requested > self.limit {
            return Err(StorageError::QuotaExceeded {
                path: normalized,
                used,
                limit: self.limit,
                requested,
            });
        }
        self.inner.write(&normalized, data)
    }

    fn remove(&self, path: &str) -> Result<bool, StorageError> {
        self.inner.remove(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(prefix)
    }
}

/// Transform making the listed mount points read-only.
///
/// Other mount points, and the global key, pass through untouched.
pub fn read_only<I, K>(
    mount_points: I,
) -> impl Fn(&MountPointKey, StorageHandle) -> Result<StorageHandle, BoxError> + Send + Sync + 'static
where
    I: IntoIterator<Item = K>,
    K: Into<MountPointKey>,
{
    let mount_points: HashSet<MountPointKey> = mount_points.into_iter().map(Into::into).collect();
    move |mount_point: &MountPointKey, storage: StorageHandle| {
        if mount_points.contains(mount_point) {
            let wrapped: StorageHandle = Arc::new(ReadOnly::new(storage));
            Ok::<_, BoxError>(wrapped)
        } else {
            Ok(storage)
        }
    }
}

/// Transform auditing every mount point.
pub fn audit(
) -> impl Fn(&MountPointKey, StorageHandle) -> Result<StorageHandle, BoxError> + Send + Sync + 'static
{
    |mount_point: &MountPointKey, storage: StorageHandle| {
        let wrapped: StorageHandle = Arc::new(Audited::new(storage, mount_point.clone()));
        Ok::<_, BoxError>(wrapped)
    }
}

/// Transform applying a `limit`-byte quota to every mount point.
pub fn quota(
    limit: u64,
) -> impl Fn(&MountPointKey, StorageHandle) -> Result<StorageHandle, BoxError> + Send + Sync + 'static
{
    move |_mount_point: &MountPointKey, storage: StorageHandle| {
        let wrapped: StorageHandle = Arc::new(Quota::new(storage, limit));
        Ok::<_, BoxError>(wrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStorage;

    fn memory() -> StorageHandle {
        Arc::new(MemoryStorage::new("mem"))
    }

    #[test]
    fn read_only_rejects_mutation() {
        let base = memory();
        base.write("a", Bytes::from_static(b"1")).unwrap();
        let ro = ReadOnly::new(base);

        assert_eq!(ro.read("a").unwrap(), Some(Bytes::from_static(b"1")));
        assert!(matches!(
            ro.write("a", Bytes::from_static(b"2")),
            Err(StorageError::ReadOnly { .. })
        ));
        assert!(matches!(ro.remove("a"), Err(StorageError::ReadOnly { .. })));
        assert_eq!(ro.list("").unwrap(), vec!["a"]);
        assert_eq!(ro.id(), "mem");
    }

    #[test]
    fn read_only_transform_is_selective() {
        let transform = read_only(["/docs"]);

        let docs = transform(&MountPointKey::from("/docs"), memory()).unwrap();
        assert!(docs.write("x", Bytes::new()).is_err());

        let scratch = transform(&MountPointKey::from("/scratch"), memory()).unwrap();
        assert!(scratch.write("x", Bytes::new()).is_ok());

        let global = transform(&MountPointKey::Global, memory()).unwrap();
        assert!(global.write("x", Bytes::new()).is_ok());
    }

    #[test]
    fn quota_blocks_oversized_writes() {
        let storage = Quota::new(memory(), 10);
        storage.write("a", Bytes::from_static(b"123456")).unwrap();

        let err = storage.write("b", Bytes::from_static(b"12345")).unwrap_err();
        assert!(matches!(
            err,
            StorageError::QuotaExceeded {
                used: 6,
                limit: 10,
                requested: 5,
                ..
            }
        ));

        storage.write("b", Bytes::from_static(b"1234")).unwrap();
        assert_eq!(usage(&storage, "").unwrap(), 10);
    }

    #[test]
    fn quota_counts_overwrites_once() {
        let storage = Quota::new(memory(), 8);
        storage.write("a", Bytes::from_static(b"12345678")).unwrap();
        storage.write("/a/", Bytes::from_static(b"87654321")).unwrap();
        assert!(storage.remove("a").unwrap());
        storage.write("b", Bytes::from_static(b"12345678")).unwrap();
        assert_eq!(storage.limit(), 8);
    }

    #[test]
    fn audited_passes_through() {
        let storage = Audited::new(memory(), MountPointKey::from("/logs"));
        storage.write("x", Bytes::from_static(b"hi")).unwrap();
        assert_eq!(storage.read("x").unwrap(), Some(Bytes::from_static(b"hi")));
        assert_eq!(storage.list("").unwrap(), vec!["x"]);
        assert!(storage.remove("x").unwrap());
        assert_eq!(storage.id(), "mem");
    }

    #[test]
    fn transforms_compose() {
        let base = memory();
        let wrapped = quota(4)(&MountPointKey::Global, base).unwrap();
        let wrapped = audit()(&MountPointKey::Global, wrapped).unwrap();
        assert!(wrapped.write("a", Bytes::from_static(b"1234")).is_ok());
        assert!(wrapped.write("b", Bytes::from_static(b"5")).is_err());
    }
}
