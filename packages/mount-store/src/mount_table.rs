//! A mount table whose storages are built and wrapped by a `StorageFactory`.
//!
//! Every lookup re-runs the factory's wrap pass for the mount, so wrappers
//! registered after a storage was mounted still reach it, exactly once.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use storewrap_core::{
    is_within, normalize_path, BackendBuilder, BackendDescriptor, ConstructorArgs,
    MountPointKey, MountWrapTracker, StorageFactory, StorageHandle,
};

use crate::config::MountTableConfig;
use crate::error::MountError;

/// How to build the storage for a mount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MountConfig {
    pub backend: BackendDescriptor,
    #[serde(default, skip_serializing_if = "ConstructorArgs::is_empty")]
    pub args: ConstructorArgs,
}

impl MountConfig {
    pub fn new(backend: impl Into<BackendDescriptor>) -> Self {
        Self {
            backend: backend.into(),
            args: ConstructorArgs::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// Information about a mount point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MountInfo {
    pub path: String,
    /// `None` for storages mounted directly with [`MountTable::mount_storage`].
    pub config: Option<MountConfig>,
    pub storage_id: String,
    /// Wrappers applied so far, in application order.
    pub wrappers: Vec<String>,
}

struct Mount {
    config: Option<MountConfig>,
    storage: StorageHandle,
    // Scoped to this mount so a later mount at the same path starts clean.
    applied: MountWrapTracker,
}

/// Mounted storages keyed by normalized mount path.
pub struct MountTable<B: BackendBuilder> {
    factory: Arc<StorageFactory<B>>,
    mounts: RwLock<BTreeMap<String, Mount>>,
}

/// Normalize a mount path to `/a/b` form; the root is `/`.
pub fn normalize_mount_path(path: &str) -> Result<String, MountError> {
    let normalized = normalize_path(path).map_err(MountError::InvalidPath)?;
    Ok(format!("/{}", normalized))
}

impl<B: BackendBuilder> MountTable<B> {
    pub fn new(factory: Arc<StorageFactory<B>>) -> Self {
        Self {
            factory,
            mounts: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build a table and mount everything `config` lists.
    pub fn from_config(
        factory: Arc<StorageFactory<B>>,
        config: &MountTableConfig,
    ) -> Result<Self, MountError> {
        let table = Self::new(factory);
        for (path, mount) in &config.mounts {
            table.mount(path, mount.clone())?;
        }
        Ok(table)
    }

    pub fn factory(&self) -> &Arc<StorageFactory<B>> {
        &self.factory
    }

    /// Build a storage from `config` and mount it at `path`.
    ///
    /// Replaces whatever was mounted there. Nothing is mounted if
    /// construction or wrapping fails.
    pub fn mount(&self, path: &str, config: MountConfig) -> Result<(), MountError> {
        let path = normalize_mount_path(path)?;
        let storage = self
            .factory
            .builder()
            .build(&config.backend, &config.args)
            .map_err(storewrap_core::Error::from)?;
        tracing::info!(mount = %path, backend = %config.backend, "mounting storage");
        self.install(path, Some(config), storage)
    }

    /// Mount a pre-built storage at `path`.
    ///
    /// This bypasses the builder for storages with setup the builder cannot
    /// express. The registered wrappers are still applied.
    pub fn mount_storage(&self, path: &str, storage: StorageHandle) -> Result<(), MountError> {
        let path = normalize_mount_path(path)?;
        tracing::info!(mount = %path, id = %storage.id(), "mounting prebuilt storage");
        self.install(path, None, storage)
    }

    fn install(
        &self,
        path: String,
        config: Option<MountConfig>,
        storage: StorageHandle,
    ) -> Result<(), MountError> {
        let applied = MountWrapTracker::new();
        let storage = self
            .factory
            .wrap_with(&applied, &MountPointKey::Path(path.clone()), storage)?;
        let replaced = self.mounts.write().insert(
            path.clone(),
            Mount {
                config,
                storage,
                applied,
            },
        );
        if replaced.is_some() {
            tracing::info!(mount = %path, "replaced existing mount");
        }
        Ok(())
    }

    /// Unmount the storage at `path`.
    pub fn unmount(&self, path: &str) -> Result<(), MountError> {
        let path = normalize_mount_path(path)?;
        match self.mounts.write().remove(&path) {
            Some(_) => {
                tracing::info!(mount = %path, "unmounted storage");
                Ok(())
            }
            None => Err(MountError::NotMounted { path }),
        }
    }

    pub fn is_mounted(&self, path: &str) -> bool {
        match normalize_mount_path(path) {
            Ok(path) => self.mounts.read().contains_key(&path),
            Err(_) => false,
        }
    }

    /// All mounts, sorted by path.
    pub fn list_mounts(&self) -> Vec<MountInfo> {
        self.mounts
            .read()
            .iter()
            .map(|(path, mount)| MountInfo {
                path: path.clone(),
                config: mount.config.clone(),
                storage_id: mount.storage.id(),
                wrappers: mount.applied.applied(&MountPointKey::Path(path.clone())),
            })
            .collect()
    }

    /// The storage mounted at exactly `path`, with any newly registered
    /// wrappers applied.
    pub fn get(&self, path: &str) -> Result<StorageHandle, MountError> {
        let path = normalize_mount_path(path)?;
        self.current(&path)?.ok_or(MountError::NotMounted { path })
    }

    /// Re-run the wrap pass for every mount.
    pub fn refresh(&self) -> Result<(), MountError> {
        let mut mounts = self.mounts.write();
        for (path, mount) in mounts.iter_mut() {
            self.rewrap(path, mount)?;
        }
        Ok(())
    }

    /// The wrapped storage for the mount at `path`, or `None` if nothing is
    /// mounted there.
    ///
    /// Lookups share the read lock. The write lock is only taken when a
    /// registered wrapper has not reached this mount yet.
    fn current(&self, path: &str) -> Result<Option<StorageHandle>, MountError> {
        {
            let mounts = self.mounts.read();
            match mounts.get(path) {
                None => return Ok(None),
                Some(mount) if self.is_current(path, mount) => {
                    return Ok(Some(mount.storage.clone()))
                }
                Some(_) => {}
            }
        }

        // The mount may have changed while no lock was held.
        let mut mounts = self.mounts.write();
        match mounts.get_mut(path) {
            Some(mount) => self.rewrap(path, mount).map(Some),
            None => Ok(None),
        }
    }

    fn is_current(&self, path: &str, mount: &Mount) -> bool {
        let key = MountPointKey::path(path);
        self.factory
            .registry()
            .names()
            .iter()
            .all(|name| mount.applied.has_applied(&key, name))
    }

    fn rewrap(&self, path: &str, mount: &mut Mount) -> Result<StorageHandle, MountError> {
        let key = MountPointKey::path(path);
        match self
            .factory
            .wrap_with(&mount.applied, &key, mount.storage.clone())
        {
            Ok(storage) => {
                mount.storage = storage.clone();
                Ok(storage)
            }
            Err(e) => {
                // Keep the wrappers that did apply; the failed one is retried
                // on the next lookup.
                mount.storage = e.partial().clone();
                Err(e.into())
            }
        }
    }

    /// Find the mount covering `path` (longest prefix wins).
    ///
    /// Returns the storage and `path` relative to the mount.
    pub fn resolve(&self, path: &str) -> Result<(StorageHandle, String), MountError> {
        let normalized = normalize_path(path).map_err(MountError::InvalidPath)?;
        let no_mount = || MountError::NoMount {
            path: format!("/{}", normalized),
        };

        let mount_path = self
            .mounts
            .read()
            .keys()
            .filter(|mount_path| is_within(&normalized, mount_path.trim_start_matches('/')))
            .max_by_key(|mount_path| mount_path.len())
            .cloned()
            .ok_or_else(no_mount)?;
        let relative = normalized
            .strip_prefix(mount_path.trim_start_matches('/'))
            .unwrap_or(&normalized)
            .trim_start_matches('/')
            .to_string();

        let storage = self.current(&mount_path)?.ok_or_else(no_mount)?;
        Ok((storage, relative))
    }

    pub fn read(&self, path: &str) -> Result<Option<Bytes>, MountError> {
        let (storage, relative) = self.resolve(path)?;
        Ok(storage.read(&relative)?)
    }

    pub fn write(&self, path: &str, data: Bytes) -> Result<(), MountError> {
        let (storage, relative) = self.resolve(path)?;
        Ok(storage.write(&relative, data)?)
    }

    pub fn remove(&self, path: &str) -> Result<bool, MountError> {
        let (storage, relative) = self.resolve(path)?;
        Ok(storage.remove(&relative)?)
    }

    /// List objects under `prefix`, as absolute paths.
    ///
    /// Only the mount covering `prefix` is consulted; mounts nested below it
    /// are not merged in.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, MountError> {
        let normalized = normalize_path(prefix).map_err(MountError::InvalidPath)?;
        let (storage, relative) = self.resolve(&normalized)?;
        let mount_base = normalized
            .strip_suffix(relative.as_str())
            .unwrap_or(&normalized)
            .trim_end_matches('/');

        Ok(storage
            .list(&relative)?
            .into_iter()
            .map(|p| {
                if mount_base.is_empty() {
                    format!("/{}", p)
                } else {
                    format!("/{}/{}", mount_base, p)
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storewrap_backends::InMemoryStorage;
    use storewrap_core::testing::tag_wrapper;
    use storewrap_core::{BuilderTable, ConstructionError, Error, StorageError};

    fn factory() -> Arc<StorageFactory<BuilderTable>> {
        Arc::new(StorageFactory::new(BuilderTable::new().with(
            "memory",
            |args: &ConstructorArgs| {
                let id = args.get("id").and_then(|v| v.as_str()).unwrap_or("mem");
                Ok(Arc::new(InMemoryStorage::with_id(id)) as StorageHandle)
            },
        )))
    }

    #[test]
    fn mount_paths_are_normalized() {
        assert_eq!(normalize_mount_path("data/").unwrap(), "/data");
        assert_eq!(normalize_mount_path("/").unwrap(), "/");
        assert_eq!(normalize_mount_path("").unwrap(), "/");
        assert!(normalize_mount_path("/a/../..").is_err());
    }

    #[test]
    fn mount_and_list() {
        let table = MountTable::new(factory());
        table
            .mount("/data", MountConfig::new("memory").with_arg("id", "d"))
            .unwrap();
        table.mount("tmp", MountConfig::new("memory")).unwrap();

        let mounts = table.list_mounts();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].path, "/data");
        assert_eq!(mounts[0].storage_id, "d");
        assert_eq!(mounts[1].path, "/tmp");
        assert!(table.is_mounted("/tmp/"));
    }

    #[test]
    fn unknown_backend_mounts_nothing() {
        let table = MountTable::new(factory());
        let err = table.mount("/x", MountConfig::new("webdav")).unwrap_err();
        assert!(matches!(
            err,
            MountError::Factory(Error::Construction(ConstructionError::UnknownBackend { .. }))
        ));
        assert!(table.list_mounts().is_empty());
    }

    #[test]
    fn unmount_missing_is_an_error() {
        let table = MountTable::new(factory());
        assert!(matches!(
            table.unmount("/nope"),
            Err(MountError::NotMounted { .. })
        ));
    }

    #[test]
    fn resolve_prefers_longest_prefix() {
        let table = MountTable::new(factory());
        table.mount("/", MountConfig::new("memory").with_arg("id", "root")).unwrap();
        table
            .mount("/data", MountConfig::new("memory").with_arg("id", "data"))
            .unwrap();
        table
            .mount("/data/archive", MountConfig::new("memory").with_arg("id", "archive"))
            .unwrap();

        let (storage, rel) = table.resolve("/data/archive/2020/a.txt").unwrap();
        assert_eq!(storage.id(), "archive");
        assert_eq!(rel, "2020/a.txt");

        let (storage, rel) = table.resolve("/data/x").unwrap();
        assert_eq!(storage.id(), "data");
        assert_eq!(rel, "x");

        let (storage, rel) = table.resolve("/database").unwrap();
        assert_eq!(storage.id(), "root");
        assert_eq!(rel, "database");

        let (storage, rel) = table.resolve("/data").unwrap();
        assert_eq!(storage.id(), "data");
        assert_eq!(rel, "");
    }

    #[test]
    fn resolve_without_cover_fails() {
        let table = MountTable::new(factory());
        table.mount("/data", MountConfig::new("memory")).unwrap();
        assert!(matches!(
            table.resolve("/other/file"),
            Err(MountError::NoMount { .. })
        ));
    }

    #[test]
    fn routed_io() {
        let table = MountTable::new(factory());
        table.mount("/data", MountConfig::new("memory")).unwrap();
        table.mount("/", MountConfig::new("memory")).unwrap();

        table.write("/data/a/b", Bytes::from_static(b"1")).unwrap();
        table.write("/top", Bytes::from_static(b"2")).unwrap();

        assert_eq!(table.read("/data/a/b").unwrap(), Some(Bytes::from_static(b"1")));
        assert_eq!(table.list("/data").unwrap(), vec!["/data/a/b"]);
        assert_eq!(table.list("/data/a").unwrap(), vec!["/data/a/b"]);
        assert_eq!(table.list("/").unwrap(), vec!["/top"]);
        assert!(table.remove("/data/a/b").unwrap());
        assert_eq!(table.read("/data/a/b").unwrap(), None);
    }

    #[test]
    fn late_wrappers_reach_existing_mounts_once() {
        let factory = factory();
        let table = MountTable::new(factory.clone());
        table.mount("/data", MountConfig::new("memory")).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        factory.add_storage_wrapper("tag", tag_wrapper("T", calls.clone()));

        assert_eq!(table.get("/data").unwrap().id(), "T(mem)");
        assert_eq!(table.get("/data").unwrap().id(), "T(mem)");
        table.refresh().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.list_mounts()[0].wrappers, vec!["tag"]);
    }

    #[test]
    fn remount_gets_wrapped_again() {
        let factory = factory();
        let calls = Arc::new(AtomicUsize::new(0));
        factory.add_storage_wrapper("tag", tag_wrapper("T", calls.clone()));

        let table = MountTable::new(factory);
        table.mount("/data", MountConfig::new("memory")).unwrap();
        table.unmount("/data").unwrap();
        table
            .mount("/data", MountConfig::new("memory").with_arg("id", "fresh"))
            .unwrap();

        assert_eq!(table.get("/data").unwrap().id(), "T(fresh)");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_wrapper_is_retried_on_next_lookup() {
        let factory = factory();
        let table = MountTable::new(factory.clone());
        table.mount("/data", MountConfig::new("memory")).unwrap();

        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        factory.add_storage_wrapper("flaky", move |_: &MountPointKey, s: StorageHandle| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("not yet".into());
            }
            Ok(s)
        });

        assert!(matches!(
            table.get("/data"),
            Err(MountError::Factory(Error::Wrapper(_)))
        ));
        assert!(table.list_mounts()[0].wrappers.is_empty());
        assert!(table.get("/data").is_ok());
        assert_eq!(table.list_mounts()[0].wrappers, vec!["flaky"]);
    }

    #[test]
    fn failed_wrapping_mounts_nothing() {
        let factory = factory();
        let table = MountTable::new(factory.clone());
        table
            .mount("/d", MountConfig::new("memory").with_arg("id", "old"))
            .unwrap();
        factory.add_storage_wrapper("broken", |_: &MountPointKey, _: StorageHandle| {
            Err("boom".into())
        });

        let err = table
            .mount("/d", MountConfig::new("memory").with_arg("id", "new"))
            .unwrap_err();
        assert!(matches!(err, MountError::Factory(Error::Wrapper(_))));
        let mounts = table.list_mounts();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].storage_id, "old");

        let err = table.mount("/e", MountConfig::new("memory")).unwrap_err();
        assert!(matches!(err, MountError::Factory(Error::Wrapper(_))));
        assert!(!table.is_mounted("/e"));

        assert!(matches!(
            table.refresh(),
            Err(MountError::Factory(Error::Wrapper(_)))
        ));
        assert_eq!(table.list_mounts()[0].storage_id, "old");
    }

    #[test]
    fn concurrent_lookups_wrap_once() {
        let factory = factory();
        let table = MountTable::new(factory.clone());
        table.mount("/data", MountConfig::new("memory")).unwrap();
        table.write("/data/a", Bytes::from_static(b"1")).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        factory.add_storage_wrapper("tag", tag_wrapper("T", calls.clone()));

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..20 {
                        assert_eq!(table.read("/data/a").unwrap(), Some(Bytes::from_static(b"1")));
                        assert_eq!(table.get("/data").unwrap().id(), "T(mem)");
                    }
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unmounted_lookup_fails() {
        let table = MountTable::new(factory());
        table.mount("/data", MountConfig::new("memory")).unwrap();
        table.unmount("/data").unwrap();
        assert!(matches!(table.get("/data"), Err(MountError::NotMounted { .. })));
        assert!(matches!(table.read("/data/a"), Err(MountError::NoMount { .. })));
    }

    #[test]
    fn storage_errors_surface() {
        let factory = factory();
        factory.add_storage_wrapper("ro", storewrap_core::wrappers::read_only(["/docs"]));
        let table = MountTable::new(factory);
        table.mount("/docs", MountConfig::new("memory")).unwrap();

        assert!(matches!(
            table.write("/docs/a", Bytes::new()),
            Err(MountError::Storage(StorageError::ReadOnly { .. }))
        ));
    }

    #[test]
    fn prebuilt_storage_is_wrapped() {
        let factory = factory();
        let calls = Arc::new(AtomicUsize::new(0));
        factory.add_storage_wrapper("tag", tag_wrapper("T", calls));
        let table = MountTable::new(factory);

        table
            .mount_storage("/help", Arc::new(InMemoryStorage::with_id("help")))
            .unwrap();
        let info = &table.list_mounts()[0];
        assert_eq!(info.storage_id, "T(help)");
        assert_eq!(info.config, None);
    }
}
