//! Storage backed by a local directory.

use std::path::{Component, Path, PathBuf};
use std::{fs, io};

use bytes::Bytes;
use storewrap_core::{
    is_within, normalize_path, BackendDescriptor, ConstructionError, Storage, StorageError,
};

use crate::LOCAL;

/// One file per object under `root`. Directories are created on demand.
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<LocalDiskStorage, ConstructionError> {
        let root = root.into();
        let invalid = |message: String| ConstructionError::InvalidArguments {
            descriptor: BackendDescriptor::new(LOCAL),
            message,
        };

        let attr = fs::metadata(&root)
            .map_err(|e| invalid(format!("root '{}' is not accessible: {}", root.display(), e)))?;
        if !attr.is_dir() {
            return Err(invalid(format!(
                "root '{}' must be a directory",
                root.display()
            )));
        }

        let root = root.canonicalize().map_err(|e| ConstructionError::Backend {
            descriptor: BackendDescriptor::new(LOCAL),
            source: Box::new(e),
        })?;
        Ok(LocalDiskStorage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, normalized: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(normalized.split('/').filter(|c| !c.is_empty()));
        path
    }

    fn relative(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        parts.map(|p| p.join("/"))
    }
}

impl Storage for LocalDiskStorage {
    fn id(&self) -> String {
        format!("local::{}", self.root.display())
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        let file_path = self.file_path(&normalize_path(path)?);
        log::debug!("Reading {}...", file_path.display());
        if !file_path.is_file() {
            return Ok(None);
        }
        match fs::read(&file_path) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let normalized = normalize_path(path)?;
        if normalized.is_empty() {
            return Err(StorageError::InvalidPath {
                message: "cannot write to the storage root".to_string(),
            });
        }
        let file_path = self.file_path(&normalized);
        log::debug!("Writing {}...", file_path.display());
        if file_path.is_dir() {
            return Err(StorageError::InvalidPath {
                message: format!("'{}' is a directory", normalized),
            });
        }
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file_path, &data)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<bool, StorageError> {
        let file_path = self.file_path(&normalize_path(path)?);
        if !file_path.is_file() {
            return Ok(false);
        }
        log::debug!("Removing {}...", file_path.display());
        fs::remove_file(&file_path)?;
        Ok(true)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let prefix = normalize_path(prefix)?;
        let start = self.file_path(&prefix);
        if !start.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(&start).sort_by_file_name() {
            let entry = entry.map_err(|e| StorageError::Other {
                message: format!("failed to walk '{}': {}", start.display(), e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(relative) = self.relative(entry.path()) {
                if is_within(&relative, &prefix) {
                    paths.push(relative);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }
}
