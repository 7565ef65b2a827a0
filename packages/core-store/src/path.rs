//! Storage-relative path handling.

use crate::error::StorageError;

/// Normalize a storage-relative path.
///
/// Leading and trailing slashes, empty segments and `.` segments are dropped.
/// The root normalizes to the empty string. `..` is rejected: a storage never
/// hands out anything above its own root.
pub fn normalize_path(path: &str) -> Result<String, StorageError> {
    let mut components = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                return Err(StorageError::InvalidPath {
                    message: format!("'{}' escapes the storage root", path),
                })
            }
            c => components.push(c),
        }
    }
    Ok(components.join("/"))
}

/// Whether normalized `path` lies at or below normalized `prefix`.
///
/// Matching is per component: `docs` covers `docs/a` but not `docsx`.
pub fn is_within(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
