//! Mount point identifiers.

use std::fmt;

/// Identifies the mount point a storage is being wrapped for.
///
/// Most storages belong to a concrete mount path. Storages that are not tied
/// to any mount use [`MountPointKey::Global`]. The two never alias: a path
/// that happens to read `<global>` is still a path.
///
/// There is no boolean shorthand; the global key is always spelled out:
///
/// ```compile_fail
/// let _ = storewrap_core::MountPointKey::from(false);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MountPointKey {
    /// Not bound to a specific mount.
    Global,
    /// A concrete mount path.
    Path(String),
}

impl MountPointKey {
    /// Key for a concrete mount path.
    pub fn path(path: impl Into<String>) -> Self {
        MountPointKey::Path(path.into())
    }

    pub fn is_global(&self) -> bool {
        matches!(self, MountPointKey::Global)
    }

    /// The mount path, or `None` for the global key.
    pub fn as_path(&self) -> Option<&str> {
        match self {
            MountPointKey::Global => None,
            MountPointKey::Path(p) => Some(p),
        }
    }
}

impl fmt::Display for MountPointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountPointKey::Global => write!(f, "<global>"),
            MountPointKey::Path(p) => write!(f, "{}", p),
        }
    }
}

impl From<&str> for MountPointKey {
    fn from(path: &str) -> Self {
        MountPointKey::Path(path.to_string())
    }
}

impl From<String> for MountPointKey {
    fn from(path: String) -> Self {
        MountPointKey::Path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn global_and_path_do_not_collide() {
        let global = MountPointKey::Global;
        let lookalike = MountPointKey::from("<global>");
        assert_ne!(global, lookalike);
        assert_eq!(global.to_string(), lookalike.to_string());

        let set: HashSet<_> = [global, lookalike].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn global_has_no_path() {
        assert!(MountPointKey::Global.is_global());
        assert_eq!(MountPointKey::Global.as_path(), None);
    }

    #[test]
    fn path_accessors() {
        let key = MountPointKey::path("/mnt/x");
        assert!(!key.is_global());
        assert_eq!(key.as_path(), Some("/mnt/x"));
        assert_eq!(key, MountPointKey::from("/mnt/x".to_string()));
    }
}
