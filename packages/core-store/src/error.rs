//! Error types for the wrapper layer.
//!
//! Construction failures and wrapper failures are kept apart so callers can
//! tell "the backend never came up" from "a decorator refused the storage".

use std::fmt;

use crate::key::MountPointKey;
use crate::storage::StorageHandle;
use crate::BackendDescriptor;

/// Boxed error returned by wrapper transforms and backend constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by storage operations.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("path '{path}' is read-only")]
    ReadOnly { path: String },

    #[error("quota exceeded writing '{path}': {used} of {limit} bytes in use, {requested} requested")]
    QuotaExceeded {
        path: String,
        used: u64,
        limit: u64,
        requested: u64,
    },

    #[error("invalid path: {message}")]
    InvalidPath { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Other { message: String },
}

/// Backend instantiation failed.
#[derive(thiserror::Error, Debug)]
pub enum ConstructionError {
    #[error("no backend registered for descriptor '{descriptor}'")]
    UnknownBackend { descriptor: BackendDescriptor },

    #[error("invalid arguments for backend '{descriptor}': {message}")]
    InvalidArguments {
        descriptor: BackendDescriptor,
        message: String,
    },

    #[error("backend '{descriptor}' failed to start: {source}")]
    Backend {
        descriptor: BackendDescriptor,
        #[source]
        source: BoxError,
    },
}

/// A wrapper transform failed while wrapping a storage.
///
/// The failing wrapper is not recorded as applied. The handle as it stood
/// before the failing transform is kept so the caller can retry the wrap
/// without losing the decorators that did succeed.
#[derive(thiserror::Error)]
#[error("wrapper '{wrapper}' failed for mount point {mount_point}: {source}")]
pub struct WrapperError {
    pub wrapper: String,
    pub mount_point: MountPointKey,
    #[source]
    pub source: BoxError,
    partial: StorageHandle,
}

impl WrapperError {
    pub(crate) fn new(
        wrapper: impl Into<String>,
        mount_point: MountPointKey,
        source: BoxError,
        partial: StorageHandle,
    ) -> Self {
        Self {
            wrapper: wrapper.into(),
            mount_point,
            source,
            partial,
        }
    }

    /// The storage with every wrapper before the failing one applied.
    pub fn partial(&self) -> &StorageHandle {
        &self.partial
    }

    /// Take back the partially wrapped storage, e.g. to retry `wrap`.
    pub fn into_partial(self) -> StorageHandle {
        self.partial
    }
}

impl fmt::Debug for WrapperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperError")
            .field("wrapper", &self.wrapper)
            .field("mount_point", &self.mount_point)
            .field("source", &self.source)
            .field("partial", &self.partial.id())
            .finish()
    }
}

/// Errors surfaced by [`StorageFactory`](crate::StorageFactory).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Wrapper(#[from] WrapperError),
}
