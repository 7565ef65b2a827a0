//! Backend construction.
//!
//! A backend is named by a [`BackendDescriptor`] and configured with
//! [`ConstructorArgs`]. Whoever owns the concrete backends supplies a
//! [`BackendBuilder`]; the factory only calls it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConstructionError;
use crate::storage::StorageHandle;

/// Names a backend implementation, e.g. `"local"` or `"memory"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendDescriptor(String);

impl BackendDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendDescriptor {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Arguments handed to a backend constructor.
pub type ConstructorArgs = serde_json::Map<String, serde_json::Value>;

/// Creates storages from descriptors.
pub trait BackendBuilder: Send + Sync {
    fn build(
        &self,
        descriptor: &BackendDescriptor,
        args: &ConstructorArgs,
    ) -> Result<StorageHandle, ConstructionError>;
}

impl<F> BackendBuilder for F
where
    F: Fn(&BackendDescriptor, &ConstructorArgs) -> Result<StorageHandle, ConstructionError>
        + Send
        + Sync,
{
    fn build(
        &self,
        descriptor: &BackendDescriptor,
        args: &ConstructorArgs,
    ) -> Result<StorageHandle, ConstructionError> {
        self(descriptor, args)
    }
}

type Constructor =
    Arc<dyn Fn(&ConstructorArgs) -> Result<StorageHandle, ConstructionError> + Send + Sync>;

/// Lookup table from descriptor to constructor.
#[derive(Clone, Default)]
pub struct BuilderTable {
    constructors: BTreeMap<BackendDescriptor, Constructor>,
}

impl BuilderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, replacing any previous one for `descriptor`.
    pub fn register<F>(&mut self, descriptor: impl Into<BackendDescriptor>, constructor: F)
    where
        F: Fn(&ConstructorArgs) -> Result<StorageHandle, ConstructionError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(descriptor.into(), Arc::new(constructor));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, descriptor: impl Into<BackendDescriptor>, constructor: F) -> Self
    where
        F: Fn(&ConstructorArgs) -> Result<StorageHandle, ConstructionError> + Send + Sync + 'static,
    {
        self.register(descriptor, constructor);
        self
    }

    pub fn contains(&self, descriptor: &BackendDescriptor) -> bool {
        self.constructors.contains_key(descriptor)
    }

    pub fn descriptors(&self) -> Vec<BackendDescriptor> {
        self.constructors.keys().cloned().collect()
    }
}

impl BackendBuilder for BuilderTable {
    fn build(
        &self,
        descriptor: &BackendDescriptor,
        args: &ConstructorArgs,
    ) -> Result<StorageHandle, ConstructionError> {
        let constructor =
            self.constructors
                .get(descriptor)
                .ok_or_else(|| ConstructionError::UnknownBackend {
                    descriptor: descriptor.clone(),
                })?;
        constructor(args)
    }
}

impl fmt::Debug for BuilderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderTable")
            .field("descriptors", &self.descriptors())
            .finish()
    }
}
