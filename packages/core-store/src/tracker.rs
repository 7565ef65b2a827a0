//! Per-mount-point record of applied wrappers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::key::MountPointKey;

/// Wrapper names applied to one mount point, in first-application order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AppliedList {
    names: Vec<String>,
}

impl AppliedList {
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Record `name`. Recording a name twice is a no-op.
    pub fn insert(&mut self, name: &str) {
        if !self.contains(name) {
            self.names.push(name.to_string());
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Tracks which wrappers have been applied to which mount point.
///
/// Each mount point gets its own lock, so bookkeeping for unrelated mount
/// points never contends beyond the brief map lookup. Unknown mount points
/// behave as if nothing had been applied. Records only ever grow.
#[derive(Debug, Default)]
pub struct MountWrapTracker {
    mounts: Mutex<HashMap<MountPointKey, Arc<Mutex<AppliedList>>>>,
}

impl MountWrapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_applied(&self, mount_point: &MountPointKey, name: &str) -> bool {
        match self.existing(mount_point) {
            Some(slot) => slot.lock().contains(name),
            None => false,
        }
    }

    pub fn mark_applied(&self, mount_point: &MountPointKey, name: &str) {
        self.slot(mount_point).lock().insert(name);
    }

    /// Applied wrapper names for a mount point.
    pub fn applied(&self, mount_point: &MountPointKey) -> Vec<String> {
        match self.existing(mount_point) {
            Some(slot) => slot.lock().names().to_vec(),
            None => Vec::new(),
        }
    }

    /// Mount points that have a record, in no particular order.
    pub fn mount_points(&self) -> Vec<MountPointKey> {
        self.mounts.lock().keys().cloned().collect()
    }

    // The map lock is released before the caller takes the slot lock.
    fn existing(&self, mount_point: &MountPointKey) -> Option<Arc<Mutex<AppliedList>>> {
        self.mounts.lock().get(mount_point).cloned()
    }

    fn slot(&self, mount_point: &MountPointKey) -> Arc<Mutex<AppliedList>> {
        self.mounts
            .lock()
            .entry(mount_point.clone())
            .or_default()
            .clone()
    }

    /// Lock the record for one mount point, creating it if needed.
    ///
    /// The factory holds this guard for a whole wrap pass so concurrent
    /// passes on the same mount point cannot both apply a wrapper.
    pub(crate) fn lock_mount(&self, mount_point: &MountPointKey) -> MountSlotGuard {
        MountSlotGuard {
            slot: self.slot(mount_point),
        }
    }
}

/// Owner of a mount point's record while a wrap pass runs.
pub(crate) struct MountSlotGuard {
    slot: Arc<Mutex<AppliedList>>,
}

impl MountSlotGuard {
    pub(crate) fn lock(&self) -> MutexGuard<'_, AppliedList> {
        self.slot.lock()
    }
}
