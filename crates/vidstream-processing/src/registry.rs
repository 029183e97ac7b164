//! Duplicate-run guard.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// In-memory set of asset ids with a run in flight.
///
/// A second spawn for an asset already running is rejected; two concurrent
/// runs would race on the same row and scratch space. The guard removes its
/// id on drop, so crashed runs cannot leak a permanent reservation.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    active: Arc<Mutex<HashSet<Uuid>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to reserve a run slot for an asset. Returns None when a run for
    /// this asset is already active.
    pub fn try_begin(&self, asset_id: Uuid) -> Option<RunGuard> {
        let mut active = self.active.lock().expect("run registry lock poisoned");
        if active.insert(asset_id) {
            Some(RunGuard {
                registry: self.active.clone(),
                asset_id,
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, asset_id: Uuid) -> bool {
        self.active
            .lock()
            .expect("run registry lock poisoned")
            .contains(&asset_id)
    }
}

/// Releases the asset's reservation when dropped.
#[derive(Debug)]
pub struct RunGuard {
    registry: Arc<Mutex<HashSet<Uuid>>>,
    asset_id: Uuid,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.registry.lock() {
            active.remove(&self.asset_id);
        }
    }
}
