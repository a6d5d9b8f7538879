//! Subscription registry: the path → characteristic routing table.
//!
//! Every accessory characteristic that mirrors a bus path is recorded
//! here. The registry answers two questions: which characteristics does
//! an update on a path feed, and which paths does the stream need to be
//! subscribed to. It is shared between the routing loop and the
//! accessory lifecycle, so the shared form wraps it in a lock.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use skbridge_core::{AccessoryId, BusPath, CharacteristicKind, ValueConverter};

/// Address of one characteristic on one accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    pub owner: AccessoryId,
    pub characteristic: CharacteristicKind,
}

/// One registered subscription: updates on `path` feed `handle` through
/// `converter`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub path: BusPath,
    pub handle: CharacteristicHandle,
    pub converter: ValueConverter,
}

/// The routing table from bus paths to characteristic subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    by_path: HashMap<BusPath, Vec<Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription. A duplicate (same path and handle)
    /// replaces the previous converter instead of double-routing.
    ///
    /// Returns true when this is the first subscription on the path,
    /// i.e. the stream needs a subscribe for it.
    pub fn add(&mut self, sub: Subscription) -> bool {
        let entries = self.by_path.entry(sub.path.clone()).or_default();
        let new_path = entries.is_empty();

        if let Some(existing) = entries.iter_mut().find(|s| s.handle == sub.handle) {
            existing.converter = sub.converter;
        } else {
            entries.push(sub);
        }
        new_path
    }

    /// Remove every subscription owned by an accessory.
    ///
    /// Returns the paths left with no subscribers, i.e. the paths the
    /// stream no longer needs.
    pub fn remove_owner(&mut self, owner: AccessoryId) -> Vec<BusPath> {
        let mut emptied = Vec::new();
        self.by_path.retain(|path, entries| {
            entries.retain(|s| s.handle.owner != owner);
            if entries.is_empty() {
                emptied.push(path.clone());
                false
            } else {
                true
            }
        });
        emptied
    }

    /// Subscriptions on a path; empty for unknown paths.
    pub fn lookup(&self, path: &BusPath) -> &[Subscription] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every path with at least one subscriber. This is the set the
    /// stream subscribes to after (re)connecting.
    pub fn all_paths(&self) -> Vec<BusPath> {
        self.by_path.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Number of subscribed paths.
    pub fn path_count(&self) -> usize {
        self.by_path.len()
    }
}

/// Registry shared between the routing loop and the accessory lifecycle.
pub type SharedRegistry = Arc<RwLock<SubscriptionRegistry>>;

pub fn shared_registry() -> SharedRegistry {
    Arc::new(RwLock::new(SubscriptionRegistry::new()))
}

/// Read the shared registry, recovering from a poisoned lock. The
/// registry holds no invariants that a panicked writer could break
/// half-way.
pub(crate) fn read_registry(
    registry: &SharedRegistry,
) -> std::sync::RwLockReadGuard<'_, SubscriptionRegistry> {
    registry.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_registry(
    registry: &SharedRegistry,
) -> std::sync::RwLockWriteGuard<'_, SubscriptionRegistry> {
    registry.write().unwrap_or_else(PoisonError::into_inner)
}
