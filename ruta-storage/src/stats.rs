//! Store statistics.

use crate::lifecycle::LifecycleState;
use ruta_core::{ExpirationPolicy, Namespace};
use std::collections::BTreeMap;

/// Statistics about one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceStats {
    pub policy: ExpirationPolicy,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (including reads of expired entries).
    pub misses: u64,
    /// Number of entries currently stored.
    pub keys: usize,
    /// Entries removed because their TTL elapsed.
    pub expired: u64,
    pub lifecycle: LifecycleState,
}

impl NamespaceStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics for the whole Store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub namespaces: BTreeMap<Namespace, NamespaceStats>,
}

impl StoreStats {
    pub fn total_hits(&self) -> u64 {
        self.namespaces.values().map(|ns| ns.hits).sum()
    }

    pub fn total_misses(&self) -> u64 {
        self.namespaces.values().map(|ns| ns.misses).sum()
    }

    pub fn total_keys(&self) -> usize {
        self.namespaces.values().map(|ns| ns.keys).sum()
    }
}
