//! Derived-Index Manager
//!
//! Second-order indexes computed from the primary client and delivery
//! collections in the Store. They are never written back to the Store and
//! are rebuilt wholesale on every refresh, in a fixed order: zone×product,
//! time slot, frequency, route.

mod frequency;
mod route;
mod time_slot;
mod zone_product;

pub use frequency::{classify_frequency, FrequencyCategory, FrequencyProfile};
pub use route::RouteEntry;
pub use time_slot::{time_slot, TimeSlot};
pub use zone_product::zone_product_key;

use crate::retry::retry_until_ready;
use chrono::Utc;
use ruta_core::{
    normalize_zone, EntityKey, EntityType, Namespace, RetrySettings, RutaError, RutaResult,
    Timestamp,
};
use ruta_events::{EventDispatcher, LifecycleEvent};
use ruta_index::{ClientIndex, DeliveryIndex};
use ruta_storage::Store;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard};

const TARGET: &str = "derived";

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Default)]
struct DerivedIndexes {
    zone_products: BTreeMap<String, BTreeSet<EntityKey>>,
    time_slots: BTreeMap<TimeSlot, BTreeSet<EntityKey>>,
    frequency: BTreeMap<FrequencyCategory, BTreeSet<EntityKey>>,
    profiles: BTreeMap<EntityKey, FrequencyProfile>,
    routes: BTreeMap<String, Vec<RouteEntry>>,
    refreshed_at: Option<Timestamp>,
}

impl DerivedIndexes {
    fn entries(&self) -> usize {
        self.zone_products.len()
            + self.time_slots.len()
            + self.frequency.len()
            + self.routes.len()
    }
}

/// Sizes of the derived maps at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedSnapshot {
    pub zone_products: usize,
    pub time_slots: BTreeMap<TimeSlot, usize>,
    pub frequency: BTreeMap<FrequencyCategory, usize>,
    pub profiles: usize,
    pub routes: usize,
    pub refreshed_at: Option<Timestamp>,
}

// ============================================================================
// MANAGER
// ============================================================================

pub struct DerivedIndexManager {
    store: Arc<Store>,
    dispatcher: EventDispatcher,
    retry: RetrySettings,
    indexes: RwLock<DerivedIndexes>,
}

impl DerivedIndexManager {
    pub fn new(store: Arc<Store>, retry: RetrySettings) -> Self {
        let dispatcher = store.dispatcher().clone();
        Self {
            store,
            dispatcher,
            retry,
            indexes: RwLock::new(DerivedIndexes::default()),
        }
    }

    /// Rebuild every derived index from the Store's primary data.
    ///
    /// Waits with backoff while clients or deliveries are not cached yet and
    /// fails with [`DependencyError::NotReady`](ruta_core::DependencyError)
    /// once retries are exhausted. On failure the previous indexes are kept.
    pub async fn refresh(&self) -> RutaResult<DerivedSnapshot> {
        self.dispatcher.publish(&LifecycleEvent::BeforeRefresh {
            target: TARGET.to_string(),
        });

        let outcome = retry_until_ready(&self.retry, || self.read_primary()).await;
        let attempts = outcome.attempts();
        let (clients, deliveries) = match outcome.into_result() {
            Ok(value) => value,
            Err(e) => {
                let err = RutaError::from(e);
                tracing::error!(attempts, error = %err, "Derived index refresh failed");
                self.dispatcher
                    .publish(&LifecycleEvent::error(TARGET, err.to_string()));
                return Err(err);
            }
        };

        let zone_products = zone_product::build_zone_products(&clients, &deliveries);
        let time_slots = time_slot::build_time_slots(&clients);
        let frequency = frequency::build_frequency(&clients, &deliveries);
        let routes = route::build_routes(&clients);

        let rebuilt = DerivedIndexes {
            zone_products,
            time_slots,
            frequency: frequency.categories,
            profiles: frequency.profiles,
            routes,
            refreshed_at: Some(Utc::now()),
        };
        let entries = rebuilt.entries();

        match self.indexes.write() {
            Ok(mut indexes) => *indexes = rebuilt,
            Err(poisoned) => *poisoned.into_inner() = rebuilt,
        }

        let snapshot = self.snapshot();
        tracing::info!(
            attempts,
            zone_products = snapshot.zone_products,
            profiles = snapshot.profiles,
            routes = snapshot.routes,
            "Derived indexes refreshed"
        );
        self.dispatcher.publish(&LifecycleEvent::AfterRefresh {
            target: TARGET.to_string(),
            entries,
        });
        Ok(snapshot)
    }

    /// Clients in `zone` that have received `product_id`.
    pub fn clients_by_zone_and_product(&self, zone: &str, product_id: &str) -> BTreeSet<EntityKey> {
        self.read()
            .zone_products
            .get(&zone_product_key(zone, product_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn clients_by_time_slot(&self, slot: TimeSlot) -> BTreeSet<EntityKey> {
        self.read().time_slots.get(&slot).cloned().unwrap_or_default()
    }

    pub fn clients_by_frequency(&self, category: FrequencyCategory) -> BTreeSet<EntityKey> {
        self.read()
            .frequency
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }

    pub fn frequency_profile(&self, client_id: &str) -> Option<FrequencyProfile> {
        self.read().profiles.get(client_id).cloned()
    }

    /// Route for `zone`, ordered by preferred time with untimed stops last.
    pub fn suggested_route(&self, zone: &str) -> Vec<RouteEntry> {
        let mut entries = self
            .read()
            .routes
            .get(&normalize_zone(zone))
            .cloned()
            .unwrap_or_default();
        route::sort_route(&mut entries);
        entries
    }

    pub fn snapshot(&self) -> DerivedSnapshot {
        let indexes = self.read();
        DerivedSnapshot {
            zone_products: indexes.zone_products.len(),
            time_slots: indexes
                .time_slots
                .iter()
                .map(|(slot, ids)| (*slot, ids.len()))
                .collect(),
            frequency: indexes
                .frequency
                .iter()
                .map(|(category, ids)| (*category, ids.len()))
                .collect(),
            profiles: indexes.profiles.len(),
            routes: indexes.routes.len(),
            refreshed_at: indexes.refreshed_at,
        }
    }

    // ------------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------------

    fn read(&self) -> RwLockReadGuard<'_, DerivedIndexes> {
        self.indexes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Both primary collections, or the `namespace/key` of each one missing.
    fn read_primary(&self) -> Result<(ClientIndex, DeliveryIndex), Vec<String>> {
        let clients: Option<ClientIndex> = self.read_collection(EntityType::Client);
        let deliveries: Option<DeliveryIndex> = self.read_collection(EntityType::Delivery);
        match (clients, deliveries) {
            (Some(clients), Some(deliveries)) => Ok((clients, deliveries)),
            (clients, deliveries) => {
                let mut missing = Vec::new();
                if clients.is_none() {
                    missing.push(dependency_name(EntityType::Client));
                }
                if deliveries.is_none() {
                    missing.push(dependency_name(EntityType::Delivery));
                }
                Err(missing)
            }
        }
    }

    fn read_collection<T: serde::de::DeserializeOwned>(&self, entity_type: EntityType) -> Option<T> {
        self.store.get(Namespace::Primary, entity_type.cache_key())
    }
}

fn dependency_name(entity_type: EntityType) -> String {
    format!("{}/{}", Namespace::Primary, entity_type.cache_key())
}
