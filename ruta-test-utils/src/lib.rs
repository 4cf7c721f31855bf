//! Ruta Test Utilities
//!
//! Shared test infrastructure for the Ruta workspace:
//! - In-memory data sources with call counting and failure injection
//! - Proptest generators for entity records
//! - Fixtures for a small but realistic delivery dataset
//! - Assertions for Ruta error shapes
//! - Tracing setup for tests

pub use ruta_cache::{
    ClientSource, DataSources, DeliverySource, DerivedIndexManager, InitOutcome, Orchestrator,
    ProductSource,
};
pub use ruta_core::{
    CacheSettings, Client, CollaboratorError, DataError, Delivery, DeliveryItem,
    DependencyError, EntityType, Namespace, Product, RetrySettings, RutaError, RutaResult,
};
pub use ruta_events::EventDispatcher;
pub use ruta_storage::Store;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// TRACING
// ============================================================================

/// Install a fmt subscriber filtered by `RUTA_LOG` (default `warn`).
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("RUTA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// IN-MEMORY SOURCES
// ============================================================================

/// The three raw collections a source serves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub clients: Vec<Client>,
    pub products: Vec<Product>,
    pub deliveries: Vec<Delivery>,
}

/// Serves a fixed [`Dataset`] through all three source traits.
#[derive(Debug, Default)]
pub struct InMemorySource {
    dataset: Dataset,
    delay: Option<Duration>,
    failing: Mutex<BTreeSet<EntityType>>,
    client_calls: AtomicUsize,
    product_calls: AtomicUsize,
    delivery_calls: AtomicUsize,
    last_months_back: Mutex<Option<u32>>,
}

impl InMemorySource {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            ..Self::default()
        }
    }

    /// Sleep this long inside every fetch (a suspension point for
    /// interleaving tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make fetches for `entity_type` fail with `FetchFailed`.
    pub fn failing_on(self, entity_type: EntityType) -> Self {
        self.set_failing(entity_type, true);
        self
    }

    pub fn set_failing(&self, entity_type: EntityType, failing: bool) {
        let mut set = self.failing.lock().unwrap_or_else(|p| p.into_inner());
        if failing {
            set.insert(entity_type);
        } else {
            set.remove(&entity_type);
        }
    }

    pub fn calls(&self, entity_type: EntityType) -> usize {
        self.counter(entity_type).load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        EntityType::ALL.into_iter().map(|t| self.calls(t)).sum()
    }

    /// `since_months_back` passed to the most recent delivery fetch.
    pub fn last_months_back(&self) -> Option<u32> {
        *self.last_months_back.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// All three sources backed by this one instance.
    pub fn data_sources(self: &Arc<Self>) -> DataSources {
        DataSources::new()
            .with_clients(Arc::clone(self) as Arc<dyn ClientSource>)
            .with_products(Arc::clone(self) as Arc<dyn ProductSource>)
            .with_deliveries(Arc::clone(self) as Arc<dyn DeliverySource>)
    }

    fn counter(&self, entity_type: EntityType) -> &AtomicUsize {
        match entity_type {
            EntityType::Client => &self.client_calls,
            EntityType::Product => &self.product_calls,
            EntityType::Delivery => &self.delivery_calls,
        }
    }

    async fn serve<T: Clone>(&self, entity_type: EntityType, records: &[T]) -> RutaResult<Vec<T>> {
        self.counter(entity_type).fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&entity_type);
        if failing {
            return Err(CollaboratorError::FetchFailed {
                source_name: format!("in-memory {entity_type}"),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        Ok(records.to_vec())
    }
}

#[async_trait]
impl ClientSource for InMemorySource {
    async fn fetch_clients(&self) -> RutaResult<Vec<Client>> {
        self.serve(EntityType::Client, &self.dataset.clients).await
    }
}

#[async_trait]
impl ProductSource for InMemorySource {
    async fn fetch_products(&self) -> RutaResult<Vec<Product>> {
        self.serve(EntityType::Product, &self.dataset.products).await
    }
}

#[async_trait]
impl DeliverySource for InMemorySource {
    async fn fetch_deliveries(&self, since_months_back: Option<u32>) -> RutaResult<Vec<Delivery>> {
        *self
            .last_months_back
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = since_months_back;
        self.serve(EntityType::Delivery, &self.dataset.deliveries)
            .await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for entity records.

    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    /// IDs drawn from a small space so duplicates and empties occur.
    pub fn arb_id() -> impl Strategy<Value = String> {
        prop_oneof![
            8 => "[0-9]{1,3}",
            1 => Just(String::new()),
        ]
    }

    pub fn arb_name() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-z]{1,8}( [A-Za-z]{1,8}){0,2}",
            Just("Panadería Ñandú".to_string()),
            Just("  almacén  ".to_string()),
        ]
    }

    pub fn arb_zone() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["Norte", "norte", "Sur", "Centro ", "Oeste"])
            .prop_map(str::to_string)
    }

    /// `HH:MM`, occasionally malformed.
    pub fn arb_preferred_time() -> impl Strategy<Value = String> {
        prop_oneof![
            9 => (0u32..24, 0u32..60).prop_map(|(h, m)| format!("{h:02}:{m:02}")),
            1 => Just("por la tarde".to_string()),
        ]
    }

    pub fn arb_client() -> impl Strategy<Value = Client> {
        (
            arb_id(),
            proptest::option::of(arb_name()),
            proptest::option::of(arb_zone()),
            proptest::option::of(arb_preferred_time()),
        )
            .prop_map(|(id, name, zone, preferred_time)| Client {
                id,
                name,
                zone,
                address: None,
                preferred_time,
            })
    }

    pub fn arb_product() -> impl Strategy<Value = Product> {
        (
            arb_id(),
            proptest::option::of(arb_name()),
            proptest::option::of(1.0f64..10_000.0),
        )
            .prop_map(|(id, name, unit_price)| Product {
                id,
                name,
                unit_price,
            })
    }

    pub fn arb_delivery() -> impl Strategy<Value = Delivery> {
        (
            arb_id(),
            proptest::option::of("[0-9]{1,3}"),
            proptest::option::of(prop::sample::select(vec!["delivered", "pending", "cancelled"])),
            proptest::option::of(1u32..=28),
            prop::collection::vec("[0-9]{1,3}", 0..4),
        )
            .prop_map(|(id, client_id, status, day, products)| Delivery {
                id,
                client_id,
                status: status.map(str::to_string),
                date: day.and_then(|d| NaiveDate::from_ymd_opt(2024, 2, d)),
                items: products
                    .into_iter()
                    .map(|product_id| DeliveryItem {
                        product_id,
                        quantity: Some(1.0),
                    })
                    .collect(),
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use chrono::NaiveDate;

    fn client(id: &str, name: &str, zone: &str, address: &str, time: Option<&str>) -> Client {
        Client {
            id: id.into(),
            name: Some(name.into()),
            zone: Some(zone.into()),
            address: Some(address.into()),
            preferred_time: time.map(str::to_string),
        }
    }

    fn product(id: &str, name: &str, price: f64) -> Product {
        Product {
            id: id.into(),
            name: Some(name.into()),
            unit_price: Some(price),
        }
    }

    fn deliveries_for(client_id: &str, count: u32, product_id: &str, first: u32) -> Vec<Delivery> {
        (0..count)
            .map(|n| Delivery {
                id: format!("{client_id}-{}", first + n),
                client_id: Some(client_id.into()),
                status: Some("delivered".into()),
                date: NaiveDate::from_ymd_opt(2024, 3, 1 + (first + n) % 28),
                items: vec![DeliveryItem {
                    product_id: product_id.into(),
                    quantity: Some(2.0),
                }],
            })
            .collect()
    }

    /// Five clients across two zones with delivery counts chosen to hit
    /// every frequency category:
    ///
    /// | client | zone   | time  | deliveries | category      |
    /// |--------|--------|-------|------------|---------------|
    /// | c1     | Norte  | 08:30 | 12         | very-frequent |
    /// | c2     | Norte  | 13:59 | 8          | frequent      |
    /// | c3     | Norte  | -     | 7          | regular       |
    /// | c4     | Sur    | 10:00 | 3          | occasional    |
    /// | c5     | Sur    | 16:45 | 0          | rare          |
    pub fn sample_dataset() -> Dataset {
        let clients = vec![
            client("c1", "Panadería Sol", "Norte", "Av. Libertad 100", Some("08:30")),
            client("c2", "Bar El Puerto", "norte", "Costanera 12", Some("13:59")),
            client("c3", "Kiosco Luna", "Norte", "San Martín 455", None),
            client("c4", "Almacén Rosa", "Sur", "Belgrano 9", Some("10:00")),
            client("c5", "Club Atlético", "Sur", "Mitre 2001", Some("16:45")),
        ];
        let products = vec![
            product("p1", "Agua mineral 500ml", 700.0),
            product("p2", "Agua con gas 1.5L", 1200.0),
            product("p3", "Soda sifón", 900.0),
            product("p4", "Hielo 2kg", 1500.0),
        ];
        let mut deliveries = Vec::new();
        deliveries.extend(deliveries_for("c1", 12, "p1", 0));
        deliveries.extend(deliveries_for("c2", 8, "p3", 12));
        deliveries.extend(deliveries_for("c3", 7, "p1", 20));
        deliveries.extend(deliveries_for("c4", 3, "p4", 27));

        Dataset {
            clients,
            products,
            deliveries,
        }
    }

    /// Default settings with fast derived-index retries.
    pub fn fast_retry_settings() -> CacheSettings {
        CacheSettings {
            derived_retry: RetrySettings {
                max_retries: 2,
                base_delay_ms: 10,
                max_delay_ms: 20,
            },
            ..CacheSettings::default()
        }
    }

    pub fn store(settings: &CacheSettings) -> Arc<Store> {
        Arc::new(Store::new(settings, EventDispatcher::new()))
    }

    /// Store, source and orchestrator wired together over `dataset`.
    pub fn orchestrator_with(
        settings: CacheSettings,
        source: Arc<InMemorySource>,
    ) -> Arc<Orchestrator> {
        let store = store(&settings);
        Arc::new(Orchestrator::new(settings, source.data_sources(), store))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Ruta error shapes.

    use super::*;

    /// Assert the error is an initialization failure at `step`.
    pub fn assert_failed_at_step(err: &RutaError, step: &str) {
        match err {
            RutaError::Initialization { step: actual, .. } => {
                assert_eq!(actual, step, "initialization failed at the wrong step: {err}")
            }
            other => panic!("Expected initialization error at {step}, got {other:?}"),
        }
    }

    /// Assert population failed for `entity_type`, at any depth.
    pub fn assert_population_failed(err: &RutaError, entity_type: EntityType) {
        let mut current = err;
        loop {
            match current {
                RutaError::Population {
                    entity_type: actual,
                    ..
                } => {
                    assert_eq!(*actual, entity_type, "wrong entity type in {err}");
                    return;
                }
                RutaError::Initialization { source, .. } => current = &**source,
                other => panic!("Expected population error for {entity_type}, got {other:?}"),
            }
        }
    }

    pub fn assert_not_ready<T: std::fmt::Debug>(result: &RutaResult<T>) {
        match result {
            Err(RutaError::Dependency(DependencyError::NotReady { .. })) => {}
            other => panic!("Expected DependencyError::NotReady, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_dataset_shape() {
        let dataset = fixtures::sample_dataset();
        assert_eq!(dataset.clients.len(), 5);
        assert_eq!(dataset.deliveries.len(), 30);
        let ids: BTreeSet<&str> = dataset.deliveries.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), 30);
    }
}
