//! Derived-index integration tests
//!
//! Builds derived indexes on top of a Store populated by the Orchestrator,
//! including the case where the refresh starts before population finishes.

use chrono::NaiveDate;
use ruta_cache::{DerivedIndexManager, FrequencyCategory, TimeSlot};
use ruta_core::{CacheSettings, Namespace, RetrySettings};
use ruta_storage::expiry_sweeper_task;
use ruta_test_utils::assertions::assert_not_ready;
use ruta_test_utils::fixtures::{fast_retry_settings, orchestrator_with, sample_dataset};
use ruta_test_utils::{Delivery, DeliveryItem, InMemorySource, Orchestrator};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn ready_orchestrator(settings: CacheSettings) -> Arc<Orchestrator> {
    let source = Arc::new(InMemorySource::new(sample_dataset()));
    let orchestrator = orchestrator_with(settings, source);
    orchestrator.initialize().await.unwrap();
    orchestrator
}

// ============================================================================
// REFRESH AFTER POPULATION
// ============================================================================

#[tokio::test]
async fn test_refresh_builds_every_derived_index() {
    let orchestrator = ready_orchestrator(CacheSettings::default()).await;
    let manager = DerivedIndexManager::new(
        Arc::clone(orchestrator.store()),
        orchestrator.settings().derived_retry,
    );

    let snapshot = manager.refresh().await.unwrap();

    assert_eq!(snapshot.profiles, 5);
    assert_eq!(snapshot.routes, 2);
    assert!(snapshot.refreshed_at.is_some());

    assert_eq!(manager.clients_by_zone_and_product("Norte", "p1"), ids(&["c1", "c3"]));
    assert_eq!(manager.clients_by_zone_and_product(" norte ", "p3"), ids(&["c2"]));
    assert_eq!(manager.clients_by_zone_and_product("Sur", "p4"), ids(&["c4"]));
    assert!(manager.clients_by_zone_and_product("Sur", "p1").is_empty());
}

#[tokio::test]
async fn test_time_slots_and_frequency_from_sample_data() {
    let orchestrator = ready_orchestrator(CacheSettings::default()).await;
    let manager = DerivedIndexManager::new(Arc::clone(orchestrator.store()), RetrySettings::default());
    manager.refresh().await.unwrap();

    assert_eq!(manager.clients_by_time_slot(TimeSlot::EarlyMorning), ids(&["c1"]));
    assert_eq!(manager.clients_by_time_slot(TimeSlot::Morning), ids(&["c4"]));
    assert_eq!(manager.clients_by_time_slot(TimeSlot::Lunch), ids(&["c2"]));
    assert_eq!(manager.clients_by_time_slot(TimeSlot::Afternoon), ids(&["c5"]));

    assert_eq!(manager.clients_by_frequency(FrequencyCategory::VeryFrequent), ids(&["c1"]));
    assert_eq!(manager.clients_by_frequency(FrequencyCategory::Frequent), ids(&["c2"]));
    assert_eq!(manager.clients_by_frequency(FrequencyCategory::Regular), ids(&["c3"]));
    assert_eq!(manager.clients_by_frequency(FrequencyCategory::Occasional), ids(&["c4"]));
    assert_eq!(manager.clients_by_frequency(FrequencyCategory::Rare), ids(&["c5"]));

    let profile = manager.frequency_profile("c1").unwrap();
    assert_eq!(profile.delivery_count, 12);
    assert_eq!(profile.last_delivery, NaiveDate::from_ymd_opt(2024, 3, 12));
    assert_eq!(manager.frequency_profile("c5").unwrap().last_delivery, None);
}

#[tokio::test]
async fn test_suggested_route_orders_by_preferred_time() {
    let orchestrator = ready_orchestrator(CacheSettings::default()).await;
    let manager = DerivedIndexManager::new(Arc::clone(orchestrator.store()), RetrySettings::default());
    manager.refresh().await.unwrap();

    let route: Vec<String> = manager
        .suggested_route("NORTE")
        .into_iter()
        .map(|stop| stop.id)
        .collect();
    assert_eq!(route, vec!["c1", "c2", "c3"]);

    let sur = manager.suggested_route("sur");
    assert_eq!(sur[0].address.as_deref(), Some("Belgrano 9"));
    assert_eq!(sur[1].preferred_time.as_deref(), Some("16:45"));
    assert!(manager.suggested_route("Este").is_empty());
}

#[tokio::test]
async fn test_longer_delivery_history_does_not_inflate_frequency() {
    let newest = NaiveDate::from_ymd_opt(2024, 3, 25).unwrap();
    let mut dataset = sample_dataset();
    dataset.deliveries = (0..13)
        .map(|week| Delivery {
            id: format!("c5-w{week}"),
            client_id: Some("c5".into()),
            status: Some("delivered".into()),
            date: Some(newest - chrono::Duration::weeks(week)),
            items: vec![DeliveryItem {
                product_id: "p2".into(),
                quantity: Some(6.0),
            }],
        })
        .collect();
    let settings = CacheSettings {
        deliveries_months_back: 3,
        ..CacheSettings::default()
    };
    let orchestrator = orchestrator_with(settings, Arc::new(InMemorySource::new(dataset)));
    orchestrator.initialize().await.unwrap();
    let manager = DerivedIndexManager::new(Arc::clone(orchestrator.store()), RetrySettings::default());
    manager.refresh().await.unwrap();

    let profile = manager.frequency_profile("c5").unwrap();
    assert_eq!(profile.delivery_count, 4);
    assert_eq!(profile.category, FrequencyCategory::Regular);
    assert_eq!(profile.last_delivery, Some(newest));
    assert!(manager.clients_by_frequency(FrequencyCategory::VeryFrequent).is_empty());
}

// ============================================================================
// REFRESH RACING POPULATION
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_waits_for_slow_population() {
    let source = Arc::new(
        InMemorySource::new(sample_dataset()).with_delay(Duration::from_millis(1500)),
    );
    let orchestrator = orchestrator_with(CacheSettings::default(), source);
    let manager = DerivedIndexManager::new(Arc::clone(orchestrator.store()), RetrySettings::default());

    // Deliveries land at 4.5s; checks run at 0s, 1s, 3s and 7s.
    let (init, refresh) = tokio::join!(orchestrator.initialize(), manager.refresh());

    init.unwrap();
    let snapshot = refresh.unwrap();
    assert_eq!(snapshot.profiles, 5);
    assert_eq!(manager.clients_by_frequency(FrequencyCategory::Rare), ids(&["c5"]));
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_previous_indexes() {
    let orchestrator = ready_orchestrator(fast_retry_settings()).await;
    let manager = DerivedIndexManager::new(
        Arc::clone(orchestrator.store()),
        orchestrator.settings().derived_retry,
    );
    let before = manager.refresh().await.unwrap();

    orchestrator.handle_invalidation_event("deliveries.changed");
    let result = manager.refresh().await;

    assert_not_ready(&result);
    let err = result.unwrap_err().to_string();
    assert!(err.contains("primary/deliveries"), "{err}");
    assert!(!err.contains("primary/clients"), "{err}");
    assert_eq!(manager.snapshot(), before);
    assert_eq!(manager.clients_by_time_slot(TimeSlot::Lunch), ids(&["c2"]));
}

// ============================================================================
// EXPIRY ALONGSIDE PRIMARY DATA
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_sweeper_expires_conversation_but_keeps_primary() {
    let settings = CacheSettings::default();
    let period = settings.sweep_interval().unwrap();
    let orchestrator = ready_orchestrator(settings).await;
    let store = Arc::clone(orchestrator.store());
    store.set(Namespace::Conversation, "chat:42", &"¿llega hoy?", None);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(expiry_sweeper_task(Arc::clone(&store), period, shutdown_rx));

    tokio::time::sleep(Duration::from_secs(31 * 60) + period).await;

    assert!(store.keys(Namespace::Conversation).is_empty());
    assert_eq!(store.keys(Namespace::Primary).len(), 3);
    assert_eq!(orchestrator.get_status().entities.len(), 3);

    shutdown_tx.send(true).unwrap();
    let metrics = handle.await.unwrap();
    assert_eq!(metrics.evicted(), 1);
}
