//! Cache Orchestrator
//!
//! Owns the initialization pipeline:
//!
//! ```text
//! Uninitialized -> ValidatingConfig -> ValidatingCollaborators
//!               -> Populating -> Verifying -> Ready
//! ```
//!
//! Any step can move the Orchestrator to `Failed`. A second `initialize()`
//! arriving while one is in flight is logged and ignored; once the pipeline
//! has finished (either way) a new call runs it again from the start.

use crate::sources::{self, DataSources};
use ruta_core::{
    CacheSettings, DataError, EntityType, InvalidationTarget, Namespace, RutaError, RutaResult,
    StorageError, Timestamp,
};
use ruta_events::{EventDispatcher, LifecycleEvent, StateChange};
use ruta_index::{
    build_client_index, build_delivery_index, build_product_index, verify_integrity,
    IndexedCollection, IndexedStructure, IntegrityIssue,
};
use ruta_storage::{KeyError, Store};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const COMPONENT: &str = "orchestrator";

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Uninitialized,
    ValidatingConfig,
    ValidatingCollaborators,
    Populating,
    Verifying,
    Ready,
    Failed,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::ValidatingConfig => "validating_config",
            Self::ValidatingCollaborators => "validating_collaborators",
            Self::Populating => "populating",
            Self::Verifying => "verifying",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// REPORTS
// ============================================================================

/// Result of an `initialize()` call.
#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    /// The pipeline ran to `Ready`.
    Completed(InitReport),
    /// Another initialization was in flight; nothing was fetched or stored.
    AlreadyInProgress,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitReport {
    /// Entities stored per type.
    pub populated: BTreeMap<EntityType, usize>,
    pub verification: VerificationReport,
}

/// Outcome of the post-population audit. Diagnostic only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationReport {
    pub counts: BTreeMap<EntityType, usize>,
    pub issues: BTreeMap<EntityType, Vec<IntegrityIssue>>,
    /// Entity types that could not be read back from the Store.
    pub unreadable: Vec<EntityType>,
}

impl VerificationReport {
    pub fn issue_count(&self) -> usize {
        self.issues.values().map(Vec::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0 && self.unreadable.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityStatus {
    pub loaded: bool,
}

/// Read-only projection of the Orchestrator and primary namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorStatus {
    pub state: OrchestratorState,
    pub initializing: bool,
    pub entities: BTreeMap<EntityType, EntityStatus>,
    pub last_refresh: BTreeMap<String, Timestamp>,
    pub last_error: BTreeMap<String, KeyError>,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct Orchestrator {
    settings: CacheSettings,
    sources: DataSources,
    store: Arc<Store>,
    dispatcher: EventDispatcher,
    state: Mutex<OrchestratorState>,
    initializing: AtomicBool,
}

/// Clears the in-flight flag when the pipeline ends, including when the
/// `initialize()` future is dropped mid-flight.
struct InitGuard<'a>(&'a AtomicBool);

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Orchestrator {
    pub fn new(settings: CacheSettings, sources: DataSources, store: Arc<Store>) -> Self {
        let dispatcher = store.dispatcher().clone();
        Self {
            settings,
            sources,
            store,
            dispatcher,
            state: Mutex::new(OrchestratorState::Uninitialized),
            initializing: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn state(&self) -> OrchestratorState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run the full pipeline. Step failures come back wrapped with the step
    /// name and leave the Orchestrator in `Failed`.
    pub async fn initialize(&self) -> RutaResult<InitOutcome> {
        if self
            .initializing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(
                state = %self.state(),
                "Initialization already in progress, ignoring request"
            );
            return Ok(InitOutcome::AlreadyInProgress);
        }
        let _guard = InitGuard(&self.initializing);

        tracing::info!("Cache initialization started");

        self.transition(OrchestratorState::ValidatingConfig);
        self.validate_config()
            .map_err(|e| self.fail("validate_config", e))?;

        self.transition(OrchestratorState::ValidatingCollaborators);
        self.validate_collaborators()
            .map_err(|e| self.fail("validate_collaborators", e))?;

        self.transition(OrchestratorState::Populating);
        let populated = self
            .populate()
            .await
            .map_err(|e| self.fail("populate", e))?;

        self.transition(OrchestratorState::Verifying);
        let verification = self.verify();

        self.transition(OrchestratorState::Ready);
        tracing::info!(
            populated = ?populated,
            integrity_issues = verification.issue_count(),
            "Cache initialization completed"
        );

        Ok(InitOutcome::Completed(InitReport {
            populated,
            verification,
        }))
    }

    /// Check the static configuration table.
    pub fn validate_config(&self) -> RutaResult<()> {
        self.settings.validate()?;
        tracing::debug!(
            namespaces = self.settings.namespaces.len(),
            invalidation_events = self.settings.invalidation_events.len(),
            "Configuration valid"
        );
        Ok(())
    }

    /// Check every data source is configured. Sources are not called.
    pub fn validate_collaborators(&self) -> RutaResult<()> {
        let missing = self.sources.missing();
        if let Some(first) = missing.first() {
            tracing::error!(missing = ?missing, "Required data sources not configured");
            return Err(sources::missing(*first).into());
        }
        Ok(())
    }

    /// Fetch, index and store clients, then products, then deliveries.
    /// The first failure aborts the rest.
    pub async fn populate(&self) -> RutaResult<BTreeMap<EntityType, usize>> {
        let mut populated = BTreeMap::new();

        let source = self.sources.client_source()?;
        self.begin_refresh(EntityType::Client);
        let fetched = source.fetch_clients().await;
        populated.insert(
            EntityType::Client,
            self.store_collection(fetched, build_client_index)?,
        );

        let source = self.sources.product_source()?;
        self.begin_refresh(EntityType::Product);
        let fetched = source.fetch_products().await;
        populated.insert(
            EntityType::Product,
            self.store_collection(fetched, build_product_index)?,
        );

        let source = self.sources.delivery_source()?;
        self.begin_refresh(EntityType::Delivery);
        let fetched = source
            .fetch_deliveries(Some(self.settings.deliveries_months_back))
            .await;
        populated.insert(
            EntityType::Delivery,
            self.store_collection(fetched, build_delivery_index)?,
        );

        Ok(populated)
    }

    /// Read each entity collection back and audit it. Never fails.
    pub fn verify(&self) -> VerificationReport {
        let mut report = VerificationReport::default();

        for entity_type in EntityType::ALL {
            let key = entity_type.cache_key();
            let collection = self
                .store
                .get_value(Namespace::Primary, key)
                .ok_or_else(|| DataError::Invalid {
                    entity_type,
                    reason: "not present in store".to_string(),
                })
                .and_then(|value| IndexedCollection::from_value(entity_type, value));

            let collection = match collection {
                Ok(collection) => collection,
                Err(e) => {
                    tracing::warn!(entity_type = %entity_type, error = %e, "Cannot verify collection");
                    report.unreadable.push(entity_type);
                    continue;
                }
            };

            let issues = verify_integrity(&collection);
            report.counts.insert(entity_type, collection.len());
            if issues.is_empty() {
                tracing::info!(
                    entity_type = %entity_type,
                    entities = collection.len(),
                    "Collection verified"
                );
            } else {
                for issue in &issues {
                    tracing::warn!(issue = %issue, "Integrity issue");
                }
                tracing::warn!(
                    entity_type = %entity_type,
                    entities = collection.len(),
                    issues = issues.len(),
                    "Collection verified with integrity issues"
                );
                report.issues.insert(entity_type, issues);
            }
        }

        report
    }

    pub fn get_status(&self) -> OrchestratorStatus {
        let lifecycle = self
            .store
            .stats()
            .namespaces
            .remove(&Namespace::Primary)
            .map(|stats| stats.lifecycle)
            .unwrap_or_default();

        OrchestratorStatus {
            state: self.state(),
            initializing: self.initializing.load(Ordering::Acquire),
            entities: EntityType::ALL
                .into_iter()
                .map(|entity_type| {
                    let loaded = self
                        .store
                        .contains(Namespace::Primary, entity_type.cache_key());
                    (entity_type, EntityStatus { loaded })
                })
                .collect(),
            last_refresh: lifecycle.last_refresh,
            last_error: lifecycle.last_error,
        }
    }

    /// Remove the Store entries mapped to `event`. Returns the targets that
    /// were present and removed; unknown events remove nothing.
    pub fn handle_invalidation_event(&self, event: &str) -> Vec<InvalidationTarget> {
        let Some(targets) = self.settings.invalidation_events.get(event) else {
            tracing::warn!(event, "Unknown invalidation event");
            return Vec::new();
        };

        let removed: Vec<InvalidationTarget> = targets
            .iter()
            .filter(|target| self.store.invalidate(target.namespace, &target.key, event))
            .cloned()
            .collect();

        tracing::info!(
            event,
            targets = targets.len(),
            removed = removed.len(),
            "Invalidation event handled"
        );
        removed
    }

    // ------------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------------

    fn transition(&self, to: OrchestratorState) {
        let from = {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *state, to)
        };
        tracing::info!(from = %from, to = %to, "Orchestrator state change");
        self.dispatcher
            .publish(&LifecycleEvent::StateChange(StateChange::Transition {
                component: COMPONENT.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            }));
    }

    fn fail(&self, step: &str, error: RutaError) -> RutaError {
        tracing::error!(step, error = %error, "Cache initialization step failed");
        self.dispatcher
            .publish(&LifecycleEvent::error(COMPONENT, format!("{step}: {error}")));
        self.transition(OrchestratorState::Failed);
        RutaError::initialization(step, error)
    }

    fn begin_refresh(&self, entity_type: EntityType) {
        tracing::debug!(entity_type = %entity_type, "Fetching collection");
        self.dispatcher.publish(&LifecycleEvent::BeforeRefresh {
            target: entity_type.cache_key().to_string(),
        });
    }

    /// Build and store one fetched collection, wrapping any failure with the
    /// entity type and recording it against the collection's key.
    fn store_collection<R, I: IndexedStructure>(
        &self,
        fetched: RutaResult<Vec<R>>,
        build: impl Fn(&[R]) -> I,
    ) -> RutaResult<usize> {
        let entity_type = I::ENTITY_TYPE;
        let key = entity_type.cache_key();

        let stored = fetched.and_then(|records| {
            if records.is_empty() {
                return Err(DataError::Empty { entity_type }.into());
            }
            let index = build(&records);
            if index.is_empty() {
                return Err(DataError::Invalid {
                    entity_type,
                    reason: format!("none of {} records has a usable ID", records.len()),
                }
                .into());
            }
            if !self.store.set(Namespace::Primary, key, &index, None) {
                return Err(StorageError::Write {
                    namespace: Namespace::Primary,
                    key: key.to_string(),
                    reason: "store rejected the indexed collection".to_string(),
                }
                .into());
            }
            Ok(index.len())
        });

        match stored {
            Ok(entries) => {
                tracing::info!(entity_type = %entity_type, entries, "Collection cached");
                self.dispatcher.publish(&LifecycleEvent::AfterRefresh {
                    target: key.to_string(),
                    entries,
                });
                Ok(entries)
            }
            Err(e) => {
                self.store.record_error(Namespace::Primary, key, e.to_string());
                Err(RutaError::population(entity_type, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{ClientSource, DeliverySource, ProductSource};
    use async_trait::async_trait;
    use ruta_core::{Client, Delivery, Product};

    struct Fixed;

    #[async_trait]
    impl ClientSource for Fixed {
        async fn fetch_clients(&self) -> RutaResult<Vec<Client>> {
            Ok(vec![Client {
                id: "1".into(),
                name: Some("Almacén Rosa".into()),
                zone: Some("Sur".into()),
                ..Default::default()
            }])
        }
    }

    #[async_trait]
    impl ProductSource for Fixed {
        async fn fetch_products(&self) -> RutaResult<Vec<Product>> {
            Ok(vec![Product {
                id: "p1".into(),
                name: Some("Soda 2L".into()),
                unit_price: Some(900.0),
            }])
        }
    }

    #[async_trait]
    impl DeliverySource for Fixed {
        async fn fetch_deliveries(&self, _months: Option<u32>) -> RutaResult<Vec<Delivery>> {
            Ok(Vec::new())
        }
    }

    fn orchestrator(sources: DataSources) -> Orchestrator {
        let settings = CacheSettings::default();
        let store = Arc::new(Store::new(&settings, EventDispatcher::new()));
        Orchestrator::new(settings, sources, store)
    }

    fn all_sources() -> DataSources {
        let fixed = Arc::new(Fixed);
        DataSources::new()
            .with_clients(fixed.clone())
            .with_products(fixed.clone())
            .with_deliveries(fixed)
    }

    #[test]
    fn test_state_names() {
        assert_eq!(OrchestratorState::ValidatingCollaborators.to_string(), "validating_collaborators");
        assert_eq!(
            serde_json::to_value(OrchestratorState::Ready).unwrap(),
            serde_json::json!("ready")
        );
    }

    #[test]
    fn test_validate_collaborators_names_missing_source() {
        let orchestrator = orchestrator(DataSources::new());
        let err = orchestrator.validate_collaborators().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Collaborator error: Required data source not configured: clients source"
        );
    }

    #[tokio::test]
    async fn test_empty_deliveries_fail_populate_after_earlier_types_stored() {
        let orchestrator = orchestrator(all_sources());

        let err = orchestrator.initialize().await.unwrap_err();
        assert!(matches!(
            &err,
            RutaError::Initialization { step, .. } if step == "populate"
        ));
        assert!(matches!(
            err.root_cause(),
            RutaError::Data(DataError::Empty {
                entity_type: EntityType::Delivery
            })
        ));
        assert_eq!(orchestrator.state(), OrchestratorState::Failed);

        let status = orchestrator.get_status();
        assert!(status.entities[&EntityType::Client].loaded);
        assert!(status.entities[&EntityType::Product].loaded);
        assert!(!status.entities[&EntityType::Delivery].loaded);
        assert!(status.last_error.contains_key("deliveries"));
        assert!(!status.initializing);
    }

    #[test]
    fn test_verify_reports_unreadable_collections() {
        let orchestrator = orchestrator(all_sources());
        orchestrator
            .store()
            .set(Namespace::Primary, "clients", &serde_json::json!([1]), None);

        let report = orchestrator.verify();
        assert_eq!(
            report.unreadable,
            vec![EntityType::Client, EntityType::Product, EntityType::Delivery]
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn test_unknown_invalidation_event_removes_nothing() {
        let orchestrator = orchestrator(all_sources());
        orchestrator
            .store()
            .set(Namespace::Primary, "clients", &serde_json::json!({"byId": {}}), None);

        assert!(orchestrator.handle_invalidation_event("orders.changed").is_empty());
        assert!(orchestrator.store().contains(Namespace::Primary, "clients"));
    }
}
