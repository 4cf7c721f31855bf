//! The namespaced Store.

use crate::lifecycle::LifecycleState;
use crate::stats::{NamespaceStats, StoreStats};
use ruta_core::{
    CacheSettings, EntityType, ExpirationPolicy, Namespace, StorageError, Timestamp,
};
use ruta_events::{EventDispatcher, LifecycleEvent, StateChange};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;

const ORIGIN: &str = "store";

// ============================================================================
// INTERNAL STATE
// ============================================================================

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
struct Partition {
    policy: ExpirationPolicy,
    entries: HashMap<String, Entry>,
    hits: u64,
    misses: u64,
    expired: u64,
    lifecycle: LifecycleState,
}

impl Partition {
    fn new(policy: ExpirationPolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            expired: 0,
            lifecycle: LifecycleState::default(),
        }
    }

    /// Drop the key if its TTL has elapsed. Returns true when it was evicted.
    fn evict_if_expired(&mut self, key: &str, now: Instant) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now));
        if expired {
            self.entries.remove(key);
            self.expired += 1;
            self.lifecycle.forget_refresh(key);
        }
        expired
    }

    fn stats(&self) -> NamespaceStats {
        NamespaceStats {
            policy: self.policy,
            hits: self.hits,
            misses: self.misses,
            keys: self.entries.len(),
            expired: self.expired,
            lifecycle: self.lifecycle.clone(),
        }
    }
}

enum Lookup {
    Hit(Value),
    Miss,
    Expired,
}

/// Which namespaces a flush clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTarget {
    All,
    Namespace(Namespace),
}

impl FlushTarget {
    fn namespace(&self) -> Option<Namespace> {
        match self {
            FlushTarget::All => None,
            FlushTarget::Namespace(ns) => Some(*ns),
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Namespaced key/value Store holding JSON-shaped values.
///
/// Every namespace from [`Namespace::ALL`] exists from construction; a
/// namespace missing from the settings behaves as `Unbounded`.
pub struct Store {
    partitions: RwLock<BTreeMap<Namespace, Partition>>,
    dispatcher: EventDispatcher,
}

impl Store {
    pub fn new(settings: &CacheSettings, dispatcher: EventDispatcher) -> Self {
        let partitions: BTreeMap<Namespace, Partition> = Namespace::ALL
            .into_iter()
            .map(|ns| {
                let policy = settings.policy(ns).unwrap_or(ExpirationPolicy::Unbounded);
                (ns, Partition::new(policy))
            })
            .collect();

        Self {
            partitions: RwLock::new(partitions),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn policy(&self, namespace: Namespace) -> ExpirationPolicy {
        self.partitions
            .read()
            .ok()
            .and_then(|partitions| partitions.get(&namespace).map(|p| p.policy))
            .unwrap_or(ExpirationPolicy::Unbounded)
    }

    /// Read and deserialize a value. Missing, expired and undecodable entries
    /// all read as `None`; decode failures are reported as read errors.
    pub fn get<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Option<T> {
        let value = self.get_value(namespace, key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                self.report_failure(
                    namespace,
                    key,
                    StorageError::Read {
                        namespace,
                        key: key.to_string(),
                        reason: e.to_string(),
                    },
                );
                None
            }
        }
    }

    /// Read the raw JSON value for a key.
    pub fn get_value(&self, namespace: Namespace, key: &str) -> Option<Value> {
        let now = Instant::now();
        let lookup = self.with_partition(namespace, |partition| {
            if partition.evict_if_expired(key, now) {
                partition.misses += 1;
                return Lookup::Expired;
            }
            match partition.entries.get(key) {
                Some(entry) => {
                    partition.hits += 1;
                    Lookup::Hit(entry.value.clone())
                }
                None => {
                    partition.misses += 1;
                    Lookup::Miss
                }
            }
        });

        match lookup {
            Ok(Lookup::Hit(value)) => {
                tracing::trace!(namespace = %namespace, key, "Cache hit");
                Some(value)
            }
            Ok(Lookup::Miss) => {
                tracing::debug!(namespace = %namespace, key, "Cache miss");
                None
            }
            Ok(Lookup::Expired) => {
                tracing::debug!(namespace = %namespace, key, "Cache miss (expired)");
                self.publish_expired(namespace, key);
                None
            }
            Err(e) => {
                self.report_failure(namespace, key, e);
                None
            }
        }
    }

    /// Serialize and store a value. Returns false when the write was rejected.
    ///
    /// `ttl` overrides the namespace policy's TTL for this entry only.
    pub fn set<T: Serialize>(
        &self,
        namespace: Namespace,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set_value(namespace, key, value, ttl),
            Err(e) => {
                self.report_failure(
                    namespace,
                    key,
                    StorageError::Write {
                        namespace,
                        key: key.to_string(),
                        reason: e.to_string(),
                    },
                );
                false
            }
        }
    }

    /// Store a raw JSON value. Null values are rejected and leave any
    /// existing entry untouched.
    pub fn set_value(
        &self,
        namespace: Namespace,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> bool {
        if value.is_null() {
            tracing::warn!(namespace = %namespace, key, "Rejecting null value");
            return false;
        }

        if namespace == Namespace::Primary {
            if let Some(entity_type) = EntityType::from_cache_key(key) {
                let missing = missing_indexes(entity_type, &value);
                if !missing.is_empty() {
                    tracing::warn!(
                        key,
                        missing = ?missing,
                        "Primary value does not have the indexed shape"
                    );
                }
            }
        }

        let now = Instant::now();
        let written = self
            .with_partition(namespace, |partition| {
                let expires_at = match ttl.or_else(|| partition.policy.ttl()) {
                    None => None,
                    Some(d) => Some(now.checked_add(d).ok_or_else(|| StorageError::Write {
                        namespace,
                        key: key.to_string(),
                        reason: format!("ttl of {}s overflows the clock", d.as_secs()),
                    })?),
                };
                partition
                    .entries
                    .insert(key.to_string(), Entry { value, expires_at });
                partition.lifecycle.record_refresh(key);
                Ok(expires_at.map(|at| at.saturating_duration_since(now)))
            })
            .and_then(|written| written);

        match written {
            Ok(ttl) => {
                tracing::debug!(
                    namespace = %namespace,
                    key,
                    ttl_secs = ttl.map(|d| d.as_secs()),
                    "Cache write"
                );
                true
            }
            Err(e) => {
                self.report_failure(namespace, key, e);
                false
            }
        }
    }

    /// Remove a key. Returns true if an entry was present.
    pub fn delete(&self, namespace: Namespace, key: &str) -> bool {
        let removed = self.with_partition(namespace, |partition| {
            partition.lifecycle.forget_refresh(key);
            partition.entries.remove(key).is_some()
        });

        match removed {
            Ok(removed) => {
                tracing::debug!(namespace = %namespace, key, removed, "Cache delete");
                removed
            }
            Err(e) => {
                self.report_failure(namespace, key, e);
                false
            }
        }
    }

    /// Remove a key in response to a named invalidation event.
    pub fn invalidate(&self, namespace: Namespace, key: &str, event: &str) -> bool {
        let removed = self.delete(namespace, key);
        self.dispatcher
            .publish(&LifecycleEvent::StateChange(StateChange::Invalidated {
                namespace,
                key: key.to_string(),
                event: event.to_string(),
            }));
        removed
    }

    /// True if a live (unexpired) entry exists. Does not touch hit/miss counters.
    pub fn contains(&self, namespace: Namespace, key: &str) -> bool {
        let now = Instant::now();
        self.partitions
            .read()
            .ok()
            .and_then(|partitions| {
                partitions
                    .get(&namespace)
                    .and_then(|p| p.entries.get(key))
                    .map(|entry| !entry.is_expired(now))
            })
            .unwrap_or(false)
    }

    /// Live keys in a namespace, sorted.
    pub fn keys(&self, namespace: Namespace) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .partitions
            .read()
            .ok()
            .and_then(|partitions| {
                partitions.get(&namespace).map(|p| {
                    p.entries
                        .iter()
                        .filter(|(_, entry)| !entry.is_expired(now))
                        .map(|(key, _)| key.clone())
                        .collect()
                })
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Clear one namespace or all of them. Returns the number of entries removed.
    pub fn flush(&self, target: FlushTarget) -> usize {
        let removed: Option<usize> = match self.partitions.write() {
            Ok(mut partitions) => Some(
                partitions
                    .iter_mut()
                    .filter(|(ns, _)| target.namespace().map_or(true, |t| t == **ns))
                    .map(|(_, partition)| {
                        let count = partition.entries.len();
                        partition.entries.clear();
                        partition.lifecycle.clear_refreshes();
                        count
                    })
                    .sum(),
            ),
            Err(_) => None,
        };
        let Some(removed) = removed else {
            let key = target.namespace().map_or("*", |ns| ns.as_str());
            self.report_failure(
                target.namespace().unwrap_or(Namespace::Primary),
                key,
                StorageError::LockPoisoned,
            );
            return 0;
        };

        tracing::debug!(flush = ?target, removed, "Cache flush");
        self.dispatcher
            .publish(&LifecycleEvent::StateChange(StateChange::Flushed {
                namespace: target.namespace(),
            }));
        removed
    }

    /// Evict every entry whose TTL has elapsed. Returns the number evicted.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let evicted: Vec<(Namespace, String)> = match self.partitions.write() {
            Ok(mut partitions) => partitions
                .iter_mut()
                .flat_map(|(ns, partition)| {
                    let expired: Vec<String> = partition
                        .entries
                        .iter()
                        .filter(|(_, entry)| entry.is_expired(now))
                        .map(|(key, _)| key.clone())
                        .collect();
                    for key in &expired {
                        partition.evict_if_expired(key, now);
                    }
                    expired.into_iter().map(move |key| (*ns, key))
                })
                .collect(),
            Err(_) => {
                tracing::error!("Store lock poisoned during expiry sweep");
                return 0;
            }
        };

        for (namespace, key) in &evicted {
            tracing::debug!(namespace = %namespace, key = %key, "Entry expired");
            self.publish_expired(*namespace, key);
        }
        evicted.len()
    }

    /// Record an error against a key without touching its value.
    pub fn record_error(&self, namespace: Namespace, key: &str, message: impl Into<String>) {
        let message = message.into();
        if self
            .with_partition(namespace, |p| p.lifecycle.record_error(key, message))
            .is_err()
        {
            tracing::error!(namespace = %namespace, key, "Store lock poisoned while recording error");
        }
    }

    pub fn last_refresh(&self, namespace: Namespace, key: &str) -> Option<Timestamp> {
        self.partitions.read().ok().and_then(|partitions| {
            partitions
                .get(&namespace)
                .and_then(|p| p.lifecycle.last_refresh.get(key).copied())
        })
    }

    pub fn stats(&self) -> StoreStats {
        match self.partitions.read() {
            Ok(partitions) => StoreStats {
                namespaces: partitions
                    .iter()
                    .map(|(ns, partition)| (*ns, partition.stats()))
                    .collect(),
            },
            Err(_) => {
                tracing::error!("Store lock poisoned while collecting stats");
                StoreStats::default()
            }
        }
    }

    // ------------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------------

    fn with_partition<R>(
        &self,
        namespace: Namespace,
        f: impl FnOnce(&mut Partition) -> R,
    ) -> Result<R, StorageError> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let partition = partitions
            .entry(namespace)
            .or_insert_with(|| Partition::new(ExpirationPolicy::Unbounded));
        Ok(f(partition))
    }

    fn report_failure(&self, namespace: Namespace, key: &str, error: StorageError) {
        tracing::error!(namespace = %namespace, key, error = %error, "Store operation failed");
        if let Ok(mut partitions) = self.partitions.write() {
            if let Some(partition) = partitions.get_mut(&namespace) {
                partition.lifecycle.record_error(key, error.to_string());
            }
        }
        self.dispatcher
            .publish(&LifecycleEvent::error(ORIGIN, error.to_string()));
    }

    fn publish_expired(&self, namespace: Namespace, key: &str) {
        self.dispatcher
            .publish(&LifecycleEvent::StateChange(StateChange::Expired {
                namespace,
                key: key.to_string(),
            }));
    }
}

/// Index maps the value lacks for an entity collection (`byId` first).
fn missing_indexes(entity_type: EntityType, value: &Value) -> Vec<&'static str> {
    std::iter::once("byId")
        .chain(entity_type.secondary_indexes().iter().copied())
        .filter(|name| !value.get(name).is_some_and(Value::is_object))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruta_events::EventKind;
    use serde::Deserialize;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn store() -> Store {
        Store::new(&CacheSettings::default(), EventDispatcher::new())
    }

    fn capture(store: &Store, kind: EventKind) -> Arc<Mutex<Vec<LifecycleEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.dispatcher().subscribe(kind, move |event: &LifecycleEvent| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        seen
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Session {
        user: String,
        turns: u32,
    }

    #[test]
    fn test_typed_set_and_get() {
        let store = store();
        let session = Session {
            user: "ana".into(),
            turns: 3,
        };
        assert!(store.set(Namespace::Conversation, "session:1", &session, None));

        let read: Option<Session> = store.get(Namespace::Conversation, "session:1");
        assert_eq!(read, Some(session));
        assert!(store.contains(Namespace::Conversation, "session:1"));
        assert!(!store.contains(Namespace::History, "session:1"));
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let store = store();
        store.set(Namespace::History, "a", &1, None);

        assert_eq!(store.get::<i32>(Namespace::History, "a"), Some(1));
        assert_eq!(store.get::<i32>(Namespace::History, "b"), None);

        let stats = store.stats();
        let history = &stats.namespaces[&Namespace::History];
        assert_eq!(history.hits, 1);
        assert_eq!(history.misses, 1);
        assert_eq!(history.keys, 1);
    }

    #[test]
    fn test_null_is_rejected_and_previous_value_kept() {
        let store = store();
        assert!(store.set(Namespace::Advanced, "ctx", &json!({"a": 1}), None));
        assert!(!store.set_value(Namespace::Advanced, "ctx", Value::Null, None));
        assert!(!store.set::<Option<u8>>(Namespace::Advanced, "ctx", &None, None));

        assert_eq!(
            store.get_value(Namespace::Advanced, "ctx"),
            Some(json!({"a": 1}))
        );
    }

    #[test]
    fn test_overflowing_ttl_override_is_rejected_without_poisoning() {
        let store = store();
        let errors = capture(&store, EventKind::Error);
        assert!(store.set(Namespace::History, "k", &1, None));

        assert!(!store.set(Namespace::History, "k", &2, Some(Duration::MAX)));

        assert_eq!(store.get_value(Namespace::History, "k"), Some(json!(1)));
        assert!(store.stats().namespaces[&Namespace::History]
            .lifecycle
            .last_error
            .contains_key("k"));
        assert_eq!(errors.lock().unwrap().len(), 1);

        // Other namespaces stay usable.
        assert!(store.set(Namespace::Conversation, "c", &"hola", None));
        assert!(store.set(Namespace::Primary, "clients", &json!({"byId": {}}), None));
        assert!(store.get_value(Namespace::Primary, "clients").is_some());
    }

    #[test]
    fn test_overflowing_policy_ttl_is_rejected_without_poisoning() {
        let mut settings = CacheSettings::default();
        settings.set_ttl(Namespace::History, u64::MAX);
        let store = Store::new(&settings, EventDispatcher::new());

        assert!(!store.set(Namespace::History, "k", &1, None));
        assert!(!store.contains(Namespace::History, "k"));
        assert!(store.set(Namespace::History, "k", &1, Some(Duration::from_secs(60))));
        assert!(store.set(Namespace::Conversation, "c", &1, None));
    }

    #[test]
    fn test_malformed_primary_value_is_stored_anyway() {
        let store = store();
        assert!(store.set(Namespace::Primary, "clients", &json!([1, 2, 3]), None));
        assert!(store.contains(Namespace::Primary, "clients"));
    }

    #[test]
    fn test_missing_indexes() {
        let complete = json!({"byId": {}, "byName": {}, "byZone": {}});
        assert!(missing_indexes(EntityType::Client, &complete).is_empty());

        let partial = json!({"byId": {}, "byType": []});
        assert_eq!(
            missing_indexes(EntityType::Product, &partial),
            vec!["byName", "byType"]
        );
        assert_eq!(missing_indexes(EntityType::Delivery, &json!("x")).len(), 3);
    }

    #[test]
    fn test_decode_failure_reads_as_none_and_records_error() {
        let store = store();
        let errors = capture(&store, EventKind::Error);
        store.set(Namespace::History, "n", &"not a number", None);

        assert_eq!(store.get::<u64>(Namespace::History, "n"), None);

        let stats = store.stats();
        assert!(stats.namespaces[&Namespace::History]
            .lifecycle
            .last_error
            .contains_key("n"));
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_lifecycle_refresh_recorded_on_write() {
        let store = store();
        assert!(store.last_refresh(Namespace::Primary, "products").is_none());
        store.set(Namespace::Primary, "products", &json!({"byId": {}}), None);
        assert!(store.last_refresh(Namespace::Primary, "products").is_some());

        store.delete(Namespace::Primary, "products");
        assert!(store.last_refresh(Namespace::Primary, "products").is_none());
    }

    #[test]
    fn test_record_error_is_visible_in_stats() {
        let store = store();
        store.record_error(Namespace::Primary, "deliveries", "source offline");
        let stats = store.stats();
        let error = &stats.namespaces[&Namespace::Primary].lifecycle.last_error["deliveries"];
        assert_eq!(error.message, "source offline");
    }

    #[test]
    fn test_flush_single_namespace() {
        let store = store();
        let changes = capture(&store, EventKind::StateChange);
        store.set(Namespace::History, "h", &1, None);
        store.set(Namespace::Conversation, "c", &1, None);

        assert_eq!(store.flush(FlushTarget::Namespace(Namespace::History)), 1);
        assert!(store.keys(Namespace::History).is_empty());
        assert_eq!(store.keys(Namespace::Conversation), vec!["c".to_string()]);

        assert_eq!(
            changes.lock().unwrap().as_slice(),
            &[LifecycleEvent::StateChange(StateChange::Flushed {
                namespace: Some(Namespace::History)
            })]
        );
    }

    #[test]
    fn test_flush_all() {
        let store = store();
        store.set(Namespace::History, "h", &1, None);
        store.set(Namespace::Primary, "p", &1, None);
        assert_eq!(store.flush(FlushTarget::All), 2);
        assert_eq!(store.stats().total_keys(), 0);
    }

    #[test]
    fn test_invalidate_publishes_state_change() {
        let store = store();
        let changes = capture(&store, EventKind::StateChange);
        store.set(Namespace::Primary, "clients", &json!({"byId": {}}), None);

        assert!(store.invalidate(Namespace::Primary, "clients", "clients.changed"));
        assert!(!store.contains(Namespace::Primary, "clients"));

        let seen = changes.lock().unwrap();
        assert!(matches!(
            &seen[0],
            LifecycleEvent::StateChange(StateChange::Invalidated { event, .. })
                if event == "clients.changed"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expires_lazily_on_read() {
        let store = store();
        let changes = capture(&store, EventKind::StateChange);
        store.set(Namespace::Conversation, "turn", &"hola", None);

        tokio::time::advance(Duration::from_secs(29 * 60)).await;
        assert_eq!(
            store.get::<String>(Namespace::Conversation, "turn"),
            Some("hola".to_string())
        );

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert_eq!(store.get::<String>(Namespace::Conversation, "turn"), None);

        let stats = store.stats();
        assert_eq!(stats.namespaces[&Namespace::Conversation].expired, 1);
        assert!(matches!(
            changes.lock().unwrap().as_slice(),
            [LifecycleEvent::StateChange(StateChange::Expired { .. })]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_override_and_primary_never_expires() {
        let store = store();
        store.set(
            Namespace::History,
            "short",
            &1,
            Some(Duration::from_secs(5)),
        );
        store.set(Namespace::History, "default", &1, None);
        store.set(Namespace::Primary, "clients", &json!({"byId": {}}), None);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!store.contains(Namespace::History, "short"));
        assert!(store.contains(Namespace::History, "default"));

        tokio::time::advance(Duration::from_secs(400 * 24 * 3600)).await;
        assert!(store.contains(Namespace::Primary, "clients"));
        assert!(!store.contains(Namespace::History, "default"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_evicts_and_publishes() {
        let store = store();
        let changes = capture(&store, EventKind::StateChange);
        store.set(Namespace::Conversation, "a", &1, None);
        store.set(Namespace::Conversation, "b", &1, Some(Duration::from_secs(7200)));
        store.set(Namespace::Advanced, "c", &1, None);

        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.keys(Namespace::Conversation), vec!["b".to_string()]);
        assert_eq!(changes.lock().unwrap().len(), 1);
        assert_eq!(store.purge_expired(), 0);
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Záéíñ ]{0,12}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        })
    }

    fn arb_namespace() -> impl Strategy<Value = Namespace> {
        prop::sample::select(Namespace::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any non-null value reads back unchanged.
        #[test]
        fn prop_set_then_get_round_trips(
            namespace in arb_namespace(),
            key in "[a-z:0-9]{1,12}",
            value in arb_json().prop_filter("non-null", |v| !v.is_null()),
        ) {
            let store = store();
            prop_assert!(store.set_value(namespace, &key, value.clone(), None));
            prop_assert_eq!(store.get_value(namespace, &key), Some(value.clone()));
            prop_assert_eq!(store.get::<Value>(namespace, &key), Some(value));
        }

        /// Writing null fails and leaves whatever was there before.
        #[test]
        fn prop_null_write_keeps_prior_value(
            namespace in arb_namespace(),
            key in "[a-z:0-9]{1,12}",
            prior in proptest::option::of(arb_json().prop_filter("non-null", |v| !v.is_null())),
        ) {
            let store = store();
            if let Some(prior) = &prior {
                prop_assert!(store.set_value(namespace, &key, prior.clone(), None));
            }

            prop_assert!(!store.set_value(namespace, &key, Value::Null, None));
            prop_assert!(!store.set::<Option<u8>>(namespace, &key, &None, None));
            prop_assert_eq!(store.get_value(namespace, &key), prior);
        }
    }
}
