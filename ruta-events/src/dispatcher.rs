//! Event dispatcher: subscriber registry, sequential delivery and the
//! bounded per-kind handler error log.

use crate::event::{EventKind, LifecycleEvent};
use chrono::Utc;
use ruta_core::Timestamp;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Handler failures retained per event kind; older entries are evicted.
pub const MAX_ERROR_LOG: usize = 10;

/// Error returned by a failing handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A subscribed handler.
pub type Handler = Arc<dyn Fn(&LifecycleEvent) -> Result<(), HandlerError> + Send + Sync>;

/// One recorded handler failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub subscriber_id: u64,
    pub message: String,
    pub at: Timestamp,
}

/// Outcome of a single `publish`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
struct KindEntry {
    subscribers: Vec<(u64, Handler)>,
    published: u64,
    delivered: u64,
    failures: u64,
    errors: VecDeque<HandlerFailure>,
}

struct Registry {
    next_id: u64,
    kinds: HashMap<EventKind, KindEntry>,
    unknown_publishes: u64,
}

impl Registry {
    fn new() -> Self {
        // Every kind exists up front so "no subscribers" differs from "unknown".
        let kinds = EventKind::ALL
            .into_iter()
            .map(|kind| (kind, KindEntry::default()))
            .collect();
        Self {
            next_id: 1,
            kinds,
            unknown_publishes: 0,
        }
    }

    fn entry(&mut self, kind: EventKind) -> &mut KindEntry {
        self.kinds.entry(kind).or_default()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-kind statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindStats {
    pub subscribers: usize,
    pub published: u64,
    pub delivered: u64,
    pub failures: u64,
    pub recent_errors: Vec<HandlerFailure>,
}

/// Dispatcher-wide statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub kinds: BTreeMap<EventKind, KindStats>,
    pub unknown_publishes: u64,
}

// ============================================================================
// SUBSCRIPTION
// ============================================================================

/// Handle for removing a handler. Dropping it does not unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    kind: Option<EventKind>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    fn noop() -> Self {
        Self {
            id: 0,
            kind: None,
            registry: Weak::new(),
        }
    }

    /// Whether this subscription is attached to a real handler.
    pub fn is_active(&self) -> bool {
        self.kind.is_some() && self.registry.strong_count() > 0
    }

    pub fn kind(&self) -> Option<EventKind> {
        self.kind
    }

    /// Remove the handler. Returns false for no-op subscriptions or if the
    /// handler was already gone.
    pub fn unsubscribe(self) -> bool {
        let (Some(kind), Some(registry)) = (self.kind, self.registry.upgrade()) else {
            return false;
        };
        let mut registry = lock(&registry);
        let subscribers = &mut registry.entry(kind).subscribers;
        let before = subscribers.len();
        subscribers.retain(|(id, _)| *id != self.id);
        before != subscribers.len()
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Typed in-process pub/sub hub for lifecycle notifications.
///
/// Handlers run sequentially in subscription order. A failing handler (an
/// `Err` return or a panic) is recorded and never stops delivery to the
/// remaining handlers nor reaches the publisher. Failures while delivering
/// a non-`error` event trigger one synthetic `error` publish; failures
/// inside that publish are only recorded.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher").finish_non_exhaustive()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::new())),
        }
    }

    /// Register `handler` for `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        let handler: Handler = Arc::new(handler);
        registry.entry(kind).subscribers.push((id, handler));
        tracing::trace!(event = %kind, subscriber_id = id, "Handler subscribed");

        Subscription {
            id,
            kind: Some(kind),
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register by event name. Unknown names log a warning and yield a no-op
    /// subscription.
    pub fn subscribe_named<F>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        match name.parse::<EventKind>() {
            Ok(kind) => self.subscribe(kind, handler),
            Err(_) => {
                tracing::warn!(event = name, "Ignoring subscription to unknown event");
                Subscription::noop()
            }
        }
    }

    /// Deliver `event` to every current subscriber of its kind.
    pub fn publish(&self, event: &LifecycleEvent) -> PublishReport {
        self.deliver(event, true)
    }

    /// Publish by event name. Unknown names (or a name that does not match
    /// the payload) are counted and dropped with a warning.
    pub fn publish_named(&self, name: &str, event: &LifecycleEvent) -> PublishReport {
        match name.parse::<EventKind>() {
            Ok(kind) if kind == event.kind() => self.publish(event),
            _ => {
                lock(&self.registry).unknown_publishes += 1;
                tracing::warn!(event = name, "Dropping publish to unknown event");
                PublishReport::default()
            }
        }
    }

    fn deliver(&self, event: &LifecycleEvent, republish_failures: bool) -> PublishReport {
        let kind = event.kind();
        let handlers: Vec<(u64, Handler)> = {
            let mut registry = lock(&self.registry);
            let entry = registry.entry(kind);
            entry.published += 1;
            entry.subscribers.clone()
        };

        let mut report = PublishReport::default();
        let mut failures = Vec::new();

        for (subscriber_id, handler) in handlers {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(event)));
            let message = match outcome {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => e.0,
                Err(panic) => panic_message(panic.as_ref()),
            };

            tracing::error!(
                event = %kind,
                subscriber_id,
                error = %message,
                "Event handler failed"
            );
            report.failed += 1;
            failures.push(HandlerFailure {
                subscriber_id,
                message,
                at: Utc::now(),
            });
        }

        {
            let mut registry = lock(&self.registry);
            let entry = registry.entry(kind);
            entry.delivered += report.delivered as u64;
            entry.failures += failures.len() as u64;
            for failure in &failures {
                if entry.errors.len() == MAX_ERROR_LOG {
                    entry.errors.pop_front();
                }
                entry.errors.push_back(failure.clone());
            }
        }

        if republish_failures && kind != EventKind::Error {
            for failure in &failures {
                let synthetic = LifecycleEvent::error(
                    format!("handler:{kind}"),
                    format!(
                        "subscriber {} failed: {}",
                        failure.subscriber_id, failure.message
                    ),
                );
                self.deliver(&synthetic, false);
            }
        }

        report
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        lock(&self.registry)
            .kinds
            .get(&kind)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Recent handler failures for `kind`, oldest first.
    pub fn recent_errors(&self, kind: EventKind) -> Vec<HandlerFailure> {
        lock(&self.registry)
            .kinds
            .get(&kind)
            .map(|entry| entry.errors.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> DispatcherStats {
        let registry = lock(&self.registry);
        let kinds = registry
            .kinds
            .iter()
            .map(|(kind, entry)| {
                (
                    *kind,
                    KindStats {
                        subscribers: entry.subscribers.len(),
                        published: entry.published,
                        delivered: entry.delivered,
                        failures: entry.failures,
                        recent_errors: entry.errors.iter().cloned().collect(),
                    },
                )
            })
            .collect();

        DispatcherStats {
            kinds,
            unknown_publishes: registry.unknown_publishes,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}
