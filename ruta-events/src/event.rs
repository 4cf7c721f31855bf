//! Lifecycle event kinds and payloads.

use ruta_core::Namespace;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The closed set of lifecycle event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventKind {
    #[serde(rename = "beforeRefresh")]
    BeforeRefresh,
    #[serde(rename = "afterRefresh")]
    AfterRefresh,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "stateChange")]
    StateChange,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::BeforeRefresh,
        EventKind::AfterRefresh,
        EventKind::Error,
        EventKind::StateChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BeforeRefresh => "beforeRefresh",
            EventKind::AfterRefresh => "afterRefresh",
            EventKind::Error => "error",
            EventKind::StateChange => "stateChange",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event: {s}"))
    }
}

/// What changed, for `stateChange` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum StateChange {
    /// A component moved between lifecycle states.
    Transition {
        component: String,
        from: String,
        to: String,
    },
    /// A TTL entry expired and was evicted.
    Expired { namespace: Namespace, key: String },
    /// An entry was removed by an invalidation event.
    Invalidated {
        namespace: Namespace,
        key: String,
        event: String,
    },
    /// One namespace (or all, when `None`) was flushed.
    Flushed { namespace: Option<Namespace> },
}

/// Payload delivered to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LifecycleEvent {
    BeforeRefresh { target: String },
    AfterRefresh { target: String, entries: usize },
    Error { origin: String, message: String },
    StateChange(StateChange),
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::BeforeRefresh { .. } => EventKind::BeforeRefresh,
            LifecycleEvent::AfterRefresh { .. } => EventKind::AfterRefresh,
            LifecycleEvent::Error { .. } => EventKind::Error,
            LifecycleEvent::StateChange(_) => EventKind::StateChange,
        }
    }

    pub fn error(origin: impl Into<String>, message: impl Into<String>) -> Self {
        LifecycleEvent::Error {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_names_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
        assert!("expired".parse::<EventKind>().is_err());
        assert!("BeforeRefresh".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_payload_kind() {
        let event = LifecycleEvent::StateChange(StateChange::Flushed { namespace: None });
        assert_eq!(event.kind(), EventKind::StateChange);
        assert_eq!(LifecycleEvent::error("store", "boom").kind(), EventKind::Error);
    }
}
