//! Per-namespace lifecycle bookkeeping: when each key was last written and
//! the last error seen for it.

use chrono::Utc;
use ruta_core::Timestamp;
use std::collections::BTreeMap;

/// Last error recorded against a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyError {
    pub message: String,
    pub at: Timestamp,
}

/// Lifecycle state for one namespace, keyed by cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleState {
    pub last_refresh: BTreeMap<String, Timestamp>,
    pub last_error: BTreeMap<String, KeyError>,
}

impl LifecycleState {
    /// A successful write: stamp the refresh time and clear any stale error.
    pub fn record_refresh(&mut self, key: &str) {
        self.last_refresh.insert(key.to_string(), Utc::now());
        self.last_error.remove(key);
    }

    pub fn record_error(&mut self, key: &str, message: impl Into<String>) {
        self.last_error.insert(
            key.to_string(),
            KeyError {
                message: message.into(),
                at: Utc::now(),
            },
        );
    }

    /// The key's data is gone (expired, deleted or flushed).
    pub fn forget_refresh(&mut self, key: &str) {
        self.last_refresh.remove(key);
    }

    pub fn clear_refreshes(&mut self) {
        self.last_refresh.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_clears_previous_error() {
        let mut state = LifecycleState::default();
        state.record_error("clients", "source offline");
        assert!(state.last_error.contains_key("clients"));

        state.record_refresh("clients");
        assert!(state.last_refresh.contains_key("clients"));
        assert!(!state.last_error.contains_key("clients"));
    }

    #[test]
    fn test_forget_refresh_keeps_errors() {
        let mut state = LifecycleState::default();
        state.record_refresh("session:1");
        state.record_error("session:2", "bad payload");

        state.forget_refresh("session:1");
        state.clear_refreshes();

        assert!(state.last_refresh.is_empty());
        assert_eq!(state.last_error.len(), 1);
    }
}
