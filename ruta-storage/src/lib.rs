//! Ruta Storage - Namespaced In-Memory Store
//!
//! The Store owns every cached value. It is partitioned into namespaces,
//! each with its own [`ExpirationPolicy`](ruta_core::ExpirationPolicy):
//!
//! - `primary`: business data, never expires on a timer
//! - `conversation`, `history`, `advanced`: TTL namespaces, expired lazily on
//!   read and eagerly by [`Store::purge_expired`] / [`expiry_sweeper_task`]
//!
//! Failures never escape the Store: they are logged with key context,
//! recorded as the key's last error, published as an `error` event and
//! converted to a `false`/`None` return.

pub mod lifecycle;
pub mod stats;
pub mod store;
pub mod sweeper;

pub use lifecycle::{KeyError, LifecycleState};
pub use stats::{NamespaceStats, StoreStats};
pub use store::{FlushTarget, Store};
pub use sweeper::{expiry_sweeper_task, SweeperMetrics};
