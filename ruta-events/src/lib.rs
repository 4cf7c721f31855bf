//! Ruta Events - Lifecycle Event Dispatcher
//!
//! In-process pub/sub over a closed set of lifecycle events:
//!
//! ```text
//! beforeRefresh → (population / rebuild) → afterRefresh
//!                         │
//!                         ├─ error        (step or handler failure)
//!                         └─ stateChange  (transitions, expiry, invalidation)
//! ```
//!
//! # Key Types
//!
//! - `EventKind`: the closed set of event names
//! - `LifecycleEvent`: the payload delivered to handlers
//! - `EventDispatcher`: the registry, cheap to clone and share
//! - `Subscription`: handle returned by `subscribe`, used to unsubscribe

mod dispatcher;
mod event;

pub use dispatcher::{
    DispatcherStats, EventDispatcher, Handler, HandlerError, HandlerFailure, KindStats,
    PublishReport, Subscription, MAX_ERROR_LOG,
};
pub use event::{EventKind, LifecycleEvent, StateChange};
