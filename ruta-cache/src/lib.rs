//! Ruta Cache - Orchestration and Derived Indexes
//!
//! Ties the Store, index builders and event dispatcher together:
//!
//! - [`Orchestrator`] runs the initialization pipeline
//!   (validate config, validate collaborators, populate, verify) and guards
//!   against concurrent re-initialization.
//! - [`DerivedIndexManager`] builds second-order indexes (zone×product,
//!   time slot, delivery frequency, routes) from the populated primary data,
//!   backing off while that data is not there yet.
//! - [`ClientSource`], [`ProductSource`] and [`DeliverySource`] are the seams
//!   to the systems of record.
//!
//! Components are constructed explicitly and shared by `Arc`; nothing here
//! is global.

pub mod derived;
pub mod orchestrator;
pub mod retry;
pub mod sources;

pub use derived::{
    classify_frequency, time_slot, zone_product_key, DerivedIndexManager, DerivedSnapshot,
    FrequencyCategory, FrequencyProfile, RouteEntry, TimeSlot,
};
pub use orchestrator::{
    EntityStatus, InitOutcome, InitReport, Orchestrator, OrchestratorState, OrchestratorStatus,
    VerificationReport,
};
pub use retry::{retry_until_ready, RetryOutcome};
pub use sources::{ClientSource, DataSources, DeliverySource, ProductSource};
