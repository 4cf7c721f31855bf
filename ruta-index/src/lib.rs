//! Ruta Index - Indexed Entity Structures
//!
//! Pure transforms from raw entity collections to the canonical cached
//! shape `{ byId, <secondary>... }`, and audits that check every entity in
//! `byId` is reachable through each secondary index.
//!
//! Builders never fail: records without an ID (or repeating an earlier ID)
//! are dropped with a warning, and untyped payloads that are not arrays
//! yield the empty structure.

mod builder;
mod integrity;
mod structures;

pub use builder::{
    build_client_index, build_client_index_from_value, build_delivery_index,
    build_delivery_index_from_value, build_product_index, build_product_index_from_value,
    status_key, UNKNOWN_STATUS,
};
pub use integrity::{verify_integrity, IntegrityIssue, IssueProblem};
pub use structures::{
    ClientIndex, DeliveryIndex, IndexedCollection, IndexedStructure, ProductIndex,
};
