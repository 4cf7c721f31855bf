//! Ruta Core - Entity Records, Configuration and Errors
//!
//! Pure data types shared by every other Ruta crate. This crate contains no
//! caching logic: the Store, index builders and orchestration live in their
//! own crates and depend on this one.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod normalize;

use chrono::{DateTime, Utc};

pub use config::{
    CacheSettings, ExpirationPolicy, InvalidationTarget, RetrySettings, CONFIG_PATH_ENV,
    MAX_TTL_SECS,
};
pub use entities::{Client, Delivery, DeliveryItem, EntityKey, Product};
pub use enums::{EntityType, Namespace};
pub use error::{
    CollaboratorError, ConfigError, DataError, DependencyError, RutaError, RutaResult,
    StorageError,
};
pub use normalize::{normalize_name, normalize_zone, product_type};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
