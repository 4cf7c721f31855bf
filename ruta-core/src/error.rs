//! Error types for Ruta operations

use crate::{EntityType, Namespace};
use thiserror::Error;

/// Static configuration errors. Fatal: they abort initialization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing expiration policy for namespace {namespace}")]
    MissingNamespace { namespace: Namespace },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalidation event {event} targets unknown key {namespace}/{key}")]
    UnknownInvalidationTarget {
        event: String,
        namespace: Namespace,
        key: String,
    },

    #[error("Failed to read config file: {reason}")]
    Io { reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },
}

/// Errors raised by (or about) the data-source collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Required data source not configured: {source_name}")]
    Missing { source_name: String },

    #[error("Data source {source_name} failed: {reason}")]
    FetchFailed { source_name: String, reason: String },
}

/// A fetch produced nothing usable for an entity type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("Data source returned no {entity_type} records")]
    Empty { entity_type: EntityType },

    #[error("Invalid {entity_type} data: {reason}")]
    Invalid {
        entity_type: EntityType,
        reason: String,
    },
}

/// Store-level failures.
///
/// These are caught at the Store boundary and degrade to a `false`/`None`
/// return; callers only ever see them through lifecycle state or when the
/// Orchestrator escalates a rejected write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Write to {namespace}/{key} failed: {reason}")]
    Write {
        namespace: Namespace,
        key: String,
        reason: String,
    },

    #[error("Read from {namespace}/{key} failed: {reason}")]
    Read {
        namespace: Namespace,
        key: String,
        reason: String,
    },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Primary data a consumer depends on has not been populated yet.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DependencyError {
    #[error("Dependencies not ready after {attempts} attempts: missing {}", .missing.join(", "))]
    NotReady { missing: Vec<String>, attempts: u32 },
}

/// Master error type for all Ruta errors.
#[derive(Debug, Clone, Error)]
pub enum RutaError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    #[error("Failed to populate {entity_type}: {source}")]
    Population {
        entity_type: EntityType,
        #[source]
        source: Box<RutaError>,
    },

    #[error("Initialization step {step} failed: {source}")]
    Initialization {
        step: String,
        #[source]
        source: Box<RutaError>,
    },
}

impl RutaError {
    /// Attach the entity type whose population failed.
    pub fn population(entity_type: EntityType, source: RutaError) -> Self {
        Self::Population {
            entity_type,
            source: Box::new(source),
        }
    }

    /// Attach the initialization step that failed.
    pub fn initialization(step: impl Into<String>, source: RutaError) -> Self {
        Self::Initialization {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Walk through step/population wrappers to the underlying error.
    pub fn root_cause(&self) -> &RutaError {
        match self {
            Self::Population { source, .. } | Self::Initialization { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// Result type alias for Ruta operations.
pub type RutaResult<T> = Result<T, RutaError>;

// =============================================================================
// TESTS
// =============================================================================
