//! Enum types shared across Ruta crates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY TYPES
// ============================================================================

/// Business entity collections held in the primary namespace.
///
/// Ordering matters: population runs clients, then products, then deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Client,
    Product,
    Delivery,
}

impl EntityType {
    /// All entity types in population order.
    pub const ALL: [EntityType; 3] = [EntityType::Client, EntityType::Product, EntityType::Delivery];

    /// Key under which the indexed collection lives in the primary namespace.
    pub fn cache_key(&self) -> &'static str {
        match self {
            EntityType::Client => "clients",
            EntityType::Product => "products",
            EntityType::Delivery => "deliveries",
        }
    }

    /// Secondary index names carried by the indexed structure, next to `byId`.
    pub fn secondary_indexes(&self) -> &'static [&'static str] {
        match self {
            EntityType::Client => &["byName", "byZone"],
            EntityType::Product => &["byName", "byType"],
            EntityType::Delivery => &["byClient", "byStatus"],
        }
    }

    /// Resolve an entity type from its primary-namespace cache key.
    pub fn from_cache_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.cache_key() == key)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_key())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" | "clients" => Ok(EntityType::Client),
            "product" | "products" => Ok(EntityType::Product),
            "delivery" | "deliveries" => Ok(EntityType::Delivery),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

// ============================================================================
// NAMESPACES
// ============================================================================

/// Independently configured partition of the Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Business data (clients, products, deliveries). Invalidated by events only.
    Primary,
    /// Short-lived conversational state.
    Conversation,
    /// Long-lived history.
    History,
    /// Medium-lived derived "advanced" context.
    Advanced,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Primary,
        Namespace::Conversation,
        Namespace::History,
        Namespace::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Primary => "primary",
            Namespace::Conversation => "conversation",
            Namespace::History => "history",
            Namespace::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown namespace: {s}"))
    }
}
