//! The canonical cached shapes for each entity collection.

use crate::integrity::{client_issues, delivery_issues, product_issues, IntegrityIssue};
use ruta_core::{Client, DataError, Delivery, EntityKey, EntityType, Product};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// STRUCTURES
// ============================================================================

/// Clients by ID, by normalized name (names collide) and by lower-cased zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIndex {
    pub by_id: BTreeMap<EntityKey, Client>,
    pub by_name: BTreeMap<String, Vec<Client>>,
    pub by_zone: BTreeMap<String, Vec<Client>>,
}

/// Products by ID, by normalized name (single, last writer wins) and by
/// type (first name token, lower-cased).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductIndex {
    pub by_id: BTreeMap<EntityKey, Product>,
    pub by_name: BTreeMap<String, Product>,
    pub by_type: BTreeMap<String, Vec<Product>>,
}

/// Deliveries by ID, by owning client and by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryIndex {
    pub by_id: BTreeMap<EntityKey, Delivery>,
    pub by_client: BTreeMap<EntityKey, Vec<Delivery>>,
    pub by_status: BTreeMap<String, Vec<Delivery>>,
}

// ============================================================================
// TRAIT
// ============================================================================

/// Common surface of the indexed structures, so population and verification
/// can be written once for all entity types.
pub trait IndexedStructure: Serialize + DeserializeOwned + Default + Send + Sync {
    const ENTITY_TYPE: EntityType;

    /// Number of entities in `byId`.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn integrity_issues(&self) -> Vec<IntegrityIssue>;
}

impl IndexedStructure for ClientIndex {
    const ENTITY_TYPE: EntityType = EntityType::Client;

    fn len(&self) -> usize {
        self.by_id.len()
    }

    fn integrity_issues(&self) -> Vec<IntegrityIssue> {
        client_issues(self)
    }
}

impl IndexedStructure for ProductIndex {
    const ENTITY_TYPE: EntityType = EntityType::Product;

    fn len(&self) -> usize {
        self.by_id.len()
    }

    fn integrity_issues(&self) -> Vec<IntegrityIssue> {
        product_issues(self)
    }
}

impl IndexedStructure for DeliveryIndex {
    const ENTITY_TYPE: EntityType = EntityType::Delivery;

    fn len(&self) -> usize {
        self.by_id.len()
    }

    fn integrity_issues(&self) -> Vec<IntegrityIssue> {
        delivery_issues(self)
    }
}

// ============================================================================
// TAGGED COLLECTION
// ============================================================================

/// Any one indexed structure, tagged with its entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexedCollection {
    Clients(ClientIndex),
    Products(ProductIndex),
    Deliveries(DeliveryIndex),
}

impl IndexedCollection {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Clients(_) => EntityType::Client,
            Self::Products(_) => EntityType::Product,
            Self::Deliveries(_) => EntityType::Delivery,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Clients(index) => index.len(),
            Self::Products(index) => index.len(),
            Self::Deliveries(index) => index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode a cached value as the structure for `entity_type`.
    pub fn from_value(entity_type: EntityType, value: Value) -> Result<Self, DataError> {
        let invalid = |e: serde_json::Error| DataError::Invalid {
            entity_type,
            reason: e.to_string(),
        };
        Ok(match entity_type {
            EntityType::Client => Self::Clients(serde_json::from_value(value).map_err(invalid)?),
            EntityType::Product => Self::Products(serde_json::from_value(value).map_err(invalid)?),
            EntityType::Delivery => {
                Self::Deliveries(serde_json::from_value(value).map_err(invalid)?)
            }
        })
    }
}

impl From<ClientIndex> for IndexedCollection {
    fn from(index: ClientIndex) -> Self {
        Self::Clients(index)
    }
}

impl From<ProductIndex> for IndexedCollection {
    fn from(index: ProductIndex) -> Self {
        Self::Products(index)
    }
}

impl From<DeliveryIndex> for IndexedCollection {
    fn from(index: DeliveryIndex) -> Self {
        Self::Deliveries(index)
    }
}
