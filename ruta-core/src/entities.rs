//! Raw business entity records.
//!
//! These are flat records as delivered by the data-source collaborators.
//! Every field except the identifier is optional because upstream sources
//! are loosely validated; normalization drops records without an ID.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier as carried by upstream sources (numeric IDs are stringified).
pub type EntityKey = String;

/// A delivery client (shop, restaurant, household).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: EntityKey,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Preferred delivery time as `HH:MM`.
    #[serde(default)]
    pub preferred_time: Option<String>,
}

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: EntityKey,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit_price: Option<f64>,
}

/// One line of a delivery.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryItem {
    #[serde(default, deserialize_with = "lenient_id")]
    pub product_id: EntityKey,
    #[serde(default)]
    pub quantity: Option<f64>,
}

/// A delivery made (or scheduled) for a client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: EntityKey,
    /// Owning client.
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub client_id: Option<EntityKey>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<DeliveryItem>,
}

// ============================================================================
// LENIENT ID DESERIALIZATION
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Int(n) => n.to_string(),
            RawId::Float(n) => n.to_string(),
        }
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?
        .map(String::from)
        .unwrap_or_default())
}

fn lenient_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?
        .map(String::from)
        .filter(|id| !id.is_empty()))
}
