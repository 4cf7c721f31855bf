//! Collection to indexed-structure builders.

use crate::structures::{ClientIndex, DeliveryIndex, ProductIndex};
use ruta_core::{
    normalize_name, normalize_zone, product_type, Client, Delivery, EntityKey, EntityType,
    Product,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Status bucket for deliveries without one.
pub const UNKNOWN_STATUS: &str = "unknown";

/// Key a delivery is filed under in `byStatus`.
pub fn status_key(status: Option<&str>) -> String {
    match status.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => UNKNOWN_STATUS.to_string(),
    }
}

/// Name key used by `byName`, or `None` when the name normalizes to nothing.
pub(crate) fn name_key(name: Option<&str>) -> Option<String> {
    name.map(normalize_name).filter(|key| !key.is_empty())
}

pub(crate) fn zone_key(zone: Option<&str>) -> Option<String> {
    zone.map(normalize_zone).filter(|key| !key.is_empty())
}

pub(crate) fn type_key(name: Option<&str>) -> Option<String> {
    name.and_then(product_type)
}

pub(crate) fn client_key(client_id: Option<&str>) -> Option<String> {
    client_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

// ============================================================================
// BUILDERS
// ============================================================================

pub fn build_client_index(clients: &[Client]) -> ClientIndex {
    let mut index = ClientIndex::default();

    for client in accept_unique(clients, EntityType::Client, |c| &mut c.id) {
        if let Some(key) = name_key(client.name.as_deref()) {
            index.by_name.entry(key).or_default().push(client.clone());
        }
        if let Some(key) = zone_key(client.zone.as_deref()) {
            index.by_zone.entry(key).or_default().push(client.clone());
        }
        index.by_id.insert(client.id.clone(), client.clone());
    }

    tracing::debug!(
        entity_type = %EntityType::Client,
        entities = index.by_id.len(),
        names = index.by_name.len(),
        zones = index.by_zone.len(),
        "Built client index"
    );
    index
}

pub fn build_product_index(products: &[Product]) -> ProductIndex {
    let mut index = ProductIndex::default();

    for product in accept_unique(products, EntityType::Product, |p| &mut p.id) {
        if let Some(key) = name_key(product.name.as_deref()) {
            if let Some(previous) = index.by_name.insert(key.clone(), product.clone()) {
                tracing::debug!(
                    name = %key,
                    replaced = %previous.id,
                    by = %product.id,
                    "Product name collision, keeping the later product"
                );
            }
        }
        if let Some(key) = type_key(product.name.as_deref()) {
            index.by_type.entry(key).or_default().push(product.clone());
        }
        index.by_id.insert(product.id.clone(), product.clone());
    }

    tracing::debug!(
        entity_type = %EntityType::Product,
        entities = index.by_id.len(),
        types = index.by_type.len(),
        "Built product index"
    );
    index
}

pub fn build_delivery_index(deliveries: &[Delivery]) -> DeliveryIndex {
    let mut index = DeliveryIndex::default();

    for delivery in accept_unique(deliveries, EntityType::Delivery, |d| &mut d.id) {
        if let Some(key) = client_key(delivery.client_id.as_deref()) {
            index.by_client.entry(key).or_default().push(delivery.clone());
        }
        index
            .by_status
            .entry(status_key(delivery.status.as_deref()))
            .or_default()
            .push(delivery.clone());
        index.by_id.insert(delivery.id.clone(), delivery.clone());
    }

    tracing::debug!(
        entity_type = %EntityType::Delivery,
        entities = index.by_id.len(),
        clients = index.by_client.len(),
        "Built delivery index"
    );
    index
}

// ============================================================================
// UNTYPED INPUT
// ============================================================================

pub fn build_client_index_from_value(value: &Value) -> ClientIndex {
    build_client_index(&records_from_value(value, EntityType::Client))
}

pub fn build_product_index_from_value(value: &Value) -> ProductIndex {
    build_product_index(&records_from_value(value, EntityType::Product))
}

pub fn build_delivery_index_from_value(value: &Value) -> DeliveryIndex {
    build_delivery_index(&records_from_value(value, EntityType::Delivery))
}

fn records_from_value<T: DeserializeOwned>(value: &Value, entity_type: EntityType) -> Vec<T> {
    let Some(items) = value.as_array() else {
        tracing::warn!(
            entity_type = %entity_type,
            "Expected an array of records, building empty index"
        );
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(position, item)| match serde_json::from_value(item.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    entity_type = %entity_type,
                    position,
                    error = %e,
                    "Dropping malformed record"
                );
                None
            }
        })
        .collect()
}

// ============================================================================
// HELPERS
// ============================================================================

/// Records with a non-empty ID not seen earlier in the list, in input order,
/// with surrounding whitespace trimmed from the ID.
fn accept_unique<T: Clone>(
    records: &[T],
    entity_type: EntityType,
    id: impl Fn(&mut T) -> &mut EntityKey,
) -> Vec<T> {
    let mut first_seen: BTreeMap<EntityKey, usize> = BTreeMap::new();
    let mut accepted = Vec::with_capacity(records.len());

    for (position, record) in records.iter().enumerate() {
        let mut record = record.clone();
        let record_id = id(&mut record);
        let trimmed = record_id.trim();
        if trimmed.is_empty() {
            tracing::warn!(entity_type = %entity_type, position, "Skipping record without ID");
            continue;
        }
        if trimmed.len() != record_id.len() {
            *record_id = trimmed.to_string();
        }
        if let Some(first) = first_seen.get(record_id.as_str()) {
            tracing::warn!(
                entity_type = %entity_type,
                id = %record_id,
                position,
                first_position = first,
                "Skipping record with duplicate ID"
            );
            continue;
        }
        first_seen.insert(record_id.clone(), position);
        accepted.push(record);
    }

    accepted
}
