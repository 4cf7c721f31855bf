//! Which clients in a zone receive a given product.

use ruta_core::{normalize_zone, EntityKey};
use ruta_index::{ClientIndex, DeliveryIndex};
use std::collections::{BTreeMap, BTreeSet};

/// Compound key `"{zone}::{product_id}"`, zone lower-cased.
pub fn zone_product_key(zone: &str, product_id: &str) -> String {
    format!("{}::{}", normalize_zone(zone), product_id.trim())
}

/// Join delivery line items to the owning client's zone.
pub(crate) fn build_zone_products(
    clients: &ClientIndex,
    deliveries: &DeliveryIndex,
) -> BTreeMap<String, BTreeSet<EntityKey>> {
    let mut index: BTreeMap<String, BTreeSet<EntityKey>> = BTreeMap::new();
    let mut orphaned = 0usize;

    for delivery in deliveries.by_id.values() {
        let client = delivery
            .client_id
            .as_deref()
            .and_then(|id| clients.by_id.get(id.trim()));
        let Some(client) = client else {
            orphaned += 1;
            continue;
        };
        let Some(zone) = client.zone.as_deref().filter(|z| !z.trim().is_empty()) else {
            continue;
        };
        for item in &delivery.items {
            if item.product_id.trim().is_empty() {
                continue;
            }
            index
                .entry(zone_product_key(zone, &item.product_id))
                .or_default()
                .insert(client.id.clone());
        }
    }

    if orphaned > 0 {
        tracing::debug!(orphaned, "Deliveries without a cached client skipped");
    }
    index
}
