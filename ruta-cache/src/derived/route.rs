//! Per-zone delivery routes ordered by preferred time.

use super::time_slot::minutes_of_day;
use ruta_core::{normalize_zone, EntityKey};
use ruta_index::ClientIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stop on a suggested route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub id: EntityKey,
    pub name: Option<String>,
    pub address: Option<String>,
    pub preferred_time: Option<String>,
}

/// Sort stops by preferred time; stops without a (parseable) time go last.
/// The sort is stable, so ties keep their existing order.
pub(crate) fn sort_route(entries: &mut [RouteEntry]) {
    entries.sort_by_key(|entry| {
        let minutes = entry.preferred_time.as_deref().and_then(minutes_of_day);
        (minutes.is_none(), minutes)
    });
}

pub(crate) fn build_routes(clients: &ClientIndex) -> BTreeMap<String, Vec<RouteEntry>> {
    let mut routes: BTreeMap<String, Vec<RouteEntry>> = BTreeMap::new();
    for client in clients.by_id.values() {
        let Some(zone) = client.zone.as_deref().map(normalize_zone) else {
            continue;
        };
        if zone.is_empty() {
            continue;
        }
        routes.entry(zone).or_default().push(RouteEntry {
            id: client.id.clone(),
            name: client.name.clone(),
            address: client.address.clone(),
            preferred_time: client.preferred_time.clone(),
        });
    }
    for entries in routes.values_mut() {
        sort_route(entries);
    }
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruta_core::Client;
    use ruta_index::build_client_index;

    fn client(id: &str, zone: &str, time: Option<&str>) -> Client {
        Client {
            id: id.into(),
            zone: Some(zone.into()),
            preferred_time: time.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_route_sorted_by_time_with_missing_last() {
        let clients = build_client_index(&[
            client("a", "Centro", None),
            client("b", "Centro", Some("14:00")),
            client("c", "centro", Some("9:30")),
            client("d", "Centro", Some("10:15")),
            client("e", "Sur", Some("08:00")),
            client("f", "Centro", Some("luego")),
        ]);

        let routes = build_routes(&clients);
        let order: Vec<&str> = routes["centro"].iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["c", "d", "b", "a", "f"]);
        assert_eq!(routes["sur"].len(), 1);
    }
}
