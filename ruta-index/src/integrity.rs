//! Cross-index consistency audits.
//!
//! Every entity in `byId` must be reachable from each applicable secondary
//! index under the key the builder would have used for it. Problems come
//! back as data; nothing here fails.

use crate::builder::{client_key, name_key, status_key, type_key, zone_key};
use crate::structures::{
    ClientIndex, DeliveryIndex, IndexedCollection, IndexedStructure, ProductIndex,
};
use ruta_core::{EntityKey, EntityType};
use std::collections::BTreeMap;
use std::fmt;

/// What went wrong for one entity in one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueProblem {
    /// `byId` holds the entity under a different key than its own ID.
    IdMismatch { stored_under: EntityKey },
    /// The secondary index has no entry for the entity's key.
    MissingKey { key: String },
    /// The key exists but does not lead to this entity.
    NotReachable { key: String },
}

/// A detected mismatch between `byId` and a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityIssue {
    pub entity_type: EntityType,
    pub entity_id: EntityKey,
    pub index: &'static str,
    pub problem: IssueProblem,
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            IssueProblem::IdMismatch { stored_under } => write!(
                f,
                "{}/{}: entity {} stored under key '{}'",
                self.entity_type, self.index, self.entity_id, stored_under
            ),
            IssueProblem::MissingKey { key } => write!(
                f,
                "{}/{}: entity {} has no entry under key '{}'",
                self.entity_type, self.index, self.entity_id, key
            ),
            IssueProblem::NotReachable { key } => write!(
                f,
                "{}/{}: entity {} not reachable under key '{}'",
                self.entity_type, self.index, self.entity_id, key
            ),
        }
    }
}

/// Audit any indexed structure.
pub fn verify_integrity(collection: &IndexedCollection) -> Vec<IntegrityIssue> {
    match collection {
        IndexedCollection::Clients(index) => index.integrity_issues(),
        IndexedCollection::Products(index) => index.integrity_issues(),
        IndexedCollection::Deliveries(index) => index.integrity_issues(),
    }
}

// ============================================================================
// PER ENTITY TYPE
// ============================================================================

pub(crate) fn client_issues(index: &ClientIndex) -> Vec<IntegrityIssue> {
    let mut audit = Audit::new(EntityType::Client);
    for (stored_under, client) in &index.by_id {
        audit.check_id(stored_under, &client.id);
        if let Some(key) = name_key(client.name.as_deref()) {
            audit.check_list(&client.id, "byName", &index.by_name, key, |c| &c.id);
        }
        if let Some(key) = zone_key(client.zone.as_deref()) {
            audit.check_list(&client.id, "byZone", &index.by_zone, key, |c| &c.id);
        }
    }
    audit.finish()
}

pub(crate) fn product_issues(index: &ProductIndex) -> Vec<IntegrityIssue> {
    let mut audit = Audit::new(EntityType::Product);
    for (stored_under, product) in &index.by_id {
        audit.check_id(stored_under, &product.id);
        if let Some(key) = name_key(product.name.as_deref()) {
            match index.by_name.get(&key) {
                None => audit.push(&product.id, "byName", IssueProblem::MissingKey { key }),
                Some(found) if found.id != product.id => {
                    audit.push(&product.id, "byName", IssueProblem::NotReachable { key })
                }
                Some(_) => {}
            }
        }
        if let Some(key) = type_key(product.name.as_deref()) {
            audit.check_list(&product.id, "byType", &index.by_type, key, |p| &p.id);
        }
    }
    audit.finish()
}

pub(crate) fn delivery_issues(index: &DeliveryIndex) -> Vec<IntegrityIssue> {
    let mut audit = Audit::new(EntityType::Delivery);
    for (stored_under, delivery) in &index.by_id {
        audit.check_id(stored_under, &delivery.id);
        if let Some(key) = client_key(delivery.client_id.as_deref()) {
            audit.check_list(&delivery.id, "byClient", &index.by_client, key, |d| &d.id);
        }
        let key = status_key(delivery.status.as_deref());
        audit.check_list(&delivery.id, "byStatus", &index.by_status, key, |d| &d.id);
    }
    audit.finish()
}

struct Audit {
    entity_type: EntityType,
    issues: Vec<IntegrityIssue>,
}

impl Audit {
    fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            issues: Vec::new(),
        }
    }

    fn push(&mut self, entity_id: &str, index: &'static str, problem: IssueProblem) {
        self.issues.push(IntegrityIssue {
            entity_type: self.entity_type,
            entity_id: entity_id.to_string(),
            index,
            problem,
        });
    }

    fn check_id(&mut self, stored_under: &str, entity_id: &str) {
        if stored_under != entity_id {
            self.push(
                entity_id,
                "byId",
                IssueProblem::IdMismatch {
                    stored_under: stored_under.to_string(),
                },
            );
        }
    }

    fn check_list<T>(
        &mut self,
        entity_id: &str,
        index: &'static str,
        map: &BTreeMap<String, Vec<T>>,
        key: String,
        id: impl Fn(&T) -> &EntityKey,
    ) {
        match map.get(&key) {
            None => self.push(entity_id, index, IssueProblem::MissingKey { key }),
            Some(entries) if !entries.iter().any(|e| id(e) == entity_id) => {
                self.push(entity_id, index, IssueProblem::NotReachable { key })
            }
            Some(_) => {}
        }
    }

    fn finish(self) -> Vec<IntegrityIssue> {
        if !self.issues.is_empty() {
            tracing::debug!(
                entity_type = %self.entity_type,
                issues = self.issues.len(),
                "Integrity audit found issues"
            );
        }
        self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_client_index, build_delivery_index, build_product_index};
    use proptest::prelude::*;
    use ruta_core::{Client, Delivery, Product};

    fn arb_label() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-zA-Z ]{0,12}",
            Just("José Pérez".to_string()),
            Just("  ÑANDÚ  ".to_string()),
        ]
    }

    fn arb_client() -> impl Strategy<Value = Client> {
        (
            "[0-9]{0,3}",
            proptest::option::of(arb_label()),
            proptest::option::of(arb_label()),
        )
            .prop_map(|(id, name, zone)| Client {
                id,
                name,
                zone,
                ..Default::default()
            })
    }

    fn arb_product() -> impl Strategy<Value = Product> {
        ("[0-9]{1,3}", proptest::option::of(arb_label())).prop_map(|(id, name)| Product {
            id,
            name,
            unit_price: None,
        })
    }

    fn arb_delivery() -> impl Strategy<Value = Delivery> {
        (
            "[0-9]{1,3}",
            proptest::option::of("[0-9]{0,2}"),
            proptest::option::of(prop_oneof![
                Just("delivered".to_string()),
                Just("pending".to_string()),
                Just(" ".to_string()),
            ]),
        )
            .prop_map(|(id, client_id, status)| Delivery {
                id,
                client_id,
                status,
                ..Default::default()
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every client reachable via byId is reachable via byName and byZone.
        #[test]
        fn prop_client_index_is_consistent(clients in prop::collection::vec(arb_client(), 0..30)) {
            let index = build_client_index(&clients);
            let issues = verify_integrity(&index.into());
            prop_assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
        }

        #[test]
        fn prop_delivery_index_is_consistent(deliveries in prop::collection::vec(arb_delivery(), 0..30)) {
            let index = build_delivery_index(&deliveries);
            prop_assert!(verify_integrity(&index.into()).is_empty());
        }

        /// Products are consistent except where two products share a
        /// normalized name: only the earlier one is unreachable via byName.
        #[test]
        fn prop_product_issues_only_from_name_collisions(products in prop::collection::vec(arb_product(), 0..30)) {
            let index = build_product_index(&products);
            for issue in index.integrity_issues() {
                prop_assert_eq!(issue.index, "byName");
                let key = match &issue.problem {
                    IssueProblem::NotReachable { key } => key.clone(),
                    other => return Err(TestCaseError::fail(format!("unexpected problem {other:?}"))),
                };
                prop_assert_ne!(&index.by_name[&key].id, &issue.entity_id);
            }
        }

        #[test]
        fn prop_empty_input_yields_empty_shape(_seed in 0u8..4) {
            prop_assert_eq!(build_client_index(&[]), ClientIndex::default());
            prop_assert_eq!(build_product_index(&[]), ProductIndex::default());
            prop_assert_eq!(build_delivery_index(&[]), DeliveryIndex::default());
        }
    }

    #[test]
    fn test_detects_entity_missing_from_secondary_index() {
        let mut index = build_client_index(&[Client {
            id: "1".into(),
            name: Some("Ana".into()),
            zone: Some("Norte".into()),
            ..Default::default()
        }]);
        index.by_zone.clear();
        index.by_name.insert("ana".into(), Vec::new());

        let issues = verify_integrity(&index.into());
        assert_eq!(issues.len(), 2);
        assert_eq!(
            issues[0].to_string(),
            "clients/byName: entity 1 not reachable under key 'ana'"
        );
        assert_eq!(
            issues[1].problem,
            IssueProblem::MissingKey {
                key: "norte".into()
            }
        );
    }

    #[test]
    fn test_detects_id_mismatch() {
        let mut index = build_delivery_index(&[Delivery {
            id: "d1".into(),
            ..Default::default()
        }]);
        let delivery = index.by_id.remove("d1").unwrap();
        index.by_id.insert("other".into(), delivery);

        let issues = index.integrity_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, "byId");
    }
}
