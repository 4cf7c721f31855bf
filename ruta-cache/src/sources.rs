//! Data-source collaborator seams.
//!
//! Implementations live outside this crate (HTTP clients, spreadsheets,
//! databases). A source must return an empty list, not an error, when there
//! is genuinely no data; unreachable backends fail with
//! [`CollaboratorError::FetchFailed`](ruta_core::CollaboratorError::FetchFailed).

use async_trait::async_trait;
use ruta_core::{Client, CollaboratorError, Delivery, EntityType, Product, RutaResult};
use std::sync::Arc;

#[async_trait]
pub trait ClientSource: Send + Sync {
    async fn fetch_clients(&self) -> RutaResult<Vec<Client>>;
}

#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch_products(&self) -> RutaResult<Vec<Product>>;
}

#[async_trait]
pub trait DeliverySource: Send + Sync {
    /// Fetch deliveries, optionally only those from the last `since_months_back` months.
    async fn fetch_deliveries(&self, since_months_back: Option<u32>) -> RutaResult<Vec<Delivery>>;
}

/// The set of collaborators handed to the Orchestrator. Any may be absent;
/// absence is reported by collaborator validation, not at construction.
#[derive(Clone, Default)]
pub struct DataSources {
    pub clients: Option<Arc<dyn ClientSource>>,
    pub products: Option<Arc<dyn ProductSource>>,
    pub deliveries: Option<Arc<dyn DeliverySource>>,
}

impl DataSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clients(mut self, source: Arc<dyn ClientSource>) -> Self {
        self.clients = Some(source);
        self
    }

    pub fn with_products(mut self, source: Arc<dyn ProductSource>) -> Self {
        self.products = Some(source);
        self
    }

    pub fn with_deliveries(mut self, source: Arc<dyn DeliverySource>) -> Self {
        self.deliveries = Some(source);
        self
    }

    /// Entity types whose source is not configured, in population order.
    pub fn missing(&self) -> Vec<EntityType> {
        EntityType::ALL
            .into_iter()
            .filter(|entity_type| !self.is_present(*entity_type))
            .collect()
    }

    fn is_present(&self, entity_type: EntityType) -> bool {
        match entity_type {
            EntityType::Client => self.clients.is_some(),
            EntityType::Product => self.products.is_some(),
            EntityType::Delivery => self.deliveries.is_some(),
        }
    }

    pub(crate) fn client_source(&self) -> Result<&Arc<dyn ClientSource>, CollaboratorError> {
        self.clients.as_ref().ok_or_else(|| missing(EntityType::Client))
    }

    pub(crate) fn product_source(&self) -> Result<&Arc<dyn ProductSource>, CollaboratorError> {
        self.products.as_ref().ok_or_else(|| missing(EntityType::Product))
    }

    pub(crate) fn delivery_source(&self) -> Result<&Arc<dyn DeliverySource>, CollaboratorError> {
        self.deliveries
            .as_ref()
            .ok_or_else(|| missing(EntityType::Delivery))
    }
}

impl std::fmt::Debug for DataSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSources")
            .field("clients", &self.clients.is_some())
            .field("products", &self.products.is_some())
            .field("deliveries", &self.deliveries.is_some())
            .finish()
    }
}

/// The error for an unconfigured source of `entity_type`.
pub(crate) fn missing(entity_type: EntityType) -> CollaboratorError {
    CollaboratorError::Missing {
        source_name: format!("{} source", entity_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoClients;

    #[async_trait]
    impl ClientSource for NoClients {
        async fn fetch_clients(&self) -> RutaResult<Vec<Client>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_missing_lists_absent_sources_in_order() {
        let sources = DataSources::new().with_clients(Arc::new(NoClients));
        assert_eq!(
            sources.missing(),
            vec![EntityType::Product, EntityType::Delivery]
        );
        assert!(sources.client_source().is_ok());
        assert_eq!(
            sources.product_source().err(),
            Some(CollaboratorError::Missing {
                source_name: "products source".into()
            })
        );
    }
}
