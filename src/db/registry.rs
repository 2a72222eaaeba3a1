use super::{ConnectorOptions, DatabaseConnector};
use crate::connection::ConnectionDescriptor;
use crate::crypto::CredentialCipher;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// One shared connector per connection id.
///
/// A connector is replaced when the descriptor it was built from no longer
/// matches, so edited connections never keep a stale pool.
pub struct ConnectorRegistry {
    connectors: DashMap<i64, Arc<DatabaseConnector>>,
    cipher: Option<Arc<CredentialCipher>>,
    options: ConnectorOptions,
}

impl ConnectorRegistry {
    pub fn new(cipher: Option<Arc<CredentialCipher>>, options: ConnectorOptions) -> Self {
        Self {
            connectors: DashMap::new(),
            cipher,
            options,
        }
    }

    pub async fn connector(&self, descriptor: &ConnectionDescriptor) -> Arc<DatabaseConnector> {
        let id = descriptor.id();
        let existing = self.connectors.get(&id).map(|c| Arc::clone(c.value()));
        if let Some(existing) = existing {
            if existing.descriptor() == descriptor {
                return existing;
            }
        }

        debug!("Creating connector for connection {}", id);
        let connector = Arc::new(DatabaseConnector::new(
            descriptor.clone(),
            self.cipher.clone(),
            self.options.clone(),
        ));
        if let Some(stale) = self.connectors.insert(id, Arc::clone(&connector)) {
            debug!("Closing replaced connector for connection {}", id);
            stale.close().await;
        }
        connector
    }

    /// Drop the connector for `id` and close its pool.
    pub async fn evict(&self, id: i64) {
        if let Some((_, connector)) = self.connectors.remove(&id) {
            connector.close().await;
        }
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Dialect;

    #[tokio::test]
    async fn test_connector_reused_until_descriptor_changes() {
        let registry = ConnectorRegistry::new(None, ConnectorOptions::default());
        let d1 = ConnectionDescriptor::builder(1, Dialect::Sqlite, "/tmp/a.db").build();

        let a = registry.connector(&d1).await;
        let b = registry.connector(&d1).await;
        assert!(Arc::ptr_eq(&a, &b));

        let d2 = ConnectionDescriptor::builder(1, Dialect::Sqlite, "/tmp/b.db").build();
        let c = registry.connector(&d2).await;
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_replaced_connector_is_closed() {
        let registry = ConnectorRegistry::new(None, ConnectorOptions::default());
        let before = ConnectionDescriptor::builder(3, Dialect::Sqlite, ":memory:")
            .name("scratch")
            .build();

        let old = registry.connector(&before).await;
        let (ok, _) = old.test_connection().await;
        assert!(ok);
        assert!(old.is_open());

        let after = ConnectionDescriptor::builder(3, Dialect::Sqlite, ":memory:")
            .name("renamed")
            .build();
        let new = registry.connector(&after).await;
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(!old.is_open());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_evict() {
        let registry = ConnectorRegistry::new(None, ConnectorOptions::default());
        let d = ConnectionDescriptor::builder(7, Dialect::Sqlite, ":memory:").build();
        let connector = registry.connector(&d).await;
        let (ok, _) = connector.test_connection().await;
        assert!(ok);

        registry.evict(7).await;
        assert!(registry.is_empty());
        assert!(!connector.is_open());
    }
}
