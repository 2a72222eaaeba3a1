//! Schema cache
//!
//! Holds the last snapshot per connection id. There is no expiry: a cached
//! snapshot is served until a caller asks for a refresh. When a record store
//! is attached, snapshots are written through so they survive restarts.
//!
//! Refresh is check-then-write without a lock. Two concurrent refreshes of
//! the same connection both introspect and the last `put` wins.

use super::SchemaSnapshot;
use crate::db::DatabaseConnector;
use crate::error::Result;
use crate::store::RecordStore;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
pub struct SchemaCache {
    entries: DashMap<i64, SchemaSnapshot>,
    store: Option<Arc<RecordStore>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<RecordStore>) -> Self {
        Self {
            entries: DashMap::new(),
            store: Some(store),
        }
    }

    pub async fn get(&self, connection_id: i64) -> Result<Option<SchemaSnapshot>> {
        if let Some(snapshot) = self.entries.get(&connection_id).map(|e| e.value().clone()) {
            return Ok(Some(snapshot));
        }

        let Some(ref store) = self.store else {
            return Ok(None);
        };
        let stored = store.get_schema(connection_id).await?;
        if let Some(ref snapshot) = stored {
            self.entries.insert(connection_id, snapshot.clone());
        }
        Ok(stored)
    }

    /// Insert or replace the snapshot for `connection_id`.
    pub async fn put(&self, connection_id: i64, snapshot: SchemaSnapshot) -> Result<()> {
        if let Some(ref store) = self.store {
            store.put_schema(connection_id, &snapshot).await?;
        }
        self.entries.insert(connection_id, snapshot);
        Ok(())
    }

    pub async fn invalidate(&self, connection_id: i64) -> Result<()> {
        self.entries.remove(&connection_id);
        if let Some(ref store) = self.store {
            store.delete_schema(connection_id).await?;
        }
        Ok(())
    }

    /// Cached snapshot, or introspect on a miss and cache the result.
    pub async fn get_or_introspect(&self, connector: &DatabaseConnector) -> Result<SchemaSnapshot> {
        let id = connector.descriptor().id();
        if let Some(snapshot) = self.get(id).await? {
            debug!("Schema cache hit for connection {}", id);
            return Ok(snapshot);
        }
        info!("Schema cache miss for connection {}, introspecting", id);
        self.refresh(connector).await
    }

    /// Always introspect and replace whatever is cached.
    pub async fn refresh(&self, connector: &DatabaseConnector) -> Result<SchemaSnapshot> {
        let snapshot = connector.introspect_schema().await?;
        self.put(snapshot.connection_id, snapshot.clone()).await?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableInfo;

    #[tokio::test]
    async fn test_put_replaces_existing_entry() {
        let cache = SchemaCache::new();
        assert!(cache.get(1).await.unwrap().is_none());

        cache
            .put(1, SchemaSnapshot::new(1, vec![TableInfo::new("a")]))
            .await
            .unwrap();
        cache
            .put(1, SchemaSnapshot::new(1, vec![TableInfo::new("b")]))
            .await
            .unwrap();

        let snapshot = cache.get(1).await.unwrap().unwrap();
        assert_eq!(snapshot.table_names(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = SchemaCache::new();
        cache.put(2, SchemaSnapshot::new(2, vec![])).await.unwrap();
        cache.invalidate(2).await.unwrap();
        assert!(cache.get(2).await.unwrap().is_none());
    }
}
