use super::handle::DbHandle;
use super::convert::{text, truthy};
use super::{ConnectorOptions, ExecutionResult, RowCountMode, TablePreview};
use crate::connection::ConnectionDescriptor;
use crate::crypto::CredentialCipher;
use crate::dialect::{adapter_for, DialectAdapter, Endpoint, IntrospectionStrategy};
use crate::error::{AgentError, Result};
use crate::schema::{ColumnInfo, SchemaSnapshot, TableInfo};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strsim::jaro_winkler;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const HINT_THRESHOLD: f64 = 0.8;

/// Access to one external database.
///
/// The pooled handle is opened on first use and shared by every caller of
/// this connector. Dialect differences are delegated to the adapter picked
/// from the descriptor.
pub struct DatabaseConnector {
    descriptor: ConnectionDescriptor,
    adapter: &'static dyn DialectAdapter,
    cipher: Option<Arc<CredentialCipher>>,
    options: ConnectorOptions,
    handle: OnceCell<DbHandle>,
}

impl DatabaseConnector {
    pub fn new(
        descriptor: ConnectionDescriptor,
        cipher: Option<Arc<CredentialCipher>>,
        options: ConnectorOptions,
    ) -> Self {
        let adapter = adapter_for(descriptor.dialect());
        Self {
            descriptor,
            adapter,
            cipher,
            options,
            handle: OnceCell::new(),
        }
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn adapter(&self) -> &'static dyn DialectAdapter {
        self.adapter
    }

    fn endpoint(&self) -> Result<Endpoint> {
        let password = match self.descriptor.password_encrypted() {
            Some(encrypted) => {
                let cipher = self.cipher.as_ref().ok_or_else(|| {
                    AgentError::Credential(
                        "Stored password cannot be decrypted without an encryption key".to_string(),
                    )
                })?;
                Some(cipher.decrypt(encrypted)?)
            }
            None => None,
        };
        self.adapter.build_endpoint(&self.descriptor, password.as_deref())
    }

    async fn handle(&self) -> Result<&DbHandle> {
        self.handle
            .get_or_try_init(|| async {
                let endpoint = self.endpoint()?;
                info!(
                    "Opening {} pool for connection {} ({})",
                    self.descriptor.dialect(),
                    self.descriptor.id(),
                    endpoint.redacted()
                );
                DbHandle::open(&endpoint, self.options.acquire_timeout).await
            })
            .await
    }

    /// Check the database with `SELECT 1`. Never fails; the message carries the cause.
    pub async fn test_connection(&self) -> (bool, String) {
        let check = async { self.handle().await?.ping().await };
        match check.await {
            Ok(()) => {
                info!("Connection {} test succeeded", self.descriptor.id());
                (true, "Connection successful".to_string())
            }
            Err(e) => {
                warn!("Connection {} test failed: {}", self.descriptor.id(), e);
                let message = match e {
                    AgentError::Connectivity(cause) => cause,
                    other => other.to_string(),
                };
                (false, message)
            }
        }
    }

    pub async fn introspect_schema(&self) -> Result<SchemaSnapshot> {
        let handle = self.handle().await?;
        let started = Instant::now();

        let mut tables = match self.adapter.introspection() {
            IntrospectionStrategy::BatchCatalog { query } => {
                let rows = handle.fetch(query).await?;
                tables_from_catalog(&rows.rows)
            }
            IntrospectionStrategy::PerTable { columns_query } => {
                let names = self.live_table_names(handle).await?;
                read_tables(names, |name| async move {
                    handle.fetch_bound(columns_query, &[name.as_str()]).await
                })
                .await
            }
        };

        if self.options.row_count_mode == RowCountMode::Approximate {
            if let Some(query) = self.adapter.approximate_row_counts_query() {
                match handle.fetch(query).await {
                    Ok(rows) => apply_row_counts(&mut tables, &rows.rows),
                    Err(e) => warn!("Approximate row counts unavailable: {}", e),
                }
            }
        }

        info!(
            "Introspected {} tables for connection {} in {}ms",
            tables.len(),
            self.descriptor.id(),
            started.elapsed().as_millis()
        );
        Ok(SchemaSnapshot::new(self.descriptor.id(), tables))
    }

    async fn live_table_names(&self, handle: &DbHandle) -> Result<Vec<String>> {
        let rows = handle.fetch(self.adapter.tables_query()).await?;
        Ok(rows
            .rows
            .iter()
            .filter_map(|r| r.first().and_then(text))
            .collect())
    }

    /// First `limit` rows of `table`. The name must match a live table exactly.
    pub async fn table_preview(&self, table: &str, limit: usize) -> Result<TablePreview> {
        let handle = self.handle().await?;
        let live = self.live_table_names(handle).await?;
        if !live.iter().any(|t| t == table) {
            return Err(AgentError::UnknownTable {
                table: table.to_string(),
                hint: closest_name(table, &live),
            });
        }

        let sql = self.adapter.preview_query(table, limit);
        debug!("Preview query: {}", sql);
        let rows = handle.fetch(&sql).await?;
        Ok(TablePreview {
            columns: rows.columns,
            rows: rows.rows,
        })
    }

    pub async fn execute_query(&self, sql: &str, timeout_secs: u64) -> Result<ExecutionResult> {
        let handle = self.handle().await?;
        debug!("Executing on connection {}: {}", self.descriptor.id(), sql);

        let started = Instant::now();
        let rows = tokio::time::timeout(Duration::from_secs(timeout_secs), handle.fetch(sql))
            .await
            .map_err(|_| {
                AgentError::Execution(format!("Query timed out after {} seconds", timeout_secs))
            })??;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        Ok(ExecutionResult {
            row_count: rows.rows.len(),
            columns: rows.columns,
            rows: rows.rows,
            execution_time_ms,
        })
    }

    /// Whether a pool has been opened and not yet closed.
    pub fn is_open(&self) -> bool {
        self.handle.get().map(|h| !h.is_closed()).unwrap_or(false)
    }

    pub async fn close(&self) {
        if let Some(handle) = self.handle.get() {
            handle.close().await;
        }
    }
}

fn column_from_row(row: &[Value]) -> Option<ColumnInfo> {
    Some(ColumnInfo {
        name: text(row.first()?)?,
        data_type: row.get(1).and_then(text).unwrap_or_default(),
        nullable: row.get(2).map(truthy).unwrap_or(true),
        primary_key: row.get(3).map(truthy).unwrap_or(false),
        foreign_key: row.get(4).and_then(text),
    })
}

/// One columns query per table. A table whose query fails keeps an empty column list.
async fn read_tables<F, Fut>(names: Vec<String>, mut fetch_columns: F) -> Vec<TableInfo>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<Vec<Value>>>>,
{
    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let mut table = TableInfo::new(name.clone());
        match fetch_columns(name).await {
            Ok(rows) => {
                for column in rows.iter().filter_map(|r| column_from_row(r)) {
                    push_unique(&mut table, column);
                }
            }
            Err(e) => {
                warn!("Failed to read columns of table {}: {}", table.name, e);
            }
        }
        tables.push(table);
    }
    tables
}

fn push_unique(table: &mut TableInfo, column: ColumnInfo) {
    if table.columns.iter().any(|c| c.name == column.name) {
        debug!("Skipping repeated column {}.{}", table.name, column.name);
        return;
    }
    table.columns.push(column);
}

/// Group batch catalog rows (ordered by table, then ordinal) into tables.
/// Only the first row of a repeated column is kept.
fn tables_from_catalog(rows: &[Vec<Value>]) -> Vec<TableInfo> {
    let mut tables: Vec<TableInfo> = Vec::new();
    for row in rows {
        let Some(table_name) = row.first().and_then(text) else {
            continue;
        };
        let Some(column) = column_from_row(&row[1..]) else {
            continue;
        };
        match tables.last_mut() {
            Some(table) if table.name == table_name => push_unique(table, column),
            _ => {
                let mut table = TableInfo::new(table_name);
                table.columns.push(column);
                tables.push(table);
            }
        }
    }
    tables
}

fn apply_row_counts(tables: &mut [TableInfo], rows: &[Vec<Value>]) {
    let counts: HashMap<String, i64> = rows
        .iter()
        .filter_map(|r| {
            let name = r.first().and_then(text)?;
            let count = r.get(1)?.as_i64()?;
            Some((name, count))
        })
        .collect();
    for table in tables.iter_mut() {
        table.row_count = counts.get(&table.name).copied();
    }
}

fn closest_name(table: &str, candidates: &[String]) -> Option<String> {
    let wanted = table.to_lowercase();
    candidates
        .iter()
        .map(|c| (c, jaro_winkler(&wanted, &c.to_lowercase())))
        .filter(|(_, score)| *score >= HINT_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(c, _)| c.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tables_from_catalog_groups_in_order() {
        let rows = vec![
            vec![json!("customers"), json!("id"), json!("int"), json!(0), json!(1), Value::Null],
            vec![json!("customers"), json!("name"), json!("nvarchar"), json!(1), json!(0), Value::Null],
            vec![json!("orders"), json!("id"), json!("int"), json!(0), json!(1), Value::Null],
            vec![
                json!("orders"),
                json!("customer_id"),
                json!("int"),
                json!(0),
                json!(0),
                json!("customers.id"),
            ],
        ];

        let tables = tables_from_catalog(&rows);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "customers");
        assert_eq!(
            tables[0].columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["id", "name"]
        );
        assert!(tables[0].columns[0].primary_key);
        assert!(!tables[0].columns[0].nullable);
        assert!(tables[0].columns[1].nullable);
        assert_eq!(tables[1].columns[1].foreign_key.as_deref(), Some("customers.id"));
    }

    #[test]
    fn test_tables_from_catalog_keeps_first_of_repeated_column() {
        let rows = vec![
            vec![json!("orders"), json!("id"), json!("int"), json!(0), json!(1), Value::Null],
            vec![
                json!("orders"),
                json!("customer_id"),
                json!("int"),
                json!(1),
                json!(0),
                json!("customers.id"),
            ],
            vec![
                json!("orders"),
                json!("customer_id"),
                json!("int"),
                json!(1),
                json!(0),
                json!("archive_customers.id"),
            ],
        ];

        let tables = tables_from_catalog(&rows);
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0].columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["id", "customer_id"]
        );
        assert_eq!(tables[0].columns[1].foreign_key.as_deref(), Some("customers.id"));
    }

    #[tokio::test]
    async fn test_read_tables_survives_failing_table() {
        let names = vec!["broken".to_string(), "orders".to_string()];
        let tables = read_tables(names, |name| async move {
            if name == "broken" {
                Err(AgentError::Execution("no such module: missing_vtab".to_string()))
            } else {
                Ok(vec![
                    vec![json!("id"), json!("INTEGER"), json!(0), json!(1), Value::Null],
                    vec![json!("total"), json!("NUMERIC"), json!(1), json!(0), Value::Null],
                ])
            }
        })
        .await;

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "broken");
        assert!(tables[0].columns.is_empty());
        assert_eq!(tables[1].name, "orders");
        assert_eq!(tables[1].columns.len(), 2);
        assert!(tables[1].columns[0].primary_key);
    }

    #[test]
    fn test_apply_row_counts() {
        let mut tables = vec![TableInfo::new("a"), TableInfo::new("b")];
        apply_row_counts(&mut tables, &[vec![json!("a"), json!(42)]]);
        assert_eq!(tables[0].row_count, Some(42));
        assert_eq!(tables[1].row_count, None);
    }

    #[test]
    fn test_closest_name() {
        let live = vec!["orders".to_string(), "customers".to_string()];
        assert_eq!(closest_name("order", &live), Some("orders".to_string()));
        assert_eq!(closest_name("zzz", &live), None);
    }
}
