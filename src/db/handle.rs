//! Pooled handles, one variant per driver.

use super::convert::{mysql_value, pg_value, sqlite_value};
use super::mssql::{self, MssqlPool};
use super::QueryRows;
use crate::connection::Dialect;
use crate::dialect::Endpoint;
use crate::error::{AgentError, Result};
use serde_json::Value;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Column, Executor, Row};
use std::str::FromStr;
use std::time::Duration;

const MAX_CONNECTIONS: u32 = 5;

pub(crate) enum DbHandle {
    Postgres(PgPool),
    MySql(MySqlPool),
    Sqlite(SqlitePool),
    Mssql(MssqlPool),
}

fn connect_error(endpoint: &Endpoint, e: impl std::fmt::Display) -> AgentError {
    AgentError::Connectivity(format!("Failed to connect to {}: {}", endpoint.redacted(), e))
}

fn execution_error(e: sqlx::Error) -> AgentError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            AgentError::Connectivity(e.to_string())
        }
        other => AgentError::Execution(other.to_string()),
    }
}

fn to_values<R: Row>(rows: &[R], convert: fn(&R, usize) -> Value) -> Vec<Vec<Value>> {
    rows.iter()
        .map(|row| (0..row.len()).map(|i| convert(row, i)).collect())
        .collect()
}

/// Fetch all rows; with an empty result the column names come from `describe`.
macro_rules! fetch_with {
    ($pool:expr, $sql:expr, $convert:path) => {{
        let rows = sqlx::query($sql).fetch_all($pool).await.map_err(execution_error)?;
        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => match $pool.describe($sql).await {
                Ok(described) => described
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                Err(_) => Vec::new(),
            },
        };
        QueryRows {
            columns,
            rows: to_values(&rows, $convert),
        }
    }};
}

macro_rules! fetch_bound_with {
    ($pool:expr, $sql:expr, $params:expr, $convert:path) => {{
        let mut query = sqlx::query($sql);
        for param in $params {
            query = query.bind(param.to_string());
        }
        let rows = query.fetch_all($pool).await.map_err(execution_error)?;
        to_values(&rows, $convert)
    }};
}

impl DbHandle {
    pub async fn open(endpoint: &Endpoint, acquire_timeout: Duration) -> Result<Self> {
        let address = endpoint.address();
        let handle = match endpoint.dialect() {
            Dialect::Postgres => DbHandle::Postgres(
                PgPoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .acquire_timeout(acquire_timeout)
                    .connect(address)
                    .await
                    .map_err(|e| connect_error(endpoint, e))?,
            ),
            Dialect::Mysql => DbHandle::MySql(
                MySqlPoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .acquire_timeout(acquire_timeout)
                    .connect(address)
                    .await
                    .map_err(|e| connect_error(endpoint, e))?,
            ),
            Dialect::Sqlite => {
                let options =
                    SqliteConnectOptions::from_str(address).map_err(|e| connect_error(endpoint, e))?;
                DbHandle::Sqlite(
                    SqlitePoolOptions::new()
                        .max_connections(MAX_CONNECTIONS)
                        .acquire_timeout(acquire_timeout)
                        .connect_with(options)
                        .await
                        .map_err(|e| connect_error(endpoint, e))?,
                )
            }
            Dialect::Mssql => {
                let pool = mssql::build_pool(address, MAX_CONNECTIONS as usize, acquire_timeout)?;
                // deadpool connects lazily; ping once so a bad endpoint fails here.
                mssql::ping(&pool).await?;
                DbHandle::Mssql(pool)
            }
        };
        Ok(handle)
    }

    pub async fn ping(&self) -> Result<()> {
        let outcome = match self {
            DbHandle::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            DbHandle::MySql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            DbHandle::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            DbHandle::Mssql(pool) => return mssql::ping(pool).await,
        };
        outcome.map_err(|e| AgentError::Connectivity(e.to_string()))
    }

    pub async fn fetch(&self, sql: &str) -> Result<QueryRows> {
        let result = match self {
            DbHandle::Postgres(pool) => fetch_with!(pool, sql, pg_value),
            DbHandle::MySql(pool) => fetch_with!(pool, sql, mysql_value),
            DbHandle::Sqlite(pool) => fetch_with!(pool, sql, sqlite_value),
            DbHandle::Mssql(pool) => mssql::fetch(pool, sql).await?,
        };
        Ok(result)
    }

    /// Rows of a catalog query with positional string parameters.
    pub async fn fetch_bound(&self, sql: &str, params: &[&str]) -> Result<Vec<Vec<Value>>> {
        let rows = match self {
            DbHandle::Postgres(pool) => fetch_bound_with!(pool, sql, params, pg_value),
            DbHandle::MySql(pool) => fetch_bound_with!(pool, sql, params, mysql_value),
            DbHandle::Sqlite(pool) => fetch_bound_with!(pool, sql, params, sqlite_value),
            DbHandle::Mssql(_) => {
                return Err(AgentError::Execution(
                    "SQL Server introspection uses the batch catalog; bound catalog queries are not supported"
                        .to_string(),
                ))
            }
        };
        Ok(rows)
    }

    pub fn is_closed(&self) -> bool {
        match self {
            DbHandle::Postgres(pool) => pool.is_closed(),
            DbHandle::MySql(pool) => pool.is_closed(),
            DbHandle::Sqlite(pool) => pool.is_closed(),
            DbHandle::Mssql(pool) => pool.is_closed(),
        }
    }

    pub async fn close(&self) {
        match self {
            DbHandle::Postgres(pool) => pool.close().await,
            DbHandle::MySql(pool) => pool.close().await,
            DbHandle::Sqlite(pool) => pool.close().await,
            DbHandle::Mssql(pool) => pool.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mssql_rejects_bound_catalog_queries() {
        let pool = mssql::build_pool(
            "server=tcp:localhost,1433;user=sa;password=secret",
            1,
            Duration::from_secs(1),
        )
        .unwrap();
        let handle = DbHandle::Mssql(pool);

        match handle.fetch_bound("SELECT 1 WHERE @P1 = 'x'", &["x"]).await {
            Err(AgentError::Execution(message)) => assert!(message.contains("batch catalog")),
            other => panic!("expected Execution error, got {:?}", other.map(|rows| rows.len())),
        }
        assert!(!handle.is_closed());
        handle.close().await;
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_sqlite_handle_close() {
        let endpoint = Endpoint::new(
            Dialect::Sqlite,
            "sqlite::memory:".to_string(),
            "sqlite::memory:".to_string(),
        );
        let handle = DbHandle::open(&endpoint, Duration::from_secs(5)).await.unwrap();
        handle.ping().await.unwrap();
        assert!(!handle.is_closed());
        handle.close().await;
        assert!(handle.is_closed());
    }
}
