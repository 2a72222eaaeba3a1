//! SQL Server access through tiberius.
//!
//! tiberius hands out single clients, so pooling is done with a deadpool
//! managed pool. Each client owns its TCP stream.

use super::QueryRows;
use crate::error::{AgentError, Result};
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use deadpool::Runtime;
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;
use tiberius::{Client, ColumnData, Config, FromSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

pub(crate) type MssqlClient = Client<Compat<TcpStream>>;

pub(crate) struct TiberiusManager {
    config: Config,
}

impl TiberiusManager {
    pub fn from_ado_string(ado: &str) -> Result<Self> {
        let config = Config::from_ado_string(ado)
            .map_err(|e| AgentError::Config(format!("Invalid SQL Server connection string: {}", e)))?;
        Ok(Self { config })
    }
}

impl managed::Manager for TiberiusManager {
    type Type = MssqlClient;
    type Error = tiberius::error::Error;

    async fn create(&self) -> std::result::Result<MssqlClient, Self::Error> {
        let tcp = TcpStream::connect(self.config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Client::connect(self.config.clone(), tcp.compat_write()).await
    }

    async fn recycle(&self, client: &mut MssqlClient, _: &Metrics) -> RecycleResult<Self::Error> {
        client
            .simple_query("SELECT 1")
            .await
            .map_err(RecycleError::Backend)?
            .into_results()
            .await
            .map_err(RecycleError::Backend)?;
        Ok(())
    }
}

pub(crate) type MssqlPool = managed::Pool<TiberiusManager>;

pub(crate) fn build_pool(ado: &str, max_size: usize, wait_timeout: Duration) -> Result<MssqlPool> {
    let manager = TiberiusManager::from_ado_string(ado)?;
    managed::Pool::builder(manager)
        .max_size(max_size)
        .wait_timeout(Some(wait_timeout))
        .create_timeout(Some(wait_timeout))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| AgentError::Connectivity(format!("Failed to build SQL Server pool: {}", e)))
}

async fn acquire(pool: &MssqlPool) -> Result<managed::Object<TiberiusManager>> {
    pool.get()
        .await
        .map_err(|e| AgentError::Connectivity(format!("SQL Server connection failed: {}", e)))
}

fn execution_error(e: tiberius::error::Error) -> AgentError {
    AgentError::Execution(e.to_string())
}

pub(crate) async fn ping(pool: &MssqlPool) -> Result<()> {
    let mut client = acquire(pool).await?;
    client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| AgentError::Connectivity(e.to_string()))?
        .into_results()
        .await
        .map_err(|e| AgentError::Connectivity(e.to_string()))?;
    Ok(())
}

/// Run `sql` and return its first result set, keeping column names even when no rows come back.
pub(crate) async fn fetch(pool: &MssqlPool, sql: &str) -> Result<QueryRows> {
    let mut client = acquire(pool).await?;
    let mut stream = client.simple_query(sql).await.map_err(execution_error)?;

    let columns: Vec<String> = stream
        .columns()
        .await
        .map_err(execution_error)?
        .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let rows = stream.into_first_result().await.map_err(execution_error)?;
    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().map(column_value).collect())
        .collect();

    Ok(QueryRows { columns, rows })
}

fn column_value(data: ColumnData<'static>) -> Value {
    match &data {
        ColumnData::U8(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or(Value::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Guid(v) => v
            .map(|g| Value::String(g.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| Value::String(base64::engine::general_purpose::STANDARD.encode(b)))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(_) => decoded(Decimal::from_sql(&data), |d| {
            Value::String(d.normalize().to_string())
        }),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            decoded(NaiveDateTime::from_sql(&data), |t| Value::String(t.to_string()))
        }
        ColumnData::Date(_) => decoded(NaiveDate::from_sql(&data), |d| Value::String(d.to_string())),
        ColumnData::Time(_) => decoded(NaiveTime::from_sql(&data), |t| Value::String(t.to_string())),
        ColumnData::DateTimeOffset(_) => decoded(DateTime::<Utc>::from_sql(&data), |t| {
            Value::String(t.to_rfc3339())
        }),
        _ => Value::Null,
    }
}

fn decoded<T>(result: tiberius::Result<Option<T>>, f: impl FnOnce(T) -> Value) -> Value {
    match result {
        Ok(Some(v)) => f(v),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_column_value_primitives() {
        assert_eq!(column_value(ColumnData::I32(Some(7))), Value::from(7));
        assert_eq!(column_value(ColumnData::I32(None)), Value::Null);
        assert_eq!(column_value(ColumnData::Bit(Some(true))), Value::Bool(true));
        assert_eq!(
            column_value(ColumnData::String(Some(Cow::Owned("north".to_string())))),
            Value::String("north".to_string())
        );
    }
}
