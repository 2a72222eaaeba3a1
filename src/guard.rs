//! Read-only enforcement in front of statement execution.
//!
//! The check is a textual prefix test, not a parser: `SELECT 1; DROP TABLE x`
//! passes. Real protection needs a read-only database role.

use crate::connection::ConnectionDescriptor;
use crate::db::{DatabaseConnector, ExecutionResult};
use crate::error::{AgentError, Result};
use crate::store::{NewHistoryEntry, QueryStatus, RecordStore};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct ExecutionGuard {
    store: Option<Arc<RecordStore>>,
    timeout_secs: u64,
}

impl ExecutionGuard {
    pub fn new(store: Option<Arc<RecordStore>>, timeout_secs: u64) -> Self {
        Self { store, timeout_secs }
    }

    /// Reject anything but `SELECT`/`WITH` statements on read-only connections.
    pub fn check(descriptor: &ConnectionDescriptor, sql: &str) -> Result<()> {
        if !descriptor.readonly() {
            return Ok(());
        }
        let normalized = sql.trim().to_uppercase();
        if normalized.starts_with("SELECT") || normalized.starts_with("WITH") {
            Ok(())
        } else {
            warn!(
                "Rejected non-SELECT statement on read-only connection {}",
                descriptor.id()
            );
            Err(AgentError::ReadOnlyViolation)
        }
    }

    /// Check, execute and record the outcome in query history.
    pub async fn execute(
        &self,
        connector: &DatabaseConnector,
        sql: &str,
        question: Option<&str>,
    ) -> Result<ExecutionResult> {
        let descriptor = connector.descriptor();
        Self::check(descriptor, sql)?;

        let outcome = connector.execute_query(sql, self.timeout_secs).await;
        let entry = match &outcome {
            Ok(result) => {
                info!(
                    "Query on connection {} returned {} rows in {}ms",
                    descriptor.id(),
                    result.row_count,
                    result.execution_time_ms
                );
                NewHistoryEntry {
                    connection_id: descriptor.id(),
                    natural_language_query: question.map(String::from),
                    generated_sql: sql.to_string(),
                    execution_time_ms: Some(result.execution_time_ms),
                    row_count: Some(result.row_count),
                    status: QueryStatus::Success,
                    error_message: None,
                }
            }
            Err(e) => {
                warn!("Query on connection {} failed: {}", descriptor.id(), e);
                NewHistoryEntry {
                    connection_id: descriptor.id(),
                    natural_language_query: question.map(String::from),
                    generated_sql: sql.to_string(),
                    execution_time_ms: None,
                    row_count: None,
                    status: QueryStatus::Error,
                    error_message: Some(e.to_string()),
                }
            }
        };

        if let Some(ref store) = self.store {
            if let Err(e) = store.record_history(&entry).await {
                warn!("Failed to record query history: {}", e);
            }
            if outcome.is_ok() {
                if let Err(e) = store.touch_connection(descriptor.id()).await {
                    warn!("Failed to update last use of connection {}: {}", descriptor.id(), e);
                }
            }
        }

        outcome
    }
}

impl Default for ExecutionGuard {
    fn default() -> Self {
        Self::new(None, DEFAULT_TIMEOUT_SECS)
    }
}
