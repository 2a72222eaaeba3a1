//! External database access: pooled handles, introspection, preview and execution.

mod connector;
mod convert;
mod handle;
mod mssql;
mod registry;

pub use connector::DatabaseConnector;
pub use registry::ConnectorRegistry;

use crate::error::AgentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// Column names and JSON-converted rows of one result set.
#[derive(Debug, Clone, Default)]
pub(crate) struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Whether introspection attaches catalog-statistics row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowCountMode {
    #[default]
    Off,
    Approximate,
}

impl FromStr for RowCountMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "off" | "none" => Ok(RowCountMode::Off),
            "approximate" | "approx" => Ok(RowCountMode::Approximate),
            other => Err(AgentError::Config(format!(
                "Invalid row count mode '{}', expected off or approximate",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectorOptions {
    pub acquire_timeout: Duration,
    pub row_count_mode: RowCountMode,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(30),
            row_count_mode: RowCountMode::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_mode_parse() {
        assert_eq!("off".parse::<RowCountMode>().unwrap(), RowCountMode::Off);
        assert_eq!("Approximate".parse::<RowCountMode>().unwrap(), RowCountMode::Approximate);
        assert!(matches!("exact".parse::<RowCountMode>(), Err(AgentError::Config(_))));
    }
}
