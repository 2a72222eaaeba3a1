//! Schema snapshots, their cache, and their textual rendering.

pub mod cache;
pub mod format;

pub use cache::SchemaCache;
pub use format::{compact_table_list, format_schema};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Referenced `table.column`, if this column is a foreign key.
    #[serde(default)]
    pub foreign_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub row_count: Option<i64>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            row_count: None,
        }
    }
}

/// A full capture of one connection's schema. A refresh replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub connection_id: i64,
    pub tables: Vec<TableInfo>,
    pub captured_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    pub fn new(connection_id: i64, tables: Vec<TableInfo>) -> Self {
        Self {
            connection_id,
            tables,
            captured_at: Utc::now(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Same tables, ignoring when each snapshot was taken.
    pub fn same_structure(&self, other: &SchemaSnapshot) -> bool {
        self.connection_id == other.connection_id && self.tables == other.tables
    }
}
