//! Table selection for large schemas.
//!
//! Past [`RELEVANCE_THRESHOLD`] tables the full schema no longer fits a
//! generation prompt. The model sees only table names and their first few
//! columns and picks the tables the question needs.

use crate::llm::{ReasoningRequest, ReasoningService};
use crate::schema::{compact_table_list, SchemaSnapshot, TableInfo};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const RELEVANCE_THRESHOLD: usize = 50;
pub const FALLBACK_TABLE_COUNT: usize = 10;
pub const MAX_SELECTED_TABLES: usize = 10;
const PREVIEW_COLUMNS: usize = 5;
const TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOutcome {
    /// Schema was small enough to pass through whole.
    Unfiltered,
    /// The model picked at least one known table.
    Selected,
    /// The model call failed or named nothing usable; the first tables were used.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct FilteredSchema {
    pub tables: Vec<TableInfo>,
    pub outcome: FilterOutcome,
}

pub struct RelevanceFilter {
    reasoner: Arc<dyn ReasoningService>,
}

impl RelevanceFilter {
    pub fn new(reasoner: Arc<dyn ReasoningService>) -> Self {
        Self { reasoner }
    }

    pub async fn filter(&self, question: &str, snapshot: &SchemaSnapshot) -> FilteredSchema {
        if snapshot.tables.len() <= RELEVANCE_THRESHOLD {
            return FilteredSchema {
                tables: snapshot.tables.clone(),
                outcome: FilterOutcome::Unfiltered,
            };
        }

        let system = format!(
            "You select database tables for a SQL question.\n\
             Given the question and the list of tables (name and first columns), \
             return the 1 to {} tables most likely needed to answer it.\n\n\
             Tables:\n{}\n\n\
             Respond in JSON format:\n{{\"tables\": [\"table_a\", \"table_b\"]}}",
            MAX_SELECTED_TABLES,
            compact_table_list(&snapshot.tables, PREVIEW_COLUMNS)
        );
        let request = ReasoningRequest::new(system, question, TEMPERATURE);

        let names = match self.reasoner.complete_json(&request).await {
            Ok(output) => table_names(&output),
            Err(e) => {
                warn!("Relevance filter call failed: {}", e);
                Vec::new()
            }
        };

        let selected = select_tables(snapshot, &names);
        if selected.is_empty() {
            warn!(
                "Relevance filter returned no usable tables for {} candidates, using the first {}",
                snapshot.tables.len(),
                FALLBACK_TABLE_COUNT
            );
            return FilteredSchema {
                tables: snapshot.tables.iter().take(FALLBACK_TABLE_COUNT).cloned().collect(),
                outcome: FilterOutcome::Fallback,
            };
        }

        info!(
            "Relevance filter kept {} of {} tables",
            selected.len(),
            snapshot.tables.len()
        );
        FilteredSchema {
            tables: selected,
            outcome: FilterOutcome::Selected,
        }
    }
}

fn table_names(output: &Value) -> Vec<String> {
    output
        .get("tables")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

/// Known tables named in `names` (already lowercased), in snapshot order, at most [`MAX_SELECTED_TABLES`].
fn select_tables(snapshot: &SchemaSnapshot, names: &[String]) -> Vec<TableInfo> {
    let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    snapshot
        .tables
        .iter()
        .filter(|t| {
            let key = t.name.to_lowercase();
            wanted.contains(key.as_str()) && seen.insert(key)
        })
        .take(MAX_SELECTED_TABLES)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AgentError, Result};
    use async_trait::async_trait;
    use serde_json::json;

    struct Scripted(std::result::Result<Value, String>);

    #[async_trait]
    impl ReasoningService for Scripted {
        async fn complete_json(&self, _: &ReasoningRequest) -> Result<Value> {
            self.0.clone().map_err(AgentError::Generation)
        }
    }

    fn snapshot(n: usize) -> SchemaSnapshot {
        SchemaSnapshot::new(1, (0..n).map(|i| TableInfo::new(format!("t{:03}", i))).collect())
    }

    fn filter(output: std::result::Result<Value, String>) -> RelevanceFilter {
        RelevanceFilter::new(Arc::new(Scripted(output)))
    }

    #[tokio::test]
    async fn test_small_schema_unfiltered() {
        let result = filter(Err("unused".into())).filter("q", &snapshot(50)).await;
        assert_eq!(result.outcome, FilterOutcome::Unfiltered);
        assert_eq!(result.tables.len(), 50);
    }

    #[tokio::test]
    async fn test_selection_case_insensitive_dedup_snapshot_order() {
        let output = json!({"tables": ["T090", "t005", "missing", "t005"]});
        let result = filter(Ok(output)).filter("q", &snapshot(120)).await;
        assert_eq!(result.outcome, FilterOutcome::Selected);
        let names: Vec<_> = result.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t005", "t090"]);
    }

    #[tokio::test]
    async fn test_selection_capped() {
        let names: Vec<String> = (0..20).map(|i| format!("t{:03}", i)).collect();
        let result = filter(Ok(json!({ "tables": names }))).filter("q", &snapshot(120)).await;
        assert_eq!(result.tables.len(), MAX_SELECTED_TABLES);
    }

    #[tokio::test]
    async fn test_fallback_on_failure_or_garbage() {
        for output in [
            Err("timeout".to_string()),
            Ok(json!({"tables": []})),
            Ok(json!({"unexpected": true})),
            Ok(json!({"tables": ["nope"]})),
        ] {
            let result = filter(output).filter("q", &snapshot(120)).await;
            assert_eq!(result.outcome, FilterOutcome::Fallback);
            assert_eq!(result.tables.len(), FALLBACK_TABLE_COUNT);
            assert_eq!(result.tables[0].name, "t000");
        }
    }
}
