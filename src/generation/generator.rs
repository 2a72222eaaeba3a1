use super::{from_output, ChartSuggestion, GeneratedQuery, GenerationRequest};
use crate::dialect::adapter_for;
use crate::error::{AgentError, Result};
use crate::llm::{ReasoningRequest, ReasoningService};
use crate::schema::{format_schema, TableInfo};
use itertools::Itertools;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

const GENERATION_TEMPERATURE: f32 = 0.1;
const SUGGESTION_TEMPERATURE: f32 = 0.7;
const VISUALIZATION_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_ROW_LIMIT: usize = 1000;
const SAMPLE_ROWS: usize = 5;

#[derive(Deserialize)]
struct Suggestions<T> {
    suggestions: Vec<T>,
}

pub struct SqlGenerator {
    reasoner: Arc<dyn ReasoningService>,
}

impl SqlGenerator {
    pub fn new(reasoner: Arc<dyn ReasoningService>) -> Self {
        Self { reasoner }
    }

    pub async fn generate(&self, request: GenerationRequest) -> Result<GeneratedQuery> {
        let system = system_prompt(&request);
        info!(
            "Generating {} SQL over {} tables",
            request.dialect,
            request.tables.len()
        );

        let output = self
            .reasoner
            .complete_json(&ReasoningRequest::new(
                system,
                request.question,
                GENERATION_TEMPERATURE,
            ))
            .await?;
        let query = parse_generated(output)?;
        debug!("Generated SQL: {}", query.sql);
        Ok(query)
    }

    /// Five analytical questions a user might ask of this schema.
    pub async fn suggest_queries(&self, tables: &[TableInfo]) -> Result<Vec<String>> {
        let system = format!(
            r#"Based on this database schema, suggest 5 useful analytical queries a user might want to run.

Database Schema:
{}

Respond in JSON format:
{{"suggestions": ["suggestion 1", "suggestion 2", ...]}}"#,
            format_schema(tables)
        );
        let output = self
            .reasoner
            .complete_json(&ReasoningRequest::new(
                system,
                "What are some useful queries I could run?",
                SUGGESTION_TEMPERATURE,
            ))
            .await?;
        let parsed: Suggestions<String> = from_output(output, "query suggestions")?;
        Ok(parsed.suggestions)
    }

    /// Chart types suited to a result set, judged from its columns and first rows.
    pub async fn suggest_visualizations(
        &self,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<Vec<ChartSuggestion>> {
        let sample = rows
            .iter()
            .take(SAMPLE_ROWS)
            .map(|row| Value::Array(row.clone()).to_string())
            .join("\n");
        let system = format!(
            r#"Based on this query result, suggest appropriate visualizations.

Columns: {}
Sample rows:
{}

For each suggestion, provide:
- chart_type: one of "bar", "line", "pie", "scatter", "table"
- reason: why this chart type is appropriate
- config: chart configuration (x_column, y_column, etc.)

Respond in JSON format:
{{"suggestions": [{{"chart_type": "...", "reason": "...", "config": {{...}}}}]}}"#,
            columns.join(", "),
            sample
        );
        let output = self
            .reasoner
            .complete_json(&ReasoningRequest::new(
                system,
                "What charts would work well for this data?",
                VISUALIZATION_TEMPERATURE,
            ))
            .await?;
        let parsed: Suggestions<ChartSuggestion> = from_output(output, "visualization suggestions")?;
        Ok(parsed.suggestions)
    }
}

pub(crate) fn system_prompt(request: &GenerationRequest) -> String {
    let adapter = adapter_for(request.dialect);
    let limit = adapter.row_limit(DEFAULT_ROW_LIMIT);

    let mut prompt = format!(
        r#"You are a SQL expert. Generate SQL queries based on natural language questions.

Database type: {dialect}

Database Schema:
{schema}

Rules:
1. Generate valid SQL for {dialect}
2. Only generate SELECT queries (read-only)
3. Use explicit JOIN syntax when combining tables
4. Include helpful column aliases
5. Limit results to {limit} rows by default unless specified, using {keyword}
6. Use proper date/time functions for {dialect}
7. Be careful with NULL handling
8. {rules}"#,
        dialect = request.dialect,
        schema = format_schema(&request.tables),
        limit = DEFAULT_ROW_LIMIT,
        keyword = limit.keyword(),
        rules = adapter.generation_rules(),
    );

    if let Some(ref params) = request.parameters {
        if !params.is_empty() {
            prompt.push_str("\n\nUse these parameter values:\n");
            prompt.push_str(
                &params
                    .iter()
                    .map(|(name, value)| format!("- {}: {}", name, value))
                    .join("\n"),
            );
        }
    }

    prompt.push_str(
        "\n\nRespond in JSON format:\n\
         {\"sql\": \"YOUR SQL QUERY\", \"explanation\": \"Brief explanation of what the query does\"}",
    );
    prompt
}

fn parse_generated(output: Value) -> Result<GeneratedQuery> {
    let query: GeneratedQuery = from_output(output, "SQL generation")?;
    let sql = query.sql.trim();
    if sql.is_empty() {
        return Err(AgentError::Generation("Model returned an empty SQL statement".to_string()));
    }
    Ok(GeneratedQuery {
        sql: sql.to_string(),
        explanation: query.explanation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Dialect;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn request(dialect: Dialect, parameters: Option<BTreeMap<String, String>>) -> GenerationRequest {
        GenerationRequest {
            question: "top customers".to_string(),
            tables: vec![TableInfo::new("customers")],
            dialect,
            parameters,
        }
    }

    #[test]
    fn test_prompt_mentions_dialect_limit_syntax() {
        let prompt = system_prompt(&request(Dialect::Mssql, None));
        assert!(prompt.contains("Database type: mssql"));
        assert!(prompt.contains("using TOP"));
        assert!(prompt.contains("Table: customers"));
        assert!(!prompt.contains("Use these parameter values"));

        let prompt = system_prompt(&request(Dialect::Postgres, None));
        assert!(prompt.contains("using LIMIT"));
    }

    #[test]
    fn test_prompt_lists_parameters_sorted() {
        let mut params = BTreeMap::new();
        params.insert("start_date".to_string(), "2024-01-01".to_string());
        params.insert("region".to_string(), "north".to_string());
        let prompt = system_prompt(&request(Dialect::Postgres, Some(params)));
        assert!(prompt.contains("Use these parameter values:\n- region: north\n- start_date: 2024-01-01"));
    }

    #[test]
    fn test_parse_generated() {
        let query = parse_generated(json!({"sql": "  SELECT 1 ", "explanation": "one"})).unwrap();
        assert_eq!(query.sql, "SELECT 1");

        for bad in [
            json!({"sql": "", "explanation": "x"}),
            json!({"explanation": "x"}),
            json!({"sql": 5, "explanation": "x"}),
            json!({"sql": "SELECT 1"}),
        ] {
            assert!(matches!(parse_generated(bad), Err(AgentError::Generation(_))));
        }
    }
}
