//! Natural language to SQL.
//!
//! Flow per question: relevance filtering (large schemas only), optional
//! parameter detection, then generation. Each step makes exactly one
//! reasoning call and treats malformed output as a [`AgentError::Generation`].

pub mod generator;
pub mod parameters;
pub mod relevance;

pub use generator::SqlGenerator;
pub use parameters::ParameterDetector;
pub use relevance::{FilterOutcome, FilteredSchema, RelevanceFilter};

use crate::connection::Dialect;
use crate::error::{AgentError, Result};
use crate::schema::TableInfo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Input to one generation call. Consumed by [`SqlGenerator::generate`].
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub question: String,
    pub tables: Vec<TableInfo>,
    pub dialect: Dialect,
    pub parameters: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub sql: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Date,
    Datetime,
    Text,
    Number,
    Select,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub default: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Choices for `select` parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

fn default_required() -> bool {
    true
}

/// Models sometimes return numeric defaults; keep them as text.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDetection {
    pub needs_parameters: bool,
    pub parameters: Vec<ParameterSpec>,
    pub clarification: Option<String>,
}

impl ParameterDetection {
    pub fn none() -> Self {
        Self {
            needs_parameters: false,
            parameters: Vec::new(),
            clarification: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Scatter,
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSuggestion {
    pub chart_type: ChartType,
    pub reason: String,
    #[serde(default = "empty_object")]
    pub config: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Deserialize the reasoning output into `T`, reporting shape mismatches as generation errors.
pub(crate) fn from_output<T: DeserializeOwned>(output: Value, what: &str) -> Result<T> {
    if !output.is_object() {
        return Err(AgentError::Generation(format!(
            "Expected a JSON object for {}, got: {}",
            what, output
        )));
    }
    serde_json::from_value(output)
        .map_err(|e| AgentError::Generation(format!("Malformed {} output: {}", what, e)))
}
