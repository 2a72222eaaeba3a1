//! Reasoning service abstraction.
//!
//! Everything that needs a language model (relevance filtering, parameter
//! detection, SQL generation, suggestions) goes through [`ReasoningService`]
//! and expects a JSON object back.

mod openai;

pub use openai::{OpenAiReasoner, DEFAULT_BASE_URL, DEFAULT_MODEL};

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

impl ReasoningRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
        }
    }
}

#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// One completion, parsed as a JSON value.
    async fn complete_json(&self, request: &ReasoningRequest) -> Result<Value>;
}

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\s*```\s*$").unwrap();
}

/// Remove a single surrounding markdown code fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// Parse model output as JSON, tolerating a surrounding code fence.
pub fn parse_json_payload(text: &str) -> Result<Value> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AgentError::Generation(format!("Failed to parse model response as JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"sql\": \"SELECT 1\"}  "), "{\"sql\": \"SELECT 1\"}");
    }

    #[test]
    fn test_parse_json_payload() {
        assert_eq!(
            parse_json_payload("```json\n{\"sql\": \"SELECT 1\"}\n```").unwrap(),
            json!({"sql": "SELECT 1"})
        );
        assert!(matches!(
            parse_json_payload("SELECT 1"),
            Err(AgentError::Generation(_))
        ));
    }
}
