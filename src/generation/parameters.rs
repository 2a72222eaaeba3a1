use super::{from_output, ParameterDetection};
use crate::error::{AgentError, Result};
use crate::llm::{ReasoningRequest, ReasoningService};
use crate::schema::{format_schema, TableInfo};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

// Detection should not vary between identical questions.
const TEMPERATURE: f32 = 0.0;

/// Decides whether a question needs user-supplied values before SQL can be written.
pub struct ParameterDetector {
    reasoner: Arc<dyn ReasoningService>,
}

impl ParameterDetector {
    pub fn new(reasoner: Arc<dyn ReasoningService>) -> Self {
        Self { reasoner }
    }

    pub async fn detect(&self, question: &str, tables: &[TableInfo]) -> Result<ParameterDetection> {
        let system = format!(
            r#"You analyze questions about a database before SQL is written for them.
Decide whether the question needs values from the user that it does not state.

Database Schema:
{}

Ask for a parameter when the question has:
1. A time window that is vague or missing where one is clearly implied ("recent orders", "last period", "between two dates")
2. An entity filter without a concrete value ("a specific customer", "for a given region")
3. A numeric threshold without a number ("large orders", "above a certain amount")
4. An explicit placeholder ("X", "<date>", "[name]")

If the question is already fully specified, return no parameters.

Parameter types: "date", "datetime", "text", "number", "select" (with "options" listing the choices).

Respond in JSON format:
{{"needs_parameters": true, "parameters": [{{"name": "start_date", "label": "Start date", "type": "date", "description": "First day to include", "default": null, "required": true}}], "clarification": "Which period should be covered?"}}"#,
            format_schema(tables)
        );

        let output = self
            .reasoner
            .complete_json(&ReasoningRequest::new(system, question, TEMPERATURE))
            .await?;
        let detection = parse_detection(output)?;
        debug!(
            "Parameter detection: needs_parameters={} ({} parameters)",
            detection.needs_parameters,
            detection.parameters.len()
        );
        Ok(detection)
    }
}

fn parse_detection(output: Value) -> Result<ParameterDetection> {
    if output.get("needs_parameters").and_then(Value::as_bool).is_none() {
        return Err(AgentError::Generation(
            "Parameter detection output is missing a boolean 'needs_parameters'".to_string(),
        ));
    }
    let mut output = output;
    if let Some(obj) = output.as_object_mut() {
        obj.entry("parameters").or_insert_with(|| Value::Array(Vec::new()));
        obj.entry("clarification").or_insert(Value::Null);
    }

    let mut detection: ParameterDetection = from_output(output, "parameter detection")?;
    if detection.parameters.is_empty() {
        detection.needs_parameters = false;
    }
    Ok(detection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ParameterType;
    use serde_json::json;

    #[test]
    fn test_parse_detection() {
        let detection = parse_detection(json!({
            "needs_parameters": true,
            "parameters": [{
                "name": "region",
                "label": "Region",
                "type": "select",
                "description": "Sales region",
                "options": ["north", "south"]
            }],
            "clarification": "Which region?"
        }))
        .unwrap();
        assert!(detection.needs_parameters);
        assert_eq!(detection.parameters[0].param_type, ParameterType::Select);
        assert_eq!(
            detection.parameters[0].options.as_deref(),
            Some(&["north".to_string(), "south".to_string()][..])
        );
        assert_eq!(detection.clarification.as_deref(), Some("Which region?"));
    }

    #[test]
    fn test_needs_parameters_forced_false_without_parameters() {
        let detection = parse_detection(json!({"needs_parameters": true, "parameters": []})).unwrap();
        assert!(!detection.needs_parameters);
        assert_eq!(detection.clarification, None);
    }

    #[test]
    fn test_missing_flag_is_generation_error() {
        assert!(matches!(
            parse_detection(json!({"parameters": []})),
            Err(AgentError::Generation(_))
        ));
        assert!(matches!(
            parse_detection(json!("no")),
            Err(AgentError::Generation(_))
        ));
    }
}
