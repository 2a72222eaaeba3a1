use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Unsupported database type: {0}")]
    UnsupportedDialect(String),

    #[error("Connection error: {0}")]
    Connectivity(String),

    #[error("Table '{table}' not found{}", hint_suffix(.hint))]
    UnknownTable { table: String, hint: Option<String> },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Connection is read-only. Only SELECT queries allowed.")]
    ReadOnlyViolation,

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Process exit code for the CLI; one per error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            AgentError::UnsupportedDialect(_) => 10,
            AgentError::Connectivity(_) => 11,
            AgentError::UnknownTable { .. } => 12,
            AgentError::Execution(_) => 13,
            AgentError::ReadOnlyViolation => 14,
            AgentError::Generation(_) => 15,
            AgentError::Config(_) => 16,
            AgentError::Store(_) => 17,
            AgentError::Credential(_) => 18,
            AgentError::NotFound { .. } => 19,
            AgentError::Io(_) => 20,
            AgentError::Json(_) => 21,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|h| format!(" (did you mean '{}'?)", h))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = vec![
            AgentError::UnsupportedDialect("oracle".into()),
            AgentError::Connectivity("refused".into()),
            AgentError::UnknownTable { table: "x".into(), hint: None },
            AgentError::Execution("boom".into()),
            AgentError::ReadOnlyViolation,
            AgentError::Generation("bad json".into()),
            AgentError::Config("missing".into()),
            AgentError::Store("locked".into()),
            AgentError::Credential("bad tag".into()),
            AgentError::NotFound { kind: "Connection", id: 7 },
            AgentError::Io(std::io::Error::new(std::io::ErrorKind::Other, "io")),
            AgentError::Json(serde_json::from_str::<serde_json::Value>("{").unwrap_err()),
        ];
        let mut codes: Vec<u8> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_unknown_table_message_includes_hint() {
        let err = AgentError::UnknownTable {
            table: "ordrs".into(),
            hint: Some("orders".into()),
        };
        assert_eq!(err.to_string(), "Table 'ordrs' not found (did you mean 'orders'?)");

        let err = AgentError::UnknownTable { table: "nope".into(), hint: None };
        assert_eq!(err.to_string(), "Table 'nope' not found");
    }
}
