//! Process configuration, read once at startup.

use crate::db::RowCountMode;
use crate::error::{AgentError, Result};
use crate::guard::DEFAULT_TIMEOUT_SECS;
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::path::PathBuf;

pub const DEFAULT_STORE_PATH: &str = "sqlagent.db";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub encryption_key: Option<String>,
    pub store_path: PathBuf,
    pub query_timeout_secs: u64,
    pub row_count_mode: RowCountMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            encryption_key: None,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            query_timeout_secs: DEFAULT_TIMEOUT_SECS,
            row_count_mode: RowCountMode::Off,
        }
    }
}

impl AppConfig {
    /// Load from environment variables (call `dotenv` first to pick up `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let query_timeout_secs = match non_empty("SQLAGENT_QUERY_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                AgentError::Config(format!("SQLAGENT_QUERY_TIMEOUT_SECS must be a number, got '{}'", raw))
            })?,
            None => defaults.query_timeout_secs,
        };

        let row_count_mode = match non_empty("SQLAGENT_ROW_COUNTS") {
            Some(raw) => raw.parse()?,
            None => defaults.row_count_mode,
        };

        let config = Self {
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: non_empty("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            encryption_key: non_empty("ENCRYPTION_KEY"),
            store_path: non_empty("SQLAGENT_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            query_timeout_secs,
            row_count_mode,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that hold however the values were set; run again after command-line overrides.
    pub fn validate(&self) -> Result<()> {
        if self.query_timeout_secs == 0 {
            return Err(AgentError::Config(
                "Query timeout must be greater than zero seconds".to_string(),
            ));
        }
        Ok(())
    }

    /// The API key, required only by commands that call the reasoning service.
    pub fn require_api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| AgentError::Config("OPENAI_API_KEY is not set".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.store_path, PathBuf::from("sqlagent.db"));
        assert_eq!(config.query_timeout_secs, 30);
        assert_eq!(config.row_count_mode, RowCountMode::Off);
        assert!(matches!(config.require_api_key(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("SQLAGENT_QUERY_TIMEOUT_SECS", "5"),
            ("SQLAGENT_ROW_COUNTS", "approximate"),
            ("ENCRYPTION_KEY", "  "),
        ])
        .unwrap();
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
        assert_eq!(config.query_timeout_secs, 5);
        assert_eq!(config.row_count_mode, RowCountMode::Approximate);
        assert_eq!(config.encryption_key, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("SQLAGENT_QUERY_TIMEOUT_SECS", "soon")]),
            Err(AgentError::Config(_))
        ));
        assert!(matches!(
            load(&[("SQLAGENT_QUERY_TIMEOUT_SECS", "0")]),
            Err(AgentError::Config(_))
        ));
        assert!(matches!(
            load(&[("SQLAGENT_ROW_COUNTS", "exact")]),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn test_validate_after_override() {
        let mut config = load(&[("SQLAGENT_QUERY_TIMEOUT_SECS", "5")]).unwrap();
        assert!(config.validate().is_ok());

        config.query_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }
}
