//! End-to-end question answering over a saved connection.
//!
//! Ties the record store, schema cache, connector registry, reasoning steps
//! and execution guard together. Built once per process from [`AppConfig`].

use crate::config::AppConfig;
use crate::connection::{ConnectionDescriptor, ConnectionUpdate, NewConnection};
use crate::crypto::CredentialCipher;
use crate::db::{ConnectorOptions, ConnectorRegistry, DatabaseConnector, ExecutionResult, TablePreview};
use crate::error::{AgentError, Result};
use crate::generation::relevance::RELEVANCE_THRESHOLD;
use crate::generation::{
    ChartSuggestion, FilterOutcome, FilteredSchema, GeneratedQuery, GenerationRequest,
    ParameterDetection, ParameterDetector, RelevanceFilter, SqlGenerator,
};
use crate::guard::ExecutionGuard;
use crate::llm::ReasoningService;
use crate::schema::{SchemaCache, SchemaSnapshot};
use crate::store::RecordStore;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of [`QueryPipeline::ask`]. Execution failures land in `error`
/// instead of failing the whole call, so the generated SQL is never lost.
#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    pub sql: String,
    pub explanation: String,
    pub filter: FilterOutcome,
    pub tables_considered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct QueryPipeline {
    store: Arc<RecordStore>,
    cache: SchemaCache,
    registry: ConnectorRegistry,
    relevance: RelevanceFilter,
    detector: ParameterDetector,
    generator: SqlGenerator,
    guard: ExecutionGuard,
}

impl QueryPipeline {
    pub fn new(
        reasoner: Arc<dyn ReasoningService>,
        store: Arc<RecordStore>,
        cipher: Option<Arc<CredentialCipher>>,
        options: ConnectorOptions,
        timeout_secs: u64,
    ) -> Self {
        Self {
            cache: SchemaCache::with_store(Arc::clone(&store)),
            registry: ConnectorRegistry::new(cipher, options),
            relevance: RelevanceFilter::new(Arc::clone(&reasoner)),
            detector: ParameterDetector::new(Arc::clone(&reasoner)),
            generator: SqlGenerator::new(reasoner),
            guard: ExecutionGuard::new(Some(Arc::clone(&store)), timeout_secs),
            store,
        }
    }

    /// Open the record store named by `config` and wire everything around it.
    pub async fn from_config(config: &AppConfig, reasoner: Arc<dyn ReasoningService>) -> Result<Self> {
        let cipher = config
            .encryption_key
            .as_deref()
            .map(CredentialCipher::new)
            .transpose()?
            .map(Arc::new);
        let store = Arc::new(RecordStore::open(&config.store_path, cipher.clone()).await?);
        let options = ConnectorOptions {
            acquire_timeout: Duration::from_secs(config.query_timeout_secs),
            row_count_mode: config.row_count_mode,
        };
        Ok(Self::new(reasoner, store, cipher, options, config.query_timeout_secs))
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub async fn descriptor(&self, connection_id: i64) -> Result<ConnectionDescriptor> {
        self.store.get_connection(connection_id).await
    }

    pub async fn connector(&self, descriptor: &ConnectionDescriptor) -> Arc<DatabaseConnector> {
        self.registry.connector(descriptor).await
    }

    pub async fn add_connection(&self, new: NewConnection) -> Result<ConnectionDescriptor> {
        let id = self.store.save_connection(new).await?;
        self.store.get_connection(id).await
    }

    /// Apply `update` and drop state built from the old settings: the cached
    /// schema and the open pool.
    pub async fn update_connection(
        &self,
        connection_id: i64,
        update: &ConnectionUpdate,
    ) -> Result<ConnectionDescriptor> {
        let descriptor = self.store.update_connection(connection_id, update).await?;
        self.cache.invalidate(connection_id).await?;
        self.registry.evict(connection_id).await;
        info!("Updated connection {}", connection_id);
        Ok(descriptor)
    }

    /// Delete the connection, its cached schema and its open pool.
    pub async fn remove_connection(&self, connection_id: i64) -> Result<()> {
        self.store.delete_connection(connection_id).await?;
        self.cache.invalidate(connection_id).await?;
        self.registry.evict(connection_id).await;
        Ok(())
    }

    pub async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> (bool, String) {
        self.connector(descriptor).await.test_connection().await
    }

    /// Cached snapshot, or a fresh introspection when missing or `refresh` is set.
    pub async fn schema(&self, descriptor: &ConnectionDescriptor, refresh: bool) -> Result<SchemaSnapshot> {
        let connector = self.connector(descriptor).await;
        if refresh {
            self.cache.refresh(&connector).await
        } else {
            self.cache.get_or_introspect(&connector).await
        }
    }

    pub async fn preview(
        &self,
        descriptor: &ConnectionDescriptor,
        table: &str,
        limit: usize,
    ) -> Result<TablePreview> {
        self.connector(descriptor).await.table_preview(table, limit).await
    }

    async fn relevant_schema(&self, descriptor: &ConnectionDescriptor, question: &str) -> Result<FilteredSchema> {
        let snapshot = self.schema(descriptor, false).await?;
        Ok(self.relevance.filter(question, &snapshot).await)
    }

    pub async fn detect_parameters(
        &self,
        descriptor: &ConnectionDescriptor,
        question: &str,
    ) -> Result<ParameterDetection> {
        let schema = self.relevant_schema(descriptor, question).await?;
        self.detector.detect(question, &schema.tables).await
    }

    pub async fn generate(
        &self,
        descriptor: &ConnectionDescriptor,
        question: &str,
        parameters: Option<BTreeMap<String, String>>,
    ) -> Result<GeneratedQuery> {
        let (query, _, _) = self.generate_filtered(descriptor, question, parameters).await?;
        Ok(query)
    }

    async fn generate_filtered(
        &self,
        descriptor: &ConnectionDescriptor,
        question: &str,
        parameters: Option<BTreeMap<String, String>>,
    ) -> Result<(GeneratedQuery, FilterOutcome, usize)> {
        let schema = self.relevant_schema(descriptor, question).await?;
        let considered = schema.tables.len();
        let request = GenerationRequest {
            question: question.to_string(),
            tables: schema.tables,
            dialect: descriptor.dialect(),
            parameters,
        };
        let query = self.generator.generate(request).await?;
        Ok((query, schema.outcome, considered))
    }

    /// Generate SQL and, if asked, run it through the guard.
    pub async fn ask(
        &self,
        descriptor: &ConnectionDescriptor,
        question: &str,
        parameters: Option<BTreeMap<String, String>>,
        auto_execute: bool,
    ) -> Result<AskOutcome> {
        let (query, filter, tables_considered) =
            self.generate_filtered(descriptor, question, parameters).await?;
        let mut outcome = AskOutcome {
            sql: query.sql,
            explanation: query.explanation,
            filter,
            tables_considered,
            result: None,
            error: None,
        };

        if auto_execute {
            let connector = self.connector(descriptor).await;
            match self.guard.execute(&connector, &outcome.sql, Some(question)).await {
                Ok(result) => outcome.result = Some(result),
                Err(e) => {
                    warn!("Generated query failed on connection {}: {}", descriptor.id(), e);
                    outcome.error = Some(e.to_string());
                }
            }
        }
        Ok(outcome)
    }

    /// Run caller-supplied SQL through the guard.
    pub async fn execute(&self, descriptor: &ConnectionDescriptor, sql: &str) -> Result<ExecutionResult> {
        let connector = self.connector(descriptor).await;
        self.guard.execute(&connector, sql, None).await
    }

    /// Query ideas for a connection whose schema has already been cached.
    pub async fn suggest_queries(&self, descriptor: &ConnectionDescriptor) -> Result<Vec<String>> {
        let snapshot = self.cache.get(descriptor.id()).await?.ok_or(AgentError::NotFound {
            kind: "Cached schema for connection",
            id: descriptor.id(),
        })?;
        let tables = &snapshot.tables[..snapshot.tables.len().min(RELEVANCE_THRESHOLD)];
        let suggestions = self.generator.suggest_queries(tables).await?;
        info!("Produced {} query suggestions", suggestions.len());
        Ok(suggestions)
    }

    pub async fn suggest_visualizations(
        &self,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<Vec<ChartSuggestion>> {
        self.generator.suggest_visualizations(columns, rows).await
    }
}
