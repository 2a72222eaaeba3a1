pub mod config;
pub mod connection;
pub mod crypto;
pub mod db;
pub mod dialect;
pub mod error;
pub mod generation;
pub mod guard;
pub mod llm;
pub mod pipeline;
pub mod schema;
pub mod store;

pub use config::AppConfig;
pub use connection::{ConnectionDescriptor, ConnectionUpdate, Dialect, NewConnection};
pub use db::{DatabaseConnector, ExecutionResult, TablePreview};
pub use error::{AgentError, Result};
pub use pipeline::{AskOutcome, QueryPipeline};
pub use schema::{SchemaSnapshot, TableInfo, ColumnInfo};
