use sqlagent::config::AppConfig;
use sqlagent::connection::{ConnectionUpdate, NewConnection};
use sqlagent::db::ExecutionResult;
use sqlagent::llm::OpenAiReasoner;
use sqlagent::store::{NewFeedback, DEFAULT_FEEDBACK_LIMIT, DEFAULT_HISTORY_LIMIT};
use sqlagent::{AgentError, ConnectionDescriptor, Dialect, QueryPipeline};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlagent")]
#[command(about = "Ask questions of Postgres, MySQL, SQL Server and SQLite databases in plain language")]
#[command(version)]
struct Args {
    /// Record store file (overrides SQLAGENT_STORE_PATH)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Statement timeout in seconds (overrides SQLAGENT_QUERY_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved connections
    Connection {
        #[command(subcommand)]
        action: ConnectionCommand,
    },
    /// Show the schema of a connection (cached unless --refresh)
    Schema {
        connection: i64,
        #[arg(long)]
        refresh: bool,
    },
    /// Show the first rows of a table
    Preview {
        connection: i64,
        table: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Check whether a question needs extra values before SQL can be generated
    Detect { connection: i64, question: String },
    /// Generate SQL for a question without running it
    Generate {
        connection: i64,
        question: String,
        /// Parameter value as name=value (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Generate SQL for a question and run it
    Ask {
        connection: i64,
        question: String,
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// Only generate, do not execute
        #[arg(long)]
        no_execute: bool,
        /// Also write the result rows to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Run a SQL statement
    Execute {
        connection: i64,
        sql: String,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Suggest questions for a connection with a cached schema
    Suggest { connection: i64 },
    /// Run a SQL statement and suggest charts for its result
    Visualize { connection: i64, sql: String },
    /// List query history, newest first
    History {
        #[arg(long)]
        connection: Option<i64>,
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: i64,
    },
    /// Toggle the favorite flag of a history entry
    Favorite { id: i64 },
    /// Record or list SQL corrections
    Feedback {
        #[command(subcommand)]
        action: FeedbackCommand,
    },
}

#[derive(Subcommand)]
enum ConnectionCommand {
    /// Save a new connection
    Add {
        #[arg(long)]
        name: String,
        /// postgres, mysql, mssql or sqlite
        #[arg(long)]
        dialect: String,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Database name, or the file path for sqlite
        #[arg(long)]
        database: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        tls: bool,
        /// Allow statements other than SELECT/WITH
        #[arg(long)]
        writable: bool,
    },
    /// Change fields of a saved connection; omitted flags keep their stored values
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        dialect: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        database: Option<String>,
        #[arg(long)]
        username: Option<String>,
        /// New password; the stored one is kept when omitted
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        tls: Option<bool>,
        #[arg(long)]
        readonly: Option<bool>,
    },
    List,
    Remove { id: i64 },
    /// Open the connection and run SELECT 1
    Test { id: i64 },
}

#[derive(Subcommand)]
enum FeedbackCommand {
    Add {
        connection: i64,
        #[arg(long)]
        question: String,
        #[arg(long)]
        original_sql: String,
        #[arg(long)]
        corrected_sql: String,
    },
    List {
        #[arg(long)]
        connection: Option<i64>,
        #[arg(long, default_value_t = DEFAULT_FEEDBACK_LIMIT)]
        limit: i64,
    },
}

impl Commands {
    fn needs_reasoning(&self) -> bool {
        matches!(
            self,
            Commands::Detect { .. }
                | Commands::Generate { .. }
                | Commands::Ask { .. }
                | Commands::Suggest { .. }
                | Commands::Visualize { .. }
        )
    }
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}

fn parameters(params: Vec<(String, String)>) -> Option<BTreeMap<String, String>> {
    if params.is_empty() {
        None
    } else {
        Some(params.into_iter().collect())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn connection_view(d: &ConnectionDescriptor) -> Value {
    json!({
        "id": d.id(),
        "name": d.name(),
        "dialect": d.dialect(),
        "host": d.host(),
        "port": d.port(),
        "database": d.database(),
        "username": d.username(),
        "tls": d.tls(),
        "readonly": d.readonly(),
    })
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_csv(path: &Path, result: &ExecutionResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row.iter().map(cell_text))?;
    }
    writer.flush()?;
    info!("Wrote {} rows to {}", result.row_count, path.display());
    Ok(())
}

/// Apply command-line overrides on top of the environment and re-check the result.
fn with_overrides(mut config: AppConfig, args: &Args) -> sqlagent::Result<AppConfig> {
    if let Some(store) = &args.store {
        config.store_path = store.clone();
    }
    if let Some(timeout) = args.timeout {
        config.query_timeout_secs = timeout;
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let config = with_overrides(AppConfig::from_env()?, &args)?;

    let api_key = if args.command.needs_reasoning() {
        config.require_api_key()?.to_string()
    } else {
        config.openai_api_key.clone().unwrap_or_default()
    };
    let reasoner = OpenAiReasoner::new(api_key)
        .with_model(config.openai_model.clone())
        .with_base_url(config.openai_base_url.clone());
    let pipeline = QueryPipeline::from_config(&config, Arc::new(reasoner)).await?;

    match args.command {
        Commands::Connection { action } => match action {
            ConnectionCommand::Add {
                name,
                dialect,
                host,
                port,
                database,
                username,
                password,
                tls,
                writable,
            } => {
                let descriptor = pipeline
                    .add_connection(NewConnection {
                        name,
                        dialect: dialect.parse()?,
                        host,
                        port,
                        database,
                        username,
                        password,
                        tls,
                        readonly: !writable,
                    })
                    .await?;
                print_json(&connection_view(&descriptor))?;
            }
            ConnectionCommand::Update {
                id,
                name,
                dialect,
                host,
                port,
                database,
                username,
                password,
                tls,
                readonly,
            } => {
                let update = ConnectionUpdate {
                    name,
                    dialect: dialect.map(|d| d.parse::<Dialect>()).transpose()?,
                    host,
                    port,
                    database,
                    username,
                    password,
                    tls,
                    readonly,
                };
                let descriptor = pipeline.update_connection(id, &update).await?;
                print_json(&connection_view(&descriptor))?;
            }
            ConnectionCommand::List => {
                let connections = pipeline.store().list_connections().await?;
                let views: Vec<Value> = connections.iter().map(connection_view).collect();
                print_json(&views)?;
            }
            ConnectionCommand::Remove { id } => {
                pipeline.remove_connection(id).await?;
                print_json(&json!({"deleted": id}))?;
            }
            ConnectionCommand::Test { id } => {
                let descriptor = pipeline.descriptor(id).await?;
                let (ok, message) = pipeline.test_connection(&descriptor).await;
                print_json(&json!({"success": ok, "message": message}))?;
                if !ok {
                    return Err(AgentError::Connectivity(message).into());
                }
            }
        },
        Commands::Schema { connection, refresh } => {
            let descriptor = pipeline.descriptor(connection).await?;
            print_json(&pipeline.schema(&descriptor, refresh).await?)?;
        }
        Commands::Preview {
            connection,
            table,
            limit,
        } => {
            let descriptor = pipeline.descriptor(connection).await?;
            print_json(&pipeline.preview(&descriptor, &table, limit).await?)?;
        }
        Commands::Detect {
            connection,
            question,
        } => {
            let descriptor = pipeline.descriptor(connection).await?;
            print_json(&pipeline.detect_parameters(&descriptor, &question).await?)?;
        }
        Commands::Generate {
            connection,
            question,
            params,
        } => {
            let descriptor = pipeline.descriptor(connection).await?;
            let query = pipeline
                .generate(&descriptor, &question, parameters(params))
                .await?;
            print_json(&query)?;
        }
        Commands::Ask {
            connection,
            question,
            params,
            no_execute,
            csv,
        } => {
            let descriptor = pipeline.descriptor(connection).await?;
            let outcome = pipeline
                .ask(&descriptor, &question, parameters(params), !no_execute)
                .await?;
            if let (Some(path), Some(result)) = (csv.as_deref(), outcome.result.as_ref()) {
                write_csv(path, result)?;
            }
            print_json(&outcome)?;
        }
        Commands::Execute {
            connection,
            sql,
            csv,
        } => {
            let descriptor = pipeline.descriptor(connection).await?;
            let result = pipeline.execute(&descriptor, &sql).await?;
            if let Some(path) = csv.as_deref() {
                write_csv(path, &result)?;
            }
            print_json(&result)?;
        }
        Commands::Suggest { connection } => {
            let descriptor = pipeline.descriptor(connection).await?;
            let suggestions = pipeline.suggest_queries(&descriptor).await?;
            print_json(&json!({ "suggestions": suggestions }))?;
        }
        Commands::Visualize { connection, sql } => {
            let descriptor = pipeline.descriptor(connection).await?;
            let result = pipeline.execute(&descriptor, &sql).await?;
            let suggestions = pipeline
                .suggest_visualizations(&result.columns, &result.rows)
                .await?;
            print_json(&json!({ "suggestions": suggestions }))?;
        }
        Commands::History { connection, limit } => {
            print_json(&pipeline.store().list_history(connection, limit).await?)?;
        }
        Commands::Favorite { id } => {
            let favorite = pipeline.store().toggle_favorite(id).await?;
            print_json(&json!({ "id": id, "is_favorite": favorite }))?;
        }
        Commands::Feedback { action } => match action {
            FeedbackCommand::Add {
                connection,
                question,
                original_sql,
                corrected_sql,
            } => {
                pipeline.descriptor(connection).await?;
                let id = pipeline
                    .store()
                    .save_feedback(&NewFeedback {
                        connection_id: connection,
                        natural_language: question,
                        original_sql,
                        corrected_sql,
                    })
                    .await?;
                print_json(&json!({ "id": id }))?;
            }
            FeedbackCommand::List { connection, limit } => {
                print_json(&pipeline.store().list_feedback(connection, limit).await?)?;
            }
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sqlagent=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<AgentError>()
                .map(AgentError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("start_date=2024-01-01").unwrap(),
            ("start_date".to_string(), "2024-01-01".to_string())
        );
        assert_eq!(parse_param("q=a=b").unwrap().1, "a=b");
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_cli_parses_ask() {
        let args = Args::try_parse_from([
            "sqlagent", "ask", "3", "top customers", "--param", "region=north", "--no-execute",
        ])
        .unwrap();
        match args.command {
            Commands::Ask { connection, params, no_execute, .. } => {
                assert_eq!(connection, 3);
                assert_eq!(params, vec![("region".to_string(), "north".to_string())]);
                assert!(no_execute);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_cli_parses_connection_update() {
        let args = Args::try_parse_from([
            "sqlagent", "connection", "update", "4", "--name", "replica", "--readonly", "false",
        ])
        .unwrap();
        match args.command {
            Commands::Connection {
                action:
                    ConnectionCommand::Update {
                        id,
                        name,
                        password,
                        readonly,
                        tls,
                        ..
                    },
            } => {
                assert_eq!(id, 4);
                assert_eq!(name.as_deref(), Some("replica"));
                assert_eq!(readonly, Some(false));
                assert_eq!(password, None);
                assert_eq!(tls, None);
            }
            _ => panic!("expected connection update"),
        }
    }

    #[test]
    fn test_zero_timeout_override_rejected() {
        let args = Args::try_parse_from(["sqlagent", "--timeout", "0", "connection", "list"]).unwrap();
        assert!(matches!(
            with_overrides(AppConfig::default(), &args),
            Err(AgentError::Config(_))
        ));

        let args = Args::try_parse_from(["sqlagent", "--timeout", "12", "connection", "list"]).unwrap();
        let config = with_overrides(AppConfig::default(), &args).unwrap();
        assert_eq!(config.query_timeout_secs, 12);
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Value::Null), "");
        assert_eq!(cell_text(&json!("north")), "north");
        assert_eq!(cell_text(&json!(12.5)), "12.5");
    }
}
