//! Local record store
//!
//! A SQLite file holding saved connections, persisted schema snapshots,
//! query history and user SQL corrections. Tables are created on open.

use crate::connection::{ConnectionDescriptor, ConnectionUpdate, Dialect, NewConnection};
use crate::crypto::CredentialCipher;
use crate::error::{AgentError, Result};
use crate::schema::SchemaSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const DEFAULT_FEEDBACK_LIMIT: i64 = 100;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS connections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        db_type TEXT NOT NULL,
        host TEXT,
        port INTEGER,
        database_name TEXT NOT NULL,
        username TEXT,
        password_encrypted TEXT,
        ssl_enabled INTEGER NOT NULL DEFAULT 0,
        is_readonly INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        last_used_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schema_cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        connection_id INTEGER NOT NULL UNIQUE,
        schema_json TEXT NOT NULL,
        cached_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS query_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        connection_id INTEGER NOT NULL,
        natural_language_query TEXT,
        generated_sql TEXT NOT NULL,
        executed_at TEXT NOT NULL,
        execution_time_ms INTEGER,
        row_count INTEGER,
        status TEXT NOT NULL,
        error_message TEXT,
        is_favorite INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS query_feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        connection_id INTEGER NOT NULL,
        natural_language TEXT NOT NULL,
        original_sql TEXT NOT NULL,
        corrected_sql TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_history_connection ON query_history (connection_id)",
];

fn store_error(e: sqlx::Error) -> AgentError {
    AgentError::Store(e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Error,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Success => "success",
            QueryStatus::Error => "error",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryStatus {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(QueryStatus::Success),
            "error" => Ok(QueryStatus::Error),
            other => Err(AgentError::Store(format!("Unknown query status '{}'", other))),
        }
    }
}

/// A history row to be written. Execution time and row count are only known on success.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub connection_id: i64,
    pub natural_language_query: Option<String>,
    pub generated_sql: String,
    pub execution_time_ms: Option<u64>,
    pub row_count: Option<usize>,
    pub status: QueryStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub connection_id: i64,
    pub natural_language_query: Option<String>,
    pub generated_sql: String,
    pub executed_at: DateTime<Utc>,
    pub execution_time_ms: Option<i64>,
    pub row_count: Option<i64>,
    pub status: QueryStatus,
    pub error_message: Option<String>,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedback {
    pub connection_id: i64,
    pub natural_language: String,
    pub original_sql: String,
    pub corrected_sql: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackEntry {
    pub id: i64,
    pub connection_id: i64,
    pub natural_language: String,
    pub original_sql: String,
    pub corrected_sql: String,
    pub created_at: DateTime<Utc>,
}

pub struct RecordStore {
    pool: SqlitePool,
    cipher: Option<Arc<CredentialCipher>>,
}

impl RecordStore {
    /// Open (creating if needed) the store at `path`.
    pub async fn open(path: impl AsRef<Path>, cipher: Option<Arc<CredentialCipher>>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(store_error)?;

        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(store_error)?;
        }
        info!("Record store ready at {}", path.display());

        Ok(Self { pool, cipher })
    }

    fn cipher(&self) -> Result<&CredentialCipher> {
        self.cipher.as_deref().ok_or_else(|| {
            AgentError::Config("ENCRYPTION_KEY is required to store database passwords".to_string())
        })
    }

    // ---- connections ----

    /// Save a connection; the password is encrypted before it is written.
    pub async fn save_connection(&self, new: NewConnection) -> Result<i64> {
        let password_encrypted = match new.password.as_deref() {
            Some(p) if !p.is_empty() => Some(self.cipher()?.encrypt(p)?),
            _ => None,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO connections
                (name, db_type, host, port, database_name, username, password_encrypted,
                 ssl_enabled, is_readonly, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(new.dialect.as_str())
        .bind(&new.host)
        .bind(new.port.map(i64::from))
        .bind(&new.database)
        .bind(&new.username)
        .bind(&password_encrypted)
        .bind(new.tls)
        .bind(new.readonly)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        let id = result.last_insert_rowid();
        info!("Saved {} connection '{}' as {}", new.dialect, new.name, id);
        Ok(id)
    }

    /// Apply the set fields of `update`. A new password is encrypted; without
    /// one the stored ciphertext is left as is.
    pub async fn update_connection(
        &self,
        id: i64,
        update: &ConnectionUpdate,
    ) -> Result<ConnectionDescriptor> {
        let password_encrypted = match update.password.as_deref() {
            Some(p) if !p.is_empty() => Some(self.cipher()?.encrypt(p)?),
            _ => None,
        };

        let updated = sqlx::query(
            r#"
            UPDATE connections SET
                name = COALESCE(?, name),
                db_type = COALESCE(?, db_type),
                host = COALESCE(?, host),
                port = COALESCE(?, port),
                database_name = COALESCE(?, database_name),
                username = COALESCE(?, username),
                password_encrypted = COALESCE(?, password_encrypted),
                ssl_enabled = COALESCE(?, ssl_enabled),
                is_readonly = COALESCE(?, is_readonly)
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(update.dialect.map(|d| d.as_str()))
        .bind(&update.host)
        .bind(update.port.map(i64::from))
        .bind(&update.database)
        .bind(&update.username)
        .bind(&password_encrypted)
        .bind(update.tls)
        .bind(update.readonly)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?
        .rows_affected();
        if updated == 0 {
            return Err(AgentError::NotFound { kind: "Connection", id });
        }

        debug!("Updated connection {}", id);
        self.get_connection(id).await
    }

    pub async fn get_connection(&self, id: i64) -> Result<ConnectionDescriptor> {
        let row = sqlx::query("SELECT * FROM connections WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or(AgentError::NotFound { kind: "Connection", id })?;
        descriptor_from_row(&row)
    }

    pub async fn list_connections(&self) -> Result<Vec<ConnectionDescriptor>> {
        let rows = sqlx::query("SELECT * FROM connections ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        rows.iter().map(descriptor_from_row).collect()
    }

    /// Delete a connection together with its persisted schema.
    pub async fn delete_connection(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        sqlx::query("DELETE FROM schema_cache WHERE connection_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        let deleted = sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?
            .rows_affected();
        if deleted == 0 {
            return Err(AgentError::NotFound { kind: "Connection", id });
        }
        tx.commit().await.map_err(store_error)?;
        info!("Deleted connection {}", id);
        Ok(())
    }

    pub async fn touch_connection(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE connections SET last_used_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    // ---- schema cache ----

    pub async fn put_schema(&self, connection_id: i64, snapshot: &SchemaSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        sqlx::query(
            r#"
            INSERT INTO schema_cache (connection_id, schema_json, cached_at)
            VALUES (?, ?, ?)
            ON CONFLICT(connection_id) DO UPDATE SET
                schema_json = excluded.schema_json,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(connection_id)
        .bind(json)
        .bind(snapshot.captured_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        debug!("Persisted schema for connection {}", connection_id);
        Ok(())
    }

    pub async fn get_schema(&self, connection_id: i64) -> Result<Option<SchemaSnapshot>> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT schema_json FROM schema_cache WHERE connection_id = ?")
                .bind(connection_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_schema(&self, connection_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM schema_cache WHERE connection_id = ?")
            .bind(connection_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    // ---- query history ----

    pub async fn record_history(&self, entry: &NewHistoryEntry) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO query_history
                (connection_id, natural_language_query, generated_sql, executed_at,
                 execution_time_ms, row_count, status, error_message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.connection_id)
        .bind(&entry.natural_language_query)
        .bind(&entry.generated_sql)
        .bind(Utc::now())
        .bind(entry.execution_time_ms.map(|ms| ms as i64))
        .bind(entry.row_count.map(|n| n as i64))
        .bind(entry.status.as_str())
        .bind(&entry.error_message)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.last_insert_rowid())
    }

    /// Newest first, optionally for a single connection.
    pub async fn list_history(&self, connection_id: Option<i64>, limit: i64) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM query_history
            WHERE (?1 IS NULL OR connection_id = ?1)
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(connection_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.iter().map(history_from_row).collect()
    }

    /// Flip the favorite flag and return its new value.
    pub async fn toggle_favorite(&self, history_id: i64) -> Result<bool> {
        let favorite: Option<bool> = sqlx::query_scalar(
            "UPDATE query_history SET is_favorite = NOT is_favorite WHERE id = ? RETURNING is_favorite",
        )
        .bind(history_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        favorite.ok_or(AgentError::NotFound {
            kind: "Query history entry",
            id: history_id,
        })
    }

    // ---- feedback ----

    pub async fn save_feedback(&self, feedback: &NewFeedback) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO query_feedback
                (connection_id, natural_language, original_sql, corrected_sql, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(feedback.connection_id)
        .bind(&feedback.natural_language)
        .bind(&feedback.original_sql)
        .bind(&feedback.corrected_sql)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.last_insert_rowid())
    }

    pub async fn list_feedback(&self, connection_id: Option<i64>, limit: i64) -> Result<Vec<FeedbackEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM query_feedback
            WHERE (?1 IS NULL OR connection_id = ?1)
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(connection_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter()
            .map(|row| {
                Ok(FeedbackEntry {
                    id: row.try_get("id").map_err(store_error)?,
                    connection_id: row.try_get("connection_id").map_err(store_error)?,
                    natural_language: row.try_get("natural_language").map_err(store_error)?,
                    original_sql: row.try_get("original_sql").map_err(store_error)?,
                    corrected_sql: row.try_get("corrected_sql").map_err(store_error)?,
                    created_at: row.try_get("created_at").map_err(store_error)?,
                })
            })
            .collect()
    }
}

fn descriptor_from_row(row: &SqliteRow) -> Result<ConnectionDescriptor> {
    let id: i64 = row.try_get("id").map_err(store_error)?;
    let db_type: String = row.try_get("db_type").map_err(store_error)?;
    let dialect: Dialect = db_type.parse()?;
    let database: String = row.try_get("database_name").map_err(store_error)?;
    let port: Option<i64> = row.try_get("port").map_err(store_error)?;
    let port = port
        .map(u16::try_from)
        .transpose()
        .map_err(|_| AgentError::Store(format!("Connection {} has an invalid port", id)))?;

    let mut builder = ConnectionDescriptor::builder(id, dialect, database)
        .name(row.try_get::<String, _>("name").map_err(store_error)?)
        .port(port)
        .password_encrypted(row.try_get("password_encrypted").map_err(store_error)?)
        .tls(row.try_get("ssl_enabled").map_err(store_error)?)
        .readonly(row.try_get("is_readonly").map_err(store_error)?);
    if let Some(host) = row.try_get::<Option<String>, _>("host").map_err(store_error)? {
        builder = builder.host(host);
    }
    if let Some(username) = row.try_get::<Option<String>, _>("username").map_err(store_error)? {
        builder = builder.username(username);
    }
    Ok(builder.build())
}

fn history_from_row(row: &SqliteRow) -> Result<HistoryEntry> {
    let status: String = row.try_get("status").map_err(store_error)?;
    Ok(HistoryEntry {
        id: row.try_get("id").map_err(store_error)?,
        connection_id: row.try_get("connection_id").map_err(store_error)?,
        natural_language_query: row.try_get("natural_language_query").map_err(store_error)?,
        generated_sql: row.try_get("generated_sql").map_err(store_error)?,
        executed_at: row.try_get("executed_at").map_err(store_error)?,
        execution_time_ms: row.try_get("execution_time_ms").map_err(store_error)?,
        row_count: row.try_get("row_count").map_err(store_error)?,
        status: status.parse()?,
        error_message: row.try_get("error_message").map_err(store_error)?,
        is_favorite: row.try_get("is_favorite").map_err(store_error)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableInfo;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir, cipher: Option<Arc<CredentialCipher>>) -> RecordStore {
        RecordStore::open(dir.path().join("store.db"), cipher).await.unwrap()
    }

    fn new_connection(password: Option<&str>) -> NewConnection {
        NewConnection {
            name: "warehouse".to_string(),
            dialect: Dialect::Postgres,
            host: Some("pg.local".to_string()),
            port: None,
            database: "sales".to_string(),
            username: Some("app".to_string()),
            password: password.map(String::from),
            tls: true,
            readonly: true,
        }
    }

    fn history(connection_id: i64, sql: &str) -> NewHistoryEntry {
        NewHistoryEntry {
            connection_id,
            natural_language_query: Some("how many".to_string()),
            generated_sql: sql.to_string(),
            execution_time_ms: Some(12),
            row_count: Some(1),
            status: QueryStatus::Success,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_update_connection_keeps_password_unless_given() {
        let dir = TempDir::new().unwrap();
        let cipher = Arc::new(CredentialCipher::new("test-key").unwrap());
        let store = open_store(&dir, Some(cipher.clone())).await;
        let id = store.save_connection(new_connection(Some("hunter2"))).await.unwrap();
        let original = store.get_connection(id).await.unwrap();
        let ciphertext = original.password_encrypted().unwrap().to_string();

        let renamed = store
            .update_connection(
                id,
                &ConnectionUpdate {
                    name: Some("warehouse-eu".to_string()),
                    port: Some(6432),
                    readonly: Some(false),
                    password: Some(String::new()),
                    ..ConnectionUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name(), "warehouse-eu");
        assert_eq!(renamed.port(), Some(6432));
        assert!(!renamed.readonly());
        assert_eq!(renamed.host(), Some("pg.local"));
        assert_eq!(renamed.database(), "sales");
        assert!(renamed.tls());
        assert_eq!(renamed.password_encrypted(), Some(ciphertext.as_str()));

        let rotated = store
            .update_connection(
                id,
                &ConnectionUpdate {
                    password: Some("correct horse".to_string()),
                    ..ConnectionUpdate::default()
                },
            )
            .await
            .unwrap();
        let new_ciphertext = rotated.password_encrypted().unwrap();
        assert_ne!(new_ciphertext, ciphertext);
        assert_eq!(cipher.decrypt(new_ciphertext).unwrap(), "correct horse");
        assert_eq!(rotated.name(), "warehouse-eu");
    }

    #[tokio::test]
    async fn test_update_missing_connection() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, None).await;
        assert!(matches!(
            store.update_connection(42, &ConnectionUpdate::default()).await,
            Err(AgentError::NotFound { id: 42, .. })
        ));

        let id = store.save_connection(new_connection(None)).await.unwrap();
        let update = ConnectionUpdate {
            password: Some("hunter2".to_string()),
            ..ConnectionUpdate::default()
        };
        assert!(matches!(
            store.update_connection(id, &update).await,
            Err(AgentError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_crud_encrypts_password() {
        let dir = TempDir::new().unwrap();
        let cipher = Arc::new(CredentialCipher::new("test-key").unwrap());
        let store = open_store(&dir, Some(cipher.clone())).await;

        let id = store.save_connection(new_connection(Some("hunter2"))).await.unwrap();
        let descriptor = store.get_connection(id).await.unwrap();
        assert_eq!(descriptor.name(), "warehouse");
        assert_eq!(descriptor.dialect(), Dialect::Postgres);
        assert_eq!(descriptor.host(), Some("pg.local"));
        assert_eq!(descriptor.port(), None);
        assert!(descriptor.tls());
        assert!(descriptor.readonly());

        let encrypted = descriptor.password_encrypted().unwrap();
        assert_ne!(encrypted, "hunter2");
        assert_eq!(cipher.decrypt(encrypted).unwrap(), "hunter2");

        assert_eq!(store.list_connections().await.unwrap().len(), 1);
        store.delete_connection(id).await.unwrap();
        assert!(matches!(
            store.get_connection(id).await,
            Err(AgentError::NotFound { id: missing, .. }) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_password_requires_cipher() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, None).await;
        assert!(matches!(
            store.save_connection(new_connection(Some("pw"))).await,
            Err(AgentError::Config(_))
        ));
        assert!(store.save_connection(new_connection(None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_schema_upsert_and_delete_with_connection() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, None).await;
        let id = store.save_connection(new_connection(None)).await.unwrap();

        store
            .put_schema(id, &SchemaSnapshot::new(id, vec![TableInfo::new("a")]))
            .await
            .unwrap();
        store
            .put_schema(id, &SchemaSnapshot::new(id, vec![TableInfo::new("b")]))
            .await
            .unwrap();
        let snapshot = store.get_schema(id).await.unwrap().unwrap();
        assert_eq!(snapshot.table_names(), vec!["b"]);

        store.delete_connection(id).await.unwrap();
        assert!(store.get_schema(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_newest_first_and_favorite() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, None).await;

        store.record_history(&history(1, "SELECT 1")).await.unwrap();
        let second = store.record_history(&history(1, "SELECT 2")).await.unwrap();
        store.record_history(&history(2, "SELECT 3")).await.unwrap();

        let entries = store.list_history(Some(1), DEFAULT_HISTORY_LIMIT).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].generated_sql, "SELECT 2");
        assert_eq!(entries[0].status, QueryStatus::Success);
        assert!(!entries[0].is_favorite);

        assert_eq!(store.list_history(None, 2).await.unwrap().len(), 2);

        assert!(store.toggle_favorite(second).await.unwrap());
        assert!(!store.toggle_favorite(second).await.unwrap());
        assert!(matches!(
            store.toggle_favorite(999).await,
            Err(AgentError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_feedback() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, None).await;
        store
            .save_feedback(&NewFeedback {
                connection_id: 3,
                natural_language: "top customers".to_string(),
                original_sql: "SELECT * FROM customers".to_string(),
                corrected_sql: "SELECT * FROM customers ORDER BY revenue DESC LIMIT 10".to_string(),
            })
            .await
            .unwrap();

        let feedback = store.list_feedback(Some(3), DEFAULT_FEEDBACK_LIMIT).await.unwrap();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].natural_language, "top customers");
        assert!(store.list_feedback(Some(4), DEFAULT_FEEDBACK_LIMIT).await.unwrap().is_empty());
    }
}
