//! Connection descriptors for external databases.
//!
//! A descriptor is built once (from the record store or the CLI) and never
//! mutated afterwards. Its dialect picks the adapter for its whole lifetime.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Mysql,
    Mssql,
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
            Dialect::Mssql => "mssql",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::Mysql),
            "mssql" | "sqlserver" => Ok(Dialect::Mssql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(AgentError::UnsupportedDialect(other.to_string())),
        }
    }
}

/// Access parameters for one external database.
///
/// `password_encrypted` is the opaque ciphertext produced by
/// [`crate::crypto::CredentialCipher`]; plaintext is only materialised while an
/// endpoint is being built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    id: i64,
    name: String,
    dialect: Dialect,
    host: Option<String>,
    port: Option<u16>,
    database: String,
    username: Option<String>,
    password_encrypted: Option<String>,
    tls: bool,
    readonly: bool,
}

impl ConnectionDescriptor {
    pub fn builder(id: i64, dialect: Dialect, database: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder {
            inner: ConnectionDescriptor {
                id,
                name: format!("connection-{}", id),
                dialect,
                host: None,
                port: None,
                database: database.into(),
                username: None,
                password_encrypted: None,
                tls: false,
                readonly: true,
            },
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Database name, or the file path for SQLite.
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password_encrypted(&self) -> Option<&str> {
        self.password_encrypted.as_deref()
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }
}

/// Builder that fixes the dialect at construction; the finished descriptor has no setters.
pub struct DescriptorBuilder {
    inner: ConnectionDescriptor,
}

impl DescriptorBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = name.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.inner.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: Option<u16>) -> Self {
        self.inner.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.inner.username = Some(username.into());
        self
    }

    pub fn password_encrypted(mut self, ciphertext: Option<String>) -> Self {
        self.inner.password_encrypted = ciphertext;
        self
    }

    pub fn tls(mut self, tls: bool) -> Self {
        self.inner.tls = tls;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.inner.readonly = readonly;
        self
    }

    pub fn build(self) -> ConnectionDescriptor {
        self.inner
    }
}

/// Parameters for registering a new connection; the password is plaintext
/// here and is encrypted before it reaches the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConnection {
    pub name: String,
    pub dialect: Dialect,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub tls: bool,
    #[serde(default = "default_readonly")]
    pub readonly: bool,
}

fn default_readonly() -> bool {
    true
}

/// Partial edit of a saved connection. `None` keeps the stored value; a
/// missing or empty password keeps the stored ciphertext.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    pub name: Option<String>,
    pub dialect: Option<Dialect>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: Option<bool>,
    pub readonly: Option<bool>,
}
