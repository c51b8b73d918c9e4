//! Backend Adapters and Core Types
//!
//! This module defines the uniform capability surface every backend adapter
//! provides: {execute, begin, commit, rollback, probe}. The adapters are a
//! fixed set of variants selected once at facade construction; the facade is
//! written against [`Connection`] and never inspects backend-specific types.
//!
//! # Engine Isolation
//! Each engine implementation is completely independent. No shared SQL
//! helpers across engines; shared rendering lives in the dialect translator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::IsolationLevel;
use crate::dialect::{self, RenderedStatement};
use crate::error::{DbiError, Result};

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded file-based engine (`SQLite`)
    Sqlite,
    /// Client/server engine (`PostgreSQL`)
    Postgres,
    /// Client/server engine (MySQL, includes `MariaDB`)
    MySql,
}

impl BackendKind {
    /// Get the backend name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection configuration for database backends
///
/// Contains all parameters needed to establish a connection. Fields are
/// backend-specific (e.g. `file` only applies to `SQLite`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Backend kind
    pub backend: BackendKind,

    /// Hostname (for postgres/mysql)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port number (for postgres/mysql)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Username (for postgres/mysql)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password (for postgres/mysql)
    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database name (for postgres/mysql)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Database file path (for sqlite)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl ConnectionConfig {
    /// Create a new `SQLite` connection config
    #[must_use]
    pub const fn sqlite(file: PathBuf) -> Self {
        Self {
            backend: BackendKind::Sqlite,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            file: Some(file),
        }
    }

    /// Create a new `PostgreSQL` connection config
    #[must_use]
    pub const fn postgres(
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    ) -> Self {
        Self {
            backend: BackendKind::Postgres,
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            database: Some(database),
            file: None,
        }
    }

    /// Create a new MySQL connection config
    #[must_use]
    pub const fn mysql(
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    ) -> Self {
        Self {
            backend: BackendKind::MySql,
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            database: Some(database),
            file: None,
        }
    }
}

/// One result row: field name mapped to a JSON-safe value
pub type Row = HashMap<String, serde_json::Value>;

/// Result of executing one statement: a row set for reads, an affected-row
/// count for writes.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult {
    Rows(Vec<Row>),
    Affected(u64),
}

impl ExecResult {
    /// Row set for reads; empty for writes
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            Self::Affected(_) => Vec::new(),
        }
    }

    /// Affected-row count for writes; 0 for reads
    #[must_use]
    pub fn affected(&self) -> u64 {
        match self {
            Self::Rows(_) => 0,
            Self::Affected(n) => *n,
        }
    }
}

/// Connection lifecycle status.
///
/// Transitions only closed -> open -> {broken, closed}; a broken connection
/// is never reused without an explicit reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Open,
    Broken,
    Closed,
}

/// Transaction boundary state for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Active,
}

/// Native driver handle, one variant per compiled-in engine
enum Native {
    #[cfg(feature = "sqlite")]
    Sqlite(rusqlite::Connection),
    #[cfg(feature = "postgres")]
    Postgres(tokio_postgres::Client),
    #[cfg(feature = "mysql")]
    MySql(mysql_async::Conn),
}

/// One live link to a backend instance.
///
/// Owned by the connection manager; the facade only borrows it for the
/// duration of an operation or holds it inside a [`crate::Transaction`].
pub struct Connection {
    id: u64,
    backend: BackendKind,
    native: Native,
    status: ConnectionStatus,
    tx: TransactionState,
    last_used: Instant,
}

impl Connection {
    /// Open a fresh connection for the given configuration.
    pub(crate) async fn open(id: u64, config: &ConnectionConfig) -> Result<Self> {
        let native = match config.backend {
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite => Native::Sqlite(sqlite::open(config)?),
            #[cfg(feature = "postgres")]
            BackendKind::Postgres => Native::Postgres(postgres::open(config).await?),
            #[cfg(feature = "mysql")]
            BackendKind::MySql => Native::MySql(mysql::open(config).await?),
            #[allow(unreachable_patterns)]
            other => {
                return Err(DbiError::config(format!(
                    "support for backend '{other}' was not compiled in"
                )))
            }
        };

        tracing::info!(id, backend = %config.backend, "connection opened");
        Ok(Self {
            id,
            backend: config.backend,
            native,
            status: ConnectionStatus::Open,
            tx: TransactionState::Idle,
            last_used: Instant::now(),
        })
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.backend
    }

    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        matches!(self.tx, TransactionState::Active)
    }

    /// How long this connection has sat idle since its last use
    #[must_use]
    pub fn idle_for(&self) -> std::time::Duration {
        self.last_used.elapsed()
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub(crate) fn mark_broken(&mut self) {
        if self.status == ConnectionStatus::Open {
            tracing::warn!(id = self.id, backend = %self.backend, "connection marked broken");
        }
        self.status = ConnectionStatus::Broken;
    }

    fn check_open(&self) -> Result<()> {
        match self.status {
            ConnectionStatus::Open => Ok(()),
            ConnectionStatus::Broken => Err(DbiError::connection(
                self.backend.as_str(),
                "connection is broken and must be reconnected",
            )),
            ConnectionStatus::Closed => {
                Err(DbiError::connection(self.backend.as_str(), "connection is closed"))
            }
        }
    }

    /// Execute one rendered statement against the native driver.
    ///
    /// A failure classified as a connection error marks this connection
    /// broken so the manager never pools it again.
    pub async fn execute(&mut self, rendered: &RenderedStatement) -> Result<ExecResult> {
        self.check_open()?;
        self.touch();
        let result = match &mut self.native {
            #[cfg(feature = "sqlite")]
            Native::Sqlite(conn) => sqlite::execute(conn, rendered),
            #[cfg(feature = "postgres")]
            Native::Postgres(client) => postgres::execute(client, rendered).await,
            #[cfg(feature = "mysql")]
            Native::MySql(conn) => mysql::execute(conn, rendered).await,
        };
        self.note_outcome(&result);
        result
    }

    /// Begin a transaction. Nested begin calls are rejected.
    pub async fn begin(&mut self, isolation: IsolationLevel) -> Result<()> {
        self.check_open()?;
        if self.in_transaction() {
            return Err(DbiError::transaction_state(
                "begin while a transaction is already active",
            ));
        }
        for sql in dialect::begin_sql(self.backend, isolation) {
            self.run_batch(&sql).await?;
        }
        self.tx = TransactionState::Active;
        tracing::debug!(id = self.id, backend = %self.backend, "transaction begun");
        Ok(())
    }

    /// Commit the active transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.in_transaction() {
            return Err(DbiError::transaction_state("commit outside of an active transaction"));
        }
        self.run_batch("COMMIT").await?;
        self.tx = TransactionState::Idle;
        tracing::debug!(id = self.id, backend = %self.backend, "transaction committed");
        Ok(())
    }

    /// Roll back the active transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.in_transaction() {
            return Err(DbiError::transaction_state("rollback outside of an active transaction"));
        }
        self.run_batch("ROLLBACK").await?;
        self.tx = TransactionState::Idle;
        tracing::debug!(id = self.id, backend = %self.backend, "transaction rolled back");
        Ok(())
    }

    /// Cheap no-op health check. A failure marks the connection broken.
    pub async fn probe(&mut self) -> Result<()> {
        self.check_open()?;
        let result = match &mut self.native {
            #[cfg(feature = "sqlite")]
            Native::Sqlite(conn) => sqlite::probe(conn),
            #[cfg(feature = "postgres")]
            Native::Postgres(client) => postgres::probe(client).await,
            #[cfg(feature = "mysql")]
            Native::MySql(conn) => mysql::probe(conn).await,
        };
        if result.is_err() {
            self.mark_broken();
        }
        result
    }

    /// Close the connection and release its native handle.
    pub(crate) async fn close(mut self) {
        self.status = ConnectionStatus::Closed;
        self.tx = TransactionState::Idle;
        tracing::debug!(id = self.id, backend = %self.backend, "connection closed");
        match self.native {
            // MySQL wants an explicit disconnect handshake; a close failure
            // only costs us the handshake, the socket goes away regardless
            #[cfg(feature = "mysql")]
            Native::MySql(conn) => {
                if let Err(err) = mysql::close(conn).await {
                    tracing::debug!(error = %err, "mysql disconnect failed");
                }
            }
            // Dropping the native handle closes sqlite and postgres
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }

    async fn run_batch(&mut self, sql: &str) -> Result<()> {
        let result = match &mut self.native {
            #[cfg(feature = "sqlite")]
            Native::Sqlite(conn) => sqlite::run_batch(conn, sql),
            #[cfg(feature = "postgres")]
            Native::Postgres(client) => postgres::run_batch(client, sql).await,
            #[cfg(feature = "mysql")]
            Native::MySql(conn) => mysql::run_batch(conn, sql).await,
        };
        self.note_outcome(&result);
        result
    }

    fn note_outcome<T>(&mut self, result: &Result<T>) {
        if let Err(DbiError::Connection { .. }) = result {
            self.mark_broken();
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("backend", &self.backend)
            .field("status", &self.status)
            .field("tx", &self.tx)
            .finish_non_exhaustive()
    }
}
