//! DBI Facade
//!
//! The single entry point callers use. A [`Dbi`] is constructed once for one
//! configured backend and dispatches every operation through the connection
//! manager, the dialect translator, and the matching backend adapter. No
//! process-wide singleton: each facade owns its configuration and pool.
//!
//! # Operation Pipeline
//! 1. build a backend-neutral statement description
//! 2. render it for the configured backend
//! 3. acquire a connection (or reuse the transaction's)
//! 4. execute via the adapter
//! 5. on a retryable failure outside a transaction, reconnect and retry the
//!    single operation once
//! 6. release the connection

use crate::config::DbiSettings;
use crate::dialect;
use crate::engine::{BackendKind, Connection, ConnectionConfig, ExecResult, Row};
use crate::error::{DbiError, Result};
use crate::pool::ConnectionManager;
use crate::statement::{OrderKey, Predicate, SqlValue, Statement};

/// Ordering and pagination options for `select`
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub order: Vec<OrderKey>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectOptions {
    #[must_use]
    pub fn order_by(mut self, key: OrderKey) -> Self {
        self.order.push(key);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// The caller-facing database interface for one configured backend
pub struct Dbi {
    manager: ConnectionManager,
    settings: DbiSettings,
    prefix: String,
}

impl Dbi {
    /// Construct a facade for the given backend configuration and settings.
    ///
    /// Configuration is read-only from here on; to pick up changed settings,
    /// construct a fresh facade.
    #[must_use]
    pub fn new(config: ConnectionConfig, settings: DbiSettings) -> Self {
        let prefix = settings.normalized_prefix();
        Self { manager: ConnectionManager::new(config, settings.clone()), settings, prefix }
    }

    /// Construct a facade with default settings
    #[must_use]
    pub fn with_defaults(config: ConnectionConfig) -> Self {
        Self::new(config, DbiSettings::default())
    }

    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.manager.config().backend
    }

    /// Retrieve rows from `table`. An empty column list selects all columns.
    pub async fn select(
        &self,
        table: &str,
        columns: &[&str],
        predicate: Option<Predicate>,
        options: SelectOptions,
    ) -> Result<Vec<Row>> {
        let stmt = self.build_select(table, columns, predicate, options);
        Ok(self.run(stmt).await?.into_rows())
    }

    /// Insert one row; returns the affected-row count
    pub async fn insert(&self, table: &str, values: &[(&str, SqlValue)]) -> Result<u64> {
        let stmt = Statement::Insert { table: self.qualify(table), values: own_values(values) };
        Ok(self.run(stmt).await?.affected())
    }

    /// Update rows matching `predicate`; returns the affected-row count
    pub async fn update(
        &self,
        table: &str,
        values: &[(&str, SqlValue)],
        predicate: Option<Predicate>,
    ) -> Result<u64> {
        let stmt = Statement::Update {
            table: self.qualify(table),
            values: own_values(values),
            predicate,
        };
        Ok(self.run(stmt).await?.affected())
    }

    /// Delete rows matching `predicate`; returns the affected-row count
    pub async fn delete(&self, table: &str, predicate: Option<Predicate>) -> Result<u64> {
        let stmt = Statement::Delete { table: self.qualify(table), predicate };
        Ok(self.run(stmt).await?.affected())
    }

    /// Begin a transaction on a dedicated connection.
    ///
    /// The returned [`Transaction`] runs all of its operations on that one
    /// connection, so they share a single isolation scope. Dropping it
    /// without calling [`Transaction::commit`] guarantees rollback.
    pub async fn begin(&self) -> Result<Transaction<'_>> {
        let mut conn = self.manager.acquire().await?;
        if let Err(err) = conn.begin(self.settings.isolation).await {
            self.manager.release(conn).await;
            return Err(err);
        }
        Ok(Transaction { dbi: self, conn: Some(conn) })
    }

    /// Close every idle pooled connection. The facade remains usable; the
    /// next operation simply opens a fresh connection.
    pub async fn close(&self) {
        self.manager.close_all().await;
    }

    /// Number of idle pooled connections
    #[must_use]
    pub fn idle_connections(&self) -> usize {
        self.manager.idle_count()
    }

    /// Apply the configured table prefix. A leading `@` suppresses
    /// prefixing and is stripped; names already prefixed pass through.
    fn qualify(&self, table: &str) -> String {
        if let Some(stripped) = table.strip_prefix('@') {
            return stripped.to_string();
        }
        if self.prefix.is_empty() || table.starts_with(&self.prefix) {
            return table.to_string();
        }
        format!("{}{table}", self.prefix)
    }

    fn build_select(
        &self,
        table: &str,
        columns: &[&str],
        predicate: Option<Predicate>,
        options: SelectOptions,
    ) -> Statement {
        Statement::Select {
            table: self.qualify(table),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            predicate,
            order: options.order,
            limit: options.limit,
            offset: options.offset,
        }
    }

    /// Acquire, execute with a single reconnect-and-retry on retryable
    /// failure, release.
    async fn run(&self, stmt: Statement) -> Result<ExecResult> {
        let rendered = dialect::render(&stmt, self.backend())
            .map_err(|e| e.for_operation(stmt.verb(), stmt.table()))?;

        let mut conn = self
            .manager
            .acquire()
            .await
            .map_err(|e| e.for_operation(stmt.verb(), stmt.table()))?;

        let result = match conn.execute(&rendered).await {
            Err(err) if err.is_retryable() => {
                tracing::warn!(
                    verb = stmt.verb(),
                    table = stmt.table(),
                    backend = %self.backend(),
                    error = %err,
                    "operation failed, reconnecting for single retry"
                );
                conn = self
                    .manager
                    .reconnect(conn)
                    .await
                    .map_err(|e| e.for_operation(stmt.verb(), stmt.table()))?;
                conn.execute(&rendered).await
            }
            other => other,
        };

        self.manager.release(conn).await;
        result.map_err(|e| e.for_operation(stmt.verb(), stmt.table()))
    }
}

impl std::fmt::Debug for Dbi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dbi")
            .field("backend", &self.backend())
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// A transaction scope bound to one connection.
///
/// All operations observe the same connection and isolation scope. The
/// scope ends in exactly one of three ways: [`commit`](Self::commit),
/// [`rollback`](Self::rollback), or drop - and drop always rolls back, so
/// no exit path can leave writes half-applied.
pub struct Transaction<'a> {
    dbi: &'a Dbi,
    conn: Option<Connection>,
}

impl Transaction<'_> {
    pub async fn select(
        &mut self,
        table: &str,
        columns: &[&str],
        predicate: Option<Predicate>,
        options: SelectOptions,
    ) -> Result<Vec<Row>> {
        let stmt = self.dbi.build_select(table, columns, predicate, options);
        Ok(self.run(stmt).await?.into_rows())
    }

    pub async fn insert(&mut self, table: &str, values: &[(&str, SqlValue)]) -> Result<u64> {
        let stmt =
            Statement::Insert { table: self.dbi.qualify(table), values: own_values(values) };
        Ok(self.run(stmt).await?.affected())
    }

    pub async fn update(
        &mut self,
        table: &str,
        values: &[(&str, SqlValue)],
        predicate: Option<Predicate>,
    ) -> Result<u64> {
        let stmt = Statement::Update {
            table: self.dbi.qualify(table),
            values: own_values(values),
            predicate,
        };
        Ok(self.run(stmt).await?.affected())
    }

    pub async fn delete(&mut self, table: &str, predicate: Option<Predicate>) -> Result<u64> {
        let stmt = Statement::Delete { table: self.dbi.qualify(table), predicate };
        Ok(self.run(stmt).await?.affected())
    }

    /// Commit and end the scope, returning the connection to the pool
    pub async fn commit(mut self) -> Result<()> {
        let mut conn = self.take_conn()?;
        let result = conn.commit().await;
        self.dbi.manager.release(conn).await;
        result
    }

    /// Roll back and end the scope, returning the connection to the pool
    pub async fn rollback(mut self) -> Result<()> {
        let mut conn = self.take_conn()?;
        let result = conn.rollback().await;
        self.dbi.manager.release(conn).await;
        result
    }

    /// Operations within the transaction reuse its connection and are never
    /// retried: a reconnect would silently discard the writes already made
    /// in this scope.
    async fn run(&mut self, stmt: Statement) -> Result<ExecResult> {
        let rendered = dialect::render(&stmt, self.dbi.backend())
            .map_err(|e| e.for_operation(stmt.verb(), stmt.table()))?;

        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DbiError::transaction_state("transaction already finished"))?;

        conn.execute(&rendered)
            .await
            .map_err(|e| e.for_operation(stmt.verb(), stmt.table()))
    }

    fn take_conn(&mut self) -> Result<Connection> {
        self.conn
            .take()
            .ok_or_else(|| DbiError::transaction_state("transaction already finished"))
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Dropping the native handle closes the link; the engine rolls
            // back whatever the scope left open. The connection is not
            // returned to the pool.
            tracing::warn!(
                id = conn.id(),
                backend = %conn.backend(),
                "transaction dropped without commit or rollback, discarding connection"
            );
            drop(conn);
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("backend", &self.dbi.backend())
            .field("finished", &self.conn.is_none())
            .finish()
    }
}

fn own_values(values: &[(&str, SqlValue)]) -> Vec<(String, SqlValue)> {
    values.iter().map(|(column, value)| ((*column).to_string(), value.clone())).collect()
}
