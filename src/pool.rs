//! Connection Manager
//!
//! Owns the lifecycle of connections to one configured backend: lazy open,
//! idle pooling, staleness health-probing, reconnect with bounded backoff,
//! and scoped close.
//!
//! The idle pool is the only shared mutable state in the crate. The lock is
//! held solely to push/pop a connection; all I/O (open, probe, close)
//! happens outside it, so concurrent callers never serialize on the network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::DbiSettings;
use crate::engine::{Connection, ConnectionConfig, ConnectionStatus};
use crate::error::{DbiError, Result};

pub struct ConnectionManager {
    config: ConnectionConfig,
    settings: DbiSettings,
    idle: Mutex<Vec<Connection>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(config: ConnectionConfig, settings: DbiSettings) -> Self {
        Self { config, settings, idle: Mutex::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Hand out a live connection, reusing an idle one when possible.
    ///
    /// A pooled connection idle past the staleness threshold is probed
    /// first; a failed probe discards it and falls through to a fresh open
    /// instead of surfacing the probe failure.
    pub async fn acquire(&self) -> Result<Connection> {
        loop {
            let candidate = lock(&self.idle).pop();
            let Some(mut conn) = candidate else { break };

            if conn.status() != ConnectionStatus::Open {
                conn.close().await;
                continue;
            }

            if conn.idle_for() >= self.settings.idle_staleness()
                && conn.probe().await.is_err()
            {
                tracing::warn!(
                    id = conn.id(),
                    backend = %self.config.backend,
                    "stale pooled connection failed probe, discarding"
                );
                conn.close().await;
                continue;
            }

            conn.touch();
            return Ok(conn);
        }

        self.open_with_retry().await
    }

    /// Return a connection to the idle pool, or close it when the pool is
    /// full or disabled.
    ///
    /// Connections that are broken or still inside a transaction are never
    /// pooled; closing them makes the server (or file engine) roll back
    /// whatever was left open.
    pub async fn release(&self, mut conn: Connection) {
        if conn.status() != ConnectionStatus::Open || conn.in_transaction() {
            if conn.in_transaction() {
                tracing::warn!(
                    id = conn.id(),
                    backend = %self.config.backend,
                    "connection released with open transaction, discarding"
                );
            }
            conn.close().await;
            return;
        }

        if self.settings.pool_size > 0 {
            let mut idle = lock(&self.idle);
            if idle.len() < self.settings.pool_size {
                conn.touch();
                idle.push(conn);
                return;
            }
        }

        conn.close().await;
    }

    /// Close a broken connection and open a fresh one with the same
    /// configuration, retrying up to the configured budget.
    pub async fn reconnect(&self, conn: Connection) -> Result<Connection> {
        tracing::info!(
            id = conn.id(),
            backend = %self.config.backend,
            "reconnecting broken connection"
        );
        conn.close().await;
        self.open_with_retry().await
    }

    /// Close every idle connection
    pub async fn close_all(&self) {
        let drained: Vec<Connection> = lock(&self.idle).drain(..).collect();
        for conn in drained {
            conn.close().await;
        }
    }

    /// Number of idle connections currently pooled
    #[must_use]
    pub fn idle_count(&self) -> usize {
        lock(&self.idle).len()
    }

    /// Open with bounded exponential backoff. Only retryable failures
    /// consume the budget; input and configuration errors fail immediately.
    async fn open_with_retry(&self) -> Result<Connection> {
        let attempts = self.settings.reconnect_attempts.max(1);
        let mut backoff = self.settings.reconnect_backoff();
        let mut last_err = None;

        for attempt in 1..=attempts {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            match Connection::open(id, &self.config).await {
                Ok(conn) => return Ok(conn),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        attempt,
                        attempts,
                        backend = %self.config.backend,
                        error = %err,
                        "connection attempt failed"
                    );
                    last_err = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            DbiError::connection(self.config.backend.as_str(), "connection retry budget exhausted")
        }))
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("backend", &self.config.backend)
            .field("pool_size", &self.settings.pool_size)
            .field("idle", &self.idle_count())
            .finish_non_exhaustive()
    }
}

// Poisoning only happens if a panic unwound mid push/pop; the Vec is still
// structurally sound, so recover the guard.
fn lock(m: &Mutex<Vec<Connection>>) -> MutexGuard<'_, Vec<Connection>> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_db(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn manager(path: PathBuf, settings: DbiSettings) -> ConnectionManager {
        ConnectionManager::new(ConnectionConfig::sqlite(path), settings)
    }

    #[tokio::test]
    async fn test_acquire_release_reuses_connection() {
        let mgr = manager(temp_db("pool_reuse.db"), DbiSettings::default());

        let conn = mgr.acquire().await.expect("acquire");
        let first_id = conn.id();
        mgr.release(conn).await;
        assert_eq!(mgr.idle_count(), 1);

        let conn = mgr.acquire().await.expect("acquire again");
        assert_eq!(conn.id(), first_id);
        mgr.release(conn).await;
        mgr.close_all().await;
        assert_eq!(mgr.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_pool_disabled_closes_on_release() {
        let settings = DbiSettings { pool_size: 0, ..DbiSettings::default() };
        let mgr = manager(temp_db("pool_disabled.db"), settings);

        let conn = mgr.acquire().await.expect("acquire");
        mgr.release(conn).await;
        assert_eq!(mgr.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_broken_connection_never_pooled() {
        let mgr = manager(temp_db("pool_broken.db"), DbiSettings::default());

        let mut conn = mgr.acquire().await.expect("acquire");
        let broken_id = conn.id();
        conn.mark_broken();
        mgr.release(conn).await;
        assert_eq!(mgr.idle_count(), 0);

        // A subsequent acquire returns a freshly opened connection
        let conn = mgr.acquire().await.expect("acquire fresh");
        assert_ne!(conn.id(), broken_id);
        assert_eq!(conn.status(), ConnectionStatus::Open);
        mgr.release(conn).await;
    }

    #[tokio::test]
    async fn test_connection_with_open_transaction_not_pooled() {
        let mgr = manager(temp_db("pool_tx.db"), DbiSettings::default());

        let mut conn = mgr.acquire().await.expect("acquire");
        conn.begin(crate::config::IsolationLevel::default()).await.expect("begin");
        mgr.release(conn).await;
        assert_eq!(mgr.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion() {
        let settings = DbiSettings {
            reconnect_attempts: 2,
            reconnect_backoff_ms: 1,
            ..DbiSettings::default()
        };
        let mgr = manager(PathBuf::from("/nonexistent-dir/zzz/db.sqlite"), settings);

        let err = mgr.acquire().await.unwrap_err();
        assert_eq!(err.error_code(), "CONNECTION_ERROR");
    }

    #[tokio::test]
    async fn test_stale_connection_probed_before_reuse() {
        // Zero staleness forces a probe on every pooled handout
        let settings = DbiSettings { idle_staleness_ms: 0, ..DbiSettings::default() };
        let mgr = manager(temp_db("pool_stale.db"), settings);

        let conn = mgr.acquire().await.expect("acquire");
        let id = conn.id();
        mgr.release(conn).await;

        // Probe passes on a healthy sqlite connection, so it is reused
        let conn = mgr.acquire().await.expect("acquire stale");
        assert_eq!(conn.id(), id);
        mgr.release(conn).await;
    }

    #[tokio::test]
    async fn test_reconnect_yields_fresh_connection() {
        let mgr = manager(temp_db("pool_reconnect.db"), DbiSettings::default());

        let mut conn = mgr.acquire().await.expect("acquire");
        let old_id = conn.id();
        conn.mark_broken();

        let conn = mgr.reconnect(conn).await.expect("reconnect");
        assert_ne!(conn.id(), old_id);
        assert_eq!(conn.status(), ConnectionStatus::Open);
        mgr.release(conn).await;
    }
}
