//! # tridb
//!
//! A uniform database interface over three relational engines: `SQLite`
//! (embedded, file-based), `PostgreSQL`, and MySQL/`MariaDB` (client/server).
//! Callers describe operations once, backend-neutrally; the crate renders
//! the correct dialect, manages pooled connections with health probing and
//! reconnect, and maps every failure into one small error taxonomy.
//!
//! ## Architecture
//!
//! - **Facade** ([`Dbi`]): the single entry point. CRUD operations plus
//!   scoped transactions, one facade per configured backend.
//! - **Dialect translator** ([`dialect`]): deterministic rendering of
//!   backend-neutral statements into engine-specific SQL with bound
//!   placeholders. Values never appear in SQL text.
//! - **Connection manager** ([`ConnectionManager`]): lazy opens, idle
//!   pooling, staleness probes, reconnect with bounded backoff.
//! - **Backend adapters** ([`engine`]): one module per engine, each the
//!   only place its native driver is touched. No shared SQL helpers
//!   across engines.
//!
//! ## Example
//!
//! ```no_run
//! use tridb::{ConnectionConfig, Dbi, Predicate, SelectOptions};
//!
//! # async fn demo() -> tridb::Result<()> {
//! let dbi = Dbi::with_defaults(ConnectionConfig::sqlite("app.db".into()));
//!
//! dbi.insert("users", &[("id", 1.into()), ("name", "ada".into())]).await?;
//!
//! let rows = dbi
//!     .select("users", &["id", "name"], Some(Predicate::eq("id", 1)), SelectOptions::default())
//!     .await?;
//! assert_eq!(rows.len(), 1);
//!
//! let mut tx = dbi.begin().await?;
//! tx.update("users", &[("name", "lovelace".into())], Some(Predicate::eq("id", 1))).await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(not(any(feature = "sqlite", feature = "postgres", feature = "mysql")))]
compile_error!("at least one engine feature must be enabled: sqlite, postgres, or mysql");

pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod facade;
pub mod pool;
pub mod statement;

pub use config::{DbiSettings, IsolationLevel};
pub use dialect::{render, RenderedStatement};
pub use engine::{BackendKind, Connection, ConnectionConfig, ConnectionStatus, ExecResult, Row};
pub use error::{DbiError, Result};
pub use facade::{Dbi, SelectOptions, Transaction};
pub use pool::ConnectionManager;
pub use statement::{CompareOp, OrderKey, Predicate, SortDirection, SqlValue, Statement};
