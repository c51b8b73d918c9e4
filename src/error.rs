//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout TriDB.
//! Native driver errors are normalized into this taxonomy at the adapter
//! boundary, so upstream code never inspects backend-specific error shapes.
//!
//! # Error Categories
//! - `Connection`: cannot open, or connection lost (retryable via reconnect)
//! - `Transient`: timeout, lock contention, deadlock (retried once)
//! - `Constraint`: unique/foreign-key/not-null violation (surfaced to caller)
//! - `Unsupported`: operator the active dialect cannot render, or native
//!   syntax error (fatal to the call)
//! - `TransactionState`: begin while active, commit/rollback while idle
//! - `Input`: malformed input or missing required parameters
//! - `Config`: configuration errors
//! - `Backend`: native errors with no taxonomy mapping (never retried)

use thiserror::Error;

/// Main error type for TriDB operations
#[derive(Error, Debug)]
pub enum DbiError {
    /// Cannot open a connection, or an open connection was lost
    #[error("connection error ({backend}): {detail}")]
    Connection { backend: String, detail: String },

    /// Timeout, lock contention, deadlock - worth one retry
    #[error("transient error ({backend}): {detail}")]
    Transient { backend: String, detail: String },

    /// Unique/foreign-key/not-null violation
    #[error("constraint violation ({backend}): {detail}")]
    Constraint { backend: String, detail: String },

    /// Operator or clause the active dialect cannot render, or a native
    /// syntax error
    #[error("unsupported by {backend} dialect: {detail}")]
    Unsupported { backend: String, detail: String },

    /// Begin while a transaction is active, or commit/rollback while idle
    #[error("transaction state error: {0}")]
    TransactionState(String),

    /// Invalid input or missing required parameters
    #[error("invalid input: {0}")]
    Input(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Engine-specific error with no taxonomy mapping
    #[error("backend error ({backend}): {detail}")]
    Backend { backend: String, detail: String },
}

impl DbiError {
    /// Convert error to a stable code string suitable for programmatic
    /// handling.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Transient { .. } => "TRANSIENT_ERROR",
            Self::Constraint { .. } => "CONSTRAINT_VIOLATION",
            Self::Unsupported { .. } => "UNSUPPORTED_OPERATION",
            Self::TransactionState(_) => "TRANSACTION_STATE_ERROR",
            Self::Input(_) => "INVALID_INPUT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Backend { .. } => "BACKEND_ERROR",
        }
    }

    /// Whether the facade may recover by reconnecting and retrying the
    /// single failed operation once.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Transient { .. })
    }

    /// Attach the attempted operation (verb and table) to the error detail.
    ///
    /// The classification is preserved; only the message gains context.
    #[must_use]
    pub fn for_operation(mut self, verb: &str, table: &str) -> Self {
        let prefix = format!("{verb} on table '{table}': ");
        match &mut self {
            Self::Connection { detail, .. }
            | Self::Transient { detail, .. }
            | Self::Constraint { detail, .. }
            | Self::Unsupported { detail, .. }
            | Self::Backend { detail, .. } => {
                detail.insert_str(0, &prefix);
            }
            Self::TransactionState(msg) | Self::Input(msg) | Self::Config(msg) => {
                msg.insert_str(0, &prefix);
            }
        }
        self
    }

    /// Create a connection error
    pub fn connection(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Connection { backend: backend.into(), detail: detail.into() }
    }

    /// Create a transient error
    pub fn transient(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Transient { backend: backend.into(), detail: detail.into() }
    }

    /// Create a constraint violation error
    pub fn constraint(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Constraint { backend: backend.into(), detail: detail.into() }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Unsupported { backend: backend.into(), detail: detail.into() }
    }

    /// Create a transaction state error
    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::TransactionState(message.into())
    }

    /// Create an invalid input error
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a backend catch-all error
    pub fn backend(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Backend { backend: backend.into(), detail: detail.into() }
    }
}

/// Result type alias for TriDB operations
pub type Result<T> = std::result::Result<T, DbiError>;
