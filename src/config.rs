//! Facade Configuration
//!
//! Tuning knobs consumed at facade construction: pool size, reconnect
//! budget and backoff, idle staleness threshold, transaction isolation, and
//! the optional table prefix. The facade never reloads these mid-operation;
//! live reload means constructing a fresh facade.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transaction isolation level requested on `begin`
///
/// `SQLite` transactions are always serializable, so the level only affects
/// the client/server backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// The SQL spelling shared by the two client/server dialects
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl Default for IsolationLevel {
    fn default() -> Self {
        Self::ReadCommitted
    }
}

/// Facade settings, supplied read-only at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbiSettings {
    /// Maximum idle connections kept for reuse; 0 disables pooling and
    /// every release closes the connection
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Attempts per reconnect before giving up with a connection error
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    /// Base backoff between reconnect attempts; doubles per attempt
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// Idle age beyond which a pooled connection is health-probed before
    /// being handed out
    #[serde(default = "default_idle_staleness_ms")]
    pub idle_staleness_ms: u64,

    /// Isolation level requested on `begin`
    #[serde(default)]
    pub isolation: IsolationLevel,

    /// Prefix applied to table names. A leading `@` on a table name
    /// suppresses prefixing and is stripped; names already carrying the
    /// prefix pass through unchanged.
    #[serde(default)]
    pub table_prefix: String,
}

const fn default_pool_size() -> usize {
    4
}

const fn default_reconnect_attempts() -> u32 {
    3
}

const fn default_reconnect_backoff_ms() -> u64 {
    100
}

const fn default_idle_staleness_ms() -> u64 {
    30_000
}

impl Default for DbiSettings {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            idle_staleness_ms: default_idle_staleness_ms(),
            isolation: IsolationLevel::default(),
            table_prefix: String::new(),
        }
    }
}

impl DbiSettings {
    #[must_use]
    pub const fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    #[must_use]
    pub const fn idle_staleness(&self) -> Duration {
        Duration::from_millis(self.idle_staleness_ms)
    }

    /// Normalized table prefix: empty stays empty, anything else ends with
    /// exactly one `_`.
    #[must_use]
    pub fn normalized_prefix(&self) -> String {
        if self.table_prefix.is_empty() {
            String::new()
        } else {
            format!("{}_", self.table_prefix.trim_end_matches('_'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DbiSettings::default();
        assert_eq!(settings.pool_size, 4);
        assert_eq!(settings.reconnect_attempts, 3);
        assert_eq!(settings.reconnect_backoff(), Duration::from_millis(100));
        assert_eq!(settings.idle_staleness(), Duration::from_secs(30));
        assert_eq!(settings.isolation, IsolationLevel::ReadCommitted);
        assert!(settings.table_prefix.is_empty());
    }

    #[test]
    fn test_deserialize_partial() {
        let settings: DbiSettings =
            serde_json::from_str(r#"{"pool_size": 0, "isolation": "serializable"}"#).unwrap();
        assert_eq!(settings.pool_size, 0);
        assert_eq!(settings.isolation, IsolationLevel::Serializable);
        assert_eq!(settings.reconnect_attempts, 3);
    }

    #[test]
    fn test_prefix_normalization() {
        let mut settings = DbiSettings::default();
        assert_eq!(settings.normalized_prefix(), "");

        settings.table_prefix = "crawl".to_string();
        assert_eq!(settings.normalized_prefix(), "crawl_");

        settings.table_prefix = "crawl_".to_string();
        assert_eq!(settings.normalized_prefix(), "crawl_");
    }

    #[test]
    fn test_isolation_sql() {
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }
}
