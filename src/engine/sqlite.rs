//! `SQLite` Backend Adapter
//!
//! Translates the uniform operation contract into `rusqlite` calls and
//! normalizes `rusqlite` errors into the shared taxonomy.
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver, no async needed)
//! - File-based (`/path/to/db.sqlite`) and in-memory (`:memory:`) databases
//! - BLOB data is Base64-encoded for JSON safety
//! - Busy/locked conditions surface as transient errors

use rusqlite::{Connection, OpenFlags};

use crate::dialect::RenderedStatement;
use crate::engine::{ConnectionConfig, ExecResult, Row};
use crate::error::{DbiError, Result};
use crate::statement::SqlValue;

const BACKEND: &str = "sqlite";

/// Open the database file named by the config, creating it if absent
pub(crate) fn open(config: &ConnectionConfig) -> Result<Connection> {
    let file = config
        .file
        .as_ref()
        .ok_or_else(|| DbiError::input("sqlite requires 'file' parameter"))?;
    let path = file
        .to_str()
        .ok_or_else(|| DbiError::input("sqlite file path contains invalid UTF-8 characters"))?;

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    Connection::open_with_flags(path, flags)
        .map_err(|e| DbiError::connection(BACKEND, e.to_string()))
}

pub(crate) fn execute(conn: &Connection, rendered: &RenderedStatement) -> Result<ExecResult> {
    let mut stmt = conn.prepare(&rendered.sql).map_err(normalize)?;
    let params = rusqlite::params_from_iter(rendered.params.iter().map(to_native));

    if rendered.returns_rows {
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| (*s).to_string()).collect();

        let mut rows = stmt.query(params).map_err(normalize)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(normalize)? {
            let mut map = Row::with_capacity(column_names.len());
            for (idx, name) in column_names.iter().enumerate() {
                map.insert(name.clone(), value_to_json(row, idx).map_err(normalize)?);
            }
            out.push(map);
        }
        Ok(ExecResult::Rows(out))
    } else {
        let affected = stmt.execute(params).map_err(normalize)?;
        Ok(ExecResult::Affected(affected as u64))
    }
}

pub(crate) fn run_batch(conn: &Connection, sql: &str) -> Result<()> {
    conn.execute_batch(sql).map_err(normalize)
}

/// Cheap no-op query used as the health probe
pub(crate) fn probe(conn: &Connection) -> Result<()> {
    conn.query_row("SELECT 1", [], |_| Ok(())).map_err(|e| {
        DbiError::connection(BACKEND, format!("health probe failed: {e}"))
    })
}

fn to_native(value: &SqlValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match value {
        SqlValue::Null => Value::Null,
        // SQLite has no boolean storage class
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

/// Convert one `SQLite` column value to a JSON value
fn value_to_json(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> std::result::Result<serde_json::Value, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    Ok(match row.get_ref(idx)? {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number), // Handle NaN/Infinity as null
        ValueRef::Text(s) => {
            let text = std::str::from_utf8(s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            serde_json::Value::String(text.to_string())
        }
        ValueRef::Blob(b) => {
            // Encode BLOB as Base64 for JSON safety
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(b);
            serde_json::Value::String(encoded)
        }
    })
}

/// Map a `rusqlite` error into the shared taxonomy
fn normalize(e: rusqlite::Error) -> DbiError {
    use rusqlite::ErrorCode;

    if let rusqlite::Error::SqliteFailure(code, message) = &e {
        let detail = message.clone().unwrap_or_else(|| e.to_string());
        return match code.code {
            ErrorCode::ConstraintViolation => DbiError::constraint(BACKEND, detail),
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                DbiError::transient(BACKEND, detail)
            }
            ErrorCode::CannotOpen | ErrorCode::NotADatabase => {
                DbiError::connection(BACKEND, detail)
            }
            _ if detail.contains("syntax error") => DbiError::unsupported(BACKEND, detail),
            _ => DbiError::backend(BACKEND, detail),
        };
    }
    DbiError::backend(BACKEND, e.to_string())
}
