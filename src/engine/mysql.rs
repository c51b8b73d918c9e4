//! MySQL Backend Adapter
//!
//! Translates the uniform operation contract into `mysql_async` calls and
//! normalizes server error codes into the shared taxonomy.
//!
//! # Implementation Notes
//! - Uses `mysql_async` (async driver, requires tokio runtime)
//! - MySQL and `MariaDB` are both supported
//! - Text/BLOB values travel as bytes; binary data is Base64-encoded on the
//!   way out for JSON safety
//! - Lock wait timeouts and deadlocks surface as transient errors

use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Params, Value};

use crate::dialect::RenderedStatement;
use crate::engine::{ConnectionConfig, ExecResult, Row};
use crate::error::{DbiError, Result};
use crate::statement::SqlValue;

const BACKEND: &str = "mysql";

// Server error codes worth classifying. See the MySQL error reference.
const ER_DUP_ENTRY: u16 = 1062;
const ER_BAD_NULL: u16 = 1048;
const ER_ROW_IS_REFERENCED: u16 = 1451;
const ER_NO_REFERENCED_ROW: u16 = 1452;
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;
const ER_PARSE_ERROR: u16 = 1064;

pub(crate) async fn open(config: &ConnectionConfig) -> Result<Conn> {
    let opts = build_opts(config)?;
    Conn::new(opts).await.map_err(|e| DbiError::connection(BACKEND, e.to_string()))
}

fn build_opts(config: &ConnectionConfig) -> Result<OptsBuilder> {
    let host = config
        .host
        .as_ref()
        .ok_or_else(|| DbiError::input("mysql requires 'host' parameter"))?;
    let port = config
        .port
        .ok_or_else(|| DbiError::input("mysql requires 'port' parameter"))?;
    let user = config
        .user
        .as_ref()
        .ok_or_else(|| DbiError::input("mysql requires 'user' parameter"))?;
    let password = config
        .password
        .as_ref()
        .ok_or_else(|| DbiError::input("mysql requires 'password' parameter"))?;
    let database = config
        .database
        .as_ref()
        .ok_or_else(|| DbiError::input("mysql requires 'database' parameter"))?;

    Ok(OptsBuilder::default()
        .ip_or_hostname(host)
        .tcp_port(port)
        .user(Some(user))
        .pass(Some(password))
        .db_name(Some(database)))
}

pub(crate) async fn execute(conn: &mut Conn, rendered: &RenderedStatement) -> Result<ExecResult> {
    let params = to_params(&rendered.params);

    if rendered.returns_rows {
        let rows: Vec<mysql_async::Row> =
            conn.exec(rendered.sql.as_str(), params).await.map_err(normalize)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(row_to_map(row)?);
        }
        Ok(ExecResult::Rows(out))
    } else {
        let result =
            conn.exec_iter(rendered.sql.as_str(), params).await.map_err(normalize)?;
        let affected = result.affected_rows();
        result.drop_result().await.map_err(normalize)?;
        Ok(ExecResult::Affected(affected))
    }
}

pub(crate) async fn run_batch(conn: &mut Conn, sql: &str) -> Result<()> {
    conn.query_drop(sql).await.map_err(normalize)
}

/// Cheap no-op query used as the health probe
pub(crate) async fn probe(conn: &mut Conn) -> Result<()> {
    conn.query_drop("SELECT 1")
        .await
        .map_err(|e| DbiError::connection(BACKEND, format!("health probe failed: {e}")))
}

/// MySQL wants an explicit disconnect handshake
pub(crate) async fn close(conn: Conn) -> Result<()> {
    conn.disconnect().await.map_err(normalize)
}

fn to_params(values: &[SqlValue]) -> Params {
    if values.is_empty() {
        return Params::Empty;
    }
    Params::Positional(values.iter().map(to_native).collect())
}

fn to_native(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::Integer(i) => Value::Int(*i),
        SqlValue::Real(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
        SqlValue::Blob(b) => Value::Bytes(b.clone()),
    }
}

fn row_to_map(row: &mysql_async::Row) -> Result<Row> {
    let mut map = Row::with_capacity(row.columns_ref().len());
    for (idx, column) in row.columns_ref().iter().enumerate() {
        map.insert(column.name_str().to_string(), value_to_json(row, idx)?);
    }
    Ok(map)
}

/// Convert one MySQL value to a JSON value
fn value_to_json(row: &mysql_async::Row, idx: usize) -> Result<serde_json::Value> {
    let value = row
        .as_ref(idx)
        .ok_or_else(|| DbiError::backend(BACKEND, format!("missing value at index {idx}")))?;

    let json_value = match value {
        Value::NULL => serde_json::Value::Null,

        Value::Bytes(bytes) => {
            // Text and BLOB both travel as bytes; keep UTF-8 as a string,
            // Base64-encode real binary for JSON safety
            if let Ok(s) = std::str::from_utf8(bytes) {
                serde_json::Value::String(s.to_string())
            } else {
                use base64::Engine;
                serde_json::Value::String(
                    base64::engine::general_purpose::STANDARD.encode(bytes),
                )
            }
        }

        Value::Int(i) => serde_json::Value::Number((*i).into()),

        Value::UInt(u) => serde_json::json!(*u),

        Value::Float(f) => serde_json::Number::from_f64(f64::from(*f))
            .map_or(serde_json::Value::Null, serde_json::Value::Number), // Handle NaN/Infinity as null

        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map_or(serde_json::Value::Null, serde_json::Value::Number), // Handle NaN/Infinity as null

        Value::Date(year, month, day, hour, minute, second, micro) => {
            serde_json::Value::String(format!(
                "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{micro:06}"
            ))
        }

        Value::Time(is_negative, days, hours, minutes, seconds, micros) => {
            let sign = if *is_negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(*hours);
            serde_json::Value::String(format!(
                "{sign}{total_hours}:{minutes:02}:{seconds:02}.{micros:06}"
            ))
        }
    };

    Ok(json_value)
}

/// Map a `mysql_async` error into the shared taxonomy
fn normalize(e: mysql_async::Error) -> DbiError {
    match &e {
        mysql_async::Error::Server(server) => {
            let detail = format!("{} (code {})", server.message, server.code);
            match server.code {
                ER_DUP_ENTRY | ER_BAD_NULL | ER_ROW_IS_REFERENCED | ER_NO_REFERENCED_ROW => {
                    DbiError::constraint(BACKEND, detail)
                }
                ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK => DbiError::transient(BACKEND, detail),
                ER_PARSE_ERROR => DbiError::unsupported(BACKEND, detail),
                _ => DbiError::backend(BACKEND, detail),
            }
        }
        mysql_async::Error::Io(_) => DbiError::connection(BACKEND, e.to_string()),
        _ => DbiError::backend(BACKEND, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BackendKind;

    // Tests that talk to a server require a running MySQL instance and are
    // exercised through the ignored integration tests.

    #[test]
    fn test_build_opts_requires_parameters() {
        let config = ConnectionConfig {
            backend: BackendKind::MySql,
            host: Some("localhost".to_string()),
            port: Some(3306),
            user: Some("root".to_string()),
            password: None,
            database: Some("test".to_string()),
            file: None,
        };
        let err = build_opts(&config).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert!(err.to_string().contains("'password'"));
    }

    #[test]
    fn test_build_opts_complete() {
        let config = ConnectionConfig::mysql(
            "localhost".to_string(),
            3306,
            "root".to_string(),
            "root".to_string(),
            "test".to_string(),
        );
        assert!(build_opts(&config).is_ok());
    }

    #[test]
    fn test_to_params_empty_and_positional() {
        assert!(matches!(to_params(&[]), Params::Empty));
        let params = to_params(&[SqlValue::Integer(1), SqlValue::Text("a".to_string())]);
        let Params::Positional(values) = params else { panic!("expected positional") };
        assert_eq!(values, vec![Value::Int(1), Value::Bytes(b"a".to_vec())]);
    }

    #[test]
    fn test_to_native_conversions() {
        assert_eq!(to_native(&SqlValue::Null), Value::NULL);
        assert_eq!(to_native(&SqlValue::Bool(true)), Value::Int(1));
        assert_eq!(to_native(&SqlValue::Real(1.5)), Value::Double(1.5));
        assert_eq!(to_native(&SqlValue::Blob(vec![0xff])), Value::Bytes(vec![0xff]));
    }
}
