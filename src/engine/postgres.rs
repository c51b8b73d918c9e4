//! `PostgreSQL` Backend Adapter
//!
//! Translates the uniform operation contract into `tokio-postgres` calls and
//! normalizes driver errors into the shared taxonomy via SQLSTATE classes.
//!
//! # Implementation Notes
//! - Uses `tokio-postgres` (async driver, requires tokio runtime)
//! - The driver task is spawned per connection; connection errors are not
//!   logged to prevent credential leakage
//! - JSON/JSONB preserved as nested JSON, BYTEA Base64-encoded
//! - Timestamps and dates converted to ISO 8601 strings via `chrono`

use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, NoTls};

use crate::dialect::RenderedStatement;
use crate::engine::{ConnectionConfig, ExecResult, Row};
use crate::error::{DbiError, Result};
use crate::statement::SqlValue;

const BACKEND: &str = "postgres";

/// Connect and spawn the driver task for the connection's lifetime
pub(crate) async fn open(config: &ConnectionConfig) -> Result<Client> {
    let pg_config = build_config(config)?;

    let (client, connection) = pg_config
        .connect(NoTls)
        .await
        .map_err(|e| DbiError::connection(BACKEND, e.to_string()))?;

    // Note: connection task errors are not logged to prevent credential leakage
    tokio::spawn(async move {
        let _ = connection.await;
    });

    Ok(client)
}

fn build_config(config: &ConnectionConfig) -> Result<Config> {
    let host = config
        .host
        .as_ref()
        .ok_or_else(|| DbiError::input("postgres requires 'host' parameter"))?;
    let port = config
        .port
        .ok_or_else(|| DbiError::input("postgres requires 'port' parameter"))?;
    let user = config
        .user
        .as_ref()
        .ok_or_else(|| DbiError::input("postgres requires 'user' parameter"))?;
    let password = config
        .password
        .as_ref()
        .ok_or_else(|| DbiError::input("postgres requires 'password' parameter"))?;
    let database = config
        .database
        .as_ref()
        .ok_or_else(|| DbiError::input("postgres requires 'database' parameter"))?;

    let mut pg_config = Config::new();
    pg_config.host(host).port(port).user(user).password(password).dbname(database);
    Ok(pg_config)
}

pub(crate) async fn execute(client: &Client, rendered: &RenderedStatement) -> Result<ExecResult> {
    let stmt = client.prepare(&rendered.sql).await.map_err(normalize)?;

    let owned = bind_params(&rendered.params);
    let refs: Vec<&(dyn ToSql + Sync)> = owned.iter().map(|p| &**p).collect();

    if rendered.returns_rows {
        let rows = client.query(&stmt, &refs).await.map_err(normalize)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(row_to_map(row)?);
        }
        Ok(ExecResult::Rows(out))
    } else {
        let affected = client.execute(&stmt, &refs).await.map_err(normalize)?;
        Ok(ExecResult::Affected(affected))
    }
}

pub(crate) async fn run_batch(client: &Client, sql: &str) -> Result<()> {
    client.batch_execute(sql).await.map_err(normalize)
}

/// Cheap no-op query used as the health probe
pub(crate) async fn probe(client: &Client) -> Result<()> {
    if client.is_closed() {
        return Err(DbiError::connection(BACKEND, "connection task has shut down"));
    }
    client
        .simple_query("SELECT 1")
        .await
        .map(|_| ())
        .map_err(|e| DbiError::connection(BACKEND, format!("health probe failed: {e}")))
}

fn bind_params(values: &[SqlValue]) -> Vec<Box<dyn ToSql + Sync>> {
    values
        .iter()
        .map(|value| -> Box<dyn ToSql + Sync> {
            match value {
                SqlValue::Null => Box::new(Option::<String>::None),
                SqlValue::Bool(b) => Box::new(*b),
                SqlValue::Integer(i) => Box::new(*i),
                SqlValue::Real(f) => Box::new(*f),
                SqlValue::Text(s) => Box::new(s.clone()),
                SqlValue::Blob(b) => Box::new(b.clone()),
            }
        })
        .collect()
}

fn row_to_map(row: &tokio_postgres::Row) -> Result<Row> {
    let mut map = Row::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), value_to_json(row, idx)?);
    }
    Ok(map)
}

/// Convert one `PostgreSQL` column value to a JSON value
fn value_to_json(row: &tokio_postgres::Row, idx: usize) -> Result<serde_json::Value> {
    use tokio_postgres::types::Type;

    let col_type = row.columns()[idx].type_();

    let fetch_err =
        |e: tokio_postgres::Error| DbiError::backend(BACKEND, format!("failed to read column: {e}"));

    let value = match *col_type {
        Type::BOOL => {
            let v: Option<bool> = row.try_get(idx).map_err(fetch_err)?;
            v.map_or(serde_json::Value::Null, serde_json::Value::Bool)
        }
        Type::INT2 => {
            let v: Option<i16> = row.try_get(idx).map_err(fetch_err)?;
            v.map_or(serde_json::Value::Null, |v| serde_json::Value::Number(v.into()))
        }
        Type::INT4 => {
            let v: Option<i32> = row.try_get(idx).map_err(fetch_err)?;
            v.map_or(serde_json::Value::Null, |v| serde_json::Value::Number(v.into()))
        }
        Type::INT8 => {
            let v: Option<i64> = row.try_get(idx).map_err(fetch_err)?;
            v.map_or(serde_json::Value::Null, |v| serde_json::Value::Number(v.into()))
        }
        Type::FLOAT4 => {
            let v: Option<f32> = row.try_get(idx).map_err(fetch_err)?;
            v.and_then(|v| serde_json::Number::from_f64(f64::from(v)))
                .map_or(serde_json::Value::Null, serde_json::Value::Number) // Handle NaN/Infinity as null
        }
        Type::FLOAT8 => {
            let v: Option<f64> = row.try_get(idx).map_err(fetch_err)?;
            v.and_then(serde_json::Number::from_f64)
                .map_or(serde_json::Value::Null, serde_json::Value::Number) // Handle NaN/Infinity as null
        }
        Type::VARCHAR | Type::TEXT | Type::BPCHAR | Type::NAME => {
            let v: Option<String> = row.try_get(idx).map_err(fetch_err)?;
            v.map_or(serde_json::Value::Null, serde_json::Value::String)
        }
        Type::JSON | Type::JSONB => {
            let v: Option<serde_json::Value> = row.try_get(idx).map_err(fetch_err)?;
            v.unwrap_or(serde_json::Value::Null)
        }
        Type::BYTEA => {
            let v: Option<Vec<u8>> = row.try_get(idx).map_err(fetch_err)?;
            v.map_or(serde_json::Value::Null, |bytes| {
                // Encode BYTEA as Base64 for JSON safety
                use base64::Engine;
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            })
        }
        Type::TIMESTAMP => {
            let v: Option<chrono::NaiveDateTime> = row.try_get(idx).map_err(fetch_err)?;
            v.map_or(serde_json::Value::Null, |v| {
                serde_json::Value::String(v.format("%Y-%m-%dT%H:%M:%S").to_string())
            })
        }
        Type::TIMESTAMPTZ => {
            let v: Option<chrono::DateTime<chrono::Utc>> = row.try_get(idx).map_err(fetch_err)?;
            v.map_or(serde_json::Value::Null, |v| serde_json::Value::String(v.to_rfc3339()))
        }
        Type::DATE => {
            let v: Option<chrono::NaiveDate> = row.try_get(idx).map_err(fetch_err)?;
            v.map_or(serde_json::Value::Null, |v| {
                serde_json::Value::String(v.format("%Y-%m-%d").to_string())
            })
        }
        Type::UUID => {
            let v: Option<uuid::Uuid> = row.try_get(idx).map_err(fetch_err)?;
            v.map_or(serde_json::Value::Null, |v| serde_json::Value::String(v.to_string()))
        }
        // Default: try to read as text
        _ => {
            let v: Option<String> = row.try_get(idx).map_err(|e| {
                DbiError::backend(
                    BACKEND,
                    format!("cannot convert column type '{}' to JSON: {e}", col_type.name()),
                )
            })?;
            v.map_or(serde_json::Value::Null, serde_json::Value::String)
        }
    };

    Ok(value)
}

/// Map a `tokio-postgres` error into the shared taxonomy
fn normalize(e: tokio_postgres::Error) -> DbiError {
    if let Some(db) = e.as_db_error() {
        let code = db.code().code();
        let detail = format!("{} (SQLSTATE {code})", db.message());
        return match code {
            // Class 23: integrity constraint violation
            c if c.starts_with("23") => DbiError::constraint(BACKEND, detail),
            // serialization_failure, deadlock_detected, lock_not_available,
            // query_canceled
            "40001" | "40P01" | "55P03" | "57014" => DbiError::transient(BACKEND, detail),
            // Class 42: syntax error or access rule violation
            c if c.starts_with("42") => DbiError::unsupported(BACKEND, detail),
            // Class 08: connection exception
            c if c.starts_with("08") => DbiError::connection(BACKEND, detail),
            _ => DbiError::backend(BACKEND, detail),
        };
    }
    if e.is_closed() {
        return DbiError::connection(BACKEND, e.to_string());
    }
    DbiError::backend(BACKEND, e.to_string())
}
