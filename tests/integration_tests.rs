//! End-to-end tests against the embedded engine.
//!
//! Every test drives the public facade over a real `SQLite` file. Schemas
//! are created with `rusqlite` directly since schema management is outside
//! the facade's surface. The client/server backends share the same facade
//! code path and are covered by their adapters' unit tests.

#![cfg(feature = "sqlite")]

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use tridb::{
    ConnectionConfig, Dbi, DbiSettings, Predicate, SelectOptions, SqlValue,
};

fn temp_db(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn create_schema(path: &PathBuf, ddl: &str) {
    let conn = rusqlite::Connection::open(path).expect("open for schema setup");
    conn.execute_batch(ddl).expect("create schema");
}

fn facade(path: PathBuf) -> Dbi {
    Dbi::with_defaults(ConnectionConfig::sqlite(path))
}

#[tokio::test]
async fn test_crud_lifecycle() {
    let path = temp_db("it_crud.db");
    create_schema(&path, "CREATE TABLE t (id INT, name TEXT)");
    let dbi = facade(path);

    let affected = dbi.insert("t", &[("id", 1.into()), ("name", "a".into())]).await.unwrap();
    assert_eq!(affected, 1);

    let rows = dbi
        .select("t", &["id", "name"], Some(Predicate::eq("id", 1)), SelectOptions::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], serde_json::json!(1));
    assert_eq!(rows[0]["name"], serde_json::json!("a"));

    let affected = dbi
        .update("t", &[("name", "b".into())], Some(Predicate::eq("id", 1)))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let rows = dbi
        .select("t", &[], Some(Predicate::eq("id", 1)), SelectOptions::default())
        .await
        .unwrap();
    assert_eq!(rows[0]["name"], serde_json::json!("b"));

    let affected = dbi.delete("t", Some(Predicate::eq("id", 1))).await.unwrap();
    assert_eq!(affected, 1);

    let rows = dbi.select("t", &[], None, SelectOptions::default()).await.unwrap();
    assert!(rows.is_empty());

    dbi.close().await;
}

#[tokio::test]
async fn test_write_without_match_affects_zero_rows() {
    let path = temp_db("it_no_match.db");
    create_schema(&path, "CREATE TABLE t (id INT, name TEXT)");
    let dbi = facade(path);

    let affected = dbi
        .update("t", &[("name", "x".into())], Some(Predicate::eq("id", 404)))
        .await
        .unwrap();
    assert_eq!(affected, 0);
    let affected = dbi.delete("t", Some(Predicate::eq("id", 404))).await.unwrap();
    assert_eq!(affected, 0);
}

#[tokio::test]
async fn test_value_fidelity() {
    let path = temp_db("it_values.db");
    create_schema(&path, "CREATE TABLE v (i INT, r REAL, b INT, t TEXT, n TEXT)");
    let dbi = facade(path);

    dbi.insert(
        "v",
        &[
            ("i", (-42i64).into()),
            ("r", 1.5.into()),
            ("b", true.into()),
            ("t", "naïve".into()),
            ("n", SqlValue::Null),
        ],
    )
    .await
    .unwrap();

    let rows = dbi.select("v", &[], None, SelectOptions::default()).await.unwrap();
    assert_eq!(rows[0]["i"], serde_json::json!(-42));
    assert_eq!(rows[0]["r"], serde_json::json!(1.5));
    // Booleans travel as integers on this engine
    assert_eq!(rows[0]["b"], serde_json::json!(1));
    assert_eq!(rows[0]["t"], serde_json::json!("naïve"));
    assert_eq!(rows[0]["n"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_select_ordering_and_pagination() {
    let path = temp_db("it_order.db");
    create_schema(&path, "CREATE TABLE t (id INT, name TEXT)");
    let dbi = facade(path);

    for (id, name) in [(3, "c"), (1, "a"), (2, "b"), (4, "d")] {
        dbi.insert("t", &[("id", id.into()), ("name", name.into())]).await.unwrap();
    }

    let options = SelectOptions::default()
        .order_by(tridb::OrderKey::asc("id"))
        .limit(2)
        .offset(1);
    let rows = dbi.select("t", &["id"], None, options).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], serde_json::json!(2));
    assert_eq!(rows[1]["id"], serde_json::json!(3));
}

#[tokio::test]
async fn test_compound_predicates() {
    let path = temp_db("it_pred.db");
    create_schema(&path, "CREATE TABLE t (id INT, name TEXT)");
    let dbi = facade(path);

    for (id, name) in [(1, "alpha"), (2, "beta"), (3, "gamma")] {
        dbi.insert("t", &[("id", id.into()), ("name", name.into())]).await.unwrap();
    }

    let pred = Predicate::and(
        Predicate::or(Predicate::eq("id", 1), Predicate::eq("id", 3)),
        Predicate::like("name", "%a%"),
    );
    let options = SelectOptions::default().order_by(tridb::OrderKey::asc("id"));
    let rows = dbi.select("t", &["id"], Some(pred), options).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], serde_json::json!(1));
    assert_eq!(rows[1]["id"], serde_json::json!(3));

    let rows = dbi
        .select("t", &["id"], Some(Predicate::is_in("id", [2i64, 3])), SelectOptions::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_transaction_commit_is_visible() {
    let path = temp_db("it_tx_commit.db");
    create_schema(&path, "CREATE TABLE t (id INT, name TEXT)");
    let dbi = facade(path);

    let mut tx = dbi.begin().await.unwrap();
    tx.insert("t", &[("id", 1.into()), ("name", "a".into())]).await.unwrap();
    // The transaction's own connection sees the uncommitted write
    let rows = tx.select("t", &[], None, SelectOptions::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    tx.commit().await.unwrap();

    let rows = dbi.select("t", &[], None, SelectOptions::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_transaction_rollback_discards_writes() {
    let path = temp_db("it_tx_rollback.db");
    create_schema(&path, "CREATE TABLE t (id INT, name TEXT)");
    let dbi = facade(path);

    dbi.insert("t", &[("id", 1.into()), ("name", "a".into())]).await.unwrap();

    let mut tx = dbi.begin().await.unwrap();
    tx.update("t", &[("name", "changed".into())], None).await.unwrap();
    tx.insert("t", &[("id", 2.into()), ("name", "extra".into())]).await.unwrap();
    tx.rollback().await.unwrap();

    let rows = dbi.select("t", &[], None, SelectOptions::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], serde_json::json!("a"));
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let path = temp_db("it_tx_drop.db");
    create_schema(&path, "CREATE TABLE t (id INT)");
    let dbi = facade(path);

    {
        let mut tx = dbi.begin().await.unwrap();
        tx.insert("t", &[("id", 1.into())]).await.unwrap();
        // Dropped without commit
    }

    let rows = dbi.select("t", &[], None, SelectOptions::default()).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_table_prefix_applied_end_to_end() {
    let path = temp_db("it_prefix.db");
    create_schema(&path, "CREATE TABLE crawl_t (id INT); CREATE TABLE raw (id INT)");
    let settings = DbiSettings { table_prefix: "crawl".to_string(), ..DbiSettings::default() };
    let dbi = Dbi::new(ConnectionConfig::sqlite(path), settings);

    // Unqualified names are prefixed, @-escaped names are not
    dbi.insert("t", &[("id", 1.into())]).await.unwrap();
    dbi.insert("crawl_t", &[("id", 2.into())]).await.unwrap();
    dbi.insert("@raw", &[("id", 3.into())]).await.unwrap();

    let rows = dbi.select("t", &[], None, SelectOptions::default()).await.unwrap();
    assert_eq!(rows.len(), 2);
    let rows = dbi.select("@raw", &[], None, SelectOptions::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_error_carries_operation_context() {
    let path = temp_db("it_err_ctx.db");
    create_schema(&path, "CREATE TABLE t (id INTEGER PRIMARY KEY)");
    let dbi = facade(path);

    dbi.insert("t", &[("id", 1.into())]).await.unwrap();
    let err = dbi.insert("t", &[("id", 1.into())]).await.unwrap_err();
    assert_eq!(err.error_code(), "CONSTRAINT_VIOLATION");
    let message = err.to_string();
    assert!(message.contains("insert"), "missing verb in: {message}");
    assert!(message.contains("'t'"), "missing table in: {message}");
}

#[tokio::test]
async fn test_invalid_identifier_fails_before_execution() {
    let dbi = facade(temp_db("it_bad_ident.db"));

    let err = dbi.select("", &[], None, SelectOptions::default()).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");
}

#[tokio::test]
async fn test_connections_are_pooled_across_operations() {
    let path = temp_db("it_pooling.db");
    create_schema(&path, "CREATE TABLE t (id INT)");
    let dbi = facade(path);

    dbi.insert("t", &[("id", 1.into())]).await.unwrap();
    assert_eq!(dbi.idle_connections(), 1);
    dbi.select("t", &[], None, SelectOptions::default()).await.unwrap();
    assert_eq!(dbi.idle_connections(), 1);

    dbi.close().await;
    assert_eq!(dbi.idle_connections(), 0);

    // The facade stays usable after close
    dbi.insert("t", &[("id", 2.into())]).await.unwrap();
}
