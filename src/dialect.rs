//! Dialect Translator
//!
//! Converts a backend-neutral [`Statement`] into the SQL text and bound
//! parameters required by the target backend. Pure functions: no I/O,
//! deterministic given identical inputs.
//!
//! # Dialect Differences Handled Here
//! - Identifier quoting: double quotes for `SQLite`/`PostgreSQL`, backticks
//!   for MySQL
//! - Parameter placeholders: positional `?` for `SQLite`/MySQL, numbered
//!   `$1..$n` for `PostgreSQL`
//! - LIMIT/OFFSET: `SQLite` needs `LIMIT -1` and MySQL the documented
//!   all-rows sentinel when an offset is given without a limit
//! - `ILIKE` exists only in the `PostgreSQL` dialect; the others fail fast

use crate::engine::BackendKind;
use crate::error::{DbiError, Result};
use crate::statement::{CompareOp, Predicate, SortDirection, SqlValue, Statement};

/// MySQL has no offset-without-limit form; the manual prescribes this
/// sentinel for "all remaining rows".
const MYSQL_ALL_ROWS: &str = "18446744073709551615";

/// SQL text plus parameters in binding order, ready for one adapter
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    /// Whether execution yields a row set rather than an affected count
    pub returns_rows: bool,
}

/// Render a statement description for the given backend.
pub fn render(stmt: &Statement, backend: BackendKind) -> Result<RenderedStatement> {
    let mut r = Renderer { backend, sql: String::new(), params: Vec::new() };

    match stmt {
        Statement::Select { table, columns, predicate, order, limit, offset } => {
            r.check_table(table)?;
            r.sql.push_str("SELECT ");
            if columns.is_empty() {
                r.sql.push('*');
            } else {
                r.push_ident_list(columns)?;
            }
            r.sql.push_str(" FROM ");
            r.push_ident(table)?;
            r.push_where(predicate.as_ref())?;
            r.push_order(order)?;
            r.push_limit_offset(*limit, *offset);
        }
        Statement::Insert { table, values } => {
            r.check_table(table)?;
            if values.is_empty() {
                return Err(DbiError::input("insert requires at least one column value"));
            }
            r.sql.push_str("INSERT INTO ");
            r.push_ident(table)?;
            r.sql.push_str(" (");
            let columns: Vec<String> = values.iter().map(|(c, _)| c.clone()).collect();
            r.push_ident_list(&columns)?;
            r.sql.push_str(") VALUES (");
            for (i, (_, value)) in values.iter().enumerate() {
                if i > 0 {
                    r.sql.push_str(", ");
                }
                r.push_param(value.clone());
            }
            r.sql.push(')');
        }
        Statement::Update { table, values, predicate } => {
            r.check_table(table)?;
            if values.is_empty() {
                return Err(DbiError::input("update requires at least one column value"));
            }
            r.sql.push_str("UPDATE ");
            r.push_ident(table)?;
            r.sql.push_str(" SET ");
            for (i, (column, value)) in values.iter().enumerate() {
                if i > 0 {
                    r.sql.push_str(", ");
                }
                r.push_ident(column)?;
                r.sql.push_str(" = ");
                r.push_param(value.clone());
            }
            r.push_where(predicate.as_ref())?;
        }
        Statement::Delete { table, predicate } => {
            r.check_table(table)?;
            r.sql.push_str("DELETE FROM ");
            r.push_ident(table)?;
            r.push_where(predicate.as_ref())?;
        }
    }

    Ok(RenderedStatement { sql: r.sql, params: r.params, returns_rows: stmt.returns_rows() })
}

/// SQL issued by `begin` for the given backend, in execution order.
///
/// MySQL cannot set the isolation level inline, hence two statements there.
/// `SQLite` transactions are always serializable and ignore the level.
#[must_use]
pub fn begin_sql(backend: BackendKind, isolation: crate::config::IsolationLevel) -> Vec<String> {
    match backend {
        BackendKind::Sqlite => vec!["BEGIN".to_string()],
        BackendKind::Postgres => {
            vec![format!("BEGIN ISOLATION LEVEL {}", isolation.as_sql())]
        }
        BackendKind::MySql => vec![
            format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql()),
            "START TRANSACTION".to_string(),
        ],
    }
}

struct Renderer {
    backend: BackendKind,
    sql: String,
    params: Vec<SqlValue>,
}

// Precedence ladder for parenthesization: OR < AND < NOT < leaf
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_LEAF: u8 = 4;

impl Renderer {
    fn check_table(&self, table: &str) -> Result<()> {
        if table.is_empty() {
            return Err(DbiError::input("table name must not be empty"));
        }
        Ok(())
    }

    fn push_ident(&mut self, ident: &str) -> Result<()> {
        if ident.is_empty() {
            return Err(DbiError::input("identifier must not be empty"));
        }
        match self.backend {
            BackendKind::MySql => {
                self.sql.push('`');
                self.sql.push_str(&ident.replace('`', "``"));
                self.sql.push('`');
            }
            _ => {
                self.sql.push('"');
                self.sql.push_str(&ident.replace('"', "\"\""));
                self.sql.push('"');
            }
        }
        Ok(())
    }

    fn push_ident_list(&mut self, idents: &[String]) -> Result<()> {
        for (i, ident) in idents.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_ident(ident)?;
        }
        Ok(())
    }

    fn push_param(&mut self, value: SqlValue) {
        self.params.push(value);
        match self.backend {
            BackendKind::Postgres => {
                self.sql.push('$');
                self.sql.push_str(&self.params.len().to_string());
            }
            _ => self.sql.push('?'),
        }
    }

    fn push_where(&mut self, predicate: Option<&Predicate>) -> Result<()> {
        if let Some(p) = predicate {
            self.sql.push_str(" WHERE ");
            self.push_predicate(p, PREC_OR)?;
        }
        Ok(())
    }

    /// Render a predicate node; wrap in parentheses when its precedence is
    /// below what the surrounding context requires.
    fn push_predicate(&mut self, predicate: &Predicate, min_prec: u8) -> Result<()> {
        let prec = precedence(predicate);
        let parenthesize = prec < min_prec;
        if parenthesize {
            self.sql.push('(');
        }

        match predicate {
            Predicate::Compare { field, op, value } => {
                self.push_ident(field)?;
                self.sql.push(' ');
                self.sql.push_str(self.compare_op_sql(*op)?);
                self.sql.push(' ');
                self.push_param(value.clone());
            }
            Predicate::IsNull { field } => {
                self.push_ident(field)?;
                self.sql.push_str(" IS NULL");
            }
            Predicate::IsNotNull { field } => {
                self.push_ident(field)?;
                self.sql.push_str(" IS NOT NULL");
            }
            Predicate::In { field, values } => {
                if values.is_empty() {
                    return Err(DbiError::input("IN predicate requires at least one value"));
                }
                self.push_ident(field)?;
                self.sql.push_str(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.push_param(value.clone());
                }
                self.sql.push(')');
            }
            Predicate::And(lhs, rhs) => {
                self.push_predicate(lhs, PREC_AND)?;
                self.sql.push_str(" AND ");
                self.push_predicate(rhs, PREC_AND)?;
            }
            Predicate::Or(lhs, rhs) => {
                self.push_predicate(lhs, PREC_OR)?;
                self.sql.push_str(" OR ");
                self.push_predicate(rhs, PREC_OR)?;
            }
            Predicate::Not(inner) => {
                self.sql.push_str("NOT ");
                self.push_predicate(inner, PREC_NOT)?;
            }
        }

        if parenthesize {
            self.sql.push(')');
        }
        Ok(())
    }

    fn compare_op_sql(&self, op: CompareOp) -> Result<&'static str> {
        Ok(match op {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::ILike => {
                if self.backend == BackendKind::Postgres {
                    "ILIKE"
                } else {
                    return Err(DbiError::unsupported(
                        self.backend.as_str(),
                        "ILIKE predicate operator",
                    ));
                }
            }
        })
    }

    fn push_order(&mut self, order: &[crate::statement::OrderKey]) -> Result<()> {
        if order.is_empty() {
            return Ok(());
        }
        self.sql.push_str(" ORDER BY ");
        for (i, key) in order.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_ident(&key.column)?;
            match key.direction {
                SortDirection::Ascending => self.sql.push_str(" ASC"),
                SortDirection::Descending => self.sql.push_str(" DESC"),
            }
        }
        Ok(())
    }

    fn push_limit_offset(&mut self, limit: Option<u64>, offset: Option<u64>) {
        match (limit, offset) {
            (None, None) => {}
            (Some(limit), None) => {
                self.sql.push_str(&format!(" LIMIT {limit}"));
            }
            (Some(limit), Some(offset)) => {
                self.sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
            }
            (None, Some(offset)) => match self.backend {
                // PostgreSQL allows a bare OFFSET
                BackendKind::Postgres => self.sql.push_str(&format!(" OFFSET {offset}")),
                // SQLite treats a negative limit as unbounded
                BackendKind::Sqlite => self.sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
                BackendKind::MySql => {
                    self.sql.push_str(&format!(" LIMIT {MYSQL_ALL_ROWS} OFFSET {offset}"));
                }
            },
        }
    }
}

const fn precedence(predicate: &Predicate) -> u8 {
    match predicate {
        Predicate::Or(_, _) => PREC_OR,
        Predicate::And(_, _) => PREC_AND,
        Predicate::Not(_) => PREC_NOT,
        _ => PREC_LEAF,
    }
}
