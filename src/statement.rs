//! Backend-Neutral Statement Descriptions
//!
//! A [`Statement`] is an immutable value describing one operation: target
//! table, column list, predicate expression tree, ordering keys, and
//! limit/offset. It never embeds backend-specific syntax; syntax is injected
//! only by the dialect translator at render time.

use serde::{Deserialize, Serialize};

/// A parameter or literal value carried by a statement description.
///
/// This is the full set of value shapes the uniform contract supports; the
/// adapters map them onto each driver's native binding types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Comparison operators usable in predicate leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    /// Case-insensitive LIKE. Only the `PostgreSQL` dialect renders this;
    /// the other dialects fail fast.
    ILike,
}

/// A structured predicate expression tree (field, operator, value).
///
/// Rendered recursively by the dialect translator with explicit
/// operator-precedence parenthesization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// `field <op> value`
    Compare { field: String, op: CompareOp, value: SqlValue },
    /// `field IS NULL`
    IsNull { field: String },
    /// `field IS NOT NULL`
    IsNotNull { field: String },
    /// `field IN (v1, v2, ...)`
    In { field: String, values: Vec<SqlValue> },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<SqlValue>) -> Self {
        Self::Compare { field: field.into(), op, value: value.into() }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(field, CompareOp::Like, SqlValue::Text(pattern.into()))
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull { field: field.into() }
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::IsNotNull { field: field.into() }
    }

    pub fn is_in(
        field: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<SqlValue>>,
    ) -> Self {
        Self::In { field: field.into(), values: values.into_iter().map(Into::into).collect() }
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

/// Sort direction for an ordering key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One ORDER BY key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderKey {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), direction: SortDirection::Ascending }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), direction: SortDirection::Descending }
    }
}

/// A backend-neutral description of one operation.
///
/// Constructed fresh per call by the facade and handed to the dialect
/// translator; write values keep caller order so rendering is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select {
        table: String,
        columns: Vec<String>,
        predicate: Option<Predicate>,
        order: Vec<OrderKey>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Insert {
        table: String,
        values: Vec<(String, SqlValue)>,
    },
    Update {
        table: String,
        values: Vec<(String, SqlValue)>,
        predicate: Option<Predicate>,
    },
    Delete {
        table: String,
        predicate: Option<Predicate>,
    },
}

impl Statement {
    /// The operation verb, used in log events and error context
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Select { .. } => "select",
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    /// The target table
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Select { table, .. }
            | Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Delete { table, .. } => table,
        }
    }

    /// Whether executing this statement produces a row set (as opposed to an
    /// affected-row count)
    #[must_use]
    pub const fn returns_rows(&self) -> bool {
        matches!(self, Self::Select { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(SqlValue::from(1i64), SqlValue::Integer(1));
        assert_eq!(SqlValue::from(1i32), SqlValue::Integer(1));
        assert_eq!(SqlValue::from("a"), SqlValue::Text("a".to_string()));
        assert_eq!(SqlValue::from(true), SqlValue::Bool(true));
        assert_eq!(SqlValue::from(Option::<i64>::None), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(2i64)), SqlValue::Integer(2));
    }

    #[test]
    fn test_predicate_builders() {
        let p = Predicate::eq("id", 1).and(Predicate::is_not_null("name"));
        assert!(matches!(p, Predicate::And(_, _)));

        let p = Predicate::is_in("id", [1i64, 2, 3]);
        let Predicate::In { field, values } = p else { panic!("expected In") };
        assert_eq!(field, "id");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_statement_accessors() {
        let stmt = Statement::Insert {
            table: "t".to_string(),
            values: vec![("id".to_string(), SqlValue::Integer(1))],
        };
        assert_eq!(stmt.verb(), "insert");
        assert_eq!(stmt.table(), "t");
        assert!(!stmt.returns_rows());

        let stmt = Statement::Select {
            table: "t".to_string(),
            columns: vec![],
            predicate: None,
            order: vec![],
            limit: None,
            offset: None,
        };
        assert!(stmt.returns_rows());
    }
}
