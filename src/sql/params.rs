//! Convert serde_json::Value to values that bind through the `Any` driver.

use crate::config::ValueKind;
use serde_json::Value;
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;

/// A bind parameter. Nulls remember the column kind so typed engines accept them.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Null(ValueKind),
    I64(i64),
    F64(f64),
    Text(String),
}

impl BindValue {
    /// Coerce a JSON value toward the column kind.
    pub fn coerce(v: &Value, kind: ValueKind) -> Self {
        match (v, kind) {
            (Value::Null, _) => BindValue::Null(kind),
            (Value::Bool(b), ValueKind::Integer) => BindValue::I64(i64::from(*b)),
            (Value::Bool(b), ValueKind::Real) => BindValue::F64(if *b { 1.0 } else { 0.0 }),
            (Value::Bool(b), ValueKind::Text) => BindValue::Text(b.to_string()),
            (Value::Number(n), ValueKind::Text) => BindValue::Text(n.to_string()),
            (Value::Number(n), _) => match n.as_i64() {
                Some(i) if kind == ValueKind::Integer => BindValue::I64(i),
                _ => n.as_f64().map(BindValue::F64).unwrap_or(BindValue::Null(kind)),
            },
            (Value::String(s), ValueKind::Integer) => match s.trim().parse::<i64>() {
                Ok(i) => BindValue::I64(i),
                Err(_) => BindValue::Text(s.clone()),
            },
            (Value::String(s), ValueKind::Real) => match s.trim().parse::<f64>() {
                Ok(f) => BindValue::F64(f),
                Err(_) => BindValue::Text(s.clone()),
            },
            (Value::String(s), ValueKind::Text) => BindValue::Text(s.clone()),
            (Value::Array(_) | Value::Object(_), _) => BindValue::Text(v.to_string()),
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        BindValue::Text(s.into())
    }
}

/// Bind every parameter in order.
pub fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    params: &[BindValue],
) -> Query<'q, Any, AnyArguments<'q>> {
    for p in params {
        query = match p.clone() {
            BindValue::Null(ValueKind::Integer) => query.bind(None::<i64>),
            BindValue::Null(ValueKind::Real) => query.bind(None::<f64>),
            BindValue::Null(ValueKind::Text) => query.bind(None::<String>),
            BindValue::I64(n) => query.bind(n),
            BindValue::F64(n) => query.bind(n),
            BindValue::Text(s) => query.bind(s),
        };
    }
    query
}
