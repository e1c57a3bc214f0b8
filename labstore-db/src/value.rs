// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Values stored in experiment tables and result tables.

use ndarray::ArrayD;
use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};

use crate::array::ArrayValue;
use crate::error::{Error, Result};
use crate::param::{ParamKind, ParamSpec};

/// One cell of a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    Array(ArrayValue),
}

impl Value {
    /// Parameter kind this value binds to, `None` for null.
    pub fn kind(&self) -> Option<ParamKind> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(ParamKind::Integer),
            Value::Real(_) => Some(ParamKind::Real),
            Value::Text(_) => Some(ParamKind::Text),
            Value::Boolean(_) => Some(ParamKind::Boolean),
            Value::Array(_) => Some(ParamKind::Array),
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self.kind() {
            None => "NULL",
            Some(kind) => kind.sql_type(),
        }
    }

    /// Check that this value may be bound to `spec`'s column.
    pub(crate) fn check_kind(&self, spec: &ParamSpec) -> Result<()> {
        match self.kind() {
            None => Ok(()),
            Some(kind) if kind == spec.kind() => match self {
                Value::Real(f) if f.is_nan() => Err(Error::NotANumber {
                    column: spec.name().to_owned(),
                }),
                _ => Ok(()),
            },
            Some(_) => Err(Error::TypeMismatch {
                column: spec.name().to_owned(),
                expected: spec.kind(),
                found: self.kind_name(),
            }),
        }
    }

    /// Decode a raw column value.
    ///
    /// With a declared kind, integers are decoded as booleans or reals where
    /// the column asks for it. Without one, the storage class decides. Blobs
    /// are always arrays; anything else is a codec error.
    pub fn decode(raw: ValueRef<'_>, kind: Option<ParamKind>) -> Result<Self> {
        Ok(match (raw, kind) {
            (ValueRef::Null, _) => Value::Null,
            (ValueRef::Integer(i), Some(ParamKind::Boolean)) => Value::Boolean(i != 0),
            (ValueRef::Integer(i), Some(ParamKind::Real)) => Value::Real(i as f64),
            (ValueRef::Integer(i), _) => Value::Integer(i),
            (ValueRef::Real(f), _) => Value::Real(f),
            (ValueRef::Text(t), _) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            (ValueRef::Blob(b), _) => Value::Array(ArrayValue::decode(b)?),
        })
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Boolean(b) => ToSqlOutput::from(*b),
            Value::Array(a) => return a.to_sql(),
        })
    }
}

impl ToSql for ArrayValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.encode()))
    }
}

impl FromSql for ArrayValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let blob = value.as_blob()?;
        ArrayValue::decode(blob).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<ArrayValue> for Value {
    fn from(v: ArrayValue) -> Self {
        Value::Array(v)
    }
}

impl<T> From<ArrayD<T>> for Value
where
    ArrayValue: From<ArrayD<T>>,
{
    fn from(v: ArrayD<T>) -> Self {
        Value::Array(v.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
