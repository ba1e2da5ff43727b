//! Owned runtime values and their canonical text form.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use super::DataType;

/// Owned runtime value container.
///
/// Rows are never materialized as `Value`s on the hot path; values appear in
/// constants, in tests and at API boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer value.
    Bigint(i64),
    /// 64-bit floating point value.
    Double(f64),
    /// Boolean value.
    Boolean(bool),
    /// Text value.
    Varchar(String),
    /// Array value.
    Array(Vec<Value>),
    /// Null value.
    Null,
}

impl Value {
    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to extract an i64 value.
    #[must_use]
    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            Value::Bigint(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to extract an f64 value.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            _ => None,
        }
    }

    /// Attempts to extract a bool value.
    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Attempts to extract the elements of an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Returns true if this value can be stored in a column of `data_type`.
    ///
    /// Null is compatible with every type.
    #[must_use]
    pub fn is_compatible_with(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Null, _)
            | (Value::Bigint(_), DataType::Bigint)
            | (Value::Double(_), DataType::Double)
            | (Value::Boolean(_), DataType::Boolean)
            | (Value::Varchar(_), DataType::Varchar) => true,
            (Value::Array(values), DataType::Array(element)) => {
                values.iter().all(|v| v.is_compatible_with(element))
            }
            _ => false,
        }
    }

    /// Returns a short description of the value's kind for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bigint(_) => "bigint",
            Value::Double(_) => "double",
            Value::Boolean(_) => "boolean",
            Value::Varchar(_) => "varchar",
            Value::Array(_) => "array",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bigint(v) => write!(f, "{v}"),
            Value::Double(v) => write_double(f, *v),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Varchar(v) => f.write_str(v),
            Value::Array(values) => {
                f.write_char('[')?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_char(']')
            }
            Value::Null => f.write_str("null"),
        }
    }
}

/// Writes the canonical text form of a double.
///
/// Shortest round-trip digits with `.0` appended to integral values.
/// Magnitudes at or above `1e7`, or below `1e-3`, use `E` notation with at
/// least one fractional mantissa digit (`1.0E7`, `1.25E-4`).
pub(crate) fn write_double<W: fmt::Write + ?Sized>(out: &mut W, value: f64) -> fmt::Result {
    if value.is_nan() {
        return out.write_str("NaN");
    }
    if value.is_infinite() {
        return out.write_str(if value > 0.0 { "Infinity" } else { "-Infinity" });
    }
    let magnitude = value.abs();
    if magnitude >= 1e7 || (magnitude < 1e-3 && magnitude != 0.0) {
        let scientific = format!("{value:e}");
        let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
        out.write_str(mantissa)?;
        if !mantissa.contains('.') {
            out.write_str(".0")?;
        }
        return write!(out, "E{exponent}");
    }
    if value.fract() == 0.0 {
        write!(out, "{value:.1}")
    } else {
        write!(out, "{value}")
    }
}
