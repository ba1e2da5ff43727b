//! Borrowed per-position values.

use std::borrow::Cow;

use crate::error::Result;
use crate::types::Value;

use super::ArrayView;

/// One position's value, borrowing from the block (or constant) it came from.
///
/// This is what compiled evaluators pass between each other per row; text
/// and arrays are not copied until they are written into an output builder.
#[derive(Debug, Clone)]
pub enum Datum<'a> {
    Null,
    Bigint(i64),
    Double(f64),
    Boolean(bool),
    Varchar(Cow<'a, str>),
    Array(ArrayView<'a>),
}

impl<'a> Datum<'a> {
    /// Returns true if this datum is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    #[must_use]
    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            Datum::Bigint(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Datum::Double(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Datum::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Varchar(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayView<'a>> {
        match self {
            Datum::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a short description of the datum's kind for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Bigint(_) => "bigint",
            Datum::Double(_) => "double",
            Datum::Boolean(_) => "boolean",
            Datum::Varchar(_) => "varchar",
            Datum::Array(_) => "array",
        }
    }

    /// Copies the datum into an owned [`Value`].
    ///
    /// # Errors
    ///
    /// Propagates element read failures for arrays.
    pub fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Datum::Null => Value::Null,
            Datum::Bigint(v) => Value::Bigint(*v),
            Datum::Double(v) => Value::Double(*v),
            Datum::Boolean(v) => Value::Boolean(*v),
            Datum::Varchar(v) => Value::Varchar(v.to_string()),
            Datum::Array(view) => Value::Array(view.to_values()?),
        })
    }
}
