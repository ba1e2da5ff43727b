//! `DataType` definitions and the Arrow type mapping.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Supported column types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Bigint,
    /// 64-bit floating point.
    Double,
    /// Boolean.
    Boolean,
    /// UTF-8 text.
    Varchar,
    /// Variable-length sequence of the element type.
    Array(Box<DataType>),
}

impl DataType {
    /// Creates an array type over `element`.
    #[must_use]
    pub fn array(element: DataType) -> Self {
        DataType::Array(Box::new(element))
    }

    /// Returns the name of the type's base constructor.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bigint => "bigint",
            DataType::Double => "double",
            DataType::Boolean => "boolean",
            DataType::Varchar => "varchar",
            DataType::Array(_) => "array",
        }
    }

    /// Returns the element type for arrays.
    #[must_use]
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Returns whether this type is a fixed-width type.
    #[must_use]
    pub fn is_fixed_width(&self) -> bool {
        matches!(self, DataType::Bigint | DataType::Double | DataType::Boolean)
    }

    /// Returns the byte size for fixed-width types.
    #[must_use]
    pub fn byte_size(&self) -> Option<usize> {
        match self {
            DataType::Bigint | DataType::Double => Some(8),
            DataType::Boolean => Some(1),
            DataType::Varchar | DataType::Array(_) => None,
        }
    }

    /// Converts to an Arrow data type.
    #[must_use]
    pub fn to_arrow(&self) -> arrow::datatypes::DataType {
        match self {
            DataType::Bigint => arrow::datatypes::DataType::Int64,
            DataType::Double => arrow::datatypes::DataType::Float64,
            DataType::Boolean => arrow::datatypes::DataType::Boolean,
            DataType::Varchar => arrow::datatypes::DataType::Utf8,
            DataType::Array(element) => arrow::datatypes::DataType::List(Arc::new(
                arrow::datatypes::Field::new("item", element.to_arrow(), true),
            )),
        }
    }

    /// Converts from an Arrow data type.
    ///
    /// Returns None for unsupported Arrow types.
    #[must_use]
    pub fn from_arrow(arrow_type: &arrow::datatypes::DataType) -> Option<Self> {
        match arrow_type {
            arrow::datatypes::DataType::Int64 => Some(DataType::Bigint),
            arrow::datatypes::DataType::Float64 => Some(DataType::Double),
            arrow::datatypes::DataType::Boolean => Some(DataType::Boolean),
            arrow::datatypes::DataType::Utf8 => Some(DataType::Varchar),
            arrow::datatypes::DataType::List(field) => {
                DataType::from_arrow(field.data_type()).map(DataType::array)
            }
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Array(element) => write!(f, "array({element})"),
            other => f.write_str(other.name()),
        }
    }
}
