//! Logical types and owned runtime values.

mod data_type;
mod value;

pub use data_type::DataType;
pub use value::Value;
pub(crate) use value::write_double;
