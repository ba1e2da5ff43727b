//! Columnar batch model.
//!
//! A [`Page`] is an ordered set of equal-length [`Block`]s ("channels"). Blocks
//! are immutable and cheap to clone; they are produced by the matching
//! [`BlockBuilder`], whose `build` consumes the builder so a frozen block can
//! never be written again.
//!
//! Every block wraps an Arrow array and every builder an Arrow builder:
//! - fixed-width scalars ([`FixedWidthBlock`], [`BooleanBlock`])
//! - variable-width text ([`VariableWidthBlock`])
//! - arrays: list offsets over one flat element block ([`ArrayBlock`])

mod array;
mod arrow;
mod datum;
mod fixed;
mod page;
mod variable;

pub use array::{ArrayBlock, ArrayBlockBuilder, ArrayView};
pub use datum::Datum;
pub use fixed::{
    BooleanBlock, BooleanBlockBuilder, DoubleBlock, FixedWidthBlock, FixedWidthBlockBuilder, LongBlock,
};
pub use page::{Page, PageBuilder};
pub use variable::{VariableWidthBlock, VariableWidthBlockBuilder};

use std::borrow::Cow;

use ::arrow::datatypes::{Float64Type, Int64Type};

use crate::error::{Result, StrataError};
use crate::types::{DataType, Value};

/// Immutable column of a single type.
#[derive(Debug, Clone)]
pub enum Block {
    Bigint(LongBlock),
    Double(DoubleBlock),
    Boolean(BooleanBlock),
    Varchar(VariableWidthBlock),
    Array(ArrayBlock),
}

impl Block {
    /// Builds a block of `data_type` from owned values.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if a value does not fit `data_type`.
    pub fn from_values(data_type: &DataType, values: &[Value]) -> Result<Self> {
        let mut builder = BlockBuilder::new(data_type, values.len());
        for value in values {
            builder.append_value(value)?;
        }
        builder.build()
    }

    /// Returns the block's type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Block::Bigint(_) => DataType::Bigint,
            Block::Double(_) => DataType::Double,
            Block::Boolean(_) => DataType::Boolean,
            Block::Varchar(_) => DataType::Varchar,
            Block::Array(b) => DataType::array(b.element_type()),
        }
    }

    /// Returns the number of positions.
    #[must_use]
    pub fn position_count(&self) -> usize {
        match self {
            Block::Bigint(b) => b.len(),
            Block::Double(b) => b.len(),
            Block::Boolean(b) => b.len(),
            Block::Varchar(b) => b.len(),
            Block::Array(b) => b.len(),
        }
    }

    /// Returns the estimated size of the block in bytes.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Block::Bigint(b) => b.size_in_bytes(),
            Block::Double(b) => b.size_in_bytes(),
            Block::Boolean(b) => b.size_in_bytes(),
            Block::Varchar(b) => b.size_in_bytes(),
            Block::Array(b) => b.size_in_bytes(),
        }
    }

    /// Returns whether the value at `position` is null.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `position` is not in `0..position_count`.
    pub fn is_null(&self, position: usize) -> Result<bool> {
        match self {
            Block::Bigint(b) => b.is_null(position),
            Block::Double(b) => b.is_null(position),
            Block::Boolean(b) => b.is_null(position),
            Block::Varchar(b) => b.is_null(position),
            Block::Array(b) => b.is_null(position),
        }
    }

    /// Reads a bigint.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for non-bigint blocks and `OutOfRange` for bad positions.
    pub fn get_long(&self, position: usize) -> Result<i64> {
        match self {
            Block::Bigint(b) => b.get(position),
            other => Err(StrataError::type_mismatch(DataType::Bigint, other.data_type())),
        }
    }

    /// Reads a double.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for non-double blocks and `OutOfRange` for bad positions.
    pub fn get_double(&self, position: usize) -> Result<f64> {
        match self {
            Block::Double(b) => b.get(position),
            other => Err(StrataError::type_mismatch(DataType::Double, other.data_type())),
        }
    }

    /// Reads a boolean.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for non-boolean blocks and `OutOfRange` for bad positions.
    pub fn get_boolean(&self, position: usize) -> Result<bool> {
        match self {
            Block::Boolean(b) => b.get(position),
            other => Err(StrataError::type_mismatch(DataType::Boolean, other.data_type())),
        }
    }

    /// Reads text.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for non-varchar blocks and `OutOfRange` for bad positions.
    pub fn get_str(&self, position: usize) -> Result<&str> {
        match self {
            Block::Varchar(b) => b.get_str(position),
            other => Err(StrataError::type_mismatch(DataType::Varchar, other.data_type())),
        }
    }

    /// Reads an array as a view over the flat element block.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for non-array blocks and `OutOfRange` for bad positions.
    pub fn get_array(&self, position: usize) -> Result<ArrayView<'_>> {
        match self {
            Block::Array(b) => b.get_array(position),
            other => Err(StrataError::type_mismatch("array", other.data_type())),
        }
    }

    /// Reads the value at `position` without copying text or arrays.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `position` is not in `0..position_count`.
    pub fn get_datum(&self, position: usize) -> Result<Datum<'_>> {
        if self.is_null(position)? {
            return Ok(Datum::Null);
        }
        Ok(match self {
            Block::Bigint(b) => Datum::Bigint(b.value_at(position)),
            Block::Double(b) => Datum::Double(b.value_at(position)),
            Block::Boolean(b) => Datum::Boolean(b.value_at(position)),
            Block::Varchar(b) => Datum::Varchar(Cow::Borrowed(b.str_at(position))),
            Block::Array(b) => Datum::Array(b.view_at(position)),
        })
    }

    /// Reads the value at `position` as an owned [`Value`].
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `position` is not in `0..position_count`.
    pub fn get_value(&self, position: usize) -> Result<Value> {
        self.get_datum(position)?.to_value()
    }
}

/// Mutable, append-only companion of [`Block`].
///
/// A builder is owned by a single writer. `build` consumes it.
#[derive(Debug)]
pub enum BlockBuilder {
    Bigint(FixedWidthBlockBuilder<Int64Type>),
    Double(FixedWidthBlockBuilder<Float64Type>),
    Boolean(BooleanBlockBuilder),
    Varchar(VariableWidthBlockBuilder),
    Array(ArrayBlockBuilder),
}

impl BlockBuilder {
    /// Creates a builder for `data_type` sized for `expected_entries` positions.
    #[must_use]
    pub fn new(data_type: &DataType, expected_entries: usize) -> Self {
        match data_type {
            DataType::Bigint => BlockBuilder::Bigint(FixedWidthBlockBuilder::with_capacity(expected_entries)),
            DataType::Double => BlockBuilder::Double(FixedWidthBlockBuilder::with_capacity(expected_entries)),
            DataType::Boolean => BlockBuilder::Boolean(BooleanBlockBuilder::with_capacity(expected_entries)),
            DataType::Varchar => {
                BlockBuilder::Varchar(VariableWidthBlockBuilder::with_capacity(expected_entries, 0))
            }
            DataType::Array(element) => BlockBuilder::Array(ArrayBlockBuilder::new(element, expected_entries)),
        }
    }

    /// Returns the type of the block being built.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            BlockBuilder::Bigint(_) => DataType::Bigint,
            BlockBuilder::Double(_) => DataType::Double,
            BlockBuilder::Boolean(_) => DataType::Boolean,
            BlockBuilder::Varchar(_) => DataType::Varchar,
            BlockBuilder::Array(b) => DataType::array(b.element_type()),
        }
    }

    /// Returns the number of completed positions.
    #[must_use]
    pub fn position_count(&self) -> usize {
        match self {
            BlockBuilder::Bigint(b) => b.len(),
            BlockBuilder::Double(b) => b.len(),
            BlockBuilder::Boolean(b) => b.len(),
            BlockBuilder::Varchar(b) => b.len(),
            BlockBuilder::Array(b) => b.len(),
        }
    }

    /// Returns the bytes held by the builder's buffers.
    #[must_use]
    pub fn retained_size_in_bytes(&self) -> usize {
        match self {
            BlockBuilder::Bigint(b) => b.retained_size_in_bytes(),
            BlockBuilder::Double(b) => b.retained_size_in_bytes(),
            BlockBuilder::Boolean(b) => b.retained_size_in_bytes(),
            BlockBuilder::Varchar(b) => b.retained_size_in_bytes(),
            BlockBuilder::Array(b) => b.retained_size_in_bytes(),
        }
    }

    /// Appends a null. On an array builder with an open entry this is a null element.
    ///
    /// # Errors
    ///
    /// Propagates nested array builder failures.
    pub fn append_null(&mut self) -> Result<()> {
        match self {
            BlockBuilder::Bigint(b) => b.append_null(),
            BlockBuilder::Double(b) => b.append_null(),
            BlockBuilder::Boolean(b) => b.append_null(),
            BlockBuilder::Varchar(b) => b.append_null(),
            BlockBuilder::Array(b) => return b.append_null(),
        }
        Ok(())
    }

    /// Appends a bigint (an element, for array builders).
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` on a builder of another type and
    /// `ProtocolViolation` on an array builder with no open entry.
    pub fn write_long(&mut self, value: i64) -> Result<()> {
        match self {
            BlockBuilder::Bigint(b) => {
                b.append(value);
                Ok(())
            }
            BlockBuilder::Array(b) => b.element_builder()?.write_long(value),
            other => Err(StrataError::type_mismatch(other.data_type(), DataType::Bigint)),
        }
    }

    /// Appends a double (an element, for array builders).
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` on a builder of another type and
    /// `ProtocolViolation` on an array builder with no open entry.
    pub fn write_double(&mut self, value: f64) -> Result<()> {
        match self {
            BlockBuilder::Double(b) => {
                b.append(value);
                Ok(())
            }
            BlockBuilder::Array(b) => b.element_builder()?.write_double(value),
            other => Err(StrataError::type_mismatch(other.data_type(), DataType::Double)),
        }
    }

    /// Appends a boolean (an element, for array builders).
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` on a builder of another type and
    /// `ProtocolViolation` on an array builder with no open entry.
    pub fn write_boolean(&mut self, value: bool) -> Result<()> {
        match self {
            BlockBuilder::Boolean(b) => {
                b.append(value);
                Ok(())
            }
            BlockBuilder::Array(b) => b.element_builder()?.write_boolean(value),
            other => Err(StrataError::type_mismatch(other.data_type(), DataType::Boolean)),
        }
    }

    /// Appends text (an element, for array builders).
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` on a builder of another type and
    /// `ProtocolViolation` on an array builder with no open entry.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        match self {
            BlockBuilder::Varchar(b) => {
                b.append(value);
                Ok(())
            }
            BlockBuilder::Array(b) => b.element_builder()?.write_str(value),
            other => Err(StrataError::type_mismatch(other.data_type(), DataType::Varchar)),
        }
    }

    /// Opens an array entry.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` on non-array builders.
    pub fn begin_entry(&mut self) -> Result<()> {
        match self {
            BlockBuilder::Array(b) => b.begin_entry(),
            other => Err(StrataError::ProtocolViolation(format!(
                "begin_entry called on a {} builder",
                other.data_type()
            ))),
        }
    }

    /// Closes the innermost open array entry.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` on non-array builders or without an open entry.
    pub fn close_entry(&mut self) -> Result<()> {
        match self {
            BlockBuilder::Array(b) => b.close_entry(),
            other => Err(StrataError::ProtocolViolation(format!(
                "close_entry called on a {} builder",
                other.data_type()
            ))),
        }
    }

    /// Appends a datum as one position (or one element of an open entry).
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the datum does not fit the builder.
    pub fn append_datum(&mut self, datum: &Datum<'_>) -> Result<()> {
        match datum {
            Datum::Null => self.append_null(),
            Datum::Bigint(v) => self.write_long(*v),
            Datum::Double(v) => self.write_double(*v),
            Datum::Boolean(v) => self.write_boolean(*v),
            Datum::Varchar(v) => self.write_str(v),
            Datum::Array(view) => {
                self.begin_entry()?;
                let elements = view.elements();
                for position in view.element_positions() {
                    self.append_datum(&elements.get_datum(position)?)?;
                }
                self.close_entry()
            }
        }
    }

    /// Appends an owned value as one position (or one element of an open entry).
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the value does not fit the builder.
    pub fn append_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.append_null(),
            Value::Bigint(v) => self.write_long(*v),
            Value::Double(v) => self.write_double(*v),
            Value::Boolean(v) => self.write_boolean(*v),
            Value::Varchar(v) => self.write_str(v),
            Value::Array(values) => {
                self.begin_entry()?;
                for element in values {
                    self.append_value(element)?;
                }
                self.close_entry()
            }
        }
    }

    /// Freezes the builder into an immutable block.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if an array entry is still open.
    pub fn build(self) -> Result<Block> {
        Ok(match self {
            BlockBuilder::Bigint(b) => Block::Bigint(b.build()),
            BlockBuilder::Double(b) => Block::Double(b.build()),
            BlockBuilder::Boolean(b) => Block::Boolean(b.build()),
            BlockBuilder::Varchar(b) => Block::Varchar(b.build()),
            BlockBuilder::Array(b) => Block::Array(b.build()?),
        })
    }
}
