//! Variable-width text blocks over Arrow string arrays.

use std::mem::size_of_val;

use arrow::array::{Array, ArrayBuilder, StringArray, StringBuilder};

use crate::error::Result;

use super::fixed::check_position;

/// Immutable text column backed by a [`StringArray`].
///
/// All positions share one UTF-8 buffer addressed by 32-bit offsets.
#[derive(Debug, Clone)]
pub struct VariableWidthBlock {
    array: StringArray,
}

impl VariableWidthBlock {
    /// Wraps an Arrow array without copying it.
    #[must_use]
    pub fn new(array: StringArray) -> Self {
        VariableWidthBlock { array }
    }

    /// Creates a block from optional strings.
    #[must_use]
    pub fn from_options(values: &[Option<&str>]) -> Self {
        VariableWidthBlock::new(values.iter().copied().collect())
    }

    #[must_use]
    pub fn as_arrow(&self) -> &StringArray {
        &self.array
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Returns whether the value at `position` is null.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `position` is not in `0..len`.
    pub fn is_null(&self, position: usize) -> Result<bool> {
        check_position(position, self.len())?;
        Ok(self.null_at(position))
    }

    /// Returns the text at `position`. Null positions read as `""`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `position` is not in `0..len`.
    pub fn get_str(&self, position: usize) -> Result<&str> {
        check_position(position, self.len())?;
        Ok(self.str_at(position))
    }

    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.array.get_buffer_memory_size()
    }

    #[must_use]
    pub fn may_have_null(&self) -> bool {
        self.array.null_count() > 0
    }

    pub(crate) fn null_at(&self, position: usize) -> bool {
        self.array.is_null(position)
    }

    pub(crate) fn str_at(&self, position: usize) -> &str {
        self.array.value(position)
    }
}

/// Append-only builder for [`VariableWidthBlock`], over an Arrow [`StringBuilder`].
#[derive(Debug)]
pub struct VariableWidthBlockBuilder {
    builder: StringBuilder,
}

impl Default for VariableWidthBlockBuilder {
    fn default() -> Self {
        Self::with_capacity(0, 0)
    }
}

impl VariableWidthBlockBuilder {
    /// Creates a builder sized for `expected_entries` positions totalling `expected_bytes`.
    #[must_use]
    pub fn with_capacity(expected_entries: usize, expected_bytes: usize) -> Self {
        VariableWidthBlockBuilder {
            builder: StringBuilder::with_capacity(expected_entries, expected_bytes),
        }
    }

    /// Appends a non-null text value.
    pub fn append(&mut self, value: &str) {
        self.builder.append_value(value);
    }

    /// Appends a null position.
    pub fn append_null(&mut self) {
        self.builder.append_null();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.builder.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builder.is_empty()
    }

    /// Returns the bytes written to the builder's data, offset and validity buffers.
    #[must_use]
    pub fn retained_size_in_bytes(&self) -> usize {
        self.builder.values_slice().len()
            + size_of_val(self.builder.offsets_slice())
            + self.builder.validity_slice().map_or(0, <[u8]>::len)
    }

    /// Freezes the builder into an immutable block.
    #[must_use]
    pub fn build(mut self) -> VariableWidthBlock {
        VariableWidthBlock::new(self.builder.finish())
    }
}
