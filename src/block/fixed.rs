//! Fixed-width blocks over Arrow primitive and boolean arrays.

use std::mem::size_of_val;

use arrow::array::{Array, ArrayBuilder, BooleanArray, BooleanBuilder, PrimitiveArray, PrimitiveBuilder};
use arrow::datatypes::{ArrowPrimitiveType, Float64Type, Int64Type};

use crate::error::{Result, StrataError};

/// Block of `i64` values.
pub type LongBlock = FixedWidthBlock<Int64Type>;
/// Block of `f64` values.
pub type DoubleBlock = FixedWidthBlock<Float64Type>;

/// Immutable fixed-width column backed by a [`PrimitiveArray`].
#[derive(Debug)]
pub struct FixedWidthBlock<T: ArrowPrimitiveType> {
    array: PrimitiveArray<T>,
}

impl<T: ArrowPrimitiveType> Clone for FixedWidthBlock<T> {
    fn clone(&self) -> Self {
        FixedWidthBlock {
            array: self.array.clone(),
        }
    }
}

impl<T: ArrowPrimitiveType> FixedWidthBlock<T> {
    /// Wraps an Arrow array without copying it.
    #[must_use]
    pub fn new(array: PrimitiveArray<T>) -> Self {
        FixedWidthBlock { array }
    }

    /// Creates a block from optional values.
    #[must_use]
    pub fn from_options(values: &[Option<T::Native>]) -> Self {
        let mut builder = FixedWidthBlockBuilder::with_capacity(values.len());
        for value in values {
            match value {
                Some(v) => builder.append(*v),
                None => builder.append_null(),
            }
        }
        builder.build()
    }

    /// Returns the underlying Arrow array.
    #[must_use]
    pub fn as_arrow(&self) -> &PrimitiveArray<T> {
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

    /// Returns the value at `position`. Null positions read as the zero value.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `position` is not in `0..len`.
    pub fn get(&self, position: usize) -> Result<T::Native> {
        check_position(position, self.len())?;
        Ok(self.array.value(position))
    }

    /// Returns the raw value slots.
    #[must_use]
    pub fn values(&self) -> &[T::Native] {
        self.array.values()
    }

    /// Returns true if any position is null.
    #[must_use]
    pub fn may_have_null(&self) -> bool {
        self.array.null_count() > 0
    }

    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.array.get_buffer_memory_size()
    }

    pub(crate) fn null_at(&self, position: usize) -> bool {
        self.array.is_null(position)
    }

    pub(crate) fn value_at(&self, position: usize) -> T::Native {
        self.array.value(position)
    }
}

/// Append-only builder for [`FixedWidthBlock`], over an Arrow [`PrimitiveBuilder`].
#[derive(Debug)]
pub struct FixedWidthBlockBuilder<T: ArrowPrimitiveType> {
    builder: PrimitiveBuilder<T>,
}

impl<T: ArrowPrimitiveType> FixedWidthBlockBuilder<T> {
    /// Creates a builder sized for `expected_entries` positions.
    #[must_use]
    pub fn with_capacity(expected_entries: usize) -> Self {
        FixedWidthBlockBuilder {
            builder: PrimitiveBuilder::with_capacity(expected_entries),
        }
    }

    /// Appends a non-null value.
    pub fn append(&mut self, value: T::Native) {
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

    /// Returns the bytes written to the builder's value and validity buffers.
    #[must_use]
    pub fn retained_size_in_bytes(&self) -> usize {
        size_of_val(self.builder.values_slice()) + self.builder.validity_slice().map_or(0, <[u8]>::len)
    }

    /// Freezes the builder into an immutable block.
    #[must_use]
    pub fn build(mut self) -> FixedWidthBlock<T> {
        FixedWidthBlock::new(self.builder.finish())
    }
}

/// Immutable boolean column backed by a [`BooleanArray`].
#[derive(Debug, Clone)]
pub struct BooleanBlock {
    array: BooleanArray,
}

impl BooleanBlock {
    /// Wraps an Arrow array without copying it.
    #[must_use]
    pub fn new(array: BooleanArray) -> Self {
        BooleanBlock { array }
    }

    #[must_use]
    pub fn as_arrow(&self) -> &BooleanArray {
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

    /// Returns the value at `position`. Null positions read as `false`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `position` is not in `0..len`.
    pub fn get(&self, position: usize) -> Result<bool> {
        check_position(position, self.len())?;
        Ok(self.array.value(position))
    }

    #[must_use]
    pub fn may_have_null(&self) -> bool {
        self.array.null_count() > 0
    }

    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.array.get_buffer_memory_size()
    }

    pub(crate) fn null_at(&self, position: usize) -> bool {
        self.array.is_null(position)
    }

    pub(crate) fn value_at(&self, position: usize) -> bool {
        self.array.value(position)
    }
}

/// Append-only builder for [`BooleanBlock`].
#[derive(Debug)]
pub struct BooleanBlockBuilder {
    builder: BooleanBuilder,
}

impl BooleanBlockBuilder {
    #[must_use]
    pub fn with_capacity(expected_entries: usize) -> Self {
        BooleanBlockBuilder {
            builder: BooleanBuilder::with_capacity(expected_entries),
        }
    }

    pub fn append(&mut self, value: bool) {
        self.builder.append_value(value);
    }

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

    /// Returns the bytes written to the builder's bitmaps.
    #[must_use]
    pub fn retained_size_in_bytes(&self) -> usize {
        self.builder.values_slice().len() + self.builder.validity_slice().map_or(0, <[u8]>::len)
    }

    #[must_use]
    pub fn build(mut self) -> BooleanBlock {
        BooleanBlock::new(self.builder.finish())
    }
}

pub(crate) fn check_position(position: usize, length: usize) -> Result<()> {
    if position >= length {
        return Err(StrataError::OutOfRange { position, length });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;

    #[test]
    fn test_builder_round_trip_with_nulls() {
        let mut builder = FixedWidthBlockBuilder::<Int64Type>::with_capacity(3);
        builder.append(10);
        builder.append_null();
        builder.append(-3);
        assert_eq!(builder.len(), 3);
        let block = builder.build();

        assert_eq!(block.len(), 3);
        assert!(block.may_have_null());
        assert!(!block.is_null(0).unwrap());
        assert!(block.is_null(1).unwrap());
        assert_eq!(block.get(2).unwrap(), -3);
        assert_eq!(block.as_arrow().null_count(), 1);
    }

    #[test]
    fn test_out_of_range_reads() {
        let block = LongBlock::from_options(&[Some(1), Some(2)]);
        assert!(matches!(
            block.get(2),
            Err(StrataError::OutOfRange {
                position: 2,
                length: 2
            })
        ));
        assert!(block.is_null(5).is_err());
    }

    #[test]
    fn test_wraps_sliced_arrow_array() {
        let array = Int64Array::from(vec![Some(1), None, Some(3), Some(4)]).slice(1, 2);
        let block = LongBlock::new(array);
        assert_eq!(block.len(), 2);
        assert!(block.is_null(0).unwrap());
        assert_eq!(block.get(1).unwrap(), 3);
        assert!(block.get(2).is_err());
    }

    #[test]
    fn test_retained_size_grows_with_rows() {
        let mut builder = FixedWidthBlockBuilder::<Float64Type>::with_capacity(0);
        assert_eq!(builder.retained_size_in_bytes(), 0);
        builder.append(1.5);
        builder.append(2.5);
        assert_eq!(builder.retained_size_in_bytes(), 16);
        builder.append_null();
        assert!(builder.retained_size_in_bytes() > 24);
    }

    #[test]
    fn test_boolean_block() {
        let mut builder = BooleanBlockBuilder::with_capacity(2);
        builder.append(true);
        builder.append_null();
        let block = builder.build();
        assert!(block.get(0).unwrap());
        assert!(block.is_null(1).unwrap());
        assert!(block.may_have_null());
        assert!(block.get(2).is_err());
    }
}
