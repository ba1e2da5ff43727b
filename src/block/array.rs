//! Array blocks over Arrow list arrays: offsets into one flat element block.

use std::mem::size_of_val;
use std::ops::Range;
use std::sync::Arc;

use arrow::array::{Array, BooleanBufferBuilder, ListArray};
use arrow::buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{ArrowNativeType, Field, FieldRef};
use arrow::error::ArrowError;

use crate::error::{Result, StrataError};
use crate::types::{DataType, Value};

use super::fixed::check_position;
use super::{Block, BlockBuilder, Datum};

/// Immutable column whose positions are sequences of elements.
///
/// Wraps a [`ListArray`]; position `i` owns the elements
/// `offsets[i]..offsets[i + 1]` of the flat `elements` block, which shares
/// its buffers with the list's child array.
#[derive(Debug, Clone)]
pub struct ArrayBlock {
    array: ListArray,
    elements: Arc<Block>,
}

fn element_field(element_type: &DataType) -> FieldRef {
    Arc::new(Field::new("item", element_type.to_arrow(), true))
}

impl ArrayBlock {
    /// Wraps an Arrow list array without copying its buffers.
    ///
    /// The child field is normalized to a nullable `item` field.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the element type has no block representation.
    pub fn try_new(array: &ListArray) -> Result<Self> {
        let elements = Block::try_from_arrow(array.values().as_ref())?;
        let array = ListArray::try_new(
            element_field(&elements.data_type()),
            array.offsets().clone(),
            elements.to_arrow(),
            array.nulls().cloned(),
        )?;
        Ok(ArrayBlock {
            array,
            elements: Arc::new(elements),
        })
    }

    /// Creates an array block from raw parts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPage` if the offsets are empty, decreasing, or point past
    /// the end of `elements`, or if the null mask has the wrong length.
    pub fn from_parts(offsets: &[usize], elements: Block, nulls: Option<Vec<bool>>) -> Result<Self> {
        let Some(&last) = offsets.last() else {
            return Err(StrataError::InvalidPage(
                "array offsets must contain at least one entry".into(),
            ));
        };
        if offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(StrataError::InvalidPage("array offsets must be non-decreasing".into()));
        }
        if last > elements.position_count() {
            return Err(StrataError::InvalidPage(format!(
                "array offset {last} exceeds element count {}",
                elements.position_count()
            )));
        }
        if let Some(mask) = &nulls {
            if mask.len() + 1 != offsets.len() {
                return Err(StrataError::InvalidPage(format!(
                    "null mask has {} entries for {} arrays",
                    mask.len(),
                    offsets.len() - 1
                )));
            }
        }
        let offsets = offsets
            .iter()
            .map(|&offset| list_offset(offset))
            .collect::<Result<Vec<i32>>>()?;
        // Arrow validity is the inverse of a null mask.
        let nulls = nulls
            .filter(|mask| mask.iter().any(|&null| null))
            .map(|mask| mask.iter().map(|&null| !null).collect::<NullBuffer>());
        let array = ListArray::try_new(
            element_field(&elements.data_type()),
            OffsetBuffer::new(ScalarBuffer::from(offsets)),
            elements.to_arrow(),
            nulls,
        )?;
        Ok(ArrayBlock {
            array,
            elements: Arc::new(elements),
        })
    }

    #[must_use]
    pub fn as_arrow(&self) -> &ListArray {
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

    #[must_use]
    pub fn element_type(&self) -> DataType {
        self.elements.data_type()
    }

    /// Returns the flat element block shared by all positions.
    #[must_use]
    pub fn elements(&self) -> &Block {
        &self.elements
    }

    /// Returns the offsets sequence, `len + 1` entries.
    #[must_use]
    pub fn offsets(&self) -> &[i32] {
        self.array.value_offsets()
    }

    /// Returns whether the array at `position` is null.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `position` is not in `0..len`.
    pub fn is_null(&self, position: usize) -> Result<bool> {
        check_position(position, self.len())?;
        Ok(self.null_at(position))
    }

    /// Returns a view over the elements of the array at `position`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `position` is not in `0..len`.
    pub fn get_array(&self, position: usize) -> Result<ArrayView<'_>> {
        check_position(position, self.len())?;
        Ok(self.view_at(position))
    }

    #[must_use]
    pub fn may_have_null(&self) -> bool {
        self.array.null_count() > 0
    }

    /// Returns the estimated size of the block in bytes, elements included.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.array.get_buffer_memory_size()
    }

    pub(crate) fn null_at(&self, position: usize) -> bool {
        self.array.is_null(position)
    }

    pub(crate) fn view_at(&self, position: usize) -> ArrayView<'_> {
        let offsets = self.array.value_offsets();
        ArrayView {
            elements: &self.elements,
            range: offsets[position].as_usize()..offsets[position + 1].as_usize(),
        }
    }
}

fn list_offset(offset: usize) -> Result<i32> {
    i32::try_from(offset).map_err(|_| {
        StrataError::Arrow(ArrowError::InvalidArgumentError(format!(
            "array offset {offset} exceeds 32-bit list offsets"
        )))
    })
}

/// Borrowed view of one array position: a range of the flat element block.
#[derive(Debug, Clone)]
pub struct ArrayView<'a> {
    elements: &'a Block,
    range: Range<usize>,
}

impl<'a> ArrayView<'a> {
    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    #[must_use]
    pub fn element_type(&self) -> DataType {
        self.elements.data_type()
    }

    /// Returns the flat element block this view borrows from.
    #[must_use]
    pub fn elements(&self) -> &'a Block {
        self.elements
    }

    /// Returns the positions of this array's elements within [`Self::elements`].
    #[must_use]
    pub fn element_positions(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Returns the element at `index` (relative to the start of the array).
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `index` is not in `0..len`.
    pub fn get(&self, index: usize) -> Result<Datum<'a>> {
        check_position(index, self.len())?;
        self.elements.get_datum(self.range.start + index)
    }

    /// Copies the elements out as owned values.
    ///
    /// # Errors
    ///
    /// Propagates element read failures.
    pub fn to_values(&self) -> Result<Vec<Value>> {
        self.range
            .clone()
            .map(|position| self.elements.get_value(position))
            .collect()
    }
}

/// Append-only builder for [`ArrayBlock`].
///
/// Positions are written with `begin_entry`, element writes, `close_entry`.
/// Element writes are only accepted while an entry is open. The finished
/// parts are assembled into a [`ListArray`] by `build`.
#[derive(Debug)]
pub struct ArrayBlockBuilder {
    offsets: Vec<i32>,
    validity: BooleanBufferBuilder,
    has_null: bool,
    elements: Box<BlockBuilder>,
    entry_open: bool,
}

impl ArrayBlockBuilder {
    /// Creates a builder for arrays of `element_type`.
    #[must_use]
    pub fn new(element_type: &DataType, expected_entries: usize) -> Self {
        let mut offsets = Vec::with_capacity(expected_entries + 1);
        offsets.push(0);
        ArrayBlockBuilder {
            offsets,
            validity: BooleanBufferBuilder::new(expected_entries),
            has_null: false,
            elements: Box::new(BlockBuilder::new(element_type, expected_entries)),
            entry_open: false,
        }
    }

    #[must_use]
    pub fn element_type(&self) -> DataType {
        self.elements.data_type()
    }

    /// Returns the number of closed positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validity.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    /// Returns true while an entry is open, at this level or a nested one.
    #[must_use]
    pub fn has_open_entry(&self) -> bool {
        self.entry_open
    }

    /// Opens a new array position.
    ///
    /// When an entry is already open the call opens a nested entry in the
    /// element builder instead.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if the element builder cannot open an entry.
    pub fn begin_entry(&mut self) -> Result<()> {
        if self.entry_open {
            return self.elements.begin_entry();
        }
        self.entry_open = true;
        Ok(())
    }

    /// Seals the innermost open entry.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if no entry is open, or an Arrow error if
    /// the element count no longer fits 32-bit list offsets.
    pub fn close_entry(&mut self) -> Result<()> {
        if !self.entry_open {
            return Err(StrataError::ProtocolViolation(
                "close_entry called without begin_entry".into(),
            ));
        }
        if let BlockBuilder::Array(inner) = self.elements.as_mut() {
            if inner.has_open_entry() {
                return inner.close_entry();
            }
        }
        let offset = list_offset(self.elements.position_count())?;
        self.entry_open = false;
        self.offsets.push(offset);
        self.validity.append(true);
        Ok(())
    }

    /// Returns the element builder of the open entry.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if no entry is open.
    pub fn element_builder(&mut self) -> Result<&mut BlockBuilder> {
        if !self.entry_open {
            return Err(StrataError::ProtocolViolation(
                "array element written without begin_entry".into(),
            ));
        }
        Ok(&mut self.elements)
    }

    /// Appends a null element to the open entry, or a null array otherwise.
    ///
    /// # Errors
    ///
    /// Propagates element builder failures.
    pub fn append_null(&mut self) -> Result<()> {
        if self.entry_open {
            return self.elements.append_null();
        }
        let offset = list_offset(self.elements.position_count())?;
        self.offsets.push(offset);
        self.validity.append(false);
        self.has_null = true;
        Ok(())
    }

    /// Returns the bytes written to the builder, element builder included.
    #[must_use]
    pub fn retained_size_in_bytes(&self) -> usize {
        size_of_val(self.offsets.as_slice())
            + self.validity.as_slice().len()
            + self.elements.retained_size_in_bytes()
    }

    /// Freezes the builder into an immutable block.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if an entry is still open.
    pub fn build(mut self) -> Result<ArrayBlock> {
        if self.entry_open {
            return Err(StrataError::ProtocolViolation(
                "build called while an array entry is open".into(),
            ));
        }
        let nulls = self.has_null.then(|| NullBuffer::new(self.validity.finish()));
        let elements = self.elements.build()?;
        let array = ListArray::try_new(
            element_field(&elements.data_type()),
            OffsetBuffer::new(ScalarBuffer::from(self.offsets)),
            elements.to_arrow(),
            nulls,
        )?;
        Ok(ArrayBlock {
            array,
            elements: Arc::new(elements),
        })
    }
}
