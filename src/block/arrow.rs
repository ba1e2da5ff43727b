//! Zero-copy access between blocks/pages and Arrow arrays/record batches.
//!
//! Blocks already hold Arrow arrays, so both directions only clone
//! reference-counted buffers.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, ListArray, StringArray};
use arrow::datatypes::{DataType as ArrowDataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::{Result, StrataError};

use super::{ArrayBlock, Block, BooleanBlock, DoubleBlock, LongBlock, Page, VariableWidthBlock};

impl Block {
    /// Returns the block's Arrow array.
    #[must_use]
    pub fn to_arrow(&self) -> ArrayRef {
        match self {
            Block::Bigint(b) => Arc::new(b.as_arrow().clone()),
            Block::Double(b) => Arc::new(b.as_arrow().clone()),
            Block::Boolean(b) => Arc::new(b.as_arrow().clone()),
            Block::Varchar(b) => Arc::new(b.as_arrow().clone()),
            Block::Array(b) => Arc::new(b.as_arrow().clone()),
        }
    }

    /// Wraps an Arrow array as a block.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for Arrow types without a block representation.
    pub fn try_from_arrow(array: &dyn Array) -> Result<Self> {
        match array.data_type() {
            ArrowDataType::Int64 => Ok(Block::Bigint(LongBlock::new(downcast::<Int64Array>(array)?.clone()))),
            ArrowDataType::Float64 => {
                Ok(Block::Double(DoubleBlock::new(downcast::<Float64Array>(array)?.clone())))
            }
            ArrowDataType::Boolean => {
                Ok(Block::Boolean(BooleanBlock::new(downcast::<BooleanArray>(array)?.clone())))
            }
            ArrowDataType::Utf8 => Ok(Block::Varchar(VariableWidthBlock::new(
                downcast::<StringArray>(array)?.clone(),
            ))),
            ArrowDataType::List(_) => Ok(Block::Array(ArrayBlock::try_new(downcast::<ListArray>(array)?)?)),
            other => Err(StrataError::type_mismatch(
                "Int64, Float64, Boolean, Utf8 or List",
                other,
            )),
        }
    }
}

fn downcast<T: 'static>(array: &dyn Array) -> Result<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        StrataError::type_mismatch(std::any::type_name::<T>(), array.data_type())
    })
}

impl Page {
    /// Returns the page as a record batch with columns named `_col0`, `_col1`, ...
    ///
    /// # Errors
    ///
    /// Returns an Arrow error if the batch cannot be assembled.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let columns = self.blocks().iter().map(Block::to_arrow).collect::<Vec<_>>();
        let options = RecordBatchOptions::new().with_row_count(Some(self.position_count()));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(self.arrow_schema()),
            columns,
            &options,
        )?)
    }

    /// Wraps a record batch as a page.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for columns without a block representation.
    pub fn try_from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let blocks = batch
            .columns()
            .iter()
            .map(|column| Block::try_from_arrow(column.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Page::with_position_count(batch.num_rows(), blocks)
    }

    /// Returns the page's channel types as an Arrow schema.
    #[must_use]
    pub fn arrow_schema(&self) -> Schema {
        Schema::new(
            self.types()
                .iter()
                .enumerate()
                .map(|(channel, data_type)| Field::new(format!("_col{channel}"), data_type.to_arrow(), true))
                .collect::<Vec<_>>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Value};

    #[test]
    fn test_array_page_through_record_batch() {
        let arrays = Block::from_values(
            &DataType::array(DataType::Bigint),
            &[
                Value::Array(vec![Value::Bigint(1), Value::Null]),
                Value::Null,
                Value::Array(vec![]),
            ],
        )
        .unwrap();
        let names = Block::from_values(
            &DataType::Varchar,
            &[Value::Varchar("a".into()), Value::Null, Value::Varchar("c".into())],
        )
        .unwrap();
        let page = Page::new(vec![arrays, names]).unwrap();

        let batch = page.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.schema().field(0).name(), "_col0");

        let restored = Page::try_from_record_batch(&batch).unwrap();
        assert_eq!(restored.types(), page.types());
        for channel in 0..page.channel_count() {
            for position in 0..page.position_count() {
                assert_eq!(
                    restored.block(channel).unwrap().get_value(position).unwrap(),
                    page.block(channel).unwrap().get_value(position).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_conversion_shares_buffers() {
        let block = Block::from_values(&DataType::Bigint, &[Value::Bigint(1), Value::Bigint(2)]).unwrap();
        let exported = block.to_arrow();
        let Block::Bigint(original) = &block else {
            panic!("expected a bigint block");
        };
        let exported = exported.as_any().downcast_ref::<Int64Array>().unwrap();
        assert!(exported.values().inner().ptr_eq(original.as_arrow().values().inner()));
    }

    #[test]
    fn test_sliced_arrow_input() {
        let array = Int64Array::from(vec![Some(1), None, Some(3), Some(4)]).slice(1, 2);
        let block = Block::try_from_arrow(&array).unwrap();
        assert_eq!(block.position_count(), 2);
        assert!(block.is_null(0).unwrap());
        assert_eq!(block.get_long(1).unwrap(), 3);
    }

    #[test]
    fn test_unsupported_arrow_type() {
        let array = arrow::array::Int32Array::from(vec![1, 2]);
        assert!(matches!(
            Block::try_from_arrow(&array),
            Err(StrataError::TypeMismatch { .. })
        ));
    }
}
