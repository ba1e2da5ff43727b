//! Pages: ordered batches of equal-length blocks.

use std::sync::Arc;

use crate::error::{Result, StrataError};
use crate::types::DataType;

use super::{Block, BlockBuilder};

/// Immutable batch of channels sharing one position count.
#[derive(Debug, Clone)]
pub struct Page {
    blocks: Arc<[Block]>,
    position_count: usize,
}

impl Page {
    /// Creates a page from at least one block.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPage` if there are no blocks or their position counts differ.
    pub fn new(blocks: Vec<Block>) -> Result<Self> {
        let Some(first) = blocks.first() else {
            return Err(StrataError::InvalidPage(
                "a page without channels needs an explicit position count".into(),
            ));
        };
        let position_count = first.position_count();
        Self::with_position_count(position_count, blocks)
    }

    /// Creates a page with an explicit position count, which allows zero channels.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPage` if any block's position count differs.
    pub fn with_position_count(position_count: usize, blocks: Vec<Block>) -> Result<Self> {
        if let Some((channel, block)) = blocks
            .iter()
            .enumerate()
            .find(|(_, block)| block.position_count() != position_count)
        {
            return Err(StrataError::InvalidPage(format!(
                "channel {channel} has {} positions, page has {position_count}",
                block.position_count()
            )));
        }
        Ok(Page {
            blocks: blocks.into(),
            position_count,
        })
    }

    /// Returns the number of positions (rows).
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.position_count
    }

    /// Returns the number of channels (columns).
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the block for `channel`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPage` if the channel does not exist.
    pub fn block(&self, channel: usize) -> Result<&Block> {
        self.blocks.get(channel).ok_or_else(|| {
            StrataError::InvalidPage(format!(
                "channel {channel} requested from a page with {} channels",
                self.blocks.len()
            ))
        })
    }

    /// Returns all blocks in channel order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Returns the channel types in order.
    #[must_use]
    pub fn types(&self) -> Vec<DataType> {
        self.blocks.iter().map(Block::data_type).collect()
    }

    /// Returns the estimated size of the page in bytes.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.blocks.iter().map(Block::size_in_bytes).sum()
    }
}

/// Builds one output page: a builder per channel plus a declared position count.
#[derive(Debug)]
pub struct PageBuilder {
    types: Vec<DataType>,
    builders: Vec<BlockBuilder>,
    declared_positions: usize,
    expected_positions: usize,
}

impl PageBuilder {
    /// Creates a page builder for `types`, sized for `expected_positions`.
    #[must_use]
    pub fn new(types: &[DataType], expected_positions: usize) -> Self {
        PageBuilder {
            types: types.to_vec(),
            builders: types
                .iter()
                .map(|t| BlockBuilder::new(t, expected_positions))
                .collect(),
            declared_positions: 0,
            expected_positions,
        }
    }

    /// Returns the builder for `channel`.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is out of range; channels are fixed at construction.
    pub fn block_builder(&mut self, channel: usize) -> &mut BlockBuilder {
        &mut self.builders[channel]
    }

    /// Records that every channel received one more position.
    pub fn declare_position(&mut self) {
        self.declared_positions += 1;
    }

    /// Returns the number of declared positions.
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.declared_positions
    }

    /// Returns true if no position was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declared_positions == 0
    }

    /// Returns the output channel types.
    #[must_use]
    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    /// Returns the bytes held by all channel builders.
    #[must_use]
    pub fn retained_size_in_bytes(&self) -> usize {
        self.builders.iter().map(BlockBuilder::retained_size_in_bytes).sum()
    }

    /// Freezes the builder into a page and leaves a fresh, empty builder in its place.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPage` if a channel's count differs from the declared count,
    /// or `ProtocolViolation` if an array entry is still open.
    pub fn take_page(&mut self) -> Result<Page> {
        let fresh = PageBuilder::new(&self.types, self.expected_positions);
        std::mem::replace(self, fresh).build()
    }

    /// Freezes the builder into a page.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPage` if a channel's count differs from the declared count,
    /// or `ProtocolViolation` if an array entry is still open.
    pub fn build(self) -> Result<Page> {
        let blocks = self
            .builders
            .into_iter()
            .map(BlockBuilder::build)
            .collect::<Result<Vec<_>>>()?;
        Page::with_position_count(self.declared_positions, blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_page_rejects_unequal_channels() {
        let a = Block::from_values(&DataType::Bigint, &[Value::Bigint(1), Value::Bigint(2)]).unwrap();
        let b = Block::from_values(&DataType::Boolean, &[Value::Boolean(true)]).unwrap();
        assert!(matches!(Page::new(vec![a.clone(), b]), Err(StrataError::InvalidPage(_))));
        assert!(Page::new(vec![]).is_err());

        let page = Page::new(vec![a]).unwrap();
        assert_eq!(page.position_count(), 2);
        assert_eq!(page.channel_count(), 1);
        assert!(page.block(1).is_err());
    }

    #[test]
    fn test_zero_channel_page() {
        let page = Page::with_position_count(5, vec![]).unwrap();
        assert_eq!(page.position_count(), 5);
        assert_eq!(page.channel_count(), 0);
    }

    #[test]
    fn test_page_builder_take_page_resets() {
        let mut builder = PageBuilder::new(&[DataType::Bigint, DataType::Varchar], 4);
        builder.block_builder(0).write_long(7).unwrap();
        builder.block_builder(1).write_str("seven").unwrap();
        builder.declare_position();

        let page = builder.take_page().unwrap();
        assert_eq!(page.position_count(), 1);
        assert_eq!(page.block(1).unwrap().get_str(0).unwrap(), "seven");
        assert!(builder.is_empty());
        assert_eq!(builder.types(), &[DataType::Bigint, DataType::Varchar]);
    }

    #[test]
    fn test_page_builder_detects_undeclared_positions() {
        let mut builder = PageBuilder::new(&[DataType::Bigint], 1);
        builder.block_builder(0).write_long(1).unwrap();
        assert!(builder.build().is_err());
    }
}
