//! Storage accessor abstraction consumed by [`crate::chain::Blockchain`]
//!
//! Any backend that can report per-block transaction ranges and hand out
//! transactions by global index can drive the traversal engine. The
//! accessor is shared across map workers, so it must be `Sync`.

use crate::error::{ChainIndexError, Result};
use crate::types::{BlockHeight, Transaction, TxIndex};

/// Transaction range of one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMetadata {
    pub first_tx_index: TxIndex,
    pub tx_count: u32,
}

impl BlockMetadata {
    pub fn end_tx_index(&self) -> TxIndex {
        self.first_tx_index + self.tx_count
    }
}

pub trait ChainAccess: Sync {
    /// Number of blocks available
    fn block_count(&self) -> BlockHeight;

    /// Metadata for `height`, which callers guarantee is below `block_count()`
    fn block_metadata(&self, height: BlockHeight) -> BlockMetadata;

    /// Reconstruct the transaction at a global index
    fn transaction(&self, tx_index: TxIndex) -> Result<Transaction>;
}

/// Fully in-memory chain, mostly useful for tests and small fixtures
#[derive(Debug, Clone, Default)]
pub struct MemoryChain {
    blocks: Vec<BlockMetadata>,
    transactions: Vec<Transaction>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blocks(blocks: impl IntoIterator<Item = Vec<Transaction>>) -> Self {
        let mut chain = Self::new();
        for block in blocks {
            chain.push_block(block);
        }
        chain
    }

    /// Append a block, returning its height
    pub fn push_block(&mut self, transactions: Vec<Transaction>) -> BlockHeight {
        let metadata = BlockMetadata {
            first_tx_index: self.transactions.len() as TxIndex,
            tx_count: transactions.len() as u32,
        };
        self.blocks.push(metadata);
        self.transactions.extend(transactions);
        (self.blocks.len() - 1) as BlockHeight
    }
}

impl ChainAccess for MemoryChain {
    fn block_count(&self) -> BlockHeight {
        self.blocks.len() as BlockHeight
    }

    fn block_metadata(&self, height: BlockHeight) -> BlockMetadata {
        self.blocks[height as usize]
    }

    fn transaction(&self, tx_index: TxIndex) -> Result<Transaction> {
        self.transactions.get(tx_index as usize).cloned().ok_or_else(|| {
            ChainIndexError::StorageAccess(format!("transaction {} not found", tx_index))
        })
    }
}
