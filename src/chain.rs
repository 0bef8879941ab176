//! Randomly addressable view of the chain
//!
//! Nothing here caches chain data: every [`Block`] and [`TxRecord`] is
//! rebuilt from the accessor when asked for, so values are cheap to copy
//! and safe to hand to parallel map workers.

use crate::access::{BlockMetadata, ChainAccess};
use crate::config::ChainIndexConfig;
use crate::error::Result;
use crate::mapreduce::{self, build_pool};
use crate::segment::{segment_chain, ChainSegment, Segment};
use crate::types::{BlockHeight, Transaction, TxIndex};
use rayon::ThreadPool;
use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;

/// A transaction together with its position in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub tx_index: TxIndex,
    pub block_height: BlockHeight,
    pub transaction: Transaction,
}

/// Block `height`, covering transactions `[first_tx_index, end_tx_index)`
#[derive(Clone, Copy)]
pub struct Block<'a> {
    height: BlockHeight,
    metadata: BlockMetadata,
    access: &'a dyn ChainAccess,
}

impl<'a> Block<'a> {
    pub(crate) fn load(access: &'a dyn ChainAccess, height: BlockHeight) -> Self {
        Self { height, metadata: access.block_metadata(height), access }
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn first_tx_index(&self) -> TxIndex {
        self.metadata.first_tx_index
    }

    pub fn end_tx_index(&self) -> TxIndex {
        self.metadata.end_tx_index()
    }

    /// Number of transactions
    pub fn size(&self) -> u32 {
        self.metadata.tx_count
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.tx_count == 0
    }

    /// Transaction at `offset` within this block
    pub fn tx(&self, offset: u32) -> Option<Result<TxRecord>> {
        if offset >= self.size() {
            return None;
        }
        Some(self.load_tx(self.first_tx_index() + offset))
    }

    pub fn transactions(&self) -> BlockTransactions<'a> {
        BlockTransactions { block: *self, next: self.first_tx_index(), end: self.end_tx_index() }
    }

    fn load_tx(&self, tx_index: TxIndex) -> Result<TxRecord> {
        Ok(TxRecord {
            tx_index,
            block_height: self.height,
            transaction: self.access.transaction(tx_index)?,
        })
    }
}

impl PartialEq for Block<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.height == other.height && self.metadata == other.metadata
    }
}

impl Eq for Block<'_> {}

impl fmt::Debug for Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("height", &self.height)
            .field("first_tx_index", &self.first_tx_index())
            .field("size", &self.size())
            .finish()
    }
}

/// Transactions of one block, loaded lazily
#[derive(Clone)]
pub struct BlockTransactions<'a> {
    block: Block<'a>,
    next: TxIndex,
    end: TxIndex,
}

impl Iterator for BlockTransactions<'_> {
    type Item = Result<TxRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let tx_index = self.next;
        self.next += 1;
        Some(self.block.load_tx(tx_index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BlockTransactions<'_> {}
impl FusedIterator for BlockTransactions<'_> {}

/// Contiguous run of blocks `[front, back)`
#[derive(Clone)]
pub struct Blocks<'a> {
    access: &'a dyn ChainAccess,
    front: BlockHeight,
    back: BlockHeight,
}

impl<'a> Blocks<'a> {
    pub(crate) fn new(access: &'a dyn ChainAccess, start: BlockHeight, end: BlockHeight) -> Self {
        Self { access, front: start, back: end.max(start) }
    }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let block = Block::load(self.access, self.front);
        self.front += 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.back - self.front) as usize;
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        let remaining = (self.back - self.front) as usize;
        self.front += n.min(remaining) as BlockHeight;
        self.next()
    }
}

impl DoubleEndedIterator for Blocks<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(Block::load(self.access, self.back))
    }
}

impl ExactSizeIterator for Blocks<'_> {}
impl FusedIterator for Blocks<'_> {}

/// The chain as an ordered sequence of blocks over a storage accessor
pub struct Blockchain<A> {
    access: A,
    last_block_height: BlockHeight,
    config: ChainIndexConfig,
    /// Dedicated map workers, present when `config.worker_threads` is set
    pool: Option<ThreadPool>,
}

impl<A: ChainAccess> Blockchain<A> {
    pub fn new(access: A) -> Self {
        let last_block_height = access.block_count();
        Self { access, last_block_height, config: ChainIndexConfig::default(), pool: None }
    }

    /// Validate `config` and build its worker pool, if any, once for the chain's lifetime
    pub fn with_config(access: A, config: ChainIndexConfig) -> Result<Self> {
        config.validate()?;
        let pool = config.worker_threads.map(build_pool).transpose()?;
        let mut chain = Self::new(access);
        chain.config = config;
        chain.pool = pool;
        Ok(chain)
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    pub fn config(&self) -> &ChainIndexConfig {
        &self.config
    }

    pub(crate) fn pool(&self) -> Option<&ThreadPool> {
        self.pool.as_ref()
    }

    /// Number of blocks, fixed when the view was created
    pub fn size(&self) -> BlockHeight {
        self.last_block_height
    }

    pub fn is_empty(&self) -> bool {
        self.last_block_height == 0
    }

    pub fn block(&self, height: BlockHeight) -> Option<Block<'_>> {
        (height < self.last_block_height).then(|| Block::load(&self.access, height))
    }

    pub fn blocks(&self) -> Blocks<'_> {
        Blocks::new(&self.access, 0, self.last_block_height)
    }

    /// Blocks `[start, end)`, clamped to the chain
    pub fn blocks_in(&self, start: BlockHeight, end: BlockHeight) -> Blocks<'_> {
        let end = end.min(self.last_block_height);
        Blocks::new(&self.access, start.min(end), end)
    }

    pub fn cursor(&self, height: BlockHeight) -> Cursor<'_, A> {
        Cursor { chain: self, position: height as i64 }
    }

    pub fn begin(&self) -> Cursor<'_, A> {
        self.cursor(0)
    }

    /// One past the last block
    pub fn end(&self) -> Cursor<'_, A> {
        self.cursor(self.last_block_height)
    }

    /// Total transactions in the chain
    pub fn tx_count(&self) -> TxIndex {
        match self.last_block_height {
            0 => 0,
            n => self.access.block_metadata(n - 1).end_tx_index(),
        }
    }

    /// Balanced, block-aligned partition of `[start_block, end_block)`
    pub fn segment(
        &self,
        start_block: BlockHeight,
        end_block: BlockHeight,
        segment_count: usize,
    ) -> Result<Vec<Segment>> {
        segment_chain(self, start_block, end_block, segment_count)
    }

    /// Parallel map over segments of `[start_block, end_block)`, folded in block order
    pub fn map_reduce<'a, M, R, MapFn, ReduceFn>(
        &'a self,
        start_block: BlockHeight,
        end_block: BlockHeight,
        map: MapFn,
        reduce: ReduceFn,
        initial: R,
    ) -> Result<R>
    where
        M: Send,
        MapFn: Fn(ChainSegment<'a>) -> Result<M> + Sync,
        ReduceFn: FnMut(R, M) -> R,
    {
        mapreduce::map_reduce(self, start_block, end_block, map, reduce, initial)
    }
}

/// Bidirectional position over block heights.
///
/// Positions may move outside `[0, size]`; only [`Cursor::block`] checks
/// bounds. Cursors are equal when they share a chain and a position;
/// cursors over different chains are unordered.
pub struct Cursor<'a, A> {
    chain: &'a Blockchain<A>,
    position: i64,
}

impl<'a, A: ChainAccess> Cursor<'a, A> {
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Rebuild the block under the cursor; `None` outside the chain
    pub fn block(&self) -> Option<Block<'a>> {
        u32::try_from(self.position).ok().and_then(|height| self.chain.block(height))
    }

    pub fn next(&mut self) {
        self.position += 1;
    }

    pub fn prev(&mut self) {
        self.position -= 1;
    }

    pub fn advance(&mut self, amount: i64) {
        self.position += amount;
    }

    /// Signed number of steps from `self` to `other`
    pub fn distance_to(&self, other: &Self) -> i64 {
        other.position - self.position
    }

    /// At the end sentinel
    pub fn is_end(&self) -> bool {
        self.position == self.chain.size() as i64
    }
}

impl<A> Clone for Cursor<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for Cursor<'_, A> {}

impl<A> PartialEq for Cursor<'_, A> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.chain, other.chain) && self.position == other.position
    }
}

impl<A> Eq for Cursor<'_, A> {}

impl<A> PartialOrd for Cursor<'_, A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        std::ptr::eq(self.chain, other.chain).then(|| self.position.cmp(&other.position))
    }
}

impl<A> fmt::Debug for Cursor<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").field("position", &self.position).finish()
    }
}
