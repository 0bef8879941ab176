//! Block-aligned partitioning of a chain range by transaction count
//!
//! A range `[start_block, end_block)` is cut at block boundaries into at most
//! `segment_count` pieces of roughly `total_tx / segment_count`
//! transactions each. Blocks are never split, so individual segments can be
//! larger or smaller than the target; the guarantee is that every block and
//! every transaction of the range lands in exactly one segment.

use crate::access::ChainAccess;
use crate::chain::{Block, Blockchain, Blocks, TxRecord};
use crate::error::{ChainIndexError, Result};
use crate::types::{BlockHeight, TxIndex};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Blocks `[start_block, end_block)` holding transactions `[first_tx_index, end_tx_index)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_block: BlockHeight,
    pub end_block: BlockHeight,
    pub first_tx_index: TxIndex,
    pub end_tx_index: TxIndex,
}

impl Segment {
    pub fn tx_count(&self) -> u32 {
        self.end_tx_index - self.first_tx_index
    }

    pub fn block_count(&self) -> u32 {
        self.end_block - self.start_block
    }

    /// Bind the segment to `chain`; fails if its blocks lie outside the chain
    pub fn view<'a, A: ChainAccess>(&self, chain: &'a Blockchain<A>) -> Result<ChainSegment<'a>> {
        if self.start_block > self.end_block || self.end_block > chain.size() {
            return Err(ChainIndexError::InvalidRange {
                start: self.start_block,
                end: self.end_block,
                size: chain.size(),
            });
        }
        Ok(ChainSegment::new(chain.access(), *self))
    }
}

/// A segment bound to the chain it was cut from; the unit of work handed to map functions
#[derive(Clone, Copy)]
pub struct ChainSegment<'a> {
    segment: Segment,
    access: &'a dyn ChainAccess,
}

impl<'a> ChainSegment<'a> {
    pub(crate) fn new(access: &'a dyn ChainAccess, segment: Segment) -> Self {
        Self { segment, access }
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn blocks(&self) -> Blocks<'a> {
        Blocks::new(self.access, self.segment.start_block, self.segment.end_block)
    }

    /// Every transaction of the segment in chain order
    pub fn transactions(&self) -> impl Iterator<Item = Result<TxRecord>> + 'a {
        self.blocks().flat_map(|block: Block<'a>| block.transactions())
    }
}

impl std::fmt::Debug for ChainSegment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ChainSegment").field(&self.segment).finish()
    }
}

/// Partition `[start_block, end_block)` of `chain` into at most `segment_count` segments.
///
/// Fails with [`ChainIndexError::IndexConsistencyViolation`] if the block
/// metadata is not contiguous or the segments do not account for every
/// transaction of the range.
pub fn segment_chain<A: ChainAccess>(
    chain: &Blockchain<A>,
    start_block: BlockHeight,
    end_block: BlockHeight,
    segment_count: usize,
) -> Result<Vec<Segment>> {
    if start_block > end_block || end_block > chain.size() {
        return Err(ChainIndexError::InvalidRange {
            start: start_block,
            end: end_block,
            size: chain.size(),
        });
    }
    if segment_count == 0 {
        return Err(ChainIndexError::InvalidSegmentCount);
    }
    if start_block == end_block {
        return Ok(Vec::new());
    }

    let access = chain.access();
    let mut boundaries = Vec::with_capacity((end_block - start_block) as usize + 1);
    let mut end_tx = access.block_metadata(start_block).first_tx_index;
    for height in start_block..end_block {
        let metadata = access.block_metadata(height);
        if metadata.first_tx_index != end_tx {
            return Err(ChainIndexError::IndexConsistencyViolation(format!(
                "block {} starts at transaction {}, previous block ends at {}",
                height, metadata.first_tx_index, end_tx
            )));
        }
        boundaries.push(metadata.first_tx_index);
        end_tx = metadata.end_tx_index();
    }
    boundaries.push(end_tx);

    let segments = segment_tx_boundaries(&boundaries, start_block, segment_count)?;
    debug!(
        start_block,
        end_block,
        requested = segment_count,
        produced = segments.len(),
        total_tx = end_tx - boundaries[0],
        "segmented chain range"
    );
    Ok(segments)
}

/// Core partitioning over precomputed boundaries.
///
/// `boundaries[i]` is the first transaction index of block `start_block + i`;
/// the final entry is the end transaction index of the last block, so
/// `boundaries.len()` is one more than the number of blocks.
pub fn segment_tx_boundaries(
    boundaries: &[TxIndex],
    start_block: BlockHeight,
    segment_count: usize,
) -> Result<Vec<Segment>> {
    if segment_count == 0 {
        return Err(ChainIndexError::InvalidSegmentCount);
    }
    if boundaries.len() < 2 {
        return Ok(Vec::new());
    }
    if let Some(pos) = boundaries.windows(2).position(|w| w[0] > w[1]) {
        return Err(ChainIndexError::IndexConsistencyViolation(format!(
            "transaction boundaries decrease after block {}",
            start_block as usize + pos
        )));
    }

    let block_count = boundaries.len() - 1;
    let first_tx = boundaries[0];
    let last_tx = boundaries[block_count];
    let target = (last_tx - first_tx) as f64 / segment_count as f64;

    let make_segment = |start: usize, end: usize| Segment {
        start_block: start_block + start as BlockHeight,
        end_block: start_block + end as BlockHeight,
        first_tx_index: boundaries[start],
        end_tx_index: boundaries[end],
    };

    let mut segments: Vec<Segment> = Vec::with_capacity(segment_count.min(block_count));
    let mut it = 0;
    while segments.len() < segment_count && (last_tx - boundaries[it]) as f64 > target {
        let breakpoint = boundaries[it] as f64 + target;
        let below_breakpoint = |&tx: &TxIndex| (tx as f64) < breakpoint;
        let found = it + boundaries[it..block_count].partition_point(below_breakpoint);
        // A tiny target can vanish in float rounding next to a large index
        let end = found.max(it + 1);
        segments.push(make_segment(it, end));
        it = end;
    }

    if it < block_count {
        if segments.len() < segment_count {
            segments.push(make_segment(it, block_count));
        } else if let Some(last) = segments.last_mut() {
            last.end_block = start_block + block_count as BlockHeight;
            last.end_tx_index = last_tx;
        }
    }

    let counted: u64 = segments.iter().map(|s| s.tx_count() as u64).sum();
    let expected = (last_tx - first_tx) as u64;
    if counted != expected {
        return Err(ChainIndexError::IndexConsistencyViolation(format!(
            "segments hold {} transactions, range holds {}",
            counted, expected
        )));
    }
    Ok(segments)
}
