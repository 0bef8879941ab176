//! Parallel map, ordered serial reduce over chain segments
//!
//! 1. Partition the range with [`segment_chain`]
//! 2. Map (parallel): run the map function on every segment on the worker pool
//! 3. Join: wait for every segment's result
//! 4. Reduce (sequential): fold results in block order into the accumulator
//!
//! Because the fold always sees segments in block order, order-sensitive
//! reductions such as concatenation give the same result as a single
//! sequential scan.

use crate::access::ChainAccess;
use crate::chain::Blockchain;
use crate::error::{ChainIndexError, Result};
use crate::segment::{segment_chain, ChainSegment};
use crate::types::BlockHeight;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Instant;
use tracing::{debug, debug_span};

pub fn map_reduce<'a, A, M, R, MapFn, ReduceFn>(
    chain: &'a Blockchain<A>,
    start_block: BlockHeight,
    end_block: BlockHeight,
    map: MapFn,
    reduce: ReduceFn,
    initial: R,
) -> Result<R>
where
    A: ChainAccess,
    M: Send,
    MapFn: Fn(ChainSegment<'a>) -> Result<M> + Sync,
    ReduceFn: FnMut(R, M) -> R,
{
    let _span = debug_span!("map_reduce", start_block, end_block).entered();
    let started = Instant::now();

    let pool = chain.pool();
    let workers = match pool {
        Some(pool) => pool.current_num_threads(),
        None => rayon::current_num_threads(),
    };
    let segment_count = chain.config().segment_count.unwrap_or(workers).max(1);
    let segments = segment_chain(chain, start_block, end_block, segment_count)?;

    let access: &'a dyn ChainAccess = chain.access();
    let map_all = || {
        segments
            .par_iter()
            .map(|segment| map(ChainSegment::new(access, *segment)))
            .collect::<Result<Vec<M>>>()
    };
    let partials = match pool {
        Some(pool) => pool.install(map_all),
        None => map_all(),
    }?;

    let result = partials.into_iter().fold(initial, reduce);
    debug!(
        segments = segments.len(),
        workers,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "map-reduce finished"
    );
    Ok(result)
}

pub(crate) fn build_pool(threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("chain-map-{}", i))
        .build()
        .map_err(|e| ChainIndexError::Config(format!("failed to build worker pool: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::MemoryChain;
    use crate::config::ChainIndexConfig;
    use crate::types::{Transaction, TxIndex};

    fn chain(sizes: &[u32], config: ChainIndexConfig) -> Blockchain<MemoryChain> {
        let mut next = 0;
        let mut memory = MemoryChain::new();
        for size in sizes {
            let block = (next..next + size)
                .map(|i| Transaction { version: 1, inputs: vec![], outputs: vec![], lock_time: i })
                .collect();
            memory.push_block(block);
            next += size;
        }
        Blockchain::with_config(memory, config).unwrap()
    }

    fn config(segments: usize, threads: usize) -> ChainIndexConfig {
        ChainIndexConfig {
            segment_count: Some(segments),
            worker_threads: Some(threads),
            ..ChainIndexConfig::REGTEST
        }
    }

    fn collect_tx_indexes(segment: ChainSegment<'_>) -> Result<Vec<TxIndex>> {
        segment.transactions().map(|tx| tx.map(|t| t.tx_index)).collect()
    }

    #[test]
    fn test_concatenation_matches_sequential_scan() {
        let chain = chain(&[3, 1, 4, 1, 5, 9, 2, 6], config(4, 3));
        let concat = |mut acc: Vec<_>, part: Vec<TxIndex>| {
            acc.extend(part);
            acc
        };
        let result = chain
            .map_reduce(0, chain.size(), collect_tx_indexes, concat, Vec::new())
            .unwrap();
        assert_eq!(result, (0..31u32).collect::<Vec<_>>());
    }

    #[test]
    fn test_sum_over_subrange() {
        let chain = chain(&[2, 2, 2, 2, 2], config(2, 2));
        let count_txs = |segment: ChainSegment<'_>| Ok(segment.segment().tx_count());
        let total = chain.map_reduce(1, 4, count_txs, |acc, n| acc + n, 0u32).unwrap();
        assert_eq!(total, 6);
    }

    #[test]
    fn test_reduce_sees_segment_order() {
        let chain = chain(&[1; 16], config(8, 4));
        let start_of = |segment: ChainSegment<'_>| Ok(segment.segment().start_block);
        let push = |mut acc: Vec<_>, start: BlockHeight| {
            acc.push(start);
            acc
        };
        let starts = chain.map_reduce(0, 16, start_of, push, Vec::new()).unwrap();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(starts.len(), 8);
    }

    #[test]
    fn test_map_failure_aborts() {
        let chain = chain(&[1, 1, 1, 1], config(4, 2));
        let result = chain.map_reduce(
            0,
            4,
            |segment| {
                if segment.segment().start_block == 2 {
                    Err(ChainIndexError::StorageAccess("disk gone".to_string()))
                } else {
                    Ok(1u32)
                }
            },
            |acc, n| acc + n,
            0u32,
        );
        assert_eq!(result, Err(ChainIndexError::StorageAccess("disk gone".to_string())));
    }

    #[test]
    fn test_empty_range_returns_initial() {
        let chain = chain(&[1, 1], config(2, 1));
        let result = chain.map_reduce(1, 1, |_| Ok(1u32), |acc, n| acc + n, 42u32).unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn test_default_pool() {
        let chain = chain(&[2, 2, 2], ChainIndexConfig::REGTEST);
        let count_txs = |segment: ChainSegment<'_>| Ok(segment.segment().tx_count());
        let count = chain.map_reduce(0, 3, count_txs, |a, b| a + b, 0u32).unwrap();
        assert_eq!(count, 6);
    }

    #[test]
    fn test_invalid_range_propagates() {
        let chain = chain(&[1], config(1, 1));
        let result = chain.map_reduce(0, 5, |_| Ok(()), |acc, _| acc, ());
        assert!(matches!(result, Err(ChainIndexError::InvalidRange { .. })));
    }
}
