//! Filters built on the map-reduce engine
//!
//! Each query maps a segment to the matches it contains and concatenates
//! the per-segment matches in block order, so results come back in chain
//! order no matter how the segments were scheduled.

use crate::access::ChainAccess;
use crate::chain::{Block, Blockchain, TxRecord};
use crate::error::Result;
use crate::script_output::AnyScriptOutput;
use crate::types::{AddressKind, BlockHeight};

fn concat<T>(mut acc: Vec<T>, part: Vec<T>) -> Vec<T> {
    acc.reserve(part.len());
    acc.extend(part);
    acc
}

/// Blocks in `[start_block, end_block)` accepted by `predicate`
pub fn filter_blocks<'a, A, P>(
    chain: &'a Blockchain<A>,
    start_block: BlockHeight,
    end_block: BlockHeight,
    predicate: P,
) -> Result<Vec<Block<'a>>>
where
    A: ChainAccess,
    P: Fn(&Block<'a>) -> bool + Sync,
{
    chain.map_reduce(
        start_block,
        end_block,
        |segment| Ok(segment.blocks().filter(|block| predicate(block)).collect()),
        concat,
        Vec::new(),
    )
}

/// Transactions in `[start_block, end_block)` accepted by `predicate`
pub fn filter_transactions<A, P>(
    chain: &Blockchain<A>,
    start_block: BlockHeight,
    end_block: BlockHeight,
    predicate: P,
) -> Result<Vec<TxRecord>>
where
    A: ChainAccess,
    P: Fn(&TxRecord) -> bool + Sync,
{
    chain.map_reduce(
        start_block,
        end_block,
        |segment| {
            let mut matches = Vec::new();
            for tx in segment.transactions() {
                let tx = tx?;
                if predicate(&tx) {
                    matches.push(tx);
                }
            }
            Ok(matches)
        },
        concat,
        Vec::new(),
    )
}

/// Kind an output is indexed under. Template matches that fail validation
/// count as non-standard.
fn indexed_kind(script_pubkey: &[u8], witness_activated: bool) -> AddressKind {
    let script = AnyScriptOutput::from_script(script_pubkey, witness_activated);
    if script.is_valid() {
        script.kind()
    } else {
        AddressKind::Nonstandard
    }
}

/// Transactions with at least one output classified as `kind`
pub fn transactions_including_output<A: ChainAccess>(
    chain: &Blockchain<A>,
    start_block: BlockHeight,
    end_block: BlockHeight,
    kind: AddressKind,
) -> Result<Vec<TxRecord>> {
    let config = *chain.config();
    let includes_kind = |tx: &TxRecord| {
        let witness_activated = config.witness_activated(tx.block_height);
        tx.transaction
            .outputs
            .iter()
            .any(|output| indexed_kind(&output.script_pubkey, witness_activated) == kind)
    };
    filter_transactions(chain, start_block, end_block, includes_kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::MemoryChain;
    use crate::config::ChainIndexConfig;
    use crate::constants::*;
    use crate::types::{Transaction, TransactionOutput};

    fn tx(lock_time: u32, script_pubkey: Vec<u8>) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TransactionOutput { value: 1_000, script_pubkey }],
            lock_time,
        }
    }

    fn test_config() -> ChainIndexConfig {
        ChainIndexConfig {
            segment_count: Some(3),
            worker_threads: Some(2),
            segwit_activation_height: 2,
        }
    }

    fn wpkh() -> Vec<u8> {
        let mut script = vec![OP_0, 0x14];
        script.extend_from_slice(&[1u8; 20]);
        script
    }

    /// `OP_1 <key> OP_2 OP_CHECKMULTISIG`: well formed but claims a missing key
    fn short_multisig() -> Vec<u8> {
        let mut script = vec![OP_1, 0x21, 0x02];
        script.extend_from_slice(&[4u8; 32]);
        script.extend_from_slice(&[OP_1 + 1, OP_CHECKMULTISIG]);
        script
    }

    fn chain() -> Blockchain<MemoryChain> {
        let memory = MemoryChain::from_blocks(vec![
            vec![tx(0, vec![OP_RETURN]), tx(1, vec![0x51])],
            vec![tx(2, wpkh())],
            vec![tx(3, wpkh()), tx(4, vec![OP_RETURN, 0x01, 0x07])],
            vec![],
            vec![tx(5, vec![0x51]), tx(7, short_multisig())],
        ]);
        Blockchain::with_config(memory, test_config()).unwrap()
    }

    #[test]
    fn test_filter_blocks() {
        let chain = chain();
        let blocks = filter_blocks(&chain, 0, chain.size(), |block| block.size() >= 2).unwrap();
        let heights: Vec<_> = blocks.iter().map(|b| b.height()).collect();
        assert_eq!(heights, vec![0, 2, 4]);
    }

    #[test]
    fn test_filter_transactions_in_order() {
        let chain = chain();
        let odd_lock_time = |tx: &TxRecord| tx.transaction.lock_time % 2 == 1;
        let txs = filter_transactions(&chain, 0, chain.size(), odd_lock_time).unwrap();
        let indexes: Vec<_> = txs.iter().map(|t| t.tx_index).collect();
        assert_eq!(indexes, vec![1, 3, 5, 6]);
    }

    #[test]
    fn test_including_null_data() {
        let chain = chain();
        let txs =
            transactions_including_output(&chain, 0, chain.size(), AddressKind::NullData).unwrap();
        let indexes: Vec<_> = txs.iter().map(|t| t.tx_index).collect();
        assert_eq!(indexes, vec![0, 4]);
    }

    #[test]
    fn test_including_witness_respects_activation() {
        let chain = chain();
        let kind = AddressKind::WitnessPubkeyHash;
        let txs = transactions_including_output(&chain, 0, chain.size(), kind).unwrap();
        // Block 1 predates activation, so only the block 2 output counts
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].block_height, 2);
    }

    #[test]
    fn test_inconsistent_multisig_counts_as_nonstandard() {
        let chain = chain();
        let end = chain.size();
        let multisig = transactions_including_output(&chain, 0, end, AddressKind::Multisig);
        assert!(multisig.unwrap().is_empty());

        let nonstandard =
            transactions_including_output(&chain, 0, end, AddressKind::Nonstandard).unwrap();
        let indexes: Vec<_> = nonstandard.iter().map(|t| t.tx_index).collect();
        // OP_1 scripts, pre-activation witness programs and the short multisig
        assert_eq!(indexes, vec![1, 2, 5, 6]);
    }
}
