//! Output resolution for one index-construction session
//!
//! The indexer owns the [`AddressState`] for the session. Blocks are fed in
//! chain order; every output is classified, resolved and returned so the
//! caller can persist the assigned ids.

use crate::address_state::AddressState;
use crate::chain::Block;
use crate::config::ChainIndexConfig;
use crate::error::Result;
use crate::script_output::AnyScriptOutput;
use crate::types::{BlockHeight, ScriptType, Transaction};
use tracing::{info, warn};

/// Counters for one indexed block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub transactions: u32,
    pub outputs: u32,
    /// Outputs that received an id never handed out before
    pub new_addresses: u32,
    /// Outputs that parsed but failed validation and were stored as non-standard
    pub fallbacks: u32,
}

impl IndexStats {
    fn record(&mut self, outputs: &[AnyScriptOutput], fallbacks: u32) {
        self.transactions += 1;
        self.outputs += outputs.len() as u32;
        self.new_addresses += outputs.iter().filter(|o| o.is_new()).count() as u32;
        self.fallbacks += fallbacks;
    }
}

/// Resolved outputs of one block, one `Vec` per transaction in block order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedBlock {
    pub height: BlockHeight,
    pub stats: IndexStats,
    pub outputs: Vec<Vec<AnyScriptOutput>>,
}

/// Classify an output, replacing a template match that fails validation
/// with a non-standard output. The flag is set when that happened.
fn classify(script_pubkey: &[u8], witness_activated: bool) -> (AnyScriptOutput, bool) {
    let script = AnyScriptOutput::from_script(script_pubkey, witness_activated);
    if script.is_valid() {
        (script, false)
    } else {
        (AnyScriptOutput::nonstandard(script_pubkey), true)
    }
}

#[derive(Debug, Default)]
pub struct ScriptIndexer {
    state: AddressState,
    config: ChainIndexConfig,
}

impl ScriptIndexer {
    pub fn new(config: ChainIndexConfig) -> Self {
        Self { state: AddressState::new(), config }
    }

    /// Continue a session from an existing state
    pub fn with_state(state: AddressState, config: ChainIndexConfig) -> Self {
        Self { state, config }
    }

    pub fn state(&self) -> &AddressState {
        &self.state
    }

    pub fn into_state(self) -> AddressState {
        self.state
    }

    /// Resolve every output of `tx`, in output order
    pub fn index_transaction(
        &mut self,
        tx: &Transaction,
        height: BlockHeight,
    ) -> Vec<AnyScriptOutput> {
        self.index_outputs(tx, height).0
    }

    fn index_outputs(
        &mut self,
        tx: &Transaction,
        height: BlockHeight,
    ) -> (Vec<AnyScriptOutput>, u32) {
        let witness_activated = self.config.witness_activated(height);
        let mut fallbacks = 0;
        let mut outputs = Vec::with_capacity(tx.outputs.len());
        for (vout, output) in tx.outputs.iter().enumerate() {
            let (mut script, fell_back) = classify(&output.script_pubkey, witness_activated);
            if fell_back {
                warn!(height, vout, "invalid output script, storing as non-standard");
                fallbacks += 1;
            }
            script.resolve(&mut self.state);
            outputs.push(script);
        }
        (outputs, fallbacks)
    }

    /// Resolve every output of every transaction in `block`.
    ///
    /// All transactions are loaded before anything is resolved, so a storage
    /// failure leaves the session untouched and the block can be retried.
    pub fn index_block(&mut self, block: &Block<'_>) -> Result<IndexedBlock> {
        let records = block.transactions().collect::<Result<Vec<_>>>()?;

        let mut stats = IndexStats::default();
        let mut outputs = Vec::with_capacity(records.len());
        for record in &records {
            let (resolved, fallbacks) =
                self.index_outputs(&record.transaction, record.block_height);
            stats.record(&resolved, fallbacks);
            outputs.push(resolved);
        }
        info!(
            height = block.height(),
            transactions = stats.transactions,
            outputs = stats.outputs,
            new_addresses = stats.new_addresses,
            fallbacks = stats.fallbacks,
            pubkeys = self.state.address_count(ScriptType::Pubkey),
            script_hashes = self.state.address_count(ScriptType::ScriptHash),
            "indexed block"
        );
        Ok(IndexedBlock { height: block.height(), stats, outputs })
    }

    /// Classify and look up the outputs of `tx` without recording anything
    pub fn verify_transaction(
        &self,
        tx: &Transaction,
        height: BlockHeight,
    ) -> Vec<AnyScriptOutput> {
        let witness_activated = self.config.witness_activated(height);
        tx.outputs
            .iter()
            .map(|output| {
                let (mut script, _) = classify(&output.script_pubkey, witness_activated);
                script.check(&self.state);
                script
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{BlockMetadata, ChainAccess, MemoryChain};
    use crate::chain::Blockchain;
    use crate::constants::*;
    use crate::error::ChainIndexError;
    use crate::types::{AddressKind, TransactionOutput, TxIndex};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn p2pkh(seed: u8) -> Vec<u8> {
        let mut script = vec![OP_DUP, OP_HASH160, 0x14];
        script.extend_from_slice(&[seed; 20]);
        script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        script
    }

    fn paying(scripts: Vec<Vec<u8>>) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: scripts
                .into_iter()
                .map(|script_pubkey| TransactionOutput { value: 546, script_pubkey })
                .collect(),
            lock_time: 0,
        }
    }

    #[test]
    fn test_index_transaction_dedups_within_tx() {
        let mut indexer = ScriptIndexer::new(ChainIndexConfig::REGTEST);
        let tx = paying(vec![p2pkh(1), p2pkh(2), p2pkh(1)]);
        let outputs = indexer.index_transaction(&tx, 0);
        let ids: Vec<_> = outputs
            .iter()
            .map(|o| (o.address().address_num, o.is_new()))
            .collect();
        assert_eq!(ids, vec![(1, true), (2, true), (1, false)]);
    }

    #[test]
    fn test_verify_transaction_is_read_only() {
        let mut indexer = ScriptIndexer::new(ChainIndexConfig::REGTEST);
        indexer.index_transaction(&paying(vec![p2pkh(7)]), 0);
        let before = indexer.state().clone();

        let tx = paying(vec![p2pkh(7), p2pkh(8), vec![OP_RETURN]]);
        let checked = indexer.verify_transaction(&tx, 0);
        assert_eq!(checked[0].address().address_num, 1);
        assert!(!checked[0].is_new());
        assert_eq!(checked[1].address().address_num, 0);
        assert!(checked[1].is_new());
        assert_eq!(checked[2].kind(), AddressKind::NullData);
        assert_eq!(checked[2].address().address_num, 0);

        assert_eq!(indexer.state().len(), before.len());
        assert_eq!(
            indexer.state().address_count(ScriptType::Pubkey),
            before.address_count(ScriptType::Pubkey)
        );
    }

    #[test]
    fn test_index_block_stats() {
        let chain = Blockchain::new(MemoryChain::from_blocks(vec![vec![
            paying(vec![p2pkh(1), vec![OP_RETURN, 0x01, 0xaa]]),
            paying(vec![p2pkh(1), p2pkh(3)]),
        ]]));
        let mut indexer = ScriptIndexer::new(ChainIndexConfig::REGTEST);
        let indexed = indexer.index_block(&chain.block(0).unwrap()).unwrap();
        assert_eq!(
            indexed.stats,
            IndexStats { transactions: 2, outputs: 4, new_addresses: 3, fallbacks: 0 }
        );
        assert_eq!(indexed.outputs.len(), 2);
        assert_eq!(indexed.outputs[1][1].address().address_num, 2);
        assert_eq!(indexer.into_state().address_count(ScriptType::Pubkey), 2);
    }

    #[test]
    fn test_inconsistent_multisig_stored_as_nonstandard() {
        let mut key = vec![0x02];
        key.extend_from_slice(&[5u8; 32]);
        // OP_1 <key> OP_2 OP_CHECKMULTISIG: claims two keys, carries one
        let mut script = vec![OP_1, key.len() as u8];
        script.extend_from_slice(&key);
        script.extend_from_slice(&[OP_1 + 1, OP_CHECKMULTISIG]);

        let chain = Blockchain::new(MemoryChain::from_blocks(vec![vec![paying(vec![script])]]));
        let mut indexer = ScriptIndexer::new(ChainIndexConfig::REGTEST);
        let indexed = indexer.index_block(&chain.block(0).unwrap()).unwrap();

        assert_eq!(indexed.stats.fallbacks, 1);
        assert_eq!(indexed.outputs[0][0].kind(), AddressKind::Nonstandard);
        assert_eq!(indexer.state().address_count(ScriptType::Multisig), 0);
        assert_eq!(indexer.state().address_count(ScriptType::Pubkey), 0);
        assert_eq!(indexer.state().address_count(ScriptType::Nonstandard), 1);
    }

    struct FlakyChain {
        inner: MemoryChain,
        broken: AtomicBool,
    }

    impl ChainAccess for FlakyChain {
        fn block_count(&self) -> BlockHeight {
            self.inner.block_count()
        }

        fn block_metadata(&self, height: BlockHeight) -> BlockMetadata {
            self.inner.block_metadata(height)
        }

        fn transaction(&self, tx_index: TxIndex) -> Result<Transaction> {
            if tx_index == 1 && self.broken.load(Ordering::SeqCst) {
                return Err(ChainIndexError::StorageAccess("io".to_string()));
            }
            self.inner.transaction(tx_index)
        }
    }

    #[test]
    fn test_storage_failure_leaves_session_untouched() {
        let chain = Blockchain::new(FlakyChain {
            inner: MemoryChain::from_blocks(vec![vec![
                paying(vec![p2pkh(1)]),
                paying(vec![p2pkh(2)]),
            ]]),
            broken: AtomicBool::new(true),
        });
        let mut indexer = ScriptIndexer::new(ChainIndexConfig::REGTEST);

        let block = chain.block(0).unwrap();
        assert_eq!(
            indexer.index_block(&block),
            Err(ChainIndexError::StorageAccess("io".to_string()))
        );
        assert!(indexer.state().is_empty());
        assert_eq!(indexer.state().address_count(ScriptType::Pubkey), 0);

        chain.access().broken.store(false, Ordering::SeqCst);
        let indexed = indexer.index_block(&block).unwrap();
        assert_eq!(indexed.stats.new_addresses, 2);
        assert!(indexed.outputs.iter().flatten().all(|o| o.is_new()));
    }

    #[test]
    fn test_segwit_height_changes_classification() {
        let mut wpkh = vec![OP_0, 0x14];
        wpkh.extend_from_slice(&[9u8; 20]);
        let config =
            ChainIndexConfig { segwit_activation_height: 100, ..ChainIndexConfig::REGTEST };
        let mut indexer = ScriptIndexer::new(config);

        let before = indexer.index_transaction(&paying(vec![wpkh.clone()]), 99);
        assert_eq!(before[0].kind(), AddressKind::Nonstandard);
        let after = indexer.index_transaction(&paying(vec![wpkh]), 100);
        assert_eq!(after[0].kind(), AddressKind::WitnessPubkeyHash);
        assert_eq!(after[0].address().address_num, 1);
    }

    #[test]
    fn test_session_can_resume() {
        let mut first = ScriptIndexer::new(ChainIndexConfig::REGTEST);
        first.index_transaction(&paying(vec![p2pkh(1)]), 0);
        let mut second = ScriptIndexer::with_state(first.into_state(), ChainIndexConfig::REGTEST);
        let outputs = second.index_transaction(&paying(vec![p2pkh(1), p2pkh(2)]), 1);
        assert!(!outputs[0].is_new());
        assert_eq!(outputs[1].address().address_num, 2);
    }
}
