//! Core types shared by the address index and the chain traversal engine

use bitcoin_hashes::{sha256d, Hash as BitcoinHash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash type: 256-bit hash
pub type Hash256 = [u8; 32];

/// Hash type: 160-bit hash
pub type Hash160 = [u8; 20];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Block height (position in the chain)
pub type BlockHeight = u32;

/// Global transaction index (position across the whole chain)
pub type TxIndex = u32;

/// OutPoint: reference to a previous transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash256,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: ByteString,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: i64,
    pub script_pubkey: ByteString,
}

/// A transaction as handed out by the storage layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Double SHA-256 over a legacy (non-witness) serialization
    pub fn txid(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(64 + self.outputs.len() * 40);
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_compact_size(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(&input.prevout.hash);
            buf.extend_from_slice(&input.prevout.index.to_le_bytes());
            write_compact_size(&mut buf, input.script_sig.len() as u64);
            buf.extend_from_slice(&input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_compact_size(&mut buf, output.script_pubkey.len() as u64);
            buf.extend_from_slice(&output.script_pubkey);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        sha256d::Hash::hash(&buf).into_inner()
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].prevout.hash == [0u8; 32]
            && self.inputs[0].prevout.index == u32::MAX
    }
}

fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Spending-condition shapes recognized by the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AddressKind {
    Pubkey,
    PubkeyHash,
    WitnessPubkeyHash,
    ScriptHash,
    WitnessScriptHash,
    Multisig,
    Nonstandard,
    NullData,
}

impl AddressKind {
    pub const ALL: [AddressKind; 8] = [
        AddressKind::Pubkey,
        AddressKind::PubkeyHash,
        AddressKind::WitnessPubkeyHash,
        AddressKind::ScriptHash,
        AddressKind::WitnessScriptHash,
        AddressKind::Multisig,
        AddressKind::Nonstandard,
        AddressKind::NullData,
    ];

    /// Id space this kind allocates from. Kinds sharing a space share ids.
    pub const fn script_type(self) -> ScriptType {
        match self {
            AddressKind::Pubkey | AddressKind::PubkeyHash | AddressKind::WitnessPubkeyHash => {
                ScriptType::Pubkey
            }
            AddressKind::ScriptHash | AddressKind::WitnessScriptHash => ScriptType::ScriptHash,
            AddressKind::Multisig => ScriptType::Multisig,
            AddressKind::Nonstandard => ScriptType::Nonstandard,
            AddressKind::NullData => ScriptType::NullData,
        }
    }

    pub const fn is_deduped(self) -> bool {
        self.script_type().is_deduped()
    }

    pub const fn name(self) -> &'static str {
        match self {
            AddressKind::Pubkey => "pubkey",
            AddressKind::PubkeyHash => "pubkeyhash",
            AddressKind::WitnessPubkeyHash => "witness_pubkeyhash",
            AddressKind::ScriptHash => "scripthash",
            AddressKind::WitnessScriptHash => "witness_scripthash",
            AddressKind::Multisig => "multisig",
            AddressKind::Nonstandard => "nonstandard",
            AddressKind::NullData => "nulldata",
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Id allocation space. Only `Pubkey` and `ScriptHash` are deduplicated by hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScriptType {
    Pubkey,
    ScriptHash,
    Multisig,
    Nonstandard,
    NullData,
}

impl ScriptType {
    pub const COUNT: usize = 5;

    pub const ALL: [ScriptType; ScriptType::COUNT] = [
        ScriptType::Pubkey,
        ScriptType::ScriptHash,
        ScriptType::Multisig,
        ScriptType::Nonstandard,
        ScriptType::NullData,
    ];

    pub const fn is_deduped(self) -> bool {
        matches!(self, ScriptType::Pubkey | ScriptType::ScriptHash)
    }

    pub(crate) const fn slot(self) -> usize {
        match self {
            ScriptType::Pubkey => 0,
            ScriptType::ScriptHash => 1,
            ScriptType::Multisig => 2,
            ScriptType::Nonstandard => 3,
            ScriptType::NullData => 4,
        }
    }
}

/// Dedup key: `(hash, script_type)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawScript {
    pub hash: Hash160,
    pub script_type: ScriptType,
}

impl RawScript {
    pub fn new(hash: Hash160, script_type: ScriptType) -> Self {
        Self { hash, script_type }
    }
}

/// Canonical identity of a resolved script.
///
/// `address_num` is scoped to `kind.script_type()`. Zero means the script
/// has no identity yet (only produced by the read-only check path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub address_num: u32,
    pub kind: AddressKind,
}

impl Address {
    pub fn new(address_num: u32, kind: AddressKind) -> Self {
        Self { address_num, kind }
    }

    pub fn script_type(&self) -> ScriptType {
        self.kind.script_type()
    }

    pub fn is_resolved(&self) -> bool {
        self.address_num != 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.address_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_script_type_mapping() {
        assert_eq!(AddressKind::PubkeyHash.script_type(), ScriptType::Pubkey);
        assert_eq!(AddressKind::WitnessPubkeyHash.script_type(), ScriptType::Pubkey);
        assert_eq!(AddressKind::WitnessScriptHash.script_type(), ScriptType::ScriptHash);
        assert_eq!(AddressKind::Multisig.script_type(), ScriptType::Multisig);
    }

    #[test]
    fn test_dedup_descriptor() {
        let deduped: Vec<_> = AddressKind::ALL.iter().filter(|k| k.is_deduped()).collect();
        assert_eq!(deduped.len(), 5);
        assert!(!AddressKind::Multisig.is_deduped());
        assert!(!AddressKind::Nonstandard.is_deduped());
        assert!(!AddressKind::NullData.is_deduped());
    }

    #[test]
    fn test_script_type_slots_unique() {
        let mut slots: Vec<_> = ScriptType::ALL.iter().map(|t| t.slot()).collect();
        slots.sort();
        slots.dedup();
        assert_eq!(slots.len(), ScriptType::COUNT);
    }

    #[test]
    fn test_txid_is_deterministic() {
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TransactionOutput { value: 1000, script_pubkey: vec![0x51] }],
            lock_time: 0,
        };
        assert_eq!(tx.txid(), tx.clone().txid());

        let mut other = tx.clone();
        other.lock_time = 1;
        assert_ne!(tx.txid(), other.txid());
    }

    #[test]
    fn test_is_coinbase() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: [0; 32], index: u32::MAX },
                script_sig: vec![],
                sequence: u32::MAX,
            }],
            outputs: vec![],
            lock_time: 0,
        };
        assert!(tx.is_coinbase());
    }

    #[test]
    fn test_address_display() {
        let address = Address::new(7, AddressKind::ScriptHash);
        assert_eq!(address.to_string(), "scripthash:7");
        assert!(address.is_resolved());
        assert!(!Address::new(0, AddressKind::Pubkey).is_resolved());
    }
}
