//! Per-kind script payloads
//!
//! Each payload knows how to extract itself from an output script, how to
//! produce its dedup hash (deduped kinds only) and how to resolve any nested
//! scripts it carries.

use crate::address_state::AddressState;
use crate::constants::*;
use crate::error::{ChainIndexError, Result};
use crate::script::{
    decode_small_int, hash160, instructions, is_pubkey_encoding, read_hash160, read_hash256,
    ripemd160, Instruction,
};
use crate::script_output::ScriptOutput;
use crate::types::{AddressKind, ByteString, Hash160, Hash256};

/// Capabilities shared by every script payload
pub trait ScriptData: Sized {
    const KIND: AddressKind;

    /// Extract the payload from a complete output script
    fn parse(script: &[u8]) -> Result<Self>;

    /// Dedup hash. `Some` exactly when `KIND` is deduped.
    fn hash(&self) -> Option<Hash160>;

    /// Resolve nested scripts. Only called the first time the outer script is seen.
    fn resolve(&mut self, _state: &mut AddressState) {}

    /// Read-only counterpart of [`ScriptData::resolve`]
    fn check(&mut self, _state: &AddressState) {}

    fn is_valid(&self) -> bool {
        true
    }
}

fn invalid(kind: AddressKind, reason: &str) -> ChainIndexError {
    ChainIndexError::InvalidScript(format!("{}: {}", kind, reason))
}

/// Pay-to-pubkey: `<pubkey> OP_CHECKSIG`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubkeyScript {
    pub pubkey: ByteString,
}

impl PubkeyScript {
    pub fn from_pubkey(pubkey: &[u8]) -> Result<Self> {
        if !is_pubkey_encoding(pubkey) {
            return Err(invalid(
                Self::KIND,
                &format!("{} bytes is not a public key encoding", pubkey.len()),
            ));
        }
        Ok(Self { pubkey: pubkey.to_vec() })
    }
}

impl ScriptData for PubkeyScript {
    const KIND: AddressKind = AddressKind::Pubkey;

    fn parse(script: &[u8]) -> Result<Self> {
        match instructions(script)?.as_slice() {
            [Instruction::PushBytes(pubkey), Instruction::Op(OP_CHECKSIG)] => {
                Self::from_pubkey(pubkey)
            }
            _ => Err(invalid(Self::KIND, "expected <pubkey> OP_CHECKSIG")),
        }
    }

    fn hash(&self) -> Option<Hash160> {
        Some(hash160(&self.pubkey))
    }
}

/// Pay-to-pubkey-hash: `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubkeyHashScript {
    pub hash: Hash160,
}

impl ScriptData for PubkeyHashScript {
    const KIND: AddressKind = AddressKind::PubkeyHash;

    fn parse(script: &[u8]) -> Result<Self> {
        match script {
            [OP_DUP, OP_HASH160, 0x14, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] => {
                Ok(Self { hash: read_hash160(hash)? })
            }
            _ => Err(invalid(Self::KIND, "script does not match P2PKH template")),
        }
    }

    fn hash(&self) -> Option<Hash160> {
        Some(self.hash)
    }
}

/// Version 0 witness pubkey hash: `OP_0 <20>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessPubkeyHashScript {
    pub hash: Hash160,
}

impl ScriptData for WitnessPubkeyHashScript {
    const KIND: AddressKind = AddressKind::WitnessPubkeyHash;

    fn parse(script: &[u8]) -> Result<Self> {
        match script {
            [OP_0, len, program @ ..] if *len as usize == WITNESS_PUBKEYHASH_SIZE => {
                Ok(Self { hash: read_hash160(program)? })
            }
            _ => Err(invalid(Self::KIND, "script does not match P2WPKH template")),
        }
    }

    fn hash(&self) -> Option<Hash160> {
        Some(self.hash)
    }
}

/// Pay-to-script-hash: `OP_HASH160 <20> OP_EQUAL`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptHashScript {
    pub hash: Hash160,
}

impl ScriptData for ScriptHashScript {
    const KIND: AddressKind = AddressKind::ScriptHash;

    fn parse(script: &[u8]) -> Result<Self> {
        match script {
            [OP_HASH160, 0x14, hash @ .., OP_EQUAL] => Ok(Self { hash: read_hash160(hash)? }),
            _ => Err(invalid(Self::KIND, "script does not match P2SH template")),
        }
    }

    fn hash(&self) -> Option<Hash160> {
        Some(self.hash)
    }
}

/// Version 0 witness script hash: `OP_0 <32>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessScriptHashScript {
    pub hash: Hash256,
}

impl ScriptData for WitnessScriptHashScript {
    const KIND: AddressKind = AddressKind::WitnessScriptHash;

    fn parse(script: &[u8]) -> Result<Self> {
        match script {
            [OP_0, len, program @ ..] if *len as usize == WITNESS_SCRIPTHASH_SIZE => {
                Ok(Self { hash: read_hash256(program)? })
            }
            _ => Err(invalid(Self::KIND, "script does not match P2WSH template")),
        }
    }

    /// RIPEMD160 of the SHA256 program equals the HASH160 a P2SH wrapper of
    /// the same redeem script commits to, so both share one id.
    fn hash(&self) -> Option<Hash160> {
        Some(ripemd160(&self.hash))
    }
}

/// Bare multisig: `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`
///
/// Not deduplicated itself; each member key resolves as a deduped pubkey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigScript {
    pub num_required: u8,
    pub num_total: u8,
    pub addresses: Vec<ScriptOutput<PubkeyScript>>,
}

impl MultisigScript {
    pub fn new(num_required: u8, num_total: u8) -> Self {
        Self { num_required, num_total, addresses: Vec::with_capacity(num_total as usize) }
    }

    pub fn add_address(&mut self, pubkey: &[u8]) -> Result<()> {
        if self.addresses.len() >= MAX_MULTISIG_KEYS {
            return Err(invalid(Self::KIND, "too many keys"));
        }
        self.addresses.push(ScriptOutput::new(PubkeyScript::from_pubkey(pubkey)?));
        Ok(())
    }

    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }
}

impl ScriptData for MultisigScript {
    const KIND: AddressKind = AddressKind::Multisig;

    /// Matches the template only. Key counts that disagree with the pushed
    /// keys still parse and are reported by [`ScriptData::is_valid`].
    fn parse(script: &[u8]) -> Result<Self> {
        let ops = instructions(script)?;
        let (first, middle, n_op) = match ops.as_slice() {
            [first, middle @ .., n_op, Instruction::Op(OP_CHECKMULTISIG)] => (first, middle, n_op),
            _ => return Err(invalid(Self::KIND, "missing OP_CHECKMULTISIG")),
        };
        let small_int = |ins: &Instruction<'_>| match ins {
            Instruction::Op(op) => decode_small_int(*op).filter(|n| *n >= 1),
            Instruction::PushBytes(_) => None,
        };
        let (num_required, num_total) = match (small_int(first), small_int(n_op)) {
            (Some(m), Some(n)) => (m, n),
            _ => return Err(invalid(Self::KIND, "key counts must be OP_1..OP_16")),
        };

        let mut multisig = Self::new(num_required, num_total);
        for ins in middle {
            match ins {
                Instruction::PushBytes(pubkey) => multisig.add_address(pubkey)?,
                Instruction::Op(_) => {
                    return Err(invalid(Self::KIND, "unexpected opcode among keys"))
                }
            }
        }
        Ok(multisig)
    }

    fn hash(&self) -> Option<Hash160> {
        None
    }

    fn resolve(&mut self, state: &mut AddressState) {
        for address in &mut self.addresses {
            address.resolve(state);
        }
    }

    fn check(&mut self, state: &AddressState) {
        for address in &mut self.addresses {
            address.check(state);
        }
    }

    fn is_valid(&self) -> bool {
        self.num_required <= self.num_total && self.num_total as usize == self.addresses.len()
    }
}

/// Anything no other template matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonstandardScript {
    pub script: ByteString,
}

impl ScriptData for NonstandardScript {
    const KIND: AddressKind = AddressKind::Nonstandard;

    fn parse(script: &[u8]) -> Result<Self> {
        Ok(Self { script: script.to_vec() })
    }

    fn hash(&self) -> Option<Hash160> {
        None
    }
}

/// Provably unspendable data carrier: `OP_RETURN <pushes>...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullDataScript {
    /// Concatenation of every pushed payload
    pub full_data: ByteString,
}

impl ScriptData for NullDataScript {
    const KIND: AddressKind = AddressKind::NullData;

    fn parse(script: &[u8]) -> Result<Self> {
        let rest = match script {
            [OP_RETURN, rest @ ..] => rest,
            _ => return Err(invalid(Self::KIND, "missing OP_RETURN")),
        };
        let mut full_data = Vec::with_capacity(rest.len());
        for ins in instructions(rest)? {
            match ins {
                Instruction::PushBytes(data) => full_data.extend_from_slice(data),
                Instruction::Op(op) if op <= OP_16 => {}
                Instruction::Op(_) => return Err(invalid(Self::KIND, "payload is not push-only")),
            }
        }
        Ok(Self { full_data })
    }

    fn hash(&self) -> Option<Hash160> {
        None
    }
}
