//! Script tokenization and hashing primitives
//!
//! Output scripts are only inspected structurally here; nothing is executed
//! and no signatures are checked.

use crate::constants::*;
use crate::error::{ChainIndexError, Result};
use crate::types::{Hash160, Hash256};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// A single script token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Data push (including `OP_0`, which pushes the empty string)
    PushBytes(&'a [u8]),
    /// Any non-push opcode, or a small-integer opcode
    Op(u8),
}

impl Instruction<'_> {
    /// Push-only per the standardness definition: data pushes and opcodes up to `OP_16`
    pub fn is_push_only(&self) -> bool {
        match self {
            Instruction::PushBytes(_) => true,
            Instruction::Op(op) => *op <= OP_16,
        }
    }
}

/// Iterator over the tokens of a script
///
/// Yields an error and stops once a push runs past the end of the script.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    script: &'a [u8],
    pos: usize,
}

impl<'a> Instructions<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self { script, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.script.len())
            .ok_or_else(|| {
                ChainIndexError::InvalidScript(format!(
                    "push of {} bytes at offset {} exceeds script length {}",
                    len,
                    self.pos,
                    self.script.len()
                ))
            })?;
        let bytes = &self.script[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_len(&mut self, width: usize) -> Result<usize> {
        let bytes = self.take(width)?;
        let mut buf = [0u8; 4];
        buf[..width].copy_from_slice(bytes);
        Ok(u32::from_le_bytes(buf) as usize)
    }

    fn next_instruction(&mut self, opcode: u8) -> Result<Instruction<'a>> {
        let len = match opcode {
            OP_0 => return Ok(Instruction::PushBytes(&[])),
            0x01..=0x4b => opcode as usize,
            OP_PUSHDATA1 => self.read_len(1)?,
            OP_PUSHDATA2 => self.read_len(2)?,
            OP_PUSHDATA4 => self.read_len(4)?,
            _ => return Ok(Instruction::Op(opcode)),
        };
        Ok(Instruction::PushBytes(self.take(len)?))
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let opcode = *self.script.get(self.pos)?;
        self.pos += 1;
        let result = self.next_instruction(opcode);
        if result.is_err() {
            self.pos = self.script.len();
        }
        Some(result)
    }
}

/// Tokenize a whole script, failing on the first truncated push
pub fn instructions(script: &[u8]) -> Result<Vec<Instruction<'_>>> {
    Instructions::new(script).collect()
}

/// Decode `OP_0`..`OP_16` into its numeric value
pub fn decode_small_int(opcode: u8) -> Option<u8> {
    match opcode {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some(opcode - OP_1 + 1),
        _ => None,
    }
}

/// SHA256(x)
pub fn sha256(data: &[u8]) -> Hash256 {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// RIPEMD160(x)
pub fn ripemd160(data: &[u8]) -> Hash160 {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(data));
    out
}

/// HASH160(x) = RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> Hash160 {
    ripemd160(&sha256(data))
}

pub(crate) fn read_hash160(bytes: &[u8]) -> Result<Hash160> {
    bytes.try_into().map_err(|_| {
        ChainIndexError::InvalidScript(format!(
            "expected 20-byte hash, found {} bytes",
            bytes.len()
        ))
    })
}

pub(crate) fn read_hash256(bytes: &[u8]) -> Result<Hash256> {
    bytes.try_into().map_err(|_| {
        ChainIndexError::InvalidScript(format!(
            "expected 32-byte hash, found {} bytes",
            bytes.len()
        ))
    })
}

/// Accepts SEC-encoded keys by length and prefix only
pub fn is_pubkey_encoding(bytes: &[u8]) -> bool {
    match bytes.len() {
        COMPRESSED_PUBKEY_SIZE => bytes[0] == 0x02 || bytes[0] == 0x03,
        UNCOMPRESSED_PUBKEY_SIZE => bytes[0] == 0x04,
        _ => false,
    }
}
