//! Script opcodes and size limits used when classifying output scripts

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Compressed public key length
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Uncompressed public key length
pub const UNCOMPRESSED_PUBKEY_SIZE: usize = 65;

/// Maximum number of keys in a bare multisig script
pub const MAX_MULTISIG_KEYS: usize = 16;

/// P2WPKH witness program length
pub const WITNESS_PUBKEYHASH_SIZE: usize = 20;

/// P2WSH witness program length
pub const WITNESS_SCRIPTHASH_SIZE: usize = 32;

/// Segwit activation height on mainnet
pub const MAINNET_SEGWIT_HEIGHT: u32 = 481_824;

/// Segwit activation height on testnet3
pub const TESTNET_SEGWIT_HEIGHT: u32 = 834_624;
