//! # Chain-Index
//!
//! Address deduplication and parallel traversal primitives for a Bitcoin
//! blockchain analysis index.
//!
//! This crate assigns every output script a canonical `(address_num, kind)`
//! identity, deduplicating scripts that lock to the same key or script hash,
//! and provides a randomly addressable view of the chain that can be cut
//! into balanced segments and processed with a parallel map-reduce.
//!
//! ## Architecture
//!
//! The system follows a layered architecture:
//! - Storage accessor ([`ChainAccess`]): block metadata and transaction loading
//! - Chain view ([`Blockchain`], [`Block`], [`Cursor`]): positions over block heights
//! - Segmentation ([`segment`]): block-aligned partition by transaction count
//! - Map-reduce ([`mapreduce`]): parallel map, ordered serial reduce
//! - Address resolution ([`AnyScriptOutput`], [`AddressState`], [`ScriptIndexer`])
//!
//! ## Design Principles
//!
//! 1. **Canonical identity**: one id per public key and one per script hash,
//!    whatever output form carried it
//! 2. **Deterministic results**: map-reduce output matches a sequential scan
//! 3. **Single writer**: only resolution mutates the address tables
//!
//! ## Usage
//!
//! ```rust
//! use chain_index::*;
//!
//! let chain = Blockchain::new(MemoryChain::from_blocks(vec![
//!     vec![Transaction { version: 1, inputs: vec![], outputs: vec![], lock_time: 0 }],
//!     vec![],
//! ]));
//!
//! let total = chain
//!     .map_reduce(0, chain.size(), |segment| Ok(segment.segment().tx_count()), |a, b| a + b, 0u32)
//!     .unwrap();
//! assert_eq!(total, chain.tx_count());
//! ```

pub mod access;
pub mod address_state;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod indexer;
pub mod mapreduce;
pub mod query;
pub mod script;
pub mod script_data;
pub mod script_output;
pub mod segment;
pub mod types;

// Re-export commonly used types
pub use access::{BlockMetadata, ChainAccess, MemoryChain};
pub use address_state::{AddressLookupResult, AddressState};
pub use chain::{Block, Blockchain, Blocks, Cursor, TxRecord};
pub use config::ChainIndexConfig;
pub use error::{ChainIndexError, Result};
pub use indexer::{IndexStats, IndexedBlock, ScriptIndexer};
pub use script_output::{AnyScriptOutput, ScriptOutput};
pub use segment::{ChainSegment, Segment};
pub use types::*;
