//! Runtime configuration: network presets and JSON loading

use crate::constants::{MAINNET_SEGWIT_HEIGHT, TESTNET_SEGWIT_HEIGHT};
use crate::error::{ChainIndexError, Result};
use crate::types::BlockHeight;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime parameters for indexing and traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainIndexConfig {
    /// Segments per map-reduce run. Defaults to the number of workers.
    pub segment_count: Option<usize>,
    /// Size of the map worker pool. Defaults to one per available CPU.
    pub worker_threads: Option<usize>,
    /// First height at which witness programs are classified as such.
    pub segwit_activation_height: BlockHeight,
}

impl ChainIndexConfig {
    /// Parameters for Bitcoin mainnet.
    pub const MAINNET: Self = Self {
        segment_count: None,
        worker_threads: None,
        segwit_activation_height: MAINNET_SEGWIT_HEIGHT,
    };

    /// Parameters for Bitcoin testnet3.
    pub const TESTNET: Self = Self {
        segment_count: None,
        worker_threads: None,
        segwit_activation_height: TESTNET_SEGWIT_HEIGHT,
    };

    /// Parameters for regtest, where segwit is active from genesis.
    pub const REGTEST: Self = Self {
        segment_count: None,
        worker_threads: None,
        segwit_activation_height: 0,
    };

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_count == Some(0) {
            return Err(ChainIndexError::Config("segment_count must be at least 1".to_string()));
        }
        if self.worker_threads == Some(0) {
            return Err(ChainIndexError::Config("worker_threads must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn witness_activated(&self, height: BlockHeight) -> bool {
        height >= self.segwit_activation_height
    }
}

impl Default for ChainIndexConfig {
    fn default() -> Self {
        Self::MAINNET
    }
}
