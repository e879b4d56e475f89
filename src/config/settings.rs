use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
pub const PROTOCOL_VERSION: u32 = 1;

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const BOOTSTRAP_NODES_KEY: &str = "BOOTSTRAP_NODES";
const VALIDATOR_SEED_KEY: &str = "VALIDATOR_SEED";
const DATA_DIR_KEY: &str = "DATA_DIR";

/// Node settings. Every field has a default, so a TOML file only needs the
/// keys it wants to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub listen_addr: String,
    pub bootstrap_nodes: Vec<String>,
    /// Hex seed of the block-producing key; nodes without one only follow.
    pub validator_seed: Option<String>,
    /// Key file holding the validator seed, used when no seed is given directly.
    pub key_file: Option<PathBuf>,
    pub block_time_ms: u64,
    pub max_block_transactions: usize,
    pub dial_timeout_ms: u64,
    pub max_bootstrap_depth: usize,
    pub protocol_version: u32,
    /// Directory of the sled database; in-memory stores when absent.
    pub data_dir: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            bootstrap_nodes: vec![],
            validator_seed: None,
            key_file: None,
            block_time_ms: 5000,
            max_block_transactions: 100,
            dial_timeout_ms: 5000,
            max_bootstrap_depth: 8,
            protocol_version: PROTOCOL_VERSION,
            data_dir: None,
        }
    }
}

impl NodeConfig {
    /// Defaults, then the TOML file if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<NodeConfig> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => NodeConfig::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<NodeConfig> {
        let text = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<NodeConfig> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_env(&mut self) {
        self.apply_vars(|key| env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var(NODE_ADDRESS_KEY) {
            self.listen_addr = addr;
        }
        if let Some(nodes) = var(BOOTSTRAP_NODES_KEY) {
            self.bootstrap_nodes = parse_address_list(&nodes);
        }
        if let Some(seed) = var(VALIDATOR_SEED_KEY) {
            self.validator_seed = Some(seed);
        }
        if let Some(dir) = var(DATA_DIR_KEY) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(LedgerError::Config("listen_addr must not be empty".to_string()));
        }
        if self.block_time_ms == 0 {
            return Err(LedgerError::Config("block_time_ms must be positive".to_string()));
        }
        if self.dial_timeout_ms == 0 {
            return Err(LedgerError::Config("dial_timeout_ms must be positive".to_string()));
        }
        if self.max_block_transactions == 0 {
            return Err(LedgerError::Config(
                "max_block_transactions must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn is_validator(&self) -> bool {
        self.validator_seed.is_some() || self.key_file.is_some()
    }
}

/// Splits a comma-separated address list, dropping blanks.
pub fn parse_address_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(String::from)
        .collect()
}
