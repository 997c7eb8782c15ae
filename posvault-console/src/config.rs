use anyhow::{Context, Result};
use posvault_ledger::VaultGenesis;
use posvault_types::Identity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Console settings, read from a JSON file. Missing fields take defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub vault_address: Identity,
    pub display_decimals: u32,
    pub block_interval_ms: u64,
    pub genesis: VaultGenesis,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            vault_address: Identity::from_bytes([
                0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67,
                0xf0, 0x32, 0xd9, 0x3f, 0x64, 0x2f, 0x64, 0x18, 0x0a, 0xa3,
            ]),
            display_decimals: 6,
            block_interval_ms: 2_000,
            genesis: VaultGenesis::default(),
        }
    }
}

impl ConsoleConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms.max(1))
    }
}
