use posvault_types::{Amount, Identity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::state::VaultState;

pub const DEV_OWNER: Identity = Identity::from_bytes([
    0xf3, 0x9f, 0xd6, 0xe5, 0x1a, 0xad, 0x88, 0xf6, 0xf4, 0xce,
    0x6a, 0xb8, 0x82, 0x72, 0x79, 0xcf, 0xff, 0xb9, 0x22, 0x66,
]);
pub const DEV_TREASURY: Identity = Identity::from_bytes([
    0x70, 0x99, 0x79, 0x70, 0xc5, 0x18, 0x12, 0xdc, 0x3a, 0x01,
    0x0c, 0x7d, 0x01, 0xb5, 0x0e, 0x0d, 0x17, 0xdc, 0x79, 0xc8,
]);

/// Starting state for an in-memory vault, loadable from JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct VaultGenesis {
    pub owner: Identity,
    pub treasury: Identity,
    pub balance: Amount,
    pub min_deposit: Amount,
    pub fee_bps: u32,
    pub paused: bool,
    pub merchants: Vec<Identity>,
}

impl Default for VaultGenesis {
    fn default() -> Self {
        // Dev vault: 10 ETH pooled, 0.001 ETH min deposit, 2.5% fee.
        Self {
            owner: DEV_OWNER,
            treasury: DEV_TREASURY,
            balance: Amount::from_ether(10),
            min_deposit: Amount::from_wei(1_000_000_000_000_000),
            fee_bps: 250,
            paused: false,
            merchants: Vec::new(),
        }
    }
}

pub fn create_genesis_state(genesis: &VaultGenesis) -> VaultState {
    VaultState {
        balance: genesis.balance,
        min_deposit: genesis.min_deposit,
        fee_bps: genesis.fee_bps,
        treasury: genesis.treasury,
        owner: genesis.owner,
        paused: genesis.paused,
        merchants: genesis.merchants.iter().copied().collect::<BTreeSet<_>>(),
        payouts: BTreeMap::new(),
    }
}
