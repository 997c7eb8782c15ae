use posvault_types::{Amount, FactKey, FactValue, Identity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct VaultState {
    pub balance: Amount,
    pub min_deposit: Amount,
    pub fee_bps: u32,
    pub treasury: Identity,
    /// `Identity::ZERO` once ownership is renounced.
    pub owner: Identity,
    pub paused: bool,
    pub merchants: BTreeSet<Identity>,

    // Native value that left the vault, per recipient.
    pub payouts: BTreeMap<Identity, Amount>,
}

impl VaultState {
    pub fn is_merchant(&self, who: &Identity) -> bool {
        self.merchants.contains(who)
    }

    pub fn read_fact(&self, key: &FactKey) -> FactValue {
        match key {
            FactKey::Balance => FactValue::Amount(self.balance),
            FactKey::MinDeposit => FactValue::Amount(self.min_deposit),
            FactKey::FeeBps => FactValue::Bps(self.fee_bps),
            FactKey::Treasury => FactValue::Identity(self.treasury),
            FactKey::Owner => FactValue::Identity(self.owner),
            FactKey::Paused => FactValue::Flag(self.paused),
            FactKey::MerchantStatus(who) => FactValue::Flag(self.is_merchant(who)),
        }
    }

    pub fn payout_to(&self, who: &Identity) -> Amount {
        self.payouts.get(who).copied().unwrap_or_default()
    }
}
