use posvault_types::{is_valid_identity, FactKey, FactValue, Identity};

use crate::cache::{FactCache, FactState};
use crate::fee::format_percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    Pending,
    Active,
    Paused,
}

/// Contract-wide facts for the info panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultOverview {
    pub balance: FactState,
    pub min_deposit: FactState,
    pub fee_bps: FactState,
    pub treasury: FactState,
    pub owner: FactState,
    pub paused: FactState,
}

const KEYS: [FactKey; 6] = [
    FactKey::Balance,
    FactKey::MinDeposit,
    FactKey::FeeBps,
    FactKey::Treasury,
    FactKey::Owner,
    FactKey::Paused,
];

impl VaultOverview {
    fn from_states(mut states: impl FnMut(&FactKey) -> FactState) -> Self {
        Self {
            balance: states(&KEYS[0]),
            min_deposit: states(&KEYS[1]),
            fee_bps: states(&KEYS[2]),
            treasury: states(&KEYS[3]),
            owner: states(&KEYS[4]),
            paused: states(&KEYS[5]),
        }
    }

    /// Non-blocking; pending entries render as placeholders.
    pub fn snapshot(cache: &FactCache) -> Self {
        Self::from_states(|key| cache.read(key))
    }

    pub async fn load(cache: &FactCache) -> Self {
        for key in &KEYS {
            cache.get(key).await;
        }
        Self::from_states(|key| cache.peek(key))
    }

    pub fn status(&self) -> VaultStatus {
        match self.paused.value.and_then(|v| v.as_flag()) {
            None => VaultStatus::Pending,
            Some(true) => VaultStatus::Paused,
            Some(false) => VaultStatus::Active,
        }
    }

    pub fn owner(&self) -> Option<Identity> {
        self.owner.value.and_then(|v| v.as_identity())
    }
}

/// Membership of an arbitrary address; `None` until the input is a
/// well-formed address.
pub fn lookup_merchant(cache: &FactCache, candidate: &str) -> Option<FactState> {
    if !is_valid_identity(candidate) {
        return None;
    }
    let who: Identity = candidate.parse().ok()?;
    Some(cache.read(&FactKey::MerchantStatus(who)))
}

/// Renders a fact for display, `...` while nothing is known.
pub fn display_fact(state: &FactState, decimals: u32) -> String {
    match state.value {
        None => "...".to_string(),
        Some(FactValue::Amount(a)) => format!("{} ETH", a.format_fixed(decimals)),
        Some(FactValue::Bps(b)) => format!("{}%", format_percent(b)),
        Some(FactValue::Flag(f)) => f.to_string(),
        Some(FactValue::Identity(id)) => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posvault_ledger::{MemoryLedger, VaultGenesis};
    use std::sync::Arc;

    #[tokio::test]
    async fn snapshot_then_load() {
        let genesis = VaultGenesis::default();
        let cache = FactCache::new(Arc::new(MemoryLedger::new(&genesis)));

        let first = VaultOverview::snapshot(&cache);
        assert_eq!(first.status(), VaultStatus::Pending);
        assert_eq!(display_fact(&first.balance, 6), "...");

        let loaded = VaultOverview::load(&cache).await;
        assert_eq!(loaded.status(), VaultStatus::Active);
        assert_eq!(loaded.owner(), Some(genesis.owner));
        assert_eq!(display_fact(&loaded.balance, 6), "10.000000 ETH");
        assert_eq!(display_fact(&loaded.fee_bps, 6), "2.5%");
        assert_eq!(display_fact(&loaded.min_deposit, 3), "0.001 ETH");
    }

    #[tokio::test]
    async fn merchant_lookup_needs_valid_address() {
        let merchant = Identity::from_bytes([0x11; 20]);
        let genesis = VaultGenesis { merchants: vec![merchant], ..VaultGenesis::default() };
        let cache = FactCache::new(Arc::new(MemoryLedger::new(&genesis)));

        assert!(lookup_merchant(&cache, "0x11").is_none());
        let candidate = merchant.to_string();
        assert!(lookup_merchant(&cache, &candidate).unwrap().pending);
        cache.get(&FactKey::MerchantStatus(merchant)).await;
        let state = lookup_merchant(&cache, &candidate.to_uppercase().replace("0X", "0x")).unwrap();
        assert_eq!(state.value, Some(FactValue::Flag(true)));
    }
}
