use posvault_types::{FactKey, Identity};

use crate::cache::{FactCache, FactState};

/// Capabilities of the connected caller. Owner and merchant are independent;
/// the owner may also be listed as a merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Roles {
    pub is_owner: bool,
    pub is_merchant: bool,
}

/// Whether a gated panel may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Role facts still loading: show neither the panel nor a denial.
    Pending,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleStatus {
    Loading,
    Resolved(Roles),
}

/// `is_owner` iff the caller equals the owner fact, `is_merchant` iff the
/// caller's membership fact is true. Both are false while either fact has
/// no value yet.
pub fn resolve(caller: Option<Identity>, owner: &FactState, membership: &FactState) -> Roles {
    let Some(caller) = caller else {
        return Roles::default();
    };
    match (owner.value, membership.value) {
        (Some(owner), Some(membership)) => Roles {
            is_owner: owner.as_identity() == Some(caller),
            is_merchant: membership.as_flag().unwrap_or(false),
        },
        _ => Roles::default(),
    }
}

impl RoleStatus {
    pub fn roles(&self) -> Roles {
        match self {
            RoleStatus::Loading => Roles::default(),
            RoleStatus::Resolved(roles) => *roles,
        }
    }

    pub fn admin_access(&self) -> Access {
        match self {
            RoleStatus::Loading => Access::Pending,
            RoleStatus::Resolved(r) if r.is_owner => Access::Granted,
            RoleStatus::Resolved(_) => Access::Denied,
        }
    }

    /// The withdraw panel is open to merchants and to the owner.
    pub fn merchant_access(&self) -> Access {
        match self {
            RoleStatus::Loading => Access::Pending,
            RoleStatus::Resolved(r) if r.is_merchant || r.is_owner => Access::Granted,
            RoleStatus::Resolved(_) => Access::Denied,
        }
    }
}

/// Derives the caller's roles from the fact cache. Nothing is stored; every
/// call recomputes from current cache contents.
#[derive(Clone)]
pub struct RoleResolver {
    cache: FactCache,
}

impl RoleResolver {
    pub fn new(cache: FactCache) -> Self {
        Self { cache }
    }

    /// Non-blocking; kicks off any missing reads.
    pub fn status(&self, caller: Option<Identity>) -> RoleStatus {
        let Some(who) = caller else {
            return RoleStatus::Resolved(Roles::default());
        };
        let owner = self.cache.read(&FactKey::Owner);
        let membership = self.cache.read(&FactKey::MerchantStatus(who));
        if owner.is_loading() || membership.is_loading() {
            return RoleStatus::Loading;
        }
        RoleStatus::Resolved(resolve(caller, &owner, &membership))
    }

    /// Waits for both role facts to be read at least once.
    pub async fn settle(&self, caller: Option<Identity>) -> RoleStatus {
        let Some(who) = caller else {
            return RoleStatus::Resolved(Roles::default());
        };
        let owner = self.cache.get(&FactKey::Owner).await;
        let membership = self.cache.get(&FactKey::MerchantStatus(who)).await;
        if owner.is_loading() || membership.is_loading() {
            return RoleStatus::Loading;
        }
        RoleStatus::Resolved(resolve(caller, &owner, &membership))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posvault_ledger::{MemoryLedger, VaultGenesis};
    use posvault_types::FactValue;
    use std::sync::Arc;

    fn loaded(value: FactValue) -> FactState {
        FactState { value: Some(value), fresh: true, ..Default::default() }
    }

    fn pending() -> FactState {
        FactState { pending: true, ..Default::default() }
    }

    const OWNER_UPPER: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const OWNER_LOWER: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn owner_match_ignores_hex_case() {
        let owner: Identity = OWNER_UPPER.parse().unwrap();
        let caller: Identity = OWNER_LOWER.parse().unwrap();
        let roles = resolve(
            Some(caller),
            &loaded(FactValue::Identity(owner)),
            &loaded(FactValue::Flag(false)),
        );
        assert_eq!(roles, Roles { is_owner: true, is_merchant: false });
    }

    #[test]
    fn owner_can_also_be_merchant() {
        let owner: Identity = OWNER_LOWER.parse().unwrap();
        let roles = resolve(
            Some(owner),
            &loaded(FactValue::Identity(owner)),
            &loaded(FactValue::Flag(true)),
        );
        assert!(roles.is_owner && roles.is_merchant);
    }

    #[test]
    fn pending_facts_grant_nothing() {
        let owner: Identity = OWNER_LOWER.parse().unwrap();
        for (o, m) in [
            (pending(), loaded(FactValue::Flag(true))),
            (loaded(FactValue::Identity(owner)), pending()),
            (pending(), pending()),
        ] {
            assert_eq!(resolve(Some(owner), &o, &m), Roles::default());
        }
        assert_eq!(resolve(None, &loaded(FactValue::Identity(owner)), &pending()), Roles::default());
    }

    #[test]
    fn access_is_tri_state() {
        assert_eq!(RoleStatus::Loading.admin_access(), Access::Pending);
        assert_eq!(RoleStatus::Loading.merchant_access(), Access::Pending);
        let merchant = RoleStatus::Resolved(Roles { is_owner: false, is_merchant: true });
        assert_eq!(merchant.admin_access(), Access::Denied);
        assert_eq!(merchant.merchant_access(), Access::Granted);
        let owner = RoleStatus::Resolved(Roles { is_owner: true, is_merchant: false });
        assert_eq!(owner.merchant_access(), Access::Granted);
        let nobody = RoleStatus::Resolved(Roles::default());
        assert_eq!(nobody.merchant_access(), Access::Denied);
    }

    #[tokio::test]
    async fn resolver_loads_then_resolves() {
        let genesis = VaultGenesis::default();
        let ledger = Arc::new(MemoryLedger::new(&genesis));
        let resolver = RoleResolver::new(FactCache::new(ledger));

        assert_eq!(resolver.status(Some(genesis.owner)), RoleStatus::Loading);
        let settled = resolver.settle(Some(genesis.owner)).await;
        assert_eq!(settled, RoleStatus::Resolved(Roles { is_owner: true, is_merchant: false }));
        assert_eq!(resolver.status(Some(genesis.owner)), settled);
        assert_eq!(resolver.status(None).admin_access(), Access::Denied);
    }
}
