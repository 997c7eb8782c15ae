use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::Amount;
use crate::identity::Identity;

/// Scalar ledger facts that can be read and cached.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FactKey {
    Balance,
    MinDeposit,
    FeeBps,
    Treasury,
    Owner,
    Paused,
    MerchantStatus(Identity),
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactKey::Balance => f.write_str("balance"),
            FactKey::MinDeposit => f.write_str("minDeposit"),
            FactKey::FeeBps => f.write_str("feeBps"),
            FactKey::Treasury => f.write_str("treasury"),
            FactKey::Owner => f.write_str("owner"),
            FactKey::Paused => f.write_str("paused"),
            FactKey::MerchantStatus(who) => write!(f, "merchantStatus({})", who),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactValue {
    Amount(Amount),
    Bps(u32),
    Identity(Identity),
    Flag(bool),
}

impl FactValue {
    pub fn as_amount(&self) -> Option<Amount> {
        match self {
            FactValue::Amount(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bps(&self) -> Option<u32> {
        match self {
            FactValue::Bps(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_identity(&self) -> Option<Identity> {
        match self {
            FactValue::Identity(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FactValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Amount(a) => write!(f, "{}", a),
            FactValue::Bps(b) => write!(f, "{} bps", b),
            FactValue::Identity(id) => write!(f, "{}", id),
            FactValue::Flag(b) => write!(f, "{}", b),
        }
    }
}
