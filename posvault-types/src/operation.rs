use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::Amount;
use crate::fact::FactKey;
use crate::identity::Identity;

/// Every mutating call the vault exposes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum VaultOperation {
    // ══════════════════════════════════════════════════════════════
    // Merchant roster (owner only)
    // ══════════════════════════════════════════════════════════════
    AddMerchant { merchant: Identity },
    RemoveMerchant { merchant: Identity },

    // ══════════════════════════════════════════════════════════════
    // Safety state (owner only)
    // ══════════════════════════════════════════════════════════════
    Pause,
    Unpause,
    EmergencyWithdraw { to: Identity, amount: Amount },

    // ══════════════════════════════════════════════════════════════
    // Ownership (owner only)
    // ══════════════════════════════════════════════════════════════
    TransferOwnership { new_owner: Identity },
    RenounceOwnership,

    // ══════════════════════════════════════════════════════════════
    // Merchant payouts
    // ══════════════════════════════════════════════════════════════
    Withdraw { amount: Amount },
}

/// Parameter-free tag of a [`VaultOperation`]. Each kind owns one operation
/// surface, so at most one action per kind is in flight.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    AddMerchant,
    RemoveMerchant,
    Pause,
    Unpause,
    EmergencyWithdraw,
    TransferOwnership,
    RenounceOwnership,
    Withdraw,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::AddMerchant,
        OperationKind::RemoveMerchant,
        OperationKind::Pause,
        OperationKind::Unpause,
        OperationKind::EmergencyWithdraw,
        OperationKind::TransferOwnership,
        OperationKind::RenounceOwnership,
        OperationKind::Withdraw,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::AddMerchant => "add-merchant",
            OperationKind::RemoveMerchant => "remove-merchant",
            OperationKind::Pause => "pause",
            OperationKind::Unpause => "unpause",
            OperationKind::EmergencyWithdraw => "emergency-withdraw",
            OperationKind::TransferOwnership => "transfer-ownership",
            OperationKind::RenounceOwnership => "renounce-ownership",
            OperationKind::Withdraw => "withdraw",
        }
    }

    pub fn from_name(name: &str) -> Option<OperationKind> {
        OperationKind::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Withdraw is open to merchants; everything else is owner only.
    pub fn owner_only(&self) -> bool {
        !matches!(self, OperationKind::Withdraw)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl VaultOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            VaultOperation::AddMerchant { .. } => OperationKind::AddMerchant,
            VaultOperation::RemoveMerchant { .. } => OperationKind::RemoveMerchant,
            VaultOperation::Pause => OperationKind::Pause,
            VaultOperation::Unpause => OperationKind::Unpause,
            VaultOperation::EmergencyWithdraw { .. } => OperationKind::EmergencyWithdraw,
            VaultOperation::TransferOwnership { .. } => OperationKind::TransferOwnership,
            VaultOperation::RenounceOwnership => OperationKind::RenounceOwnership,
            VaultOperation::Withdraw { .. } => OperationKind::Withdraw,
        }
    }

    /// Ledger facts that are out of date once this operation is final.
    pub fn invalidates(&self) -> Vec<FactKey> {
        match self {
            VaultOperation::AddMerchant { merchant } | VaultOperation::RemoveMerchant { merchant } => {
                vec![FactKey::MerchantStatus(*merchant)]
            }
            VaultOperation::Pause | VaultOperation::Unpause => vec![FactKey::Paused],
            VaultOperation::EmergencyWithdraw { .. } | VaultOperation::Withdraw { .. } => {
                vec![FactKey::Balance]
            }
            VaultOperation::TransferOwnership { .. } | VaultOperation::RenounceOwnership => {
                vec![FactKey::Owner]
            }
        }
    }
}
