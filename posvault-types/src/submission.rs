use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::Identity;
use crate::operation::VaultOperation;

/// Ledger-assigned handle for an accepted submission.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxReference(pub [u8; 32]);

impl fmt::Display for TxReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxReference({})", self)
    }
}

/// An operation as the caller hands it to the ledger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub caller: Identity,
    pub nonce: u64,
    pub operation: VaultOperation,
}

impl Submission {
    pub fn encoded(&self) -> Vec<u8> {
        bincode::serialize(self).expect("submission serialization")
    }

    pub fn reference(&self) -> TxReference {
        use blake3::Hasher;
        let mut hasher = Hasher::new();
        hasher.update(&self.encoded());
        TxReference(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_depends_on_nonce() {
        let caller = Identity::from_bytes([1u8; 20]);
        let a = Submission { caller, nonce: 0, operation: VaultOperation::Pause };
        let b = Submission { nonce: 1, ..a.clone() };
        assert_eq!(a.reference(), a.clone().reference());
        assert_ne!(a.reference(), b.reference());
    }
}
