//! 20-byte account identities and the syntactic address check.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const IDENTITY_LEN: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("not a 0x-prefixed 40 hex character address: {0:?}")]
    Malformed(String),
}

/// Returns true iff `candidate` is exactly `0x` followed by 40 hex characters.
/// Case of the hex digits is not checked.
pub fn is_valid_identity(candidate: &str) -> bool {
    match candidate.strip_prefix("0x") {
        Some(digits) => {
            digits.len() == IDENTITY_LEN * 2 && digits.bytes().all(|b| b.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// An account on the ledger. Equality is byte equality, so two strings that
/// differ only in hex case parse to the same identity.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// The zero identity; an owner that has renounced ownership reads as this.
    pub const ZERO: Identity = Identity([0u8; IDENTITY_LEN]);

    pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Identity(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; IDENTITY_LEN]
    }

    /// `0x1234...abcd` form for log lines and narrow panels.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_valid_identity(s) {
            return Err(IdentityError::Malformed(s.to_string()));
        }
        let mut bytes = [0u8; IDENTITY_LEN];
        hex::decode_to_slice(&s[2..], &mut bytes)
            .map_err(|_| IdentityError::Malformed(s.to_string()))?;
        Ok(Identity(bytes))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            Ok(Identity(<[u8; IDENTITY_LEN]>::deserialize(deserializer)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOWER: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn accepts_well_formed_addresses() {
        assert!(is_valid_identity(LOWER));
        assert!(is_valid_identity("0xAbCdEf0123456789aBcDeF0123456789AbCdEf01"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_identity(""));
        assert!(!is_valid_identity("0x"));
        assert!(!is_valid_identity(&LOWER[2..]));
        assert!(!is_valid_identity(&LOWER[..41]));
        assert!(!is_valid_identity(&format!("{}a", LOWER)));
        assert!(!is_valid_identity("0xgggggggggggggggggggggggggggggggggggggggg"));
        assert!(!is_valid_identity("0Xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
        assert!(!is_valid_identity(" 0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
    }

    #[test]
    fn case_insensitive_equality() {
        let upper: Identity = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".parse().unwrap();
        let lower: Identity = LOWER.parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), LOWER);
    }

    #[test]
    fn short_form() {
        let id: Identity = "0x1234567890abcdef1234567890abcdef12345678".parse().unwrap();
        assert_eq!(id.short(), "0x1234...5678");
    }

    #[test]
    fn bincode_is_raw_bytes() {
        let id: Identity = LOWER.parse().unwrap();
        let encoded = bincode::serialize(&id).unwrap();
        assert_eq!(encoded, vec![0xaa; IDENTITY_LEN]);
        let decoded: Identity = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded, id);
    }
}
