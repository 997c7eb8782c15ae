//! Native-token amounts as 18-decimal fixed point.
//!
//! Values are held in base units (wei) so every computation matches the
//! ledger's integer accounting exactly. Rounding to display digits happens only
//! in [`Amount::format_fixed`].

use alloy_primitives::utils::{format_ether, parse_ether};
use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DECIMALS: u32 = 18;
const UNIT: u128 = 10u128.pow(DECIMALS);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount {0:?}: expected a plain decimal number")]
    Invalid(String),
    #[error("amount {0:?} has more than 18 fractional digits")]
    TooPrecise(String),
    #[error("amount {0:?} is too large")]
    Overflow(String),
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_wei(wei: u128) -> Self {
        Amount(wei)
    }

    pub fn from_ether(whole: u64) -> Self {
        Amount(whole as u128 * UNIT)
    }

    pub const fn wei(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// `self * bps / 10_000`, rounded down to the base unit.
    ///
    /// Rates above 10_000 bps are treated as 10_000. The multiplication is
    /// split so it cannot overflow for any `u128` amount while staying exact.
    pub fn mul_bps(self, bps: u32) -> Amount {
        let bps = bps.min(10_000) as u128;
        let quot = self.0 / 10_000;
        let rem = self.0 % 10_000;
        Amount(quot * bps + rem * bps / 10_000)
    }

    /// Parses a plain decimal string such as `"0.5"`, `"12"` or `".25"`.
    pub fn parse(input: &str) -> Result<Amount, AmountError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
            return Err(AmountError::Invalid(input.to_string()));
        }
        // parse_ether truncates extra digits instead of refusing them.
        if frac.len() > DECIMALS as usize {
            return Err(AmountError::TooPrecise(input.to_string()));
        }

        let overflow = || AmountError::Overflow(input.to_string());
        let whole = if whole.is_empty() { "0" } else { whole };
        let normalized = if frac.is_empty() { whole.to_string() } else { format!("{}.{}", whole, frac) };
        let wei = parse_ether(&normalized).map_err(|_| overflow())?;
        u128::try_from(wei).map(Amount).map_err(|_| overflow())
    }

    /// Renders with exactly `digits` fractional digits, rounding half up.
    pub fn format_fixed(&self, digits: u32) -> String {
        let digits = digits.min(DECIMALS);
        let scale = U256::from(10u8).pow(U256::from(DECIMALS - digits));
        let rounded = (U256::from(self.0) + scale / U256::from(2u8)) / scale * scale;
        let full = format_ether(rounded);
        let (whole, frac) = full.split_once('.').unwrap_or((full.as_str(), ""));
        if digits == 0 {
            return whole.to_string();
        }
        format!("{}.{}", whole, &frac[..digits as usize])
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

/// Shortest exact decimal form: `1`, `0.5`, `0.000000000000000001`.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = format_ether(U256::from(self.0));
        f.write_str(full.trim_end_matches('0').trim_end_matches('.'))
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Amount::parse(&s).map_err(serde::de::Error::custom)
        } else {
            Ok(Amount(u128::deserialize(deserializer)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_strings() {
        assert_eq!(Amount::parse("1").unwrap(), Amount::from_ether(1));
        assert_eq!(Amount::parse("0.5").unwrap().wei(), 500_000_000_000_000_000);
        assert_eq!(Amount::parse(".25").unwrap().wei(), 250_000_000_000_000_000);
        assert_eq!(Amount::parse("2.").unwrap(), Amount::from_ether(2));
        assert_eq!(Amount::parse("0.000000000000000001").unwrap().wei(), 1);
        assert_eq!(Amount::parse(" 3 ").unwrap(), Amount::from_ether(3));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(Amount::parse(""), Err(AmountError::Empty));
        assert!(matches!(Amount::parse("."), Err(AmountError::Invalid(_))));
        assert!(matches!(Amount::parse("-1"), Err(AmountError::Invalid(_))));
        assert!(matches!(Amount::parse("1e18"), Err(AmountError::Invalid(_))));
        assert!(matches!(Amount::parse("1.2.3"), Err(AmountError::Invalid(_))));
        assert!(matches!(
            Amount::parse("0.0000000000000000001"),
            Err(AmountError::TooPrecise(_))
        ));
        assert!(matches!(
            Amount::parse("999999999999999999999999999999"),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn display_is_shortest_exact() {
        assert_eq!(Amount::ZERO.to_string(), "0");
        assert_eq!(Amount::from_ether(4).to_string(), "4");
        assert_eq!(Amount::parse("0.975").unwrap().to_string(), "0.975");
        assert_eq!(Amount::from_wei(1).to_string(), "0.000000000000000001");
    }

    #[test]
    fn format_fixed_rounds_only_for_display() {
        let a = Amount::parse("0.0249995").unwrap();
        assert_eq!(a.format_fixed(6), "0.025000");
        assert_eq!(a.format_fixed(4), "0.0250");
        assert_eq!(Amount::parse("1.4").unwrap().format_fixed(0), "1");
        assert_eq!(Amount::ZERO.format_fixed(6), "0.000000");
        // The value itself keeps full precision.
        assert_eq!(a.wei(), 24_999_500_000_000_000);
        // Rounding up at the very top of the range does not overflow.
        assert_eq!(Amount::from_wei(u128::MAX).format_fixed(0), "340282366920938463463");
    }

    #[test]
    fn mul_bps_is_exact_at_the_edges() {
        let max = Amount::from_wei(u128::MAX);
        assert_eq!(max.mul_bps(10_000), max);
        assert_eq!(max.mul_bps(0), Amount::ZERO);
        assert_eq!(Amount::from_wei(9_999).mul_bps(1), Amount::ZERO);
        assert_eq!(Amount::from_wei(10_000).mul_bps(1), Amount::from_wei(1));
    }
}
