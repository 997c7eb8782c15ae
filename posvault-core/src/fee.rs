//! Protocol fee split shown before a withdrawal is submitted.

use posvault_types::Amount;

pub const BPS_DENOMINATOR: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub gross: Amount,
    pub fee_bps: u32,
    pub fee: Amount,
    pub net: Amount,
}

/// `fee = gross * fee_bps / 10_000` rounded down to the base unit, and
/// `net = gross - fee`, so `fee + net == gross` always holds.
/// Rates above 10_000 bps are clamped.
pub fn quote(gross: Amount, fee_bps: u32) -> FeeQuote {
    let fee_bps = fee_bps.min(BPS_DENOMINATOR);
    let fee = gross.mul_bps(fee_bps);
    FeeQuote { gross, fee_bps, fee, net: gross.saturating_sub(fee) }
}

impl FeeQuote {
    pub fn fee_percent(&self) -> String {
        format_percent(self.fee_bps)
    }
}

/// Basis points as a percentage string: 250 bps is `"2.5"`.
pub fn format_percent(bps: u32) -> String {
    let whole = bps / 100;
    let frac = bps % 100;
    if frac == 0 {
        whole.to_string()
    } else {
        let frac = format!("{:02}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    #[test]
    fn quarter_percent_of_one() {
        let q = quote(eth("1.0"), 250);
        assert_eq!(q.fee, eth("0.025"));
        assert_eq!(q.net, eth("0.975"));
        assert_eq!(q.fee_percent(), "2.5");
    }

    #[test]
    fn zero_gross_and_zero_rate() {
        let q = quote(Amount::ZERO, 250);
        assert_eq!((q.fee, q.net), (Amount::ZERO, Amount::ZERO));
        let q = quote(eth("3"), 0);
        assert_eq!((q.fee, q.net), (Amount::ZERO, eth("3")));
        assert_eq!(q.fee_percent(), "0");
    }

    #[test]
    fn split_is_exact_across_rates() {
        let grosses = [
            Amount::ZERO,
            Amount::from_wei(1),
            Amount::from_wei(9_999),
            eth("0.333333333333333333"),
            eth("12345.678901234567890123"),
            Amount::from_wei(u128::MAX),
        ];
        for gross in grosses {
            for bps in [0, 1, 5, 99, 250, 1_000, 5_000, 9_999, 10_000] {
                let q = quote(gross, bps);
                assert_eq!(q.fee.checked_add(q.net), Some(gross), "gross {} bps {}", gross, bps);
                assert_eq!(q.fee.wei(), gross.wei() / 10_000 * bps as u128 + gross.wei() % 10_000 * bps as u128 / 10_000);
            }
        }
    }

    #[test]
    fn rate_above_denominator_is_clamped() {
        let q = quote(eth("2"), 20_000);
        assert_eq!(q.fee_bps, 10_000);
        assert_eq!(q.fee, eth("2"));
        assert_eq!(q.net, Amount::ZERO);
    }

    #[test]
    fn percent_rendering() {
        assert_eq!(quote(Amount::ZERO, 100).fee_percent(), "1");
        assert_eq!(quote(Amount::ZERO, 5).fee_percent(), "0.05");
        assert_eq!(quote(Amount::ZERO, 1_050).fee_percent(), "10.5");
    }
}
