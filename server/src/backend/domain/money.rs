//! Money helpers. All amounts are `Decimal` kept at two decimal places.

use rust_decimal::{Decimal, RoundingStrategy};

pub const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Round to cents, halves away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Truncate to cents, toward zero
pub fn truncate_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// `amount * rate / 100`, rounded to cents
pub fn percent_of(amount: Decimal, rate: Decimal) -> Decimal {
    round_money(amount * rate / HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round_money_midpoint() {
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("2.344")), dec("2.34"));
        assert_eq!(round_money(dec("-2.345")), dec("-2.35"));
    }

    #[test]
    fn test_truncate_money() {
        assert_eq!(truncate_money(dec("416.666")), dec("416.66"));
        assert_eq!(truncate_money(dec("0.005")), dec("0"));
        assert_eq!(truncate_money(dec("2.35")), dec("2.35"));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(dec("10000"), dec("10")), dec("1000"));
        assert_eq!(percent_of(dec("333.33"), dec("2.5")), dec("8.33"));
    }
}
