use std::{fmt, ops::Neg, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Signed amount in **integer cents** (two decimal places, single currency).
///
/// Balances, opening balances and transaction amounts are all `Money`; the
/// ledger never touches floating point.
///
/// ```rust
/// use engine::Money;
///
/// let amount: Money = "150,5".parse().unwrap();
/// assert_eq!(amount.cents(), 150_50);
/// assert_eq!(amount.to_string(), "150.50");
/// assert!("1.234,5".parse::<Money>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `None` on overflow.
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// `None` on overflow.
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "{}.{:02}", abs / 100, abs % 100)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

fn digits(value: &str) -> Option<i64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses user input such as `10`, `10.5`, `10,50` or `-3.20`.
    ///
    /// Either `.` or `,` separates the cents; at most two decimals are
    /// accepted and thousands separators are not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            |reason: &str| EngineError::InvalidAmount(format!("\"{}\": {reason}", s.trim()));

        let text = s.trim();
        let (negative, text) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            Some(_) => (false, text),
            None => return Err(invalid("empty amount")),
        };

        let (units, fraction) = match text.split_once(['.', ',']) {
            Some((units, fraction)) => (units, fraction),
            None => (text, ""),
        };
        let units = digits(units).ok_or_else(|| invalid("not a number"))?;
        let fraction = match fraction.len() {
            0 => 0,
            1 => digits(fraction).ok_or_else(|| invalid("not a number"))? * 10,
            2 => digits(fraction).ok_or_else(|| invalid("not a number"))?,
            _ => return Err(invalid("more than two decimals")),
        };

        let cents = units
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction))
            .ok_or_else(|| invalid("amount too large"))?;
        Ok(Money(if negative { -cents } else { cents }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Option<i64> {
        raw.parse::<Money>().ok().map(Money::cents)
    }

    #[test]
    fn displays_two_decimals_without_currency() {
        assert_eq!(Money::ZERO.to_string(), "0.00");
        assert_eq!(Money::new(7).to_string(), "0.07");
        assert_eq!(Money::new(100_00).to_string(), "100.00");
        assert_eq!(Money::new(-10_50).to_string(), "-10.50");
    }

    #[test]
    fn parses_either_separator() {
        assert_eq!(parse("10"), Some(10_00));
        assert_eq!(parse("10.5"), Some(10_50));
        assert_eq!(parse("10,05"), Some(10_05));
        assert_eq!(parse(" +0.01 "), Some(1));
        assert_eq!(parse("-150.00"), Some(-150_00));
        assert_eq!(parse("3."), Some(3_00));
    }

    #[test]
    fn rejects_malformed_input() {
        let malformed = [
            "", "-", "abc", "1.2.3", "1.234,5", "12.345", ".50", "1e3", "99999999999999999999",
        ];
        for raw in malformed {
            let err = raw.parse::<Money>().unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount(_)), "{raw}");
        }
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        assert_eq!(Money::new(i64::MAX).checked_add(Money::new(1)), None);
        assert_eq!(Money::new(1_00).checked_sub(Money::new(1_50)), Some(Money::new(-50)));
        assert_eq!(-Money::new(5), Money::new(-5));
    }
}
