//! Parsing and display of money amounts.
//!
//! Records hold plain `Decimal` values. `Amount` is the type used at the edges: it parses what a
//! person types (`$1,250.00`, `-40`, `12.5`) and prints amounts in messages.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Whether an amount was written with a dollar sign and with thousands separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmountFormat {
    dollar: bool,
    commas: bool,
}

/// Messages print amounts like `-$60,000.00`.
const MESSAGE_FORMAT: AmountFormat = AmountFormat {
    dollar: true,
    commas: true,
};

impl Default for AmountFormat {
    fn default() -> Self {
        MESSAGE_FORMAT
    }
}

/// A money amount together with the way it is written.
///
/// Two amounts with the same value but different formatting are not equal; compare
/// `value()` for numeric equality.
///
/// ```
/// # use pocketplan::model::Amount;
/// # use std::str::FromStr;
/// let typed = Amount::from_str("1250").unwrap();
/// assert_eq!(typed.to_string(), "1250");
///
/// let message = Amount::new(typed.value());
/// assert_eq!(message.to_string(), "$1,250.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Amount {
    value: Decimal,
    format: AmountFormat,
}

impl Amount {
    /// An amount printed in message format.
    pub const fn new(value: Decimal) -> Self {
        Self {
            value,
            format: MESSAGE_FORMAT,
        }
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// True for amounts strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.value.is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value.is_sign_negative()
    }
}

/// Converts a float received from a JSON client into a `Decimal`. NaN and infinities have no
/// decimal representation and yield `None`.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.normalize())
}

/// Returned when a string is not a recognizable amount.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid amount: {}", self.0)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (dollar, digits) = match unsigned.strip_prefix('$') {
            Some(rest) => (true, rest),
            None => (false, unsigned),
        };
        let plain = digits.replace(',', "");
        let commas = plain.len() < digits.len();

        let magnitude = Decimal::from_str(&plain).map_err(AmountError)?;
        let value = if negative { -magnitude } else { magnitude };
        Ok(Amount {
            value,
            format: AmountFormat { dollar, commas },
        })
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let magnitude = self.value.abs();
        let dollar = if self.format.dollar { "$" } else { "" };
        if self.format.commas {
            write!(
                f,
                "{sign}{dollar}{}",
                format_num::format_num!(",.2", magnitude.to_f64().unwrap_or_default())
            )
        } else {
            write!(f, "{sign}{dollar}{magnitude}")
        }
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_typed_forms() {
        assert_eq!(Amount::from_str("$50.00").unwrap().value(), dec("50"));
        assert_eq!(Amount::from_str("-$1,234.50").unwrap().value(), dec("-1234.5"));
        assert_eq!(Amount::from_str(" 12.5 ").unwrap().value(), dec("12.5"));
        assert_eq!(Amount::from_str("1,000,000").unwrap().value(), dec("1000000"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Amount::from_str("").is_err());
        assert!(Amount::from_str("twelve").is_err());
        assert!(Amount::from_str("$").is_err());
    }

    #[test]
    fn test_message_format() {
        assert_eq!(Amount::new(dec("60000")).to_string(), "$60,000.00");
        assert_eq!(Amount::new(dec("-4.5")).to_string(), "-$4.50");
        assert_eq!(Amount::new(Decimal::ZERO).to_string(), "$0.00");
    }

    #[test]
    fn test_typed_format_is_kept() {
        assert_eq!(Amount::from_str("-$1000.00").unwrap().to_string(), "-$1000.00");
        assert_eq!(Amount::from_str("2,500.00").unwrap().to_string(), "2,500.00");
    }

    #[test]
    fn test_sign_predicates() {
        let zero = Amount::new(Decimal::ZERO);
        assert!(zero.is_zero() && !zero.is_positive() && !zero.is_negative());
        assert!(Amount::new(dec("0.01")).is_positive());
        assert!(Amount::new(dec("-0.01")).is_negative());
    }

    #[test]
    fn test_decimal_from_f64() {
        assert_eq!(decimal_from_f64(25.5), Some(dec("25.5")));
        assert_eq!(decimal_from_f64(0.1), Some(dec("0.1")));
        assert_eq!(decimal_from_f64(f64::NAN), None);
        assert_eq!(decimal_from_f64(f64::INFINITY), None);
    }
}
