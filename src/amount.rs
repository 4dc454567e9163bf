//! Fixed-point token amounts.
//!
//! Amounts are integer `units` at a declared decimal precision. Parsing is
//! exact: a string either converts losslessly or fails with a typed error,
//! never a silent zero. Display truncation caps precision without touching
//! the underlying value.

use std::{cmp::Ordering, fmt};

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount cannot be negative")]
    Negative,
    #[error("amount is not a decimal number: {0:?}")]
    Malformed(String),
    #[error("amount has more than {0} fractional digits")]
    TooPrecise(u8),
    #[error("amount is too large")]
    Overflow,
}

/// A non-negative fixed-point value: `units / 10^decimals`.
///
/// Two amounts are only comparable at equal precision; mixing precisions in
/// a comparison is a bug in the caller and trips a debug assertion.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TokenAmount {
    units: u128,
    decimals: u8,
}

impl TokenAmount {
    pub const fn from_units(units: u128, decimals: u8) -> Self {
        Self { units, decimals }
    }

    pub const fn zero(decimals: u8) -> Self {
        Self { units: 0, decimals }
    }

    pub const fn units(&self) -> u128 {
        self.units
    }

    pub const fn decimals(&self) -> u8 {
        self.decimals
    }

    pub const fn is_zero(&self) -> bool {
        self.units == 0
    }

    /// Doubles the amount, `None` on overflow.
    pub fn checked_double(&self) -> Option<Self> {
        let units = self.units.checked_mul(2)?;
        Some(Self {
            units,
            decimals: self.decimals,
        })
    }

    /// Halves the amount, rounding toward zero on odd unit counts.
    pub fn halved(&self) -> Self {
        Self {
            units: self.units / 2,
            decimals: self.decimals,
        }
    }

    /// Renders at most `fraction_digits` fractional digits, truncating toward
    /// zero. Digits beyond the amount's own precision are not invented.
    pub fn format(&self, fraction_digits: u8) -> String {
        let scale = pow10(self.decimals);
        let whole = self.units / scale;
        let digits = fraction_digits.min(self.decimals);
        if digits == 0 {
            return whole.to_string();
        }
        let frac = self.units % scale;
        let full = format!("{frac:0width$}", width = self.decimals as usize);
        format!("{whole}.{}", &full[..digits as usize])
    }

    /// Full-precision rendering with trailing zeros (and a bare trailing
    /// point) trimmed. `format_full` of a whole amount has no fraction part.
    pub fn format_full(&self) -> String {
        let mut out = self.format(self.decimals);
        if out.contains('.') {
            while out.ends_with('0') {
                out.pop();
            }
            if out.ends_with('.') {
                out.pop();
            }
        }
        out
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_full())
    }
}

impl PartialOrd for TokenAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TokenAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        debug_assert_eq!(
            self.decimals, other.decimals,
            "comparing amounts at different precisions"
        );
        self.units.cmp(&other.units)
    }
}

/// Parses a human decimal string into units at `decimals` precision.
///
/// Grouping separators (`,`, `_`, spaces) are stripped first. Empty,
/// negative, and non-numeric input is rejected, as is a fraction longer than
/// `decimals` — excess precision is an error, not a rounding site.
pub fn parse(input: &str, decimals: u8) -> Result<TokenAmount, AmountError> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect();
    if cleaned.is_empty() {
        return Err(AmountError::Empty);
    }
    if cleaned.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Malformed(input.to_string()));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AmountError::Malformed(input.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(AmountError::TooPrecise(decimals));
    }

    let whole_units = if whole.is_empty() {
        0u128
    } else {
        whole.parse::<u128>().map_err(|_| AmountError::Overflow)?
    };
    let frac_units = if frac.is_empty() {
        0u128
    } else {
        let padding = decimals as usize - frac.len();
        let parsed = frac.parse::<u128>().map_err(|_| AmountError::Overflow)?;
        parsed
            .checked_mul(pow10(padding as u8))
            .ok_or(AmountError::Overflow)?
    };

    let units = whole_units
        .checked_mul(pow10(decimals))
        .and_then(|scaled| scaled.checked_add(frac_units))
        .ok_or(AmountError::Overflow)?;

    Ok(TokenAmount::from_units(units, decimals))
}

/// Halves a decimal-string amount, rounding toward zero on non-exact
/// division. The truncation is deliberate: halving one odd smallest-unit
/// drops the remainder rather than rounding up.
pub fn halve(input: &str, decimals: u8) -> Result<String, AmountError> {
    Ok(parse(input, decimals)?.halved().format_full())
}

/// Doubles a decimal-string amount, failing on overflow.
pub fn double(input: &str, decimals: u8) -> Result<String, AmountError> {
    parse(input, decimals)?
        .checked_double()
        .ok_or(AmountError::Overflow)
        .map(|amount| amount.format_full())
}

fn pow10(exp: u8) -> u128 {
    10u128.pow(exp as u32)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const D: u8 = 18;

    #[test]
    fn parse__whole_and_fraction() {
        let amount = parse("12.5", D).unwrap();
        assert_eq!(amount.units(), 12_500_000_000_000_000_000);
    }

    #[test]
    fn parse__strips_grouping_separators() {
        let amount = parse("1,000_000 000", D).unwrap();
        assert_eq!(amount, parse("1000000000", D).unwrap());
    }

    #[test]
    fn parse__bare_fraction_is_accepted() {
        assert_eq!(parse(".5", D).unwrap(), parse("0.5", D).unwrap());
    }

    #[test]
    fn parse__rejects_empty_input() {
        assert_eq!(parse("", D), Err(AmountError::Empty));
        assert_eq!(parse("   ", D), Err(AmountError::Empty));
    }

    #[test]
    fn parse__rejects_negative_input() {
        assert_eq!(parse("-1", D), Err(AmountError::Negative));
    }

    #[test]
    fn parse__rejects_non_numeric_input() {
        assert!(matches!(parse("abc", D), Err(AmountError::Malformed(_))));
        assert!(matches!(parse("1.2.3", D), Err(AmountError::Malformed(_))));
        assert!(matches!(parse("1e5", D), Err(AmountError::Malformed(_))));
        assert!(matches!(parse(".", D), Err(AmountError::Malformed(_))));
    }

    #[test]
    fn parse__rejects_excess_precision() {
        assert_eq!(parse("0.123", 2), Err(AmountError::TooPrecise(2)));
    }

    #[test]
    fn parse__rejects_overflow() {
        let big = "9".repeat(60);
        assert_eq!(parse(&big, D), Err(AmountError::Overflow));
    }

    #[test]
    fn format__truncates_display_precision() {
        let amount = parse("1.23456789", D).unwrap();
        assert_eq!(amount.format(4), "1.2345");
        // The underlying value is untouched.
        assert_eq!(amount.format_full(), "1.23456789");
    }

    #[test]
    fn format__caps_requested_digits_at_own_precision() {
        let amount = parse("1.25", 2).unwrap();
        assert_eq!(amount.format(10), "1.25");
    }

    #[test]
    fn format__zero_fraction_digits() {
        assert_eq!(parse("7.9", D).unwrap().format(0), "7");
    }

    #[test]
    fn halve__truncates_toward_zero_on_odd_units() {
        // 3 smallest units halve to 1, not 1.5 or 2.
        assert_eq!(
            halve("0.000000000000000003", D).unwrap(),
            "0.000000000000000001"
        );
    }

    #[test]
    fn double__fails_on_overflow() {
        let near_max = TokenAmount::from_units(u128::MAX - 1, D).format_full();
        assert_eq!(double(&near_max, D), Err(AmountError::Overflow));
    }

    proptest! {
        #[test]
        fn roundtrip__format_then_parse_preserves_value(units in 0u128..1_000_000_000_000_000_000_000_000_000_000) {
            let amount = TokenAmount::from_units(units, D);
            let rendered = amount.format_full();
            prop_assert_eq!(parse(&rendered, D).unwrap(), amount);
        }

        #[test]
        fn roundtrip__halve_after_double_is_identity(units in 0u128..(u128::MAX / 2)) {
            let amount = TokenAmount::from_units(units, D).format_full();
            let doubled = double(&amount, D).unwrap();
            prop_assert_eq!(halve(&doubled, D).unwrap(), amount);
        }

        #[test]
        fn halve__never_rounds_up(units in 0u128..u128::MAX) {
            let halved = TokenAmount::from_units(units, D).halved();
            prop_assert!(halved.units() * 2 <= units);
            prop_assert!(units - halved.units() * 2 <= 1);
        }
    }
}
