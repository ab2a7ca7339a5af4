//! # Amounts
//!
//! Every balance, stake and fee in Trinity is an [`Amount`]: an unsigned
//! count of the smallest currency unit (wei). `u128` leaves enough headroom
//! that overflow is unreachable at any realistic scale, but callers still
//! use `checked_*` arithmetic everywhere money moves.
//!
//! Human-facing values are written in ether (`"0.001"`) and converted with
//! [`parse_ether`] / [`format_ether`].

use thiserror::Error;

/// An amount of the native currency in wei.
pub type Amount = u128;

/// Number of decimal places between ether and wei.
pub const ETHER_DECIMALS: u32 = 18;

/// One ether expressed in wei.
pub const WEI_PER_ETHER: Amount = 1_000_000_000_000_000_000;

/// Errors produced when parsing a human-readable amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The string was empty or contained something other than digits and
    /// a single decimal point.
    #[error("invalid amount: {0:?}")]
    Invalid(String),

    /// More fractional digits than the currency supports.
    #[error("too many decimal places: {got} (max {max})")]
    TooPrecise {
        /// Fractional digits supplied.
        got: usize,
        /// Maximum supported.
        max: u32,
    },

    /// The value does not fit in an [`Amount`].
    #[error("amount overflow: {0}")]
    Overflow(String),
}

/// Parses a decimal ether string (`"1"`, `"0.001"`, `".5"`) into wei.
///
/// # Errors
///
/// Returns [`AmountError::Invalid`] for malformed input,
/// [`AmountError::TooPrecise`] for more than 18 fractional digits and
/// [`AmountError::Overflow`] when the result exceeds `u128`.
///
/// # Example
///
/// ```
/// use trinity_protocol::amount::{parse_ether, WEI_PER_ETHER};
///
/// assert_eq!(parse_ether("0.001").unwrap(), WEI_PER_ETHER / 1_000);
/// ```
pub fn parse_ether(s: &str) -> Result<Amount, AmountError> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if frac.len() > ETHER_DECIMALS as usize {
        return Err(AmountError::TooPrecise {
            got: frac.len(),
            max: ETHER_DECIMALS,
        });
    }

    let overflow = || AmountError::Overflow(s.to_string());

    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<Amount>()
            .map_err(|_| overflow())?
            .checked_mul(WEI_PER_ETHER)
            .ok_or_else(overflow)?
    };

    let frac_wei = if frac.is_empty() {
        0
    } else {
        let scale = 10u128.pow(ETHER_DECIMALS - frac.len() as u32);
        frac.parse::<Amount>().map_err(|_| overflow())? * scale
    };

    whole_wei.checked_add(frac_wei).ok_or_else(overflow)
}

/// Formats a wei amount as a decimal ether string with trailing zeros
/// trimmed (`2_000_000_000_000_000` -> `"0.002"`).
pub fn format_ether(amount: Amount) -> String {
    let whole = amount / WEI_PER_ETHER;
    let frac = amount % WEI_PER_ETHER;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:018}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Serde adapter that encodes an [`Amount`] as a decimal string.
///
/// JSON numbers above 2^53 lose precision in most clients, and wei values
/// cross that line at 0.009 ether.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use trinity_protocol::Amount;
///
/// #[derive(Serialize, Deserialize)]
/// struct Stake {
///     #[serde(with = "trinity_protocol::amount::as_decimal_str")]
///     amount: Amount,
/// }
/// ```
pub mod as_decimal_str {
    use super::Amount;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<Amount>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_ether() {
        assert_eq!(parse_ether("1").unwrap(), WEI_PER_ETHER);
        assert_eq!(parse_ether("0.001").unwrap(), 1_000_000_000_000_000);
        assert_eq!(parse_ether(".5").unwrap(), WEI_PER_ETHER / 2);
        assert_eq!(parse_ether("0").unwrap(), 0);
        assert_eq!(parse_ether("0.000000000000000001").unwrap(), 1);
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert!(matches!(parse_ether(""), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_ether("."), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_ether("1.2.3"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_ether("-1"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_ether("1e18"), Err(AmountError::Invalid(_))));
    }

    #[test]
    fn rejects_sub_wei_precision() {
        let err = parse_ether("0.0000000000000000001").unwrap_err();
        assert_eq!(err, AmountError::TooPrecise { got: 19, max: 18 });
    }

    #[test]
    fn rejects_overflow() {
        let huge = "9".repeat(40);
        assert!(matches!(parse_ether(&huge), Err(AmountError::Overflow(_))));
    }

    #[test]
    fn format_trims_trailing_zeros() {
        assert_eq!(format_ether(2_000_000_000_000_000), "0.002");
        assert_eq!(format_ether(WEI_PER_ETHER), "1");
        assert_eq!(format_ether(WEI_PER_ETHER + WEI_PER_ETHER / 4), "1.25");
        assert_eq!(format_ether(1), "0.000000000000000001");
    }

    #[test]
    fn decimal_str_adapter_survives_json() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "as_decimal_str")]
            amount: Amount,
        }

        let w = Wrapper {
            amount: u128::MAX,
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, format!("{{\"amount\":\"{}\"}}", u128::MAX));
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.amount, u128::MAX);
    }
}
