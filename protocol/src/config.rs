//! # Protocol Configuration & Constants
//!
//! Every magic number the vault depends on lives here, together with the
//! helpers that turn human amounts ("500000", "1.5") into base units and
//! back.

use thiserror::Error;

/// Token amounts in base units.
///
/// 18 decimals put a million whole tokens at 10^24 base units, well past
/// what a `u64` can hold, so amounts are 128-bit.
pub type Amount = u128;

// ---------------------------------------------------------------------------
// Token Parameters
// ---------------------------------------------------------------------------

/// Display name of the custodied token.
pub const TOKEN_NAME: &str = "Floppy";

/// Ticker symbol of the custodied token.
pub const TOKEN_SYMBOL: &str = "FLP";

/// Decimal places. Base units per whole token is `10^TOKEN_DECIMALS`.
pub const TOKEN_DECIMALS: u8 = 18;

/// Whole tokens minted to the deployer when the ledger is created.
pub const TOKEN_CAP_WHOLE: u128 = 50_000_000_000;

/// Total supply in base units.
pub const TOKEN_CAP: Amount = TOKEN_CAP_WHOLE * 10u128.pow(TOKEN_DECIMALS as u32);

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Human-readable name of the role allowed to withdraw. The role id is the
/// Keccak-256 digest of these bytes.
pub const WITHDRAWER_ROLE_NAME: &str = "WITHDRAWER_ROLE";

// ---------------------------------------------------------------------------
// Unit Conversion
// ---------------------------------------------------------------------------

/// Errors produced while parsing a decimal amount.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitsError {
    /// Nothing to parse.
    #[error("empty amount")]
    Empty,

    /// A character other than a digit or a single `.` was found.
    #[error("invalid amount '{0}'")]
    InvalidDigit(String),

    /// More fractional digits than the token has decimals.
    #[error("too many decimal places: {found} > {decimals}")]
    TooManyDecimals {
        /// Fractional digits in the input.
        found: usize,
        /// Decimals supported by the token.
        decimals: u8,
    },

    /// The value does not fit in an [`Amount`].
    #[error("amount overflow")]
    Overflow,
}

/// Parses a decimal string into base units.
///
/// `parse_units("1.5", 18)` is `1_500_000_000_000_000_000`. Underscores are
/// accepted as digit separators.
pub fn parse_units(value: &str, decimals: u8) -> Result<Amount, UnitsError> {
    let cleaned: String = value.trim().chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) || (whole.is_empty() && frac.is_empty()) {
        return Err(UnitsError::InvalidDigit(value.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals {
            found: frac.len(),
            decimals,
        });
    }

    let scale = 10u128
        .checked_pow(decimals as u32)
        .ok_or(UnitsError::Overflow)?;
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().map_err(|_| UnitsError::Overflow)?
    };

    let frac_units = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded.parse::<u128>().map_err(|_| UnitsError::Overflow)?
    };

    whole_units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or(UnitsError::Overflow)
}

/// Formats base units as a decimal string, trimming trailing zeros.
pub fn format_units(amount: Amount, decimals: u8) -> String {
    let scale = 10u128.pow(decimals as u32);
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

/// Whole tokens to base units using [`TOKEN_DECIMALS`].
///
/// Saturates at `Amount::MAX`; callers deal in human-sized numbers.
pub fn tokens(whole: u128) -> Amount {
    whole.saturating_mul(10u128.pow(TOKEN_DECIMALS as u32))
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

/// Serde adapter that writes an [`Amount`] as a decimal string.
///
/// Use it on amount fields of tagged enums: serde buffers those fields
/// before decoding them and the buffer has no 128-bit integers. Plain JSON
/// integers are still accepted on input.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use vault_protocol::config::{amount_string, tokens, Amount};
///
/// #[derive(Serialize, Deserialize)]
/// #[serde(tag = "kind")]
/// enum Entry {
///     Credit {
///         #[serde(with = "amount_string")]
///         amount: Amount,
///     },
/// }
///
/// let json = serde_json::to_string(&Entry::Credit { amount: tokens(20) }).unwrap();
/// assert_eq!(json, r#"{"kind":"Credit","amount":"20000000000000000000"}"#);
/// ```
pub mod amount_string {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    use super::Amount;

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an amount in base units, as a decimal string or integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            v.parse().map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            Ok(Amount::from(v))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
            Ok(v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_fits_in_amount() {
        assert_eq!(TOKEN_CAP, tokens(TOKEN_CAP_WHOLE));
        assert!(TOKEN_CAP < Amount::MAX);
    }

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(parse_units("500000", 18).unwrap(), tokens(500_000));
        assert_eq!(
            parse_units("1.5", 18).unwrap(),
            1_500_000_000_000_000_000
        );
        assert_eq!(parse_units(".25", 2).unwrap(), 25);
        assert_eq!(parse_units("1_000", 0).unwrap(), 1_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_units("", 18), Err(UnitsError::Empty));
        assert!(matches!(
            parse_units("12a", 18),
            Err(UnitsError::InvalidDigit(_))
        ));
        assert!(matches!(
            parse_units("-1", 18),
            Err(UnitsError::InvalidDigit(_))
        ));
        assert!(matches!(parse_units(".", 18), Err(UnitsError::InvalidDigit(_))));
    }

    #[test]
    fn test_parse_rejects_excess_precision() {
        assert_eq!(
            parse_units("0.001", 2),
            Err(UnitsError::TooManyDecimals {
                found: 3,
                decimals: 2
            })
        );
    }

    #[test]
    fn test_parse_overflow() {
        assert_eq!(
            parse_units("999999999999999999999999999999", 18),
            Err(UnitsError::Overflow)
        );
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(tokens(200_000), 18), "200000");
        assert_eq!(format_units(1_500_000_000_000_000_000, 18), "1.5");
        assert_eq!(format_units(1, 18), "0.000000000000000001");
    }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    #[serde(tag = "kind")]
    enum Entry {
        Credit {
            #[serde(with = "amount_string")]
            amount: Amount,
        },
    }

    #[test]
    fn test_amount_string_survives_tagged_enums() {
        let entry = Entry::Credit { amount: TOKEN_CAP };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"50000000000000000000000000000\""));
        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_amount_string_accepts_integers_and_rejects_junk() {
        let back: Entry = serde_json::from_str(r#"{"kind":"Credit","amount":42}"#).unwrap();
        assert_eq!(back, Entry::Credit { amount: 42 });
        assert!(serde_json::from_str::<Entry>(r#"{"kind":"Credit","amount":"1.5"}"#).is_err());
        assert!(serde_json::from_str::<Entry>(r#"{"kind":"Credit","amount":"-1"}"#).is_err());
    }
}
