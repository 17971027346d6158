//! Fixed-point token amount formatting.
//!
//! Ledgers count raw units; a token with `decimals = 18` shows `10^18` raw
//! units as `1`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("empty amount")]
    Empty,

    #[error("invalid digit in amount {0:?}")]
    InvalidDigit(String),

    #[error("amount {amount:?} has more than {decimals} fractional digits")]
    TooPrecise { amount: String, decimals: u8 },

    #[error("amount {0:?} does not fit in 128 bits")]
    Overflow(String),
}

/// Render `raw` units as a decimal string, trimming trailing zeros.
pub fn format_amount(raw: u128, decimals: u8) -> String {
    let Some(unit) = 10u128.checked_pow(u32::from(decimals)) else {
        return raw.to_string();
    };
    let whole = raw / unit;
    let frac = raw % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:0width$}", width = usize::from(decimals));
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Parse a decimal string such as `"1.5"` into raw units.
pub fn parse_amount(s: &str, decimals: u8) -> Result<u128, AmountParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AmountParseError::Empty);
    }
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(AmountParseError::InvalidDigit(s.to_string()));
    }
    if frac.len() > usize::from(decimals) {
        return Err(AmountParseError::TooPrecise {
            amount: s.to_string(),
            decimals,
        });
    }
    let overflow = || AmountParseError::Overflow(s.to_string());
    let unit = 10u128
        .checked_pow(u32::from(decimals))
        .ok_or_else(overflow)?;
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let frac_raw: u128 = if frac.is_empty() {
        0
    } else {
        let scale = 10u128
            .checked_pow((usize::from(decimals) - frac.len()) as u32)
            .ok_or_else(overflow)?;
        frac.parse::<u128>()
            .map_err(|_| overflow())?
            .checked_mul(scale)
            .ok_or_else(overflow)?
    };
    whole
        .checked_mul(unit)
        .and_then(|w| w.checked_add(frac_raw))
        .ok_or_else(overflow)
}
