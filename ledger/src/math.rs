//! Wide fixed-point helpers.
//!
//! Shares are scaled well above raw units, so `shares * supply` routinely
//! exceeds 128 bits even when the quotient fits. Products are formed in 256
//! bits and only the final quotient is narrowed.

pub use primitive_types::U256;
use primitive_types::U512;

/// `floor(a * b / denominator)`, computed without intermediate overflow.
///
/// Returns `None` when `denominator` is zero or the quotient does not fit in
/// a `u128`.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    let product = U256::from(a) * U256::from(b);
    let quotient = product / U256::from(denominator);
    u128::try_from(quotient).ok()
}

/// [`mul_div`] for a 256-bit left operand: `floor(a * b / denominator)`
/// with a 512-bit intermediate.
///
/// Returns `None` when `denominator` is zero or the quotient does not fit in
/// a `U256`.
pub fn mul_div_wide(a: U256, b: u128, denominator: u128) -> Option<U256> {
    if denominator == 0 {
        return None;
    }
    let product = a.full_mul(U256::from(b));
    let quotient = product / U512::from(denominator);
    U256::try_from(quotient).ok()
}

/// Serde adapter writing a [`U256`] as a decimal string, for fields that
/// outgrow 128 bits.
pub mod u256_dec {
    use super::U256;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s)
            .map_err(|_| D::Error::custom(format!("invalid 256-bit integer {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_truncating_division() {
        assert_eq!(mul_div(6, 7, 2), Some(21));
        assert_eq!(mul_div(10, 1, 3), Some(3));
        assert_eq!(mul_div(0, u128::MAX, 1), Some(0));
    }

    #[test]
    fn intermediate_product_above_u128() {
        // 1e29 * 1e20 = 1e49 does not fit in u128; the quotient does.
        let shares = 100_000_000_000_000_000_000_000_000_000u128;
        let supply = 100_000_000_000_000_000_000u128;
        assert_eq!(mul_div(shares, supply, shares), Some(supply));
    }

    #[test]
    fn zero_denominator_and_oversized_quotient() {
        assert_eq!(mul_div(1, 1, 0), None);
        assert_eq!(mul_div(u128::MAX, 2, 1), None);
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX), Some(u128::MAX));
    }

    #[test]
    fn wide_operand_beyond_u128() {
        let a = U256::from(u128::MAX) * U256::from(1_000_000u64);
        assert_eq!(mul_div_wide(a, 3, 1_000_000), Some(U256::from(u128::MAX) * U256::from(3u8)));
        assert_eq!(mul_div_wide(U256::from(10u8), 7, 3), Some(U256::from(23u8)));
        assert_eq!(mul_div_wide(U256::one(), 1, 0), None);
        assert_eq!(mul_div_wide(U256::MAX, u128::MAX, 1), None);
        assert_eq!(mul_div_wide(U256::MAX, u128::MAX, u128::MAX), Some(U256::MAX));
    }

    #[test]
    fn u256_survives_bincode_as_decimal() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Wrapped(#[serde(with = "u256_dec")] U256);

        let value = Wrapped(U256::from(u128::MAX) * U256::from(u128::MAX));
        let bytes = bincode::serialize(&value).unwrap();
        assert_eq!(bincode::deserialize::<Wrapped>(&bytes).unwrap(), value);
    }
}
