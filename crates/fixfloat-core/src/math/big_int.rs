//! Big integer operations for high-precision math
//!
//! Wad products overflow 128 bits long before the values themselves do, so
//! every `a * b / c` goes through a 256-bit intermediate.

use ethnum::{I256, U256};

use crate::errors::{CoreResult, FixfloatCoreError};

/// Rounding mode for division operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum Rounding {
    /// Round towards zero
    Down,
    /// Round away from zero
    Up,
}

/// Narrow a 256-bit signed value back to i128
pub fn i256_to_i128(value: I256) -> CoreResult<i128> {
    if value > I256::from(i128::MAX) || value < I256::from(i128::MIN) {
        return Err(FixfloatCoreError::MulDivOverflow);
    }
    let (_, lo) = value.into_words();
    Ok(lo)
}

/// Narrow a 256-bit unsigned value back to u128
pub fn u256_to_u128(value: U256) -> CoreResult<u128> {
    let (hi, lo) = value.into_words();
    if hi != 0 {
        return Err(FixfloatCoreError::MulDivOverflow);
    }
    Ok(lo)
}

/// Signed `(a * b) / denominator` with a 256-bit intermediate
pub fn mul_div(a: i128, b: i128, denominator: i128, rounding: Rounding) -> CoreResult<i128> {
    if denominator == 0 {
        return Err(FixfloatCoreError::DivisionByZero);
    }

    // |i128| * |i128| < 2^254, cannot overflow I256
    let product = I256::from(a) * I256::from(b);
    let denominator = I256::from(denominator);

    let quotient = product / denominator;
    let remainder = product % denominator;

    let quotient = if rounding == Rounding::Up && remainder != I256::ZERO {
        // Away from zero, following the sign of the exact result
        if (product < I256::ZERO) == (denominator < I256::ZERO) {
            quotient + I256::ONE
        } else {
            quotient - I256::ONE
        }
    } else {
        quotient
    };

    i256_to_i128(quotient)
}

/// Unsigned `(a * b) / denominator` with a 256-bit intermediate
pub fn mul_div_u128(a: u128, b: u128, denominator: u128, rounding: Rounding) -> CoreResult<u128> {
    if denominator == 0 {
        return Err(FixfloatCoreError::DivisionByZero);
    }

    let product = U256::from(a) * U256::from(b);
    let denominator = U256::from(denominator);

    let mut quotient = product / denominator;
    if rounding == Rounding::Up && product % denominator != U256::ZERO {
        quotient += U256::ONE;
    }

    u256_to_u128(quotient)
}

/// Integer square root of a 256-bit value (Newton's method)
pub fn sqrt_u256(n: U256) -> U256 {
    if n == U256::ZERO {
        return U256::ZERO;
    }

    // Start above the root: 2^(ceil(bits / 2))
    let bits = 256 - n.leading_zeros();
    let mut x = U256::ONE << ((bits + 1) / 2);
    loop {
        let y = (x + n / x) >> 1;
        if y >= x {
            return x;
        }
        x = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_rounding() {
        // 30 / 4 = 7.5
        assert_eq!(mul_div(10, 3, 4, Rounding::Down).unwrap(), 7);
        assert_eq!(mul_div(10, 3, 4, Rounding::Up).unwrap(), 8);

        // Negative results round away from zero when rounding up
        assert_eq!(mul_div(-10, 3, 4, Rounding::Down).unwrap(), -7);
        assert_eq!(mul_div(-10, 3, 4, Rounding::Up).unwrap(), -8);

        // Exact division
        assert_eq!(mul_div(10, 4, 5, Rounding::Up).unwrap(), 8);
    }

    #[test]
    fn test_mul_div_large_numbers() {
        let a = i128::MAX / 2;
        assert_eq!(mul_div(a, 1_000_000, 1_000_000, Rounding::Down).unwrap(), a);
        assert_eq!(mul_div(i128::MAX, 2, 1, Rounding::Down), Err(FixfloatCoreError::MulDivOverflow));

        let b = u128::MAX / 3;
        assert_eq!(mul_div_u128(b, 3, 3, Rounding::Down).unwrap(), b);
        assert_eq!(mul_div_u128(1, 1, 0, Rounding::Down), Err(FixfloatCoreError::DivisionByZero));
    }

    #[test]
    fn test_sqrt_u256() {
        assert_eq!(sqrt_u256(U256::from(0u128)), U256::ZERO);
        assert_eq!(sqrt_u256(U256::from(1u128)), U256::ONE);
        assert_eq!(sqrt_u256(U256::from(99u128)), U256::from(9u128));
        assert_eq!(sqrt_u256(U256::from(100u128)), U256::from(10u128));

        // (2^100)^2 = 2^200
        let big = U256::ONE << 200;
        assert_eq!(sqrt_u256(big), U256::ONE << 100);
    }
}
