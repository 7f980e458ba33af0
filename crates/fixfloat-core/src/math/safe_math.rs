//! # Safe Math Operations
//!
//! Overflow-checked integer arithmetic underlying the wad library.

use integer_sqrt::IntegerSquareRoot;

use crate::errors::{CoreResult, FixfloatCoreError};

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    // Type conversion operations. Must precede the generic arm, which has
    // the same arity and would otherwise capture `cast` as a function name.
    (cast, $fn_name:ident, $from_type:ty, $to_type:ty) => {
        /// Safe cast, erroring when the value does not fit
        pub fn $fn_name(value: $from_type) -> CoreResult<$to_type> {
            <$to_type>::try_from(value).map_err(|_| FixfloatCoreError::ConversionError)
        }
    };

    // Division operations with zero check
    (div, $fn_name:ident, $type:ty) => {
        /// Safe division with zero check
        pub fn $fn_name(a: $type, b: $type) -> CoreResult<$type> {
            if b == 0 {
                return Err(FixfloatCoreError::DivisionByZero);
            }
            a.checked_div(b).ok_or(FixfloatCoreError::MathOverflow)
        }
    };

    // Binary operations with checked methods
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Checked binary operation, erroring instead of wrapping
        pub fn $fn_name(a: $type, b: $type) -> CoreResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };
}

safe_arith!(safe_add_u128, u128, checked_add, FixfloatCoreError::MathOverflow);
safe_arith!(safe_sub_u128, u128, checked_sub, FixfloatCoreError::MathUnderflow);
safe_arith!(safe_mul_u128, u128, checked_mul, FixfloatCoreError::MathOverflow);
safe_arith!(div, safe_div_u128, u128);

safe_arith!(safe_add_i128, i128, checked_add, FixfloatCoreError::MathOverflow);
safe_arith!(safe_sub_i128, i128, checked_sub, FixfloatCoreError::MathUnderflow);
safe_arith!(safe_mul_i128, i128, checked_mul, FixfloatCoreError::MathOverflow);
safe_arith!(div, safe_div_i128, i128);

safe_arith!(cast, safe_cast_i128_to_u128, i128, u128);
safe_arith!(cast, safe_cast_u128_to_i128, u128, i128);
safe_arith!(cast, safe_cast_u64_to_i128, u64, i128);
safe_arith!(cast, safe_cast_i128_to_u64, i128, u64);

/// Absolute value that errors on `i128::MIN`
pub fn safe_abs_i128(value: i128) -> CoreResult<i128> {
    value.checked_abs().ok_or(FixfloatCoreError::MathOverflow)
}

/// Integer square root for u128
pub fn sqrt_u128(n: u128) -> u128 {
    n.integer_sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_ops() {
        assert_eq!(safe_add_i128(2, 3).unwrap(), 5);
        assert_eq!(safe_sub_u128(1, 2), Err(FixfloatCoreError::MathUnderflow));
        assert_eq!(safe_mul_i128(i128::MAX, 2), Err(FixfloatCoreError::MathOverflow));
        assert_eq!(safe_div_i128(1, 0), Err(FixfloatCoreError::DivisionByZero));
        assert_eq!(safe_div_i128(i128::MIN, -1), Err(FixfloatCoreError::MathOverflow));
    }

    #[test]
    fn test_casts() {
        assert_eq!(safe_cast_i128_to_u128(-1), Err(FixfloatCoreError::ConversionError));
        assert_eq!(safe_cast_u128_to_i128(u128::MAX), Err(FixfloatCoreError::ConversionError));
        assert_eq!(safe_cast_u64_to_i128(7).unwrap(), 7);
        assert_eq!(safe_cast_i128_to_u128(42).unwrap(), 42u128);
        assert_eq!(safe_cast_i128_to_u64(-1), Err(FixfloatCoreError::ConversionError));
        assert_eq!(safe_cast_i128_to_u64(u64::MAX as i128).unwrap(), u64::MAX);
        assert_eq!(safe_abs_i128(-9).unwrap(), 9);
    }

    #[test]
    fn test_sqrt_u128() {
        assert_eq!(sqrt_u128(0), 0);
        assert_eq!(sqrt_u128(15), 3);
        assert_eq!(sqrt_u128(16), 4);
        assert_eq!(sqrt_u128(u128::MAX), u64::MAX as u128);
    }
}
