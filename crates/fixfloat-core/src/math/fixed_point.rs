//! # Fixed-Point Arithmetic
//!
//! Wad (1e18) fixed-point math shared by the oracle and the margin calculator.
//!
//! Values are plain `i128` (signed) or `u128` (unsigned) integers scaled by
//! [`WAD`]. Products and quotients go through 256-bit intermediates and every
//! operation is overflow-checked, so results are bit-for-bit reproducible.
//! Division truncates towards zero.

use ethnum::U256;

use crate::constants::{
    EXP_MAX_INPUT_WAD, EXP_MIN_INPUT_WAD, HALF_WAD, LN_2_WAD, TWO_WAD, WAD, WAD_U128,
};
use crate::errors::{CoreResult, FixfloatCoreError};
use crate::math::big_int::{mul_div, mul_div_u128, sqrt_u256, u256_to_u128, Rounding};
use crate::math::safe_math::{
    safe_add_i128, safe_cast_u128_to_i128, safe_mul_i128, safe_sub_i128, sqrt_u128,
};

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert an integer to wad
pub fn from_int(value: i128) -> CoreResult<i128> {
    safe_mul_i128(value, WAD)
}

/// Convert a wad to an integer, truncating the fractional part
pub fn to_int(value: i128) -> i128 {
    value / WAD
}

/// Convert whole seconds to wad seconds
pub fn seconds_to_wad(seconds: u64) -> i128 {
    // u64::MAX * 1e18 < i128::MAX
    seconds as i128 * WAD
}

/// Convert a wad to f64 for display and logging
pub fn wad_to_f64(value: i128) -> f64 {
    value as f64 / WAD as f64
}

/// Convert f64 to wad (configuration input only, never on a risk path)
pub fn f64_to_wad(value: f64) -> CoreResult<i128> {
    if !value.is_finite() {
        return Err(FixfloatCoreError::ConversionError);
    }

    let scaled = value * WAD as f64;
    if scaled >= i128::MAX as f64 || scaled <= i128::MIN as f64 {
        return Err(FixfloatCoreError::MathOverflow);
    }
    Ok(scaled as i128)
}

/// Parse a decimal string such as `"-0.04"` into a wad without rounding
pub fn parse_wad(value: &str) -> CoreResult<i128> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty())
        || fraction.len() > 18
        || !is_digits(whole)
        || !is_digits(fraction)
    {
        return Err(FixfloatCoreError::ConversionError);
    }

    let parse = |part: &str| -> CoreResult<i128> {
        if part.is_empty() {
            return Ok(0);
        }
        part.parse::<i128>().map_err(|_| FixfloatCoreError::ConversionError)
    };
    let fraction_scale = 10i128.pow(18 - fraction.len() as u32);
    let magnitude = safe_add_i128(
        safe_mul_i128(parse(whole)?, WAD)?,
        parse(fraction)? * fraction_scale,
    )?;

    Ok(if negative { -magnitude } else { magnitude })
}

/// Format a wad as its shortest exact decimal string
pub fn format_wad(value: i128) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    let whole = magnitude / WAD_U128;
    let fraction = magnitude % WAD_U128;

    if fraction == 0 {
        return format!("{}{}", sign, whole);
    }
    let fraction = format!("{:018}", fraction);
    format!("{}{}.{}", sign, whole, fraction.trim_end_matches('0'))
}

// ============================================================================
// Basic Fixed-Point Arithmetic
// ============================================================================

/// Add two wads
pub fn add_wad(a: i128, b: i128) -> CoreResult<i128> {
    safe_add_i128(a, b)
}

/// Subtract two wads
pub fn sub_wad(a: i128, b: i128) -> CoreResult<i128> {
    safe_sub_i128(a, b)
}

/// Multiply two wads
pub fn mul_wad(a: i128, b: i128) -> CoreResult<i128> {
    mul_div(a, b, WAD, Rounding::Down)
}

/// Divide two wads
pub fn div_wad(a: i128, b: i128) -> CoreResult<i128> {
    mul_div(a, WAD, b, Rounding::Down)
}

/// Multiply two unsigned wads
pub fn mul_wad_u128(a: u128, b: u128) -> CoreResult<u128> {
    mul_div_u128(a, b, WAD_U128, Rounding::Down)
}

/// Divide two unsigned wads
pub fn div_wad_u128(a: u128, b: u128) -> CoreResult<u128> {
    mul_div_u128(a, WAD_U128, b, Rounding::Down)
}

/// Square root of a wad
pub fn sqrt_wad(value: i128) -> CoreResult<i128> {
    if value < 0 {
        return Err(FixfloatCoreError::NegativeSquareRoot);
    }

    // sqrt(x * 1e18) is the wad root of x
    let value = value as u128;
    let root = match value.checked_mul(WAD_U128) {
        Some(scaled) => sqrt_u128(scaled),
        None => u256_to_u128(sqrt_u256(U256::from(value) * U256::from(WAD_U128)))?,
    };
    safe_cast_u128_to_i128(root)
}

// ============================================================================
// Transcendental Functions
// ============================================================================

/// ln(2) at 36 decimals, the working precision of [`exp_wad`]
const LN_2_E36: i128 = 693_147_180_559_945_309_417_232_121_458_176_568;

/// e^x for a wad exponent, rounded to the nearest wad
///
/// Range reduction `x = n·ln2 + r` with `0 <= r < ln2`, then a Taylor series
/// for e^r and a binary shift for 2^n. Both run at 36 decimals so the wad
/// result is correctly rounded. Exponents below [`EXP_MIN_INPUT_WAD`]
/// underflow to zero.
pub fn exp_wad(x: i128) -> CoreResult<i128> {
    if x < EXP_MIN_INPUT_WAD {
        return Ok(0);
    }
    if x > EXP_MAX_INPUT_WAD {
        return Err(FixfloatCoreError::ExponentialOverflow);
    }
    if x == 0 {
        return Ok(WAD);
    }

    // |x| <= 46e18, so x·1e18 still fits an i128
    let x_e36 = safe_mul_i128(x, WAD)?;
    let n = x_e36.div_euclid(LN_2_E36);
    let r = U256::from(x_e36.rem_euclid(LN_2_E36) as u128);

    let one = U256::from(WAD_U128) * U256::from(WAD_U128);
    let mut sum = one;
    let mut term = one;
    let mut k = 1u32;
    loop {
        term = term * r / one / U256::from(k);
        if term == U256::ZERO {
            break;
        }
        sum += term;
        k += 1;
    }

    // -60 <= n <= 66 within the accepted input range
    let (numerator, denominator) = if n >= 0 {
        (sum << (n as u32), U256::from(WAD_U128))
    } else {
        (sum, U256::from(WAD_U128) << ((-n) as u32))
    };
    let rounded = (numerator + denominator / 2) / denominator;
    safe_cast_u128_to_i128(u256_to_u128(rounded)?)
}

/// Base-2 logarithm of a wad, for `x >= 1`
fn log2_wad_unit(x: i128) -> i128 {
    debug_assert!(x >= WAD);

    // Integer part: position of the highest bit of x / 1e18
    let quotient = x / WAD;
    let n = 127 - quotient.leading_zeros() as i128;
    let mut result = n * WAD;

    // y = x / 2^n is in [1, 2)
    let mut y = x >> n;
    if y == WAD {
        return result;
    }

    // Fractional bits by repeated squaring
    let mut delta = HALF_WAD;
    while delta > 0 {
        y = y * y / WAD;
        if y >= TWO_WAD {
            result += delta;
            y >>= 1;
        }
        delta >>= 1;
    }

    result
}

/// Natural logarithm of a wad
pub fn ln_wad(x: i128) -> CoreResult<i128> {
    if x <= 0 {
        return Err(FixfloatCoreError::InvalidLogarithmInput);
    }

    let log2 = if x >= WAD {
        log2_wad_unit(x)
    } else {
        // log2(x) = -log2(1/x), and 1/x >= 1 here
        -log2_wad_unit(WAD * WAD / x)
    };

    mul_wad(log2, LN_2_WAD)
}

/// x^y for wads, `x >= 0`
pub fn pow_wad(x: i128, y: i128) -> CoreResult<i128> {
    if x < 0 {
        return Err(FixfloatCoreError::invalid_parameter("pow base must be non-negative"));
    }
    if y == 0 {
        return Ok(WAD);
    }
    if x == 0 {
        return if y > 0 {
            Ok(0)
        } else {
            Err(FixfloatCoreError::DivisionByZero)
        };
    }
    if x == WAD {
        return Ok(WAD);
    }

    exp_wad(mul_wad(y, ln_wad(x)?)?)
}
