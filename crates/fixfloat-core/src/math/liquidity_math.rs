//! # Liquidity Math
//!
//! Token amounts locked in a concentrated liquidity range, in wad. Token0 is
//! the fixed token side of the vAMM, token1 the variable token side.

use crate::constants::WAD_U128;
use crate::errors::{CoreResult, FixfloatCoreError};
use crate::math::big_int::{mul_div_u128, Rounding};

fn rounding(round_up: bool) -> Rounding {
    if round_up {
        Rounding::Up
    } else {
        Rounding::Down
    }
}

/// Calculate amount0 delta: `L * (sqrt_b - sqrt_a) / (sqrt_a * sqrt_b)`
pub fn get_amount_0_delta(
    sqrt_ratio_a_wad: u128,
    sqrt_ratio_b_wad: u128,
    liquidity: u128,
    round_up: bool,
) -> CoreResult<u128> {
    if sqrt_ratio_a_wad > sqrt_ratio_b_wad {
        return get_amount_0_delta(sqrt_ratio_b_wad, sqrt_ratio_a_wad, liquidity, round_up);
    }
    if sqrt_ratio_a_wad == 0 {
        return Err(FixfloatCoreError::DivisionByZero);
    }

    let rounding = rounding(round_up);

    // Divide by sqrt_b first so the intermediate stays a wad
    let scaled = mul_div_u128(
        liquidity,
        sqrt_ratio_b_wad - sqrt_ratio_a_wad,
        sqrt_ratio_b_wad,
        rounding,
    )?;
    mul_div_u128(scaled, WAD_U128, sqrt_ratio_a_wad, rounding)
}

/// Calculate amount1 delta: `L * (sqrt_b - sqrt_a)`
pub fn get_amount_1_delta(
    sqrt_ratio_a_wad: u128,
    sqrt_ratio_b_wad: u128,
    liquidity: u128,
    round_up: bool,
) -> CoreResult<u128> {
    if sqrt_ratio_a_wad > sqrt_ratio_b_wad {
        return get_amount_1_delta(sqrt_ratio_b_wad, sqrt_ratio_a_wad, liquidity, round_up);
    }

    mul_div_u128(
        liquidity,
        sqrt_ratio_b_wad - sqrt_ratio_a_wad,
        WAD_U128,
        rounding(round_up),
    )
}
