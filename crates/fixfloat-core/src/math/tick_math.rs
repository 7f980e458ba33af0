//! # Tick Math
//!
//! Conversion from vAMM ticks to wad sqrt prices, `sqrt(1.0001^tick)`.
//! Only the direction needed to size a liquidity range's exposure is provided.

use crate::constants::{LN_TICK_BASE_WAD, MAX_TICK, MIN_TICK};
use crate::errors::{CoreResult, FixfloatCoreError};
use crate::math::fixed_point::exp_wad;

/// Get the wad sqrt price at a tick
pub fn get_sqrt_price_at_tick(tick: i32) -> CoreResult<i128> {
    if !is_tick_valid(tick) {
        return Err(FixfloatCoreError::TickOutOfRange(tick));
    }

    // sqrt(1.0001^tick) = e^(tick * ln(1.0001) / 2)
    exp_wad(tick as i128 * LN_TICK_BASE_WAD / 2)
}

/// Check if a tick is within the supported range
pub fn is_tick_valid(tick: i32) -> bool {
    (MIN_TICK..=MAX_TICK).contains(&tick)
}

/// Validate a position's tick range
pub fn check_ticks(tick_lower: i32, tick_upper: i32) -> CoreResult<()> {
    if tick_lower >= tick_upper {
        return Err(FixfloatCoreError::InvalidTickRange(tick_lower, tick_upper));
    }
    if !is_tick_valid(tick_lower) {
        return Err(FixfloatCoreError::TickOutOfRange(tick_lower));
    }
    if !is_tick_valid(tick_upper) {
        return Err(FixfloatCoreError::TickOutOfRange(tick_upper));
    }
    Ok(())
}
