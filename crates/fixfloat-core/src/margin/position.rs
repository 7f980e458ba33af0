//! Margin of liquidity positions.
//!
//! The liquidity still active in a range can be traded against at any time,
//! so a position is margined as the worse of two sweeps: the price moving up
//! through the range to `tick_upper` (the position absorbs fixed-taker
//! exposure) or down to `tick_lower` (variable-taker exposure). Each sweep
//! adds the traded amounts to the settled balances and the result is margined
//! like a trader.

use log::trace;

use crate::errors::CoreResult;
use crate::margin::calculator::get_trader_margin_requirement;
use crate::margin::params::{
    MarginCalculatorParameters, PositionMarginRequirementParams, TraderMarginRequirementParams,
};
use crate::math::fixed_point::{add_wad, div_wad, mul_wad, sub_wad};
use crate::math::liquidity_math::{get_amount_0_delta, get_amount_1_delta};
use crate::math::safe_math::safe_cast_u128_to_i128;
use crate::math::tick_math::{check_ticks, get_sqrt_price_at_tick};
use crate::math::time::fixed_factor;

/// Fixed token balance equivalent to trading `amount0` fixed and `amount1`
/// variable tokens now, net of the cashflows both sides already accrued
/// since the term started
pub fn get_fixed_token_balance(
    amount0: i128,
    amount1: i128,
    accrued_variable_factor_wad: i128,
    term_start_timestamp_wad: i128,
    term_end_timestamp_wad: i128,
    current_timestamp_wad: i128,
) -> CoreResult<i128> {
    let fixed_factor_so_far = fixed_factor(
        false,
        term_start_timestamp_wad,
        term_end_timestamp_wad,
        current_timestamp_wad,
    )?;
    let fixed_factor_at_maturity = fixed_factor(
        true,
        term_start_timestamp_wad,
        term_end_timestamp_wad,
        current_timestamp_wad,
    )?;

    let excess_balance = add_wad(
        mul_wad(amount0, fixed_factor_so_far)?,
        mul_wad(amount1, accrued_variable_factor_wad)?,
    )?;
    let numerator = sub_wad(mul_wad(amount0, fixed_factor_at_maturity)?, excess_balance)?;
    div_wad(numerator, fixed_factor_at_maturity)
}

/// Amounts of token0 and token1 in the liquidity between two ticks
fn range_amounts(tick_a: i32, tick_b: i32, liquidity: u128) -> CoreResult<(i128, i128)> {
    let sqrt_a = get_sqrt_price_at_tick(tick_a)? as u128;
    let sqrt_b = get_sqrt_price_at_tick(tick_b)? as u128;
    let amount0 = get_amount_0_delta(sqrt_a, sqrt_b, liquidity, true)?;
    let amount1 = get_amount_1_delta(sqrt_a, sqrt_b, liquidity, true)?;
    Ok((safe_cast_u128_to_i128(amount0)?, safe_cast_u128_to_i128(amount1)?))
}

/// Balances after the remaining liquidity is swept in one direction
fn sweep(
    position: &PositionMarginRequirementParams,
    amount0: i128,
    amount1: i128,
    current_timestamp_wad: i128,
) -> CoreResult<TraderMarginRequirementParams> {
    let fixed_delta = get_fixed_token_balance(
        amount0,
        amount1,
        position.variable_factor_wad,
        position.term_start_timestamp_wad,
        position.term_end_timestamp_wad,
        current_timestamp_wad,
    )?;

    let mut trader = position.as_trader();
    trader.fixed_token_balance = add_wad(trader.fixed_token_balance, fixed_delta)?;
    trader.variable_token_balance = add_wad(trader.variable_token_balance, amount1)?;
    Ok(trader)
}

/// Margin a liquidity position must hold: the worse of both sweeps
pub fn get_position_margin_requirement(
    position: &PositionMarginRequirementParams,
    current_timestamp_wad: i128,
    params: &MarginCalculatorParameters,
) -> CoreResult<i128> {
    check_ticks(position.tick_lower, position.tick_upper)?;

    if position.liquidity == 0 {
        return get_trader_margin_requirement(&position.as_trader(), current_timestamp_wad, params);
    }

    let mut requirement: Option<i128> = None;

    if position.current_tick < position.tick_upper {
        // Price moves up: the position receives fixed and pays variable
        let from_tick = position.current_tick.max(position.tick_lower);
        let (amount0, amount1) = range_amounts(from_tick, position.tick_upper, position.liquidity)?;
        let trader = sweep(position, amount0, -amount1, current_timestamp_wad)?;
        let margin = get_trader_margin_requirement(&trader, current_timestamp_wad, params)?;
        trace!("Position sweep to tick {} requires {}", position.tick_upper, margin);
        requirement = Some(margin);
    }

    if position.current_tick > position.tick_lower {
        // Price moves down: the position pays fixed and receives variable
        let to_tick = position.current_tick.min(position.tick_upper);
        let (amount0, amount1) = range_amounts(position.tick_lower, to_tick, position.liquidity)?;
        let trader = sweep(position, -amount0, amount1, current_timestamp_wad)?;
        let margin = get_trader_margin_requirement(&trader, current_timestamp_wad, params)?;
        trace!("Position sweep to tick {} requires {}", position.tick_lower, margin);
        requirement = Some(requirement.map_or(margin, |other| other.max(margin)));
    }

    match requirement {
        Some(margin) => Ok(margin),
        // Not reached once the tick range is valid
        None => get_trader_margin_requirement(&position.as_trader(), current_timestamp_wad, params),
    }
}

/// Whether `current_margin` is strictly below the position's liquidation
/// margin
pub fn is_liquidatable_position(
    position: &PositionMarginRequirementParams,
    current_timestamp_wad: i128,
    current_margin: i128,
    params: &MarginCalculatorParameters,
) -> CoreResult<bool> {
    let liquidation = PositionMarginRequirementParams {
        is_lm: true,
        ..*position
    };
    let requirement = get_position_margin_requirement(&liquidation, current_timestamp_wad, params)?;
    Ok(current_margin < requirement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SECONDS_IN_WEEK, WAD};
    use crate::errors::FixfloatCoreError;

    const WEEK: i128 = SECONDS_IN_WEEK * WAD;
    const NOW: i128 = 1_700_000_000 * WAD;

    fn position() -> PositionMarginRequirementParams {
        PositionMarginRequirementParams {
            tick_lower: -1,
            tick_upper: 1,
            current_tick: 0,
            liquidity: WAD as u128,
            fixed_token_balance: -3_000 * WAD,
            variable_token_balance: 1_000 * WAD,
            variable_factor_wad: 2 * WAD / 100,
            term_start_timestamp_wad: NOW - WEEK,
            term_end_timestamp_wad: NOW + WEEK,
            is_lm: false,
            historical_apy_wad: 3 * WAD / 10,
        }
    }

    #[test]
    fn test_fixed_token_balance() {
        // halfway through the term with no variable accrual, trading 100
        // fixed tokens now is worth half of them at maturity
        let balance = get_fixed_token_balance(100 * WAD, 0, 0, NOW - WEEK, NOW + WEEK, NOW).unwrap();
        assert!((balance - 50 * WAD).abs() <= 1_000);

        // accrued variable cashflows are netted out
        let with_variable =
            get_fixed_token_balance(100 * WAD, -100 * WAD, WAD / 100, NOW - WEEK, NOW + WEEK, NOW).unwrap();
        assert!(with_variable > balance);
    }

    #[test]
    fn test_position_is_liquidatable() {
        let params = MarginCalculatorParameters::default();
        let position = position();

        let requirement = get_position_margin_requirement(
            &PositionMarginRequirementParams { is_lm: true, ..position },
            NOW,
            &params,
        )
        .unwrap();
        assert!(requirement > 0);

        assert!(is_liquidatable_position(&position, NOW, 0, &params).unwrap());
        assert!(!is_liquidatable_position(&position, NOW, requirement, &params).unwrap());
    }

    #[test]
    fn test_zero_liquidity_matches_trader() {
        let params = MarginCalculatorParameters::default();
        let position = PositionMarginRequirementParams {
            liquidity: 0,
            ..position()
        };
        assert_eq!(
            get_position_margin_requirement(&position, NOW, &params).unwrap(),
            get_trader_margin_requirement(&position.as_trader(), NOW, &params).unwrap()
        );
    }

    #[test]
    fn test_liquidity_adds_risk() {
        let params = MarginCalculatorParameters::default();
        let settled = PositionMarginRequirementParams {
            fixed_token_balance: 0,
            variable_token_balance: 0,
            liquidity: 0,
            ..position()
        };
        assert_eq!(get_position_margin_requirement(&settled, NOW, &params).unwrap(), 0);

        // a wide range of fresh liquidity can be traded into either side
        let active = PositionMarginRequirementParams {
            tick_lower: -6_000,
            tick_upper: 6_000,
            liquidity: 1_000 * WAD as u128,
            ..settled
        };
        assert!(get_position_margin_requirement(&active, NOW, &params).unwrap() > 0);
    }

    #[test]
    fn test_invalid_ticks() {
        let params = MarginCalculatorParameters::default();
        let position = PositionMarginRequirementParams {
            tick_lower: 5,
            tick_upper: 5,
            ..position()
        };
        assert_eq!(
            get_position_margin_requirement(&position, NOW, &params),
            Err(FixfloatCoreError::InvalidTickRange(5, 5))
        );
    }
}
