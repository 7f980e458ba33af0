//! # Margin Calculator
//!
//! Worst-case APY envelopes and the margin requirements derived from them.
//!
//! The variable rate is modelled as a CIR process. Over the remaining time to
//! maturity its scaled value follows a non-central chi-square distribution
//! with `k = 4·alpha / sigma²` degrees of freedom and non-centrality
//! `lambda = 4·beta·tf·apy / (sigma²·(1 - tf))`, where `tf` is the time factor
//! `exp(-beta·(term_end - current) / t_max)` and the scale is
//! `zeta = sigma²·(1 - tf) / (4·beta)`. The upper and lower bounds sit `xi`
//! standard deviations away from the mean:
//!
//! ```text
//! bound = zeta · (k + lambda ± xi · sqrt(2·(k + 2·lambda)))
//! ```
//!
//! Every function here is pure over a [`MarginCalculatorParameters`].

use log::info;

use crate::constants::{FOUR_WAD, TWO_WAD, WAD};
use crate::errors::{CoreResult, FixfloatCoreError};
use crate::margin::params::{
    MarginCalculatorParameters, PositionMarginRequirementParams, TraderMarginRequirementParams,
};
use crate::margin::position;
use crate::margin::quadrant::WorstCaseQuadrant;
use crate::math::fixed_point::{add_wad, div_wad, exp_wad, mul_wad, sqrt_wad, sub_wad};
use crate::math::safe_math::safe_abs_i128;
use crate::math::time::{accrual_fact, fixed_factor};

// ============================================================================
// APY Bounds
// ============================================================================

/// Remaining-time risk decay in `(0, 1]`, approaching 1 at maturity
pub fn compute_time_factor(
    term_end_timestamp_wad: i128,
    current_timestamp_wad: i128,
    params: &MarginCalculatorParameters,
) -> CoreResult<i128> {
    if term_end_timestamp_wad <= 0 {
        return Err(FixfloatCoreError::InvalidTermEnd);
    }
    if current_timestamp_wad >= term_end_timestamp_wad {
        return Err(FixfloatCoreError::TermEnded);
    }

    let time_to_maturity = sub_wad(term_end_timestamp_wad, current_timestamp_wad)?;
    let scaled_time = div_wad(time_to_maturity, params.t_max_wad)?;
    exp_wad(-mul_wad(params.beta_wad, scaled_time)?)
}

/// Upper or lower APY bound around `historical_apy_wad`, never negative
pub fn compute_apy_bound(
    term_end_timestamp_wad: i128,
    current_timestamp_wad: i128,
    historical_apy_wad: i128,
    is_upper: bool,
    params: &MarginCalculatorParameters,
) -> CoreResult<i128> {
    if historical_apy_wad < 0 {
        return Err(FixfloatCoreError::invalid_parameter("historical_apy_wad"));
    }

    let time_factor = compute_time_factor(term_end_timestamp_wad, current_timestamp_wad, params)?;
    let one_minus_time_factor = sub_wad(WAD, time_factor)?;
    if one_minus_time_factor <= 0 {
        // No time left for the rate to move
        return Ok(historical_apy_wad);
    }

    let variance_over_term = mul_wad(params.sigma_squared_wad, one_minus_time_factor)?;
    let four_beta = mul_wad(FOUR_WAD, params.beta_wad)?;

    let k = div_wad(mul_wad(FOUR_WAD, params.alpha_wad)?, params.sigma_squared_wad)?;
    let zeta = div_wad(variance_over_term, four_beta)?;
    let lambda = div_wad(
        mul_wad(four_beta, mul_wad(time_factor, historical_apy_wad)?)?,
        variance_over_term,
    )?;

    let xi = if is_upper {
        params.xi_upper_wad
    } else {
        params.xi_lower_wad
    };
    let spread = mul_wad(TWO_WAD, add_wad(k, mul_wad(TWO_WAD, lambda)?)?)?;
    let critical_value = mul_wad(xi, sqrt_wad(spread)?)?;

    let mean = add_wad(k, lambda)?;
    let quantile = if is_upper {
        add_wad(mean, critical_value)?
    } else {
        sub_wad(mean, critical_value)?
    };

    Ok(mul_wad(zeta, quantile)?.max(0))
}

/// Variable factor accrued over the whole term if the rate follows its
/// adverse bound, for an explicit orientation
pub fn worst_case_variable_factor_for(
    quadrant: WorstCaseQuadrant,
    time_from_start_to_maturity_wad: i128,
    term_end_timestamp_wad: i128,
    current_timestamp_wad: i128,
    historical_apy_wad: i128,
    params: &MarginCalculatorParameters,
) -> CoreResult<i128> {
    let bound = compute_apy_bound(
        term_end_timestamp_wad,
        current_timestamp_wad,
        historical_apy_wad,
        quadrant.is_upper(),
        params,
    )?;
    let rate = mul_wad(bound, quadrant.multiplier(params))?;
    mul_wad(rate, accrual_fact(time_from_start_to_maturity_wad)?)
}

/// Variable factor accrued over the whole term if the rate follows the bound
/// adverse to an FT (`is_ft`) or VT position
pub fn worst_case_variable_factor_at_maturity(
    time_from_start_to_maturity_wad: i128,
    term_end_timestamp_wad: i128,
    current_timestamp_wad: i128,
    is_ft: bool,
    is_lm: bool,
    historical_apy_wad: i128,
    params: &MarginCalculatorParameters,
) -> CoreResult<i128> {
    worst_case_variable_factor_for(
        WorstCaseQuadrant::new(is_ft, is_lm),
        time_from_start_to_maturity_wad,
        term_end_timestamp_wad,
        current_timestamp_wad,
        historical_apy_wad,
        params,
    )
}

// ============================================================================
// Trader Margin
// ============================================================================

/// Floor of any at-risk requirement: `|variable| · eta · years_to_maturity`,
/// at least `min_margin_to_incentivise_liquidators`
pub fn get_minimum_margin_requirement(
    variable_token_balance: i128,
    term_end_timestamp_wad: i128,
    current_timestamp_wad: i128,
    is_lm: bool,
    params: &MarginCalculatorParameters,
) -> CoreResult<i128> {
    let years_to_maturity = accrual_fact(sub_wad(term_end_timestamp_wad, current_timestamp_wad)?)?;
    let notional = safe_abs_i128(variable_token_balance)?;
    let minimum = mul_wad(mul_wad(notional, params.eta(is_lm))?, years_to_maturity)?;
    Ok(minimum.max(params.min_margin_to_incentivise_liquidators))
}

/// Margin a trader must hold, zero if no rate move can make them lose
pub fn get_trader_margin_requirement(
    trader: &TraderMarginRequirementParams,
    current_timestamp_wad: i128,
    params: &MarginCalculatorParameters,
) -> CoreResult<i128> {
    if trader.fixed_token_balance >= 0 && trader.variable_token_balance >= 0 {
        return Ok(0);
    }

    let is_ft = trader.fixed_token_balance > 0;
    let fixed_factor_at_maturity = fixed_factor(
        true,
        trader.term_start_timestamp_wad,
        trader.term_end_timestamp_wad,
        current_timestamp_wad,
    )?;
    let worst_case_variable_factor = worst_case_variable_factor_at_maturity(
        sub_wad(trader.term_end_timestamp_wad, trader.term_start_timestamp_wad)?,
        trader.term_end_timestamp_wad,
        current_timestamp_wad,
        is_ft,
        trader.is_lm,
        trader.historical_apy_wad,
        params,
    )?;

    let model_margin = add_wad(
        mul_wad(trader.fixed_token_balance, fixed_factor_at_maturity)?,
        mul_wad(trader.variable_token_balance, worst_case_variable_factor)?,
    )?;
    let minimum_margin = get_minimum_margin_requirement(
        trader.variable_token_balance,
        trader.term_end_timestamp_wad,
        current_timestamp_wad,
        trader.is_lm,
        params,
    )?;

    Ok(model_margin.max(minimum_margin).max(0))
}

/// Whether `current_margin` is strictly below the liquidation margin
pub fn is_liquidatable_trader(
    trader: &TraderMarginRequirementParams,
    current_timestamp_wad: i128,
    current_margin: i128,
    params: &MarginCalculatorParameters,
) -> CoreResult<bool> {
    let liquidation = TraderMarginRequirementParams {
        is_lm: true,
        ..*trader
    };
    let requirement = get_trader_margin_requirement(&liquidation, current_timestamp_wad, params)?;
    Ok(current_margin < requirement)
}

// ============================================================================
// Calculator
// ============================================================================

/// Margin calculator of a pool, owning its parameter set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarginCalculator {
    params: MarginCalculatorParameters,
}

impl MarginCalculator {
    pub fn new(params: MarginCalculatorParameters) -> CoreResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &MarginCalculatorParameters {
        &self.params
    }

    /// Replace the whole parameter set, rejecting an invalid one
    pub fn update_parameters(&mut self, params: MarginCalculatorParameters) -> CoreResult<()> {
        params.validate()?;
        info!("Margin calculator parameters updated: {:?} -> {:?}", self.params, params);
        self.params = params;
        Ok(())
    }

    pub fn compute_time_factor(&self, term_end_timestamp_wad: i128, current_timestamp_wad: i128) -> CoreResult<i128> {
        compute_time_factor(term_end_timestamp_wad, current_timestamp_wad, &self.params)
    }

    pub fn compute_apy_bound(
        &self,
        term_end_timestamp_wad: i128,
        current_timestamp_wad: i128,
        historical_apy_wad: i128,
        is_upper: bool,
    ) -> CoreResult<i128> {
        compute_apy_bound(
            term_end_timestamp_wad,
            current_timestamp_wad,
            historical_apy_wad,
            is_upper,
            &self.params,
        )
    }

    pub fn worst_case_variable_factor_at_maturity(
        &self,
        time_from_start_to_maturity_wad: i128,
        term_end_timestamp_wad: i128,
        current_timestamp_wad: i128,
        is_ft: bool,
        is_lm: bool,
        historical_apy_wad: i128,
    ) -> CoreResult<i128> {
        worst_case_variable_factor_at_maturity(
            time_from_start_to_maturity_wad,
            term_end_timestamp_wad,
            current_timestamp_wad,
            is_ft,
            is_lm,
            historical_apy_wad,
            &self.params,
        )
    }

    pub fn get_trader_margin_requirement(
        &self,
        trader: &TraderMarginRequirementParams,
        current_timestamp_wad: i128,
    ) -> CoreResult<i128> {
        get_trader_margin_requirement(trader, current_timestamp_wad, &self.params)
    }

    pub fn is_liquidatable_trader(
        &self,
        trader: &TraderMarginRequirementParams,
        current_timestamp_wad: i128,
        current_margin: i128,
    ) -> CoreResult<bool> {
        is_liquidatable_trader(trader, current_timestamp_wad, current_margin, &self.params)
    }

    pub fn get_position_margin_requirement(
        &self,
        position: &PositionMarginRequirementParams,
        current_timestamp_wad: i128,
    ) -> CoreResult<i128> {
        position::get_position_margin_requirement(position, current_timestamp_wad, &self.params)
    }

    pub fn is_liquidatable_position(
        &self,
        position: &PositionMarginRequirementParams,
        current_timestamp_wad: i128,
        current_margin: i128,
    ) -> CoreResult<bool> {
        position::is_liquidatable_position(position, current_timestamp_wad, current_margin, &self.params)
    }
}
