//! Margin engine parameters and per-call balance snapshots

use crate::constants::WAD;
use crate::errors::{CoreResult, FixfloatCoreError};

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

/// Statistical bound and minimum margin parameters of a pool. All values are
/// wads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct MarginCalculatorParameters {
    /// Initial margin scaling of the upper APY bound
    pub apy_upper_multiplier_wad: i128,
    /// Initial margin scaling of the lower APY bound
    pub apy_lower_multiplier_wad: i128,
    /// Variance of the rate process
    pub sigma_squared_wad: i128,
    /// Long run drift term
    pub alpha_wad: i128,
    /// Mean reversion speed
    pub beta_wad: i128,
    /// Critical value of the upper bound
    pub xi_upper_wad: i128,
    /// Critical value of the lower bound
    pub xi_lower_wad: i128,
    /// Time horizon (wad seconds) normalizing the time to maturity
    pub t_max_wad: i128,
    /// Minimum margin rate per year of variable notional, initial margin
    pub eta_im_wad: i128,
    /// Minimum margin rate per year of variable notional, liquidation margin
    pub eta_lm_wad: i128,
    /// Absolute minimum margin of any position at risk
    pub min_margin_to_incentivise_liquidators: i128,
}

impl MarginCalculatorParameters {
    pub fn validate(&self) -> CoreResult<()> {
        if self.sigma_squared_wad <= 0 {
            return Err(FixfloatCoreError::invalid_parameter("sigma_squared_wad"));
        }
        if self.beta_wad <= 0 {
            return Err(FixfloatCoreError::invalid_parameter("beta_wad"));
        }
        if self.t_max_wad <= 0 {
            return Err(FixfloatCoreError::invalid_parameter("t_max_wad"));
        }
        if self.apy_upper_multiplier_wad <= 0 {
            return Err(FixfloatCoreError::invalid_parameter("apy_upper_multiplier_wad"));
        }
        if self.apy_lower_multiplier_wad <= 0 {
            return Err(FixfloatCoreError::invalid_parameter("apy_lower_multiplier_wad"));
        }

        let non_negative = [
            (self.alpha_wad, "alpha_wad"),
            (self.xi_upper_wad, "xi_upper_wad"),
            (self.xi_lower_wad, "xi_lower_wad"),
            (self.eta_im_wad, "eta_im_wad"),
            (self.eta_lm_wad, "eta_lm_wad"),
            (
                self.min_margin_to_incentivise_liquidators,
                "min_margin_to_incentivise_liquidators",
            ),
        ];
        for (value, name) in non_negative {
            if value < 0 {
                return Err(FixfloatCoreError::invalid_parameter(name));
            }
        }

        Ok(())
    }

    /// Minimum margin rate for the given mode
    pub fn eta(&self, is_lm: bool) -> i128 {
        if is_lm {
            self.eta_lm_wad
        } else {
            self.eta_im_wad
        }
    }
}

impl Default for MarginCalculatorParameters {
    fn default() -> Self {
        Self {
            apy_upper_multiplier_wad: 3 * WAD / 2,
            apy_lower_multiplier_wad: 7 * WAD / 10,
            sigma_squared_wad: 15 * WAD / 100,
            alpha_wad: 4 * WAD / 100,
            beta_wad: WAD,
            xi_upper_wad: 516_397_779_494_288_625,
            xi_lower_wad: 387_298_334_620_764_948,
            t_max_wad: 31_536_000 * WAD,
            eta_im_wad: 0,
            eta_lm_wad: 0,
            min_margin_to_incentivise_liquidators: 0,
        }
    }
}

/// Balance snapshot of a trader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct TraderMarginRequirementParams {
    pub fixed_token_balance: i128,
    pub variable_token_balance: i128,
    pub term_start_timestamp_wad: i128,
    pub term_end_timestamp_wad: i128,
    /// Liquidation margin when set, initial margin otherwise
    pub is_lm: bool,
    pub historical_apy_wad: i128,
}

/// Balance snapshot of a liquidity position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct PositionMarginRequirementParams {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub current_tick: i32,
    /// Wad liquidity of the range
    pub liquidity: u128,
    pub fixed_token_balance: i128,
    pub variable_token_balance: i128,
    /// Variable factor accrued since the term started
    pub variable_factor_wad: i128,
    pub term_start_timestamp_wad: i128,
    pub term_end_timestamp_wad: i128,
    pub is_lm: bool,
    pub historical_apy_wad: i128,
}

impl PositionMarginRequirementParams {
    /// Trader snapshot of the position's settled balances
    pub fn as_trader(&self) -> TraderMarginRequirementParams {
        TraderMarginRequirementParams {
            fixed_token_balance: self.fixed_token_balance,
            variable_token_balance: self.variable_token_balance,
            term_start_timestamp_wad: self.term_start_timestamp_wad,
            term_end_timestamp_wad: self.term_end_timestamp_wad,
            is_lm: self.is_lm,
            historical_apy_wad: self.historical_apy_wad,
        }
    }
}
