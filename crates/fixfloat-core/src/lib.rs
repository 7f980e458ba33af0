//! # Fixfloat Core - Risk Engine
//!
//! This crate contains the numerically sensitive part of the fixfloat
//! interest rate swap AMM, shared between the keeper and any other client:
//!
//! - Wad (1e18) fixed-point arithmetic and time accrual helpers
//! - The rate oracle: a circular buffer of cumulative index observations
//! - The margin calculator: worst-case APY bounds, margin requirements and
//!   liquidation checks for traders and liquidity positions
//!
//! ## Feature Flags
//!
//! - `client`: Enables serde serialization for off-chain use

// Re-export all modules
pub mod constants;
pub mod errors;
pub mod margin;
pub mod math;
pub mod oracle;

// Re-export commonly used items
pub use constants::*;
pub use errors::{FixfloatCoreError, CoreResult};
pub use margin::{
    MarginCalculator, MarginCalculatorParameters, PositionMarginRequirementParams,
    TraderMarginRequirementParams,
};
pub use oracle::{HistoricalApyCache, Observation, RateOracle, RateSource};
