//! # Protocol Constants
//!
//! Fundamental constants for the risk engine:
//! - Fixed-point scales (wad, ray)
//! - Time accrual constants
//! - Oracle buffer bounds
//! - Tick bounds used for liquidity exposure

// ============================================================================
// Fixed-Point Constants
// ============================================================================

/// Wad fixed-point scale: 1.0 == 10^18
pub const WAD: i128 = 1_000_000_000_000_000_000;

/// Unsigned wad for u128 values
pub const WAD_U128: u128 = WAD as u128;

/// Ray scale used by lending pool indices: 1.0 == 10^27
pub const RAY: u128 = 1_000_000_000_000_000_000_000_000_000;

/// Ray to wad divisor
pub const WAD_RAY_RATIO: u128 = RAY / WAD_U128;

/// 0.5 in wad
pub const HALF_WAD: i128 = WAD / 2;

/// 2.0 in wad
pub const TWO_WAD: i128 = 2 * WAD;

/// 4.0 in wad
pub const FOUR_WAD: i128 = 4 * WAD;

/// 0.01 in wad, the fixed rate unit of fixed token balances
pub const ONE_HUNDREDTH_WAD: i128 = WAD / 100;

/// ln(2) in wad
pub const LN_2_WAD: i128 = 693_147_180_559_945_309;

/// Below this exponent e^x rounds to zero in wad precision
pub const EXP_MIN_INPUT_WAD: i128 = -41_446_531_673_892_822_312;

/// Largest accepted exponent, e^46 still fits an i128 wad
pub const EXP_MAX_INPUT_WAD: i128 = 46 * WAD;

// ============================================================================
// Time Constants
// ============================================================================

/// Seconds in a (non leap) year
pub const SECONDS_IN_YEAR: i128 = 31_536_000;

/// Seconds in a year, wad scaled
pub const SECONDS_IN_YEAR_WAD: i128 = SECONDS_IN_YEAR * WAD;

/// Seconds in a day
pub const SECONDS_IN_DAY: i128 = 86_400;

/// Seconds in a week
pub const SECONDS_IN_WEEK: i128 = 7 * SECONDS_IN_DAY;

// ============================================================================
// Oracle Constants
// ============================================================================

/// Maximum number of observation slots a rate oracle can hold
pub const MAX_CARDINALITY: u32 = 65_535;

/// Default historical APY lookback window (seconds)
pub const DEFAULT_LOOKBACK_WINDOW_SECS: i128 = 7 * SECONDS_IN_DAY;

/// Default historical APY cache age (seconds)
pub const DEFAULT_CACHE_MAX_AGE_SECS: i128 = 6 * 3600;

// ============================================================================
// Tick Constants
// ============================================================================

/// Minimum tick of the vAMM
pub const MIN_TICK: i32 = -69_100;

/// Maximum tick of the vAMM
pub const MAX_TICK: i32 = 69_100;

/// ln(1.0001) in wad, the log of the price ratio between adjacent ticks
pub const LN_TICK_BASE_WAD: i128 = 99_995_000_333_308;
