//! # Mathematical Functions
//!
//! Deterministic wad arithmetic, time accrual and liquidity exposure math.

pub mod big_int;
pub mod fixed_point;
pub mod liquidity_math;
pub mod safe_math;
pub mod tick_math;
pub mod time;

// Re-export commonly used functions
pub use big_int::*;
pub use fixed_point::*;
pub use liquidity_math::*;
pub use safe_math::*;
pub use tick_math::*;
pub use time::*;
