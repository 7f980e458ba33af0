//! # Margin Module
//!
//! Margin requirements and liquidation checks for traders and liquidity
//! positions, derived from worst-case APY bounds.

pub mod calculator;
pub mod params;
pub mod position;
pub mod quadrant;

pub use calculator::*;
pub use params::*;
pub use position::*;
pub use quadrant::*;
