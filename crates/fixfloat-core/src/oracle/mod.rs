//! # Oracle Module
//!
//! Rate oracle over an underlying yield-bearing asset, the sources it reads
//! from, and the historical APY cache the margin engine consumes.

pub mod apy_cache;
pub mod rate_oracle;
pub mod source;

pub use apy_cache::*;
pub use rate_oracle::*;
pub use source::*;
