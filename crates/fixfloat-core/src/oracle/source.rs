//! Readings of an underlying asset's normalized accrual index

use crate::constants::WAD_U128;
use crate::errors::{CoreResult, FixfloatCoreError};
use crate::math::big_int::{mul_div_u128, Rounding};
use crate::math::safe_math::{safe_cast_i128_to_u128, safe_cast_u128_to_i128, safe_mul_u128};
use crate::math::time::compounding_factor;

/// Decimals of a wad reading
pub const WAD_DECIMALS: u8 = 18;

/// Decimals of a ray reading (lending pool liquidity indices)
pub const RAY_DECIMALS: u8 = 27;

/// A yield source exposing a monotonically non-decreasing accrual index
pub trait RateSource: Send + Sync {
    /// Raw index reading at `now` (wad seconds), scaled by `decimals()`
    fn current_index(&self, now: i128) -> CoreResult<u128>;

    /// Decimals of the raw reading
    fn decimals(&self) -> u8 {
        RAY_DECIMALS
    }
}

/// Convert a raw reading to a wad rate value, truncating extra precision
pub fn normalize_reading(reading: u128, decimals: u8) -> CoreResult<i128> {
    let wad = if decimals >= WAD_DECIMALS {
        let divisor = 10u128
            .checked_pow((decimals - WAD_DECIMALS) as u32)
            .ok_or(FixfloatCoreError::invalid_parameter("decimals"))?;
        reading / divisor
    } else {
        let multiplier = 10u128
            .checked_pow((WAD_DECIMALS - decimals) as u32)
            .ok_or(FixfloatCoreError::invalid_parameter("decimals"))?;
        safe_mul_u128(reading, multiplier)?
    };
    safe_cast_u128_to_i128(wad)
}

/// Source returning whatever reading was last set
#[derive(Debug, Clone)]
pub struct StaticRateSource {
    index: u128,
    decimals: u8,
}

impl StaticRateSource {
    pub fn new(index: u128, decimals: u8) -> Self {
        Self { index, decimals }
    }

    pub fn set_index(&mut self, index: u128) {
        self.index = index;
    }
}

impl RateSource for StaticRateSource {
    fn current_index(&self, _now: i128) -> CoreResult<u128> {
        Ok(self.index)
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }
}

/// Source whose index compounds at a fixed APY from a starting point
#[derive(Debug, Clone)]
pub struct CompoundingRateSource {
    initial_index: u128,
    apy_wad: i128,
    start_timestamp: i128,
    decimals: u8,
}

impl CompoundingRateSource {
    pub fn new(initial_index: u128, apy_wad: i128, start_timestamp: i128, decimals: u8) -> CoreResult<Self> {
        if apy_wad < 0 {
            return Err(FixfloatCoreError::invalid_parameter("apy_wad"));
        }
        Ok(Self {
            initial_index,
            apy_wad,
            start_timestamp,
            decimals,
        })
    }
}

impl RateSource for CompoundingRateSource {
    fn current_index(&self, now: i128) -> CoreResult<u128> {
        if now < self.start_timestamp {
            return Err(FixfloatCoreError::InvalidTimeRange {
                from: self.start_timestamp,
                to: now,
            });
        }

        let factor = compounding_factor(self.apy_wad, now - self.start_timestamp)?;
        mul_div_u128(
            self.initial_index,
            safe_cast_i128_to_u128(factor)?,
            WAD_U128,
            Rounding::Down,
        )
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RAY, SECONDS_IN_YEAR_WAD, WAD};

    #[test]
    fn test_normalize_reading() {
        assert_eq!(normalize_reading(RAY, RAY_DECIMALS).unwrap(), WAD);
        assert_eq!(normalize_reading(WAD_U128, WAD_DECIMALS).unwrap(), WAD);
        assert_eq!(normalize_reading(1_000_000, 6).unwrap(), WAD);
        assert!(normalize_reading(u128::MAX, 6).is_err());
    }

    #[test]
    fn test_static_source() {
        let mut source = StaticRateSource::new(RAY, RAY_DECIMALS);
        assert_eq!(source.current_index(0).unwrap(), RAY);
        source.set_index(11 * RAY / 10);
        assert_eq!(source.current_index(0).unwrap(), 11 * RAY / 10);
    }

    #[test]
    fn test_compounding_source() {
        let source = CompoundingRateSource::new(RAY, WAD / 10, 0, RAY_DECIMALS).unwrap();
        assert_eq!(source.current_index(0).unwrap(), RAY);

        let after_year = source.current_index(SECONDS_IN_YEAR_WAD).unwrap();
        let expected = 11 * RAY / 10;
        assert!(after_year.abs_diff(expected) < RAY / 1_000_000_000);

        assert!(source.current_index(-WAD).is_err());
        assert!(CompoundingRateSource::new(RAY, -1, 0, RAY_DECIMALS).is_err());
    }
}
