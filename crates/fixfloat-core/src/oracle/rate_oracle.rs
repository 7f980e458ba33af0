//! # Rate Oracle
//!
//! Circular buffer of timestamped cumulative-rate observations. The buffer is
//! an arena `Vec` whose slots are materialized lazily as the write index first
//! reaches them, so growing the cardinality never preallocates.
//!
//! The logical order of the buffer starts at `index + 1` (oldest) and ends at
//! `index` (newest). Timestamps strictly increase along that order.

use log::{debug, trace};

use crate::constants::{MAX_CARDINALITY, WAD};
use crate::errors::{CoreResult, FixfloatCoreError};
use crate::math::fixed_point::{add_wad, div_wad, mul_wad, pow_wad, sub_wad};
use crate::math::time::{accrual_fact, compounding_factor};
use crate::oracle::source::{normalize_reading, RateSource};

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

/// One buffer slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct Observation {
    /// Wad seconds at which the reading was taken
    pub timestamp: i128,
    /// Wad cumulative accrual index at `timestamp`
    pub rate_value: i128,
    /// Whether the slot has been written
    pub initialized: bool,
}

/// Buffer cursor, as exposed for inspection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct OracleVars {
    pub index: u32,
    pub cardinality: u32,
    pub cardinality_next: u32,
}

/// Rate oracle over a single underlying yield-bearing asset
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct RateOracle {
    observations: Vec<Observation>,
    index: u32,
    cardinality: u32,
    cardinality_next: u32,
    /// Minimum wad seconds between two writes made through `update`
    min_seconds_since_last_update: i128,
    /// True until the first write after `initialize`
    seed_only: bool,
}

impl RateOracle {
    /// Create an uninitialized oracle
    pub fn new(min_seconds_since_last_update: i128) -> Self {
        Self {
            min_seconds_since_last_update,
            ..Self::default()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cardinality > 0
    }

    pub fn oracle_vars(&self) -> OracleVars {
        OracleVars {
            index: self.index,
            cardinality: self.cardinality,
            cardinality_next: self.cardinality_next,
        }
    }

    /// Slot contents, `None` if the slot has not been materialized yet
    pub fn get_rate(&self, slot: u32) -> Option<&Observation> {
        self.observations.get(slot as usize)
    }

    pub fn min_seconds_since_last_update(&self) -> i128 {
        self.min_seconds_since_last_update
    }

    pub fn set_min_seconds_since_last_update(&mut self, min_seconds_wad: i128) -> CoreResult<()> {
        if min_seconds_wad < 0 {
            return Err(FixfloatCoreError::invalid_parameter("min_seconds_since_last_update"));
        }
        self.min_seconds_since_last_update = min_seconds_wad;
        Ok(())
    }

    /// Seed slot 0
    pub fn initialize(&mut self, timestamp: i128, rate_value: i128) -> CoreResult<()> {
        if self.is_initialized() {
            return Err(FixfloatCoreError::AlreadyInitialized);
        }

        self.observations = vec![Observation {
            timestamp,
            rate_value,
            initialized: true,
        }];
        self.index = 0;
        self.cardinality = 1;
        self.cardinality_next = 1;
        self.seed_only = true;

        debug!("Rate oracle initialized at {} with value {}", timestamp, rate_value);
        Ok(())
    }

    /// Request capacity for `target` observations. Returns the resulting
    /// `cardinality_next`, which never decreases.
    pub fn grow(&mut self, target: u32) -> CoreResult<u32> {
        if !self.is_initialized() {
            return Err(FixfloatCoreError::NotInitialized);
        }
        if target > MAX_CARDINALITY {
            return Err(FixfloatCoreError::CardinalityTooLarge(target, MAX_CARDINALITY));
        }
        if target <= self.cardinality_next {
            return Ok(self.cardinality_next);
        }

        debug!("Rate oracle cardinality next {} -> {}", self.cardinality_next, target);
        self.cardinality_next = target;
        Ok(target)
    }

    /// Append an observation
    pub fn write(&mut self, timestamp: i128, rate_value: i128) -> CoreResult<()> {
        let last = *self.newest()?;

        if timestamp < last.timestamp || (timestamp == last.timestamp && !self.seed_only) {
            return Err(FixfloatCoreError::non_increasing(timestamp, last.timestamp));
        }

        let observation = Observation {
            timestamp,
            rate_value,
            initialized: true,
        };

        if timestamp == last.timestamp {
            // Same-instant rewrite of the seed
            self.observations[self.index as usize] = observation;
            self.seed_only = false;
            debug!("Rate oracle seed overwritten with value {}", rate_value);
            return Ok(());
        }

        // Grow into the reserved region once the write index reaches the end
        if self.cardinality_next > self.cardinality && self.index == self.cardinality - 1 {
            self.cardinality = self.cardinality_next;
        }

        let index_updated = (self.index + 1) % self.cardinality;
        let slot = index_updated as usize;
        if slot == self.observations.len() {
            self.observations.push(observation);
        } else {
            self.observations[slot] = observation;
        }

        self.index = index_updated;
        self.seed_only = false;

        debug!(
            "Rate oracle write at {} value {} (index {}, cardinality {})",
            timestamp, rate_value, self.index, self.cardinality
        );
        Ok(())
    }

    /// Read the source and write its normalized reading.
    ///
    /// Returns `Ok(false)` without writing when the last observation is more
    /// recent than `min_seconds_since_last_update`.
    pub fn update<S: RateSource + ?Sized>(
        &mut self,
        source: &S,
        current_timestamp: i128,
    ) -> CoreResult<bool> {
        let last = *self.newest()?;
        if sub_wad(current_timestamp, last.timestamp)? < self.min_seconds_since_last_update {
            trace!("Rate oracle update skipped, last write at {}", last.timestamp);
            return Ok(false);
        }

        let reading = source.current_index(current_timestamp)?;
        let rate_value = normalize_reading(reading, source.decimals())?;
        self.write(current_timestamp, rate_value)?;
        Ok(true)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    fn slot(&self, position: u64) -> Option<&Observation> {
        self.observations
            .get((position % self.cardinality as u64) as usize)
            .filter(|observation| observation.initialized)
    }

    /// Most recent observation
    pub fn newest(&self) -> CoreResult<&Observation> {
        if !self.is_initialized() {
            return Err(FixfloatCoreError::NotInitialized);
        }
        self.observations
            .get(self.index as usize)
            .ok_or(FixfloatCoreError::NotInitialized)
    }

    /// Oldest retained observation
    pub fn oldest(&self) -> CoreResult<&Observation> {
        if !self.is_initialized() {
            return Err(FixfloatCoreError::NotInitialized);
        }
        // Before the buffer wraps into the reserved region slot 0 is oldest
        match self.slot(self.index as u64 + 1) {
            Some(observation) => Ok(observation),
            None => self.observations.first().ok_or(FixfloatCoreError::NotInitialized),
        }
    }

    /// Observation written just before the newest one, if retained
    fn previous(&self) -> Option<&Observation> {
        if self.cardinality < 2 {
            return None;
        }
        self.slot(self.index as u64 + self.cardinality as u64 - 1)
    }

    /// Adjacent observations bracketing `target`, which must lie strictly
    /// inside the retained window
    pub fn binary_search(&self, target: i128) -> CoreResult<(Observation, Observation)> {
        if !self.is_initialized() {
            return Err(FixfloatCoreError::NotInitialized);
        }

        let cardinality = self.cardinality as i64;
        let mut l = (self.index as i64 + 1) % cardinality;
        let mut r = l + cardinality - 1;

        while l <= r {
            let i = (l + r) / 2;

            let before_or_at = match self.slot(i as u64) {
                Some(observation) => *observation,
                None => {
                    // Reserved but never written
                    l = i + 1;
                    continue;
                }
            };
            let at_or_after = match self.slot(i as u64 + 1) {
                Some(observation) => *observation,
                None => break,
            };

            trace!("Rate oracle binary search l={} r={} i={}", l, r, i);

            let target_at_or_after = before_or_at.timestamp <= target;
            if target_at_or_after && target <= at_or_after.timestamp {
                return Ok((before_or_at, at_or_after));
            }

            if !target_at_or_after {
                r = i - 1;
            } else {
                l = i + 1;
            }
        }

        Err(FixfloatCoreError::InsufficientHistory)
    }

    /// Observations surrounding `target`: `(before_or_at, at_or_after)`.
    /// The second is `None` when `target` is at the oldest or at/after the
    /// newest observation.
    pub fn get_surrounding_rates(&self, target: i128) -> CoreResult<(Observation, Option<Observation>)> {
        let oldest = *self.oldest()?;
        if target == oldest.timestamp {
            return Ok((oldest, None));
        }

        let newest = *self.newest()?;
        if target >= newest.timestamp {
            return Ok((newest, None));
        }

        if target < oldest.timestamp {
            return Err(FixfloatCoreError::TargetTooOld {
                target,
                oldest: oldest.timestamp,
            });
        }

        let (before_or_at, at_or_after) = self.binary_search(target)?;
        Ok((before_or_at, Some(at_or_after)))
    }

    /// Cumulative rate value at `target`, interpolated between the bracketing
    /// observations or extrapolated past the newest one
    pub fn observe_single(&self, target: i128) -> CoreResult<i128> {
        let newest = *self.newest()?;
        if target == newest.timestamp {
            return Ok(newest.rate_value);
        }

        if target > newest.timestamp {
            let previous = *self.previous().ok_or(FixfloatCoreError::InsufficientHistory)?;
            let apy = apy_between(&previous, &newest)?;
            let increment =
                interpolate_rate_value(newest.rate_value, apy, sub_wad(target, newest.timestamp)?)?;
            return add_wad(newest.rate_value, increment);
        }

        let (before_or_at, at_or_after) = self.get_surrounding_rates(target)?;
        let at_or_after = match at_or_after {
            Some(observation) => observation,
            None => return Ok(before_or_at.rate_value),
        };

        if target == before_or_at.timestamp {
            return Ok(before_or_at.rate_value);
        }
        if target == at_or_after.timestamp {
            return Ok(at_or_after.rate_value);
        }

        let apy = apy_between(&before_or_at, &at_or_after)?;
        let increment = interpolate_rate_value(
            before_or_at.rate_value,
            apy,
            sub_wad(target, before_or_at.timestamp)?,
        )?;
        add_wad(before_or_at.rate_value, increment)
    }

    /// Realized return between two timestamps, `(v_to - v_from) / v_from`
    pub fn get_rate_from_to(&self, from: i128, to: i128) -> CoreResult<i128> {
        if from > to {
            return Err(FixfloatCoreError::InvalidTimeRange { from, to });
        }

        let rate_from = self.observe_single(from)?;
        let rate_to = self.observe_single(to)?;
        div_wad(sub_wad(rate_to, rate_from)?, rate_from)
    }

    /// Annualized realized return between two timestamps
    pub fn get_apy_from_to(&self, from: i128, to: i128) -> CoreResult<i128> {
        let rate = self.get_rate_from_to(from, to)?;
        compute_apy_from_rate(rate, accrual_fact(sub_wad(to, from)?)?)
    }
}

/// Increment of a cumulative value over `time_delta` wad seconds at a
/// constant `apy`: `before * ((1 + apy)^years - 1)`
pub fn interpolate_rate_value(before_or_at_value: i128, apy: i128, time_delta: i128) -> CoreResult<i128> {
    let factor = compounding_factor(apy, time_delta)?;
    mul_wad(before_or_at_value, sub_wad(factor, WAD)?)
}

/// Annualize a realized return: `(1 + rate)^(1 / years) - 1`
pub fn compute_apy_from_rate(rate_from_to: i128, time_in_years: i128) -> CoreResult<i128> {
    if time_in_years <= 0 {
        return Err(FixfloatCoreError::invalid_parameter("time_in_years"));
    }

    let exponent = div_wad(WAD, time_in_years)?;
    let factor = pow_wad(add_wad(WAD, rate_from_to)?, exponent)?;
    sub_wad(factor, WAD)
}

fn apy_between(before: &Observation, after: &Observation) -> CoreResult<i128> {
    let rate = div_wad(sub_wad(after.rate_value, before.rate_value)?, before.rate_value)?;
    compute_apy_from_rate(rate, accrual_fact(sub_wad(after.timestamp, before.timestamp)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SECONDS_IN_DAY;

    const DAY: i128 = SECONDS_IN_DAY * WAD;

    fn initialized(start: i128) -> RateOracle {
        let mut oracle = RateOracle::new(0);
        oracle.initialize(start, WAD).unwrap();
        oracle
    }

    fn vars(oracle: &RateOracle) -> (u32, u32, u32) {
        let vars = oracle.oracle_vars();
        (vars.index, vars.cardinality, vars.cardinality_next)
    }

    #[test]
    fn test_initialize() {
        let mut oracle = RateOracle::new(0);
        assert!(!oracle.is_initialized());
        assert_eq!(oracle.observe_single(0), Err(FixfloatCoreError::NotInitialized));
        assert_eq!(oracle.grow(4), Err(FixfloatCoreError::NotInitialized));

        oracle.initialize(100 * WAD, WAD).unwrap();
        assert_eq!(vars(&oracle), (0, 1, 1));
        assert_eq!(oracle.initialize(100 * WAD, WAD), Err(FixfloatCoreError::AlreadyInitialized));
    }

    #[test]
    fn test_grow_is_monotonic() {
        let mut oracle = initialized(0);
        assert_eq!(oracle.grow(5).unwrap(), 5);
        assert_eq!(oracle.grow(3).unwrap(), 5);
        assert_eq!(vars(&oracle), (0, 1, 5));
        // nothing is materialized until written
        assert!(oracle.get_rate(1).is_none());
        assert!(oracle.grow(MAX_CARDINALITY + 1).is_err());
    }

    #[test]
    fn test_single_slot_overwritten() {
        let mut oracle = initialized(0);
        oracle.write(DAY, WAD).unwrap();
        assert_eq!(vars(&oracle), (0, 1, 1));
        assert_eq!(oracle.get_rate(0).unwrap().timestamp, DAY);
    }

    #[test]
    fn test_grow_on_wrap() {
        let mut oracle = initialized(0);
        oracle.grow(2).unwrap();
        oracle.grow(4).unwrap();
        assert_eq!(vars(&oracle), (0, 1, 4));

        oracle.write(DAY, WAD).unwrap();
        assert_eq!(vars(&oracle), (1, 4, 4));

        oracle.write(2 * DAY, WAD).unwrap();
        assert_eq!(vars(&oracle), (2, 4, 4));
        assert_eq!(oracle.get_rate(2).unwrap().timestamp, 2 * DAY);
    }

    #[test]
    fn test_write_ordering() {
        let mut oracle = initialized(DAY);

        // the seed may be rewritten once at the same instant
        oracle.write(DAY, 2 * WAD).unwrap();
        assert_eq!(oracle.newest().unwrap().rate_value, 2 * WAD);
        assert_eq!(oracle.write(DAY, 3 * WAD), Err(FixfloatCoreError::non_increasing(DAY, DAY)));
        assert_eq!(oracle.write(0, 3 * WAD), Err(FixfloatCoreError::non_increasing(0, DAY)));
    }

    #[test]
    fn test_wraparound_drops_oldest() {
        let mut oracle = initialized(0);
        oracle.grow(3).unwrap();
        for day in 1..=4 {
            oracle.write(day * DAY, WAD + day * WAD / 100).unwrap();
        }
        // slots hold days 3, 4 and 2
        assert_eq!(vars(&oracle), (1, 3, 3));
        assert_eq!(oracle.oldest().unwrap().timestamp, 2 * DAY);
        assert_eq!(oracle.newest().unwrap().timestamp, 4 * DAY);
        assert!(matches!(
            oracle.get_surrounding_rates(DAY),
            Err(FixfloatCoreError::TargetTooOld { .. })
        ));

        let (before, after) = oracle.binary_search(2 * DAY + DAY / 2).unwrap();
        assert_eq!(before.timestamp, 2 * DAY);
        assert_eq!(after.timestamp, 3 * DAY);
    }

    #[test]
    fn test_observe_single() {
        let mut oracle = initialized(0);
        oracle.grow(4).unwrap();
        oracle.write(DAY, WAD).unwrap();
        oracle.write(2 * DAY, 11 * WAD / 10).unwrap();

        // exact hits are returned unchanged
        assert_eq!(oracle.observe_single(DAY).unwrap(), WAD);
        assert_eq!(oracle.observe_single(2 * DAY).unwrap(), 11 * WAD / 10);
        assert_eq!(oracle.observe_single(0).unwrap(), WAD);

        // inside the bracket the value sits strictly between both ends
        let mid = oracle.observe_single(DAY + DAY / 2).unwrap();
        assert!(mid > WAD && mid < 11 * WAD / 10);

        // past the newest observation the last apy keeps compounding
        let future = oracle.observe_single(3 * DAY).unwrap();
        assert!(future > 11 * WAD / 10);
    }

    #[test]
    fn test_extrapolation_needs_two_observations() {
        let oracle = initialized(0);
        assert_eq!(oracle.observe_single(DAY), Err(FixfloatCoreError::InsufficientHistory));
    }

    #[test]
    fn test_compute_apy_from_rate() {
        // (1 + 0.1)^(1 / 0.5) - 1 = 0.21
        let apy = compute_apy_from_rate(WAD / 10, WAD / 2).unwrap();
        assert!((apy - 21 * WAD / 100).abs() <= 1_000);
        assert!(compute_apy_from_rate(WAD / 10, 0).is_err());
    }

    #[test]
    fn test_rate_from_to_range() {
        let oracle = initialized(0);
        assert_eq!(
            oracle.get_rate_from_to(DAY, 0),
            Err(FixfloatCoreError::InvalidTimeRange { from: DAY, to: 0 })
        );
        assert_eq!(oracle.get_rate_from_to(0, 0).unwrap(), 0);
    }
}
