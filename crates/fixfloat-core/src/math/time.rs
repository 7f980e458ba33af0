//! # Time Accrual
//!
//! Year fractions, fixed factors and compounding factors. All timestamps and
//! durations are wad seconds.

use crate::constants::{ONE_HUNDREDTH_WAD, SECONDS_IN_YEAR_WAD, WAD};
use crate::errors::{CoreResult, FixfloatCoreError};
use crate::math::fixed_point::{add_wad, div_wad, mul_wad, pow_wad, sub_wad};

/// Convert a duration in wad seconds to a wad year fraction
pub fn accrual_fact(time_in_seconds_wad: i128) -> CoreResult<i128> {
    div_wad(time_in_seconds_wad, SECONDS_IN_YEAR_WAD)
}

/// Fixed factor of a term: accrued years times the 1% fixed rate unit.
///
/// With `at_maturity` (or once the term has ended) the whole term counts,
/// otherwise only the time elapsed since the term started.
pub fn fixed_factor(
    at_maturity: bool,
    term_start_timestamp_wad: i128,
    term_end_timestamp_wad: i128,
    current_timestamp_wad: i128,
) -> CoreResult<i128> {
    if term_start_timestamp_wad >= term_end_timestamp_wad {
        return Err(FixfloatCoreError::InvalidTerm {
            start: term_start_timestamp_wad,
            end: term_end_timestamp_wad,
        });
    }

    let time_in_seconds_wad = if at_maturity || current_timestamp_wad >= term_end_timestamp_wad {
        sub_wad(term_end_timestamp_wad, term_start_timestamp_wad)?
    } else {
        if current_timestamp_wad < term_start_timestamp_wad {
            return Err(FixfloatCoreError::invalid_parameter("current time before term start"));
        }
        sub_wad(current_timestamp_wad, term_start_timestamp_wad)?
    };

    mul_wad(accrual_fact(time_in_seconds_wad)?, ONE_HUNDREDTH_WAD)
}

/// Growth factor `(1 + apy)^years` of a fixed annual rate over a duration
pub fn compounding_factor(apy_wad: i128, time_in_seconds_wad: i128) -> CoreResult<i128> {
    if time_in_seconds_wad < 0 {
        return Err(FixfloatCoreError::invalid_parameter("negative duration"));
    }
    pow_wad(add_wad(WAD, apy_wad)?, accrual_fact(time_in_seconds_wad)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SECONDS_IN_WEEK, SECONDS_IN_YEAR};

    #[test]
    fn test_accrual_fact() {
        assert_eq!(accrual_fact(SECONDS_IN_YEAR * WAD).unwrap(), WAD);
        // one week is 7 / 365 of a year
        assert_eq!(accrual_fact(SECONDS_IN_WEEK * WAD).unwrap(), 19_178_082_191_780_821);
    }

    #[test]
    fn test_fixed_factor() {
        let start = 1_000 * WAD;
        let end = start + 2 * SECONDS_IN_WEEK * WAD;
        let current = start + SECONDS_IN_WEEK * WAD;

        // at maturity the full two weeks count
        assert_eq!(fixed_factor(true, start, end, current).unwrap(), 383_561_643_835_616);
        // before maturity only the elapsed week counts
        assert_eq!(fixed_factor(false, start, end, current).unwrap(), 191_780_821_917_808);
        // after maturity the term is capped
        assert_eq!(fixed_factor(false, start, end, end + WAD).unwrap(), 383_561_643_835_616);

        assert!(fixed_factor(true, end, start, current).is_err());
        assert!(fixed_factor(false, start, end, start - WAD).is_err());
    }

    #[test]
    fn test_compounding_factor() {
        assert_eq!(compounding_factor(WAD / 10, 0).unwrap(), WAD);
        let one_year = compounding_factor(WAD / 10, SECONDS_IN_YEAR * WAD).unwrap();
        assert!((one_year - 11 * WAD / 10).abs() < 1_000);
        assert!(compounding_factor(WAD / 10, -WAD).is_err());
    }
}
