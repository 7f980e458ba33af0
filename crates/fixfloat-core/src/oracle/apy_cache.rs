//! Historical APY over a lookback window, recomputed at most once per
//! `cache_max_age`

use log::debug;

use crate::constants::{DEFAULT_CACHE_MAX_AGE_SECS, DEFAULT_LOOKBACK_WINDOW_SECS, WAD};
use crate::errors::{CoreResult, FixfloatCoreError};
use crate::math::fixed_point::sub_wad;
use crate::oracle::rate_oracle::RateOracle;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
struct CachedApy {
    apy_wad: i128,
    computed_at: i128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct HistoricalApyCache {
    /// Wad seconds looked back from `now`
    lookback_window: i128,
    /// Wad seconds a computed APY stays valid
    cache_max_age: i128,
    cached: Option<CachedApy>,
}

impl Default for HistoricalApyCache {
    fn default() -> Self {
        Self {
            lookback_window: DEFAULT_LOOKBACK_WINDOW_SECS * WAD,
            cache_max_age: DEFAULT_CACHE_MAX_AGE_SECS * WAD,
            cached: None,
        }
    }
}

impl HistoricalApyCache {
    pub fn new(lookback_window: i128, cache_max_age: i128) -> CoreResult<Self> {
        if lookback_window <= 0 {
            return Err(FixfloatCoreError::invalid_parameter("lookback_window"));
        }
        if cache_max_age < 0 {
            return Err(FixfloatCoreError::invalid_parameter("cache_max_age"));
        }
        Ok(Self {
            lookback_window,
            cache_max_age,
            cached: None,
        })
    }

    pub fn lookback_window(&self) -> i128 {
        self.lookback_window
    }

    /// Last computed APY, if any
    pub fn cached_apy(&self) -> Option<i128> {
        self.cached.map(|cached| cached.apy_wad)
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// APY realized over `[now - lookback_window, now]`
    pub fn get_historical_apy(&mut self, oracle: &RateOracle, now: i128) -> CoreResult<i128> {
        if let Some(cached) = self.cached {
            let age = sub_wad(now, cached.computed_at)?;
            if age >= 0 && age < self.cache_max_age {
                return Ok(cached.apy_wad);
            }
        }

        let from = sub_wad(now, self.lookback_window)?;
        let apy_wad = oracle.get_apy_from_to(from, now)?;
        debug!("Historical APY refreshed at {}: {}", now, apy_wad);

        self.cached = Some(CachedApy {
            apy_wad,
            computed_at: now,
        });
        Ok(apy_wad)
    }
}
