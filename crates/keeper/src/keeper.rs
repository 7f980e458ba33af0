use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fixfloat_core::margin::{
    MarginCalculator, PositionMarginRequirementParams, TraderMarginRequirementParams,
};
use fixfloat_core::math::{format_wad, from_int, safe_cast_i128_to_u128, sub_wad, to_int};
use fixfloat_core::oracle::{
    normalize_reading, CompoundingRateSource, HistoricalApyCache, OracleVars, RateOracle, RateSource,
    StaticRateSource, WAD_DECIMALS,
};
use fixfloat_core::FixfloatCoreError;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::{KeeperConfig, OracleConfig, PositionConfig, RetryConfig, SourceConfig};
use crate::error::{KeeperError, KeeperResult};

/// Snapshot written after each iteration
#[derive(Debug, Clone, Serialize)]
pub struct KeeperStatus {
    pub generated_at: Option<DateTime<Utc>>,
    pub oracles: Vec<OracleStatus>,
    pub positions: Vec<PositionStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OracleStatus {
    pub name: String,
    pub vars: OracleVars,
    /// Unix seconds of the newest observation
    pub newest_timestamp: i64,
    pub newest_rate: String,
    /// Last historical APY computed for margin checks
    pub historical_apy: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionStatus {
    pub name: String,
    pub oracle: String,
    pub historical_apy: String,
    pub initial_margin: String,
    pub liquidation_margin: String,
    pub current_margin: String,
    pub liquidatable: bool,
}

/// Where an oracle's readings come from
enum IndexFeed {
    Simulated(CompoundingRateSource),
    File { path: String, source: StaticRateSource },
}

impl IndexFeed {
    fn from_config(config: &SourceConfig, start_timestamp_wad: i128) -> KeeperResult<Self> {
        match config {
            SourceConfig::Simulated { initial_index, apy } => Ok(IndexFeed::Simulated(CompoundingRateSource::new(
                safe_cast_i128_to_u128(*initial_index)?,
                *apy,
                start_timestamp_wad,
                WAD_DECIMALS,
            )?)),
            SourceConfig::File { path, decimals } => Ok(IndexFeed::File {
                path: path.clone(),
                source: StaticRateSource::new(0, *decimals),
            }),
        }
    }

    /// Refresh file readings and return the source to read from
    async fn refresh(&mut self, retry: &RetryConfig) -> KeeperResult<&dyn RateSource> {
        match self {
            IndexFeed::Simulated(source) => Ok(&*source),
            IndexFeed::File { path, source } => {
                source.set_index(read_index_file(path, retry).await?);
                Ok(&*source)
            }
        }
    }
}

/// Read a raw integer index reading, retrying with backoff
async fn read_index_file(path: &str, retry: &RetryConfig) -> KeeperResult<u128> {
    let mut attempt = 0;
    loop {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                return content
                    .trim()
                    .parse::<u128>()
                    .map_err(|e| KeeperError::SourceError(format!("Invalid index reading in {}: {}", path, e)));
            }
            Err(e) if attempt + 1 < retry.max_retries => {
                let delay = retry.delay_for_attempt(attempt);
                log::warn!("Failed to read {} (attempt {}): {}, retrying in {}ms", path, attempt + 1, e, delay);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(KeeperError::SourceError(format!("Failed to read {}: {}", path, e)));
            }
        }
    }
}

/// An oracle together with its feed and the pool parameters margined on it
struct ManagedOracle {
    name: String,
    feed: IndexFeed,
    oracle: Arc<RwLock<RateOracle>>,
    apy_cache: HistoricalApyCache,
    calculator: MarginCalculator,
    max_staleness_wad: i128,
}

impl ManagedOracle {
    async fn new(config: &OracleConfig, retry: &RetryConfig, now_wad: i128) -> KeeperResult<Self> {
        let mut feed = IndexFeed::from_config(&config.source, now_wad)?;
        let seed = {
            let source = feed.refresh(retry).await?;
            normalize_reading(source.current_index(now_wad)?, source.decimals())?
        };

        let mut oracle = RateOracle::new(from_int(config.min_seconds_since_last_update.into())?);
        oracle.initialize(now_wad, seed)?;
        oracle.grow(config.cardinality)?;

        log::info!(
            "Initialized oracle {} at {} with cardinality {}",
            config.name,
            format_wad(seed),
            config.cardinality
        );

        Ok(Self {
            name: config.name.clone(),
            feed,
            oracle: Arc::new(RwLock::new(oracle)),
            apy_cache: HistoricalApyCache::new(
                from_int(config.lookback_window_secs.into())?,
                from_int(config.cache_max_age_secs.into())?,
            )?,
            calculator: MarginCalculator::new(config.margin_parameters)?,
            max_staleness_wad: from_int(config.max_staleness_secs.into())?,
        })
    }

    async fn update(&mut self, retry: &RetryConfig, now_wad: i128) -> KeeperResult<bool> {
        let source = self.feed.refresh(retry).await?;
        let written = self.oracle.write().await.update(source, now_wad)?;
        Ok(written)
    }

    async fn evaluate(&mut self, position: &PositionConfig, now_wad: i128) -> KeeperResult<PositionStatus> {
        let historical_apy_wad = {
            let oracle = self.oracle.read().await;
            self.apy_cache.get_historical_apy(&oracle, now_wad)?
        };

        let trader = TraderMarginRequirementParams {
            fixed_token_balance: position.fixed_token_balance,
            variable_token_balance: position.variable_token_balance,
            term_start_timestamp_wad: from_int(position.term_start.into())?,
            term_end_timestamp_wad: from_int(position.term_end.into())?,
            is_lm: false,
            historical_apy_wad,
        };

        let (initial_margin, liquidation_margin, liquidatable) = match &position.range {
            None => {
                let initial = self.calculator.get_trader_margin_requirement(&trader, now_wad)?;
                let liquidation = self
                    .calculator
                    .get_trader_margin_requirement(&TraderMarginRequirementParams { is_lm: true, ..trader }, now_wad)?;
                let liquidatable = self
                    .calculator
                    .is_liquidatable_trader(&trader, now_wad, position.current_margin)?;
                (initial, liquidation, liquidatable)
            }
            Some(range) => {
                let params = PositionMarginRequirementParams {
                    tick_lower: range.tick_lower,
                    tick_upper: range.tick_upper,
                    current_tick: range.current_tick,
                    liquidity: safe_cast_i128_to_u128(range.liquidity)?,
                    fixed_token_balance: trader.fixed_token_balance,
                    variable_token_balance: trader.variable_token_balance,
                    variable_factor_wad: range.variable_factor,
                    term_start_timestamp_wad: trader.term_start_timestamp_wad,
                    term_end_timestamp_wad: trader.term_end_timestamp_wad,
                    is_lm: false,
                    historical_apy_wad,
                };
                let initial = self.calculator.get_position_margin_requirement(&params, now_wad)?;
                let liquidation = self.calculator.get_position_margin_requirement(
                    &PositionMarginRequirementParams { is_lm: true, ..params },
                    now_wad,
                )?;
                let liquidatable = self
                    .calculator
                    .is_liquidatable_position(&params, now_wad, position.current_margin)?;
                (initial, liquidation, liquidatable)
            }
        };

        Ok(PositionStatus {
            name: position.name.clone(),
            oracle: self.name.clone(),
            historical_apy: format_wad(historical_apy_wad),
            initial_margin: format_wad(initial_margin),
            liquidation_margin: format_wad(liquidation_margin),
            current_margin: format_wad(position.current_margin),
            liquidatable,
        })
    }

    async fn status(&self) -> KeeperResult<OracleStatus> {
        let oracle = self.oracle.read().await;
        let newest = oracle.newest()?;
        Ok(OracleStatus {
            name: self.name.clone(),
            vars: oracle.oracle_vars(),
            newest_timestamp: i64::try_from(to_int(newest.timestamp)).map_err(|_| FixfloatCoreError::ConversionError)?,
            newest_rate: format_wad(newest.rate_value),
            historical_apy: self.apy_cache.cached_apy().map(format_wad),
        })
    }
}

/// Main keeper service feeding rate oracles and checking positions against
/// them
pub struct Keeper {
    /// Keeper configuration
    config: KeeperConfig,

    /// Enabled oracles by name
    oracles: BTreeMap<String, ManagedOracle>,
}

impl Keeper {
    /// Create a new keeper, seeding every enabled oracle with a reading taken
    /// at `now` (unix seconds)
    pub async fn new(config: KeeperConfig, now: i64) -> KeeperResult<Self> {
        config.validate()?;
        let now_wad = from_int(now.into())?;

        let mut oracles = BTreeMap::new();
        for oracle_config in config.get_enabled_oracles() {
            let managed = ManagedOracle::new(oracle_config, &config.retry, now_wad).await?;
            oracles.insert(oracle_config.name.clone(), managed);
        }

        Ok(Self { config, oracles })
    }

    /// Shared handle to an oracle, for readers outside the keeper loop
    pub fn oracle(&self, name: &str) -> Option<Arc<RwLock<RateOracle>>> {
        self.oracles.get(name).map(|managed| Arc::clone(&managed.oracle))
    }

    /// Update all oracles whose minimum interval has passed
    pub async fn update_all_oracles(&mut self, now: i64) -> KeeperResult<usize> {
        let now_wad = from_int(now.into())?;
        let mut updates = 0;

        for managed in self.oracles.values_mut() {
            match managed.update(&self.config.retry, now_wad).await {
                Ok(true) => updates += 1,
                Ok(false) => log::debug!("Oracle {} updated recently, skipping", managed.name),
                Err(e) => {
                    log::error!("Failed to update oracle {}: {}", managed.name, e);
                    // Continue with other oracles
                }
            }
        }

        Ok(updates)
    }

    /// Margin requirements of every position whose oracle is enabled and has
    /// enough history
    pub async fn evaluate_positions(&mut self, now: i64) -> KeeperResult<Vec<PositionStatus>> {
        let now_wad = from_int(now.into())?;
        let mut statuses = Vec::new();

        for position in &self.config.positions {
            let Some(managed) = self.oracles.get_mut(&position.oracle) else {
                log::debug!("Oracle {} of position {} is disabled, skipping", position.oracle, position.name);
                continue;
            };

            match managed.evaluate(position, now_wad).await {
                Ok(status) => {
                    if status.liquidatable {
                        log::warn!(
                            "Position {} is liquidatable: margin {} below liquidation margin {}",
                            status.name,
                            status.current_margin,
                            status.liquidation_margin
                        );
                    }
                    statuses.push(status);
                }
                Err(KeeperError::Core(FixfloatCoreError::TargetTooOld { .. })) => {
                    log::debug!("Oracle {} has not covered the lookback window yet, skipping {}", managed.name, position.name);
                }
                Err(KeeperError::Core(FixfloatCoreError::TermEnded)) => {
                    log::debug!("Position {} has matured", position.name);
                }
                Err(e) => log::error!("Failed to evaluate position {}: {}", position.name, e),
            }
        }

        Ok(statuses)
    }

    /// One keeper iteration: update oracles, check positions, publish status
    pub async fn run_once(&mut self, now: i64) -> KeeperResult<KeeperStatus> {
        let updates = self.update_all_oracles(now).await?;
        let positions = self.evaluate_positions(now).await?;

        let mut oracles = Vec::with_capacity(self.oracles.len());
        for managed in self.oracles.values() {
            oracles.push(managed.status().await?);
        }

        let status = KeeperStatus {
            generated_at: DateTime::<Utc>::from_timestamp(now, 0),
            oracles,
            positions,
        };

        if let Some(path) = &self.config.status_file {
            tokio::fs::write(path, serde_json::to_string_pretty(&status)?).await?;
        }

        log::debug!(
            "Updated {} oracles, evaluated {} positions",
            updates,
            status.positions.len()
        );

        Ok(status)
    }

    /// Health check for keeper service
    pub async fn health_check(&self, now: i64) -> KeeperResult<()> {
        let now_wad = from_int(now.into())?;

        for managed in self.oracles.values() {
            let oracle = managed.oracle.read().await;
            let age = sub_wad(now_wad, oracle.newest()?.timestamp)?;
            if age > managed.max_staleness_wad {
                return Err(KeeperError::Unhealthy(format!(
                    "oracle {} last written {}s ago",
                    managed.name,
                    to_int(age)
                )));
            }
        }

        log::debug!("Health check passed for {} oracles", self.oracles.len());
        Ok(())
    }
}
