use std::collections::HashSet;
use std::fs;
use std::path::Path;

use fixfloat_core::constants::{
    DEFAULT_CACHE_MAX_AGE_SECS, DEFAULT_LOOKBACK_WINDOW_SECS, MAX_CARDINALITY, SECONDS_IN_DAY, WAD,
};
use fixfloat_core::margin::MarginCalculatorParameters;
use serde::{Deserialize, Serialize};

use crate::error::{KeeperError, KeeperResult};

/// Prefix of environment variables overriding the configuration file,
/// e.g. `FIXFLOAT_KEEPER__UPDATE_INTERVAL_SECS=30`
pub const ENV_PREFIX: &str = "FIXFLOAT_KEEPER";

/// Keeper configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeeperConfig {
    /// Seconds between two keeper iterations
    pub update_interval_secs: u64,

    /// JSON status snapshot written after every iteration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_file: Option<String>,

    /// Retry configuration for reading index sources
    pub retry: RetryConfig,

    /// Rate oracles to feed
    pub oracles: Vec<OracleConfig>,

    /// Positions to check against their oracle's historical APY
    #[serde(default)]
    pub positions: Vec<PositionConfig>,
}

/// Configuration of one rate oracle and the pool parameters margined on it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    /// Oracle name for logging and position lookup
    pub name: String,

    /// Whether this oracle is fed
    pub enabled: bool,

    /// Minimum seconds between two recorded observations
    pub min_seconds_since_last_update: i64,

    /// Maximum age of the newest observation before the health check fails
    pub max_staleness_secs: i64,

    /// Number of observations retained
    pub cardinality: u32,

    /// Seconds of history the historical APY is computed over
    pub lookback_window_secs: i64,

    /// Seconds a computed historical APY is reused
    pub cache_max_age_secs: i64,

    /// Where the accrual index is read from
    pub source: SourceConfig,

    /// Margin engine parameters of pools using this oracle
    #[serde(default, with = "MarginParametersDef")]
    pub margin_parameters: MarginCalculatorParameters,
}

/// Accrual index source of an oracle
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Index compounding at a fixed APY from the moment the keeper starts
    Simulated {
        #[serde(with = "wad_serde")]
        initial_index: i128,
        #[serde(with = "wad_serde")]
        apy: i128,
    },
    /// Raw integer reading kept up to date in a file by another process
    File { path: String, decimals: u8 },
}

/// A trader or liquidity provider to monitor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PositionConfig {
    pub name: String,

    /// Name of the oracle whose historical APY applies
    pub oracle: String,

    #[serde(with = "wad_serde")]
    pub fixed_token_balance: i128,

    #[serde(with = "wad_serde")]
    pub variable_token_balance: i128,

    /// Margin currently deposited
    #[serde(with = "wad_serde")]
    pub current_margin: i128,

    /// Term start, unix seconds
    pub term_start: i64,

    /// Term end, unix seconds
    pub term_end: i64,

    /// Liquidity still provided, absent for plain traders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeConfig>,
}

/// Liquidity a position provides between two ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RangeConfig {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub current_tick: i32,

    #[serde(with = "wad_serde")]
    pub liquidity: i128,

    /// Variable factor accrued since the term started
    #[serde(with = "wad_serde")]
    pub variable_factor: i128,
}

/// Retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum number of attempts for failed reads
    pub max_retries: u32,

    /// Base delay between retries in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
}

impl KeeperConfig {
    /// Load configuration from a TOML file, layered with `FIXFLOAT_KEEPER__*`
    /// environment overrides
    pub fn load(path: &str) -> KeeperResult<Self> {
        Self::from_file_source(config::File::from(Path::new(path)))
    }

    /// Parse configuration from TOML text, environment overrides included
    pub fn from_toml_str(content: &str) -> KeeperResult<Self> {
        Self::from_file_source(config::File::from_str(content, config::FileFormat::Toml))
    }

    fn from_file_source<S>(file: S) -> KeeperResult<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: KeeperConfig = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &str) -> KeeperResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> KeeperResult<()> {
        if self.oracles.is_empty() {
            return Err(invalid("oracles must not be empty"));
        }

        if self.update_interval_secs == 0 {
            return Err(invalid("update_interval_secs must be greater than 0"));
        }

        let mut names = HashSet::new();
        for oracle in &self.oracles {
            oracle.validate()?;
            if !names.insert(oracle.name.as_str()) {
                return Err(invalid(format!("duplicate oracle name {}", oracle.name)));
            }

            // Older history is overwritten before the lookback window is reached
            let spacing = oracle.min_seconds_since_last_update.max(self.update_interval_secs as i64);
            let retained_secs = i64::from(oracle.cardinality).saturating_mul(spacing);
            if retained_secs < oracle.lookback_window_secs {
                return Err(invalid(format!(
                    "oracle {}: cardinality {} retains {}s of history, less than the {}s lookback window",
                    oracle.name, oracle.cardinality, retained_secs, oracle.lookback_window_secs
                )));
            }
        }

        for position in &self.positions {
            position.validate()?;
            if !names.contains(position.oracle.as_str()) {
                return Err(KeeperError::UnknownOracle(format!(
                    "{} (position {})",
                    position.oracle, position.name
                )));
            }
        }

        self.retry.validate()?;

        Ok(())
    }

    /// Get enabled oracles
    pub fn get_enabled_oracles(&self) -> Vec<&OracleConfig> {
        self.oracles.iter().filter(|o| o.enabled).collect()
    }
}

impl OracleConfig {
    /// Validate oracle configuration
    fn validate(&self) -> KeeperResult<()> {
        if self.name.is_empty() {
            return Err(invalid("oracle name must not be empty"));
        }

        if self.min_seconds_since_last_update < 0 {
            return Err(invalid(format!(
                "oracle {}: min_seconds_since_last_update must not be negative",
                self.name
            )));
        }

        if self.max_staleness_secs <= self.min_seconds_since_last_update {
            return Err(invalid(format!(
                "oracle {}: max_staleness_secs must be greater than min_seconds_since_last_update ({})",
                self.name, self.min_seconds_since_last_update
            )));
        }

        if self.cardinality == 0 || self.cardinality > MAX_CARDINALITY {
            return Err(invalid(format!(
                "oracle {}: cardinality {} must be between 1 and {}",
                self.name, self.cardinality, MAX_CARDINALITY
            )));
        }

        if self.lookback_window_secs <= 0 {
            return Err(invalid(format!("oracle {}: lookback_window_secs must be greater than 0", self.name)));
        }

        if self.cache_max_age_secs < 0 {
            return Err(invalid(format!("oracle {}: cache_max_age_secs must not be negative", self.name)));
        }

        match &self.source {
            SourceConfig::Simulated { initial_index, apy } => {
                if *initial_index <= 0 {
                    return Err(invalid(format!("oracle {}: initial_index must be positive", self.name)));
                }
                if *apy < 0 {
                    return Err(invalid(format!("oracle {}: apy must not be negative", self.name)));
                }
            }
            SourceConfig::File { path, decimals } => {
                if path.is_empty() {
                    return Err(invalid(format!("oracle {}: source path must not be empty", self.name)));
                }
                if *decimals > 36 {
                    return Err(invalid(format!("oracle {}: decimals {} is at most 36", self.name, decimals)));
                }
            }
        }

        self.margin_parameters
            .validate()
            .map_err(|e| invalid(format!("oracle {}: {}", self.name, e)))
    }
}

impl PositionConfig {
    /// Validate position configuration
    fn validate(&self) -> KeeperResult<()> {
        if self.name.is_empty() {
            return Err(invalid("position name must not be empty"));
        }

        if self.term_start >= self.term_end {
            return Err(invalid(format!(
                "position {}: term_start {} must be before term_end {}",
                self.name, self.term_start, self.term_end
            )));
        }

        if let Some(range) = &self.range {
            if range.tick_lower >= range.tick_upper {
                return Err(invalid(format!(
                    "position {}: tick_lower {} must be below tick_upper {}",
                    self.name, range.tick_lower, range.tick_upper
                )));
            }
            if range.liquidity < 0 {
                return Err(invalid(format!("position {}: liquidity must not be negative", self.name)));
            }
        }

        Ok(())
    }
}

impl RetryConfig {
    /// Validate retry configuration
    fn validate(&self) -> KeeperResult<()> {
        if self.max_retries == 0 {
            return Err(invalid("max_retries must be greater than 0"));
        }

        if self.base_delay_ms == 0 {
            return Err(invalid("base_delay_ms must be greater than 0"));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(invalid(format!(
                "max_delay_ms must be greater than or equal to base_delay_ms ({})",
                self.base_delay_ms
            )));
        }

        if self.backoff_multiplier <= 1.0 {
            return Err(invalid("backoff_multiplier must be greater than 1.0"));
        }

        Ok(())
    }

    /// Calculate delay for retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return self.base_delay_ms;
        }

        let exponential_delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        (exponential_delay as u64).min(self.max_delay_ms)
    }
}

fn invalid(message: impl Into<String>) -> KeeperError {
    KeeperError::InvalidConfig(message.into())
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 60,
            status_file: None,
            retry: RetryConfig::default(),
            oracles: vec![],
            positions: vec![],
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            name: "Default Oracle".to_string(),
            enabled: true,
            min_seconds_since_last_update: 3600,
            max_staleness_secs: 7200,
            cardinality: 200, // a bit over a week of hourly observations
            lookback_window_secs: DEFAULT_LOOKBACK_WINDOW_SECS as i64,
            cache_max_age_secs: DEFAULT_CACHE_MAX_AGE_SECS as i64,
            source: SourceConfig::Simulated {
                initial_index: WAD,
                apy: WAD / 20,
            },
            margin_parameters: MarginCalculatorParameters::default(),
        }
    }
}

/// Create example configuration file
pub fn create_example_config(path: &str) -> KeeperResult<()> {
    let now = chrono::Utc::now().timestamp();
    let term_end = now + 90 * SECONDS_IN_DAY as i64;

    let example_config = KeeperConfig {
        update_interval_secs: 300,
        status_file: Some("keeper-status.json".to_string()),
        retry: RetryConfig::default(),
        oracles: vec![
            OracleConfig {
                name: "aave-usdc".to_string(),
                source: SourceConfig::Simulated {
                    initial_index: WAD,
                    apy: 35 * WAD / 1000,
                },
                ..OracleConfig::default()
            },
            OracleConfig {
                name: "compound-dai".to_string(),
                enabled: false,
                source: SourceConfig::File {
                    path: "compound-dai.index".to_string(),
                    decimals: 27,
                },
                ..OracleConfig::default()
            },
        ],
        positions: vec![
            PositionConfig {
                name: "variable-taker".to_string(),
                oracle: "aave-usdc".to_string(),
                fixed_token_balance: -1_000 * WAD,
                variable_token_balance: 3_000 * WAD,
                current_margin: 50 * WAD,
                term_start: now,
                term_end,
                range: None,
            },
            PositionConfig {
                name: "liquidity-provider".to_string(),
                oracle: "aave-usdc".to_string(),
                fixed_token_balance: 0,
                variable_token_balance: 0,
                current_margin: 100 * WAD,
                term_start: now,
                term_end,
                range: Some(RangeConfig {
                    tick_lower: -6_000,
                    tick_upper: 6_000,
                    current_tick: 0,
                    liquidity: 1_000 * WAD,
                    variable_factor: 0,
                }),
            },
        ],
    };

    example_config.save(path)?;
    Ok(())
}

// Custom serde module for wad values, kept as exact decimal strings since
// TOML integers stop at 64 bits
mod wad_serde {
    use fixfloat_core::math::{format_wad, parse_wad};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &i128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_wad(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i128, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_wad(s.trim()).map_err(serde::de::Error::custom)
    }
}

#[derive(Deserialize, Serialize)]
#[serde(remote = "MarginCalculatorParameters")]
struct MarginParametersDef {
    #[serde(with = "wad_serde")]
    apy_upper_multiplier_wad: i128,
    #[serde(with = "wad_serde")]
    apy_lower_multiplier_wad: i128,
    #[serde(with = "wad_serde")]
    sigma_squared_wad: i128,
    #[serde(with = "wad_serde")]
    alpha_wad: i128,
    #[serde(with = "wad_serde")]
    beta_wad: i128,
    #[serde(with = "wad_serde")]
    xi_upper_wad: i128,
    #[serde(with = "wad_serde")]
    xi_lower_wad: i128,
    #[serde(with = "wad_serde")]
    t_max_wad: i128,
    #[serde(with = "wad_serde")]
    eta_im_wad: i128,
    #[serde(with = "wad_serde")]
    eta_lm_wad: i128,
    #[serde(with = "wad_serde")]
    min_margin_to_incentivise_liquidators: i128,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_oracle() -> KeeperConfig {
        let mut config = KeeperConfig::default();
        config.oracles.push(OracleConfig::default());
        config
    }

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("fixfloat-keeper-{}-{}", std::process::id(), name))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_config_validation() {
        let mut config = config_with_oracle();
        assert!(config.validate().is_ok());

        // Test invalid interval
        config.update_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lookback_must_fit_in_buffer() {
        let mut config = config_with_oracle();
        config.oracles[0].cardinality = 24;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lookback window"), "{}", err);

        // Slower writes stretch the same buffer over more time
        config.oracles[0].min_seconds_since_last_update = 8 * 3600;
        config.oracles[0].max_staleness_secs = 9 * 3600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_margin_parameters_rejected() {
        let mut config = config_with_oracle();
        config.oracles[0].margin_parameters.sigma_squared_wad = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sigma_squared_wad"), "{}", err);
    }

    #[test]
    fn test_position_needs_known_oracle() {
        let mut config = config_with_oracle();
        config.positions.push(PositionConfig {
            name: "trader".to_string(),
            oracle: "missing".to_string(),
            fixed_token_balance: 0,
            variable_token_balance: 0,
            current_margin: 0,
            term_start: 0,
            term_end: 1,
            range: None,
        });
        assert!(matches!(config.validate(), Err(KeeperError::UnknownOracle(_))));

        config.positions[0].oracle = "Default Oracle".to_string();
        assert!(config.validate().is_ok());

        config.positions[0].term_end = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_wad_strings() {
        let config = KeeperConfig::from_toml_str(
            r#"
            update_interval_secs = 60

            [retry]
            max_retries = 3
            base_delay_ms = 100
            max_delay_ms = 1000
            backoff_multiplier = 2.0

            [[oracles]]
            name = "aave-usdc"
            enabled = true
            min_seconds_since_last_update = 3600
            max_staleness_secs = 7200
            cardinality = 200
            lookback_window_secs = 604800
            cache_max_age_secs = 21600
            source = { kind = "simulated", initial_index = "1.0", apy = "0.035" }

            [oracles.margin_parameters]
            apy_upper_multiplier_wad = "1.5"
            apy_lower_multiplier_wad = "0.7"
            sigma_squared_wad = "0.15"
            alpha_wad = "0.04"
            beta_wad = "1"
            xi_upper_wad = "0.516397779494288625"
            xi_lower_wad = "0.387298334620764948"
            t_max_wad = "31536000"
            eta_im_wad = "0"
            eta_lm_wad = "0"
            min_margin_to_incentivise_liquidators = "0"

            [[positions]]
            name = "trader"
            oracle = "aave-usdc"
            fixed_token_balance = "-1000"
            variable_token_balance = "3000.5"
            current_margin = "12.25"
            term_start = 1700000000
            term_end = 1707776000
            "#,
        )
        .unwrap();

        assert_eq!(
            config.oracles[0].source,
            SourceConfig::Simulated {
                initial_index: WAD,
                apy: 35 * WAD / 1000
            }
        );
        assert_eq!(config.oracles[0].margin_parameters, MarginCalculatorParameters::default());
        assert_eq!(config.positions[0].variable_token_balance, 3_000 * WAD + WAD / 2);
        assert_eq!(config.positions[0].current_margin, 12 * WAD + WAD / 4);
        assert!(config.positions[0].range.is_none());
        assert!(config.status_file.is_none());
    }

    #[test]
    fn test_example_config_loads() {
        let path = temp_path("example.toml");
        create_example_config(&path).unwrap();

        let config = KeeperConfig::load(&path).unwrap();
        assert_eq!(config.oracles.len(), 2);
        assert_eq!(config.get_enabled_oracles().len(), 1);
        assert_eq!(config.positions.len(), 2);
        assert_eq!(config.positions[1].range.unwrap().liquidity, 1_000 * WAD);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_retry_delay_calculation() {
        let retry_config = RetryConfig::default();

        assert_eq!(retry_config.delay_for_attempt(0), 1000);
        assert_eq!(retry_config.delay_for_attempt(1), 2000);
        assert_eq!(retry_config.delay_for_attempt(2), 4000);

        // Should cap at max_delay_ms
        assert_eq!(retry_config.delay_for_attempt(10), 30_000);
    }
}
