pub mod keeper;
pub mod config;
pub mod error;

pub use keeper::{Keeper, KeeperStatus, OracleStatus, PositionStatus};
pub use config::{KeeperConfig, OracleConfig, PositionConfig, RangeConfig, RetryConfig, SourceConfig};
pub use error::{KeeperError, KeeperResult};
