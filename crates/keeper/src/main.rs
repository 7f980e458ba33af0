use std::time::Duration;

use anyhow::{ensure, Context};
use clap::Parser;
use tokio::time;

use fixfloat_keeper::config::create_example_config;
use fixfloat_keeper::{Keeper, KeeperConfig};

#[derive(Parser, Debug)]
#[command(name = "fixfloat-keeper")]
#[command(about = "Fixfloat rate oracle feeder and margin monitor")]
struct Args {
    /// Path to keeper configuration file
    #[arg(short, long, default_value = "keeper.toml")]
    config: String,

    /// Update interval in seconds, overrides the configuration
    #[arg(short, long)]
    interval: Option<u64>,

    /// Run a single iteration, print the status and exit
    #[arg(long)]
    once: bool,

    /// Write an example configuration to the config path and exit
    #[arg(long)]
    init_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if args.verbose { "debug" } else { "info" })
    ).init();

    if args.init_config {
        create_example_config(&args.config)
            .with_context(|| format!("Failed to write example config to {}", args.config))?;
        log::info!("Wrote example configuration to {}", args.config);
        return Ok(());
    }

    log::info!("Starting Fixfloat Keeper");

    // Load configuration
    let config = KeeperConfig::load(&args.config)
        .with_context(|| format!("Failed to load config file {}", args.config))?;
    let interval = args.interval.unwrap_or(config.update_interval_secs);
    ensure!(interval > 0, "update interval must be greater than 0");

    log::info!(
        "Loaded configuration for {} oracles and {} positions",
        config.get_enabled_oracles().len(),
        config.positions.len()
    );
    log::info!("Update interval: {}s", interval);

    let mut keeper = Keeper::new(config, chrono::Utc::now().timestamp())
        .await
        .context("Failed to initialize oracles")?;

    log::info!("Keeper initialized successfully");

    if args.once {
        let status = keeper.run_once(chrono::Utc::now().timestamp()).await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    // Start main update loop
    let mut interval_timer = time::interval(Duration::from_secs(interval));
    let mut iteration = 0u64;

    loop {
        interval_timer.tick().await;
        iteration += 1;

        log::debug!("Starting keeper iteration {}", iteration);

        let now = chrono::Utc::now().timestamp();
        match keeper.run_once(now).await {
            Ok(status) => {
                let liquidatable = status.positions.iter().filter(|p| p.liquidatable).count();
                if liquidatable > 0 {
                    log::info!("Iteration {}: {} liquidatable positions", iteration, liquidatable);
                } else {
                    log::debug!("Iteration {}: all {} positions margined", iteration, status.positions.len());
                }
            }
            Err(e) => {
                log::error!("Error in keeper iteration {}: {}", iteration, e);
                // Continue running even if individual iterations fail
            }
        }

        // Basic health check every 100 iterations
        if iteration % 100 == 0 {
            log::info!("Keeper health check - iteration {}", iteration);
            if let Err(e) = keeper.health_check(now).await {
                log::warn!("Health check warning: {}", e);
            }
        }
    }
}
