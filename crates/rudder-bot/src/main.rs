//! rudder paper-trading bot - entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

/// rudder trading control plane (paper venue)
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RUDDER_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate a strategy's PnL over a synthetic series and exit
    Backtest {
        #[arg(long, default_value = "scalping_breakout")]
        strategy: String,
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,
        #[arg(
            long,
            default_value_t = 7,
            value_parser = clap::value_parser!(u32)
                .range(1..=i64::from(rudder_strategy::MAX_BACKTEST_DAYS))
        )]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    rudder_telemetry::init_logging()?;

    info!("Starting rudder v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > RUDDER_CONFIG > default
    let config_path = args
        .config
        .or_else(|| std::env::var("RUDDER_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = rudder_bot::AppConfig::from_file(&config_path)?;

    let app = rudder_bot::Application::new(config)?;

    match args.command {
        Some(Command::Backtest {
            strategy,
            symbol,
            days,
        }) => {
            let report = app.backtest(&strategy, &symbol.to_uppercase(), days)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => app.run().await?,
    }

    Ok(())
}
