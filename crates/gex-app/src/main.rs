//! GEX stream console - Entry Point

use anyhow::Result;
use clap::Parser;
use gex_aggregator::ExpirationFilter;
use tracing::info;

/// Real-time gamma exposure for one underlying
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via GEX_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Underlying ticker, overrides the config file
    #[arg(short, long)]
    ticker: Option<String>,

    /// Expiration filter: today, next-friday, two-fridays, all
    #[arg(short, long)]
    expiration: Option<ExpirationFilter>,

    /// Number of strikes to display
    #[arg(long)]
    top: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection
    gex_stream::init_crypto();

    let args = Args::parse();

    // CLI arg > GEX_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("GEX_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let mut config = gex_app::AppConfig::from_file(&config_path)?;
    config.apply_overrides(args.ticker, args.expiration, args.top);

    gex_telemetry::init_logging(config.log_level.as_deref())?;
    info!("Starting GEX stream v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = %config_path,
        ticker = %config.ticker,
        expiration = %config.display.expiration,
        "Configuration loaded"
    );

    let mut app = gex_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
