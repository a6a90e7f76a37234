//! tradesim - live transaction-cost estimation from an order-book feed.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tradesim_core::OrderType;

/// Estimate slippage, fees, market impact and maker/taker split for a
/// hypothetical order against a live order book.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "TRADESIM_CONFIG", default_value = "config/default.toml")]
    config: String,

    /// Instrument override (e.g. ETH-USDT-SWAP)
    #[arg(long)]
    instrument: Option<String>,

    /// Order quantity override (quote currency)
    #[arg(long)]
    quantity: Option<f64>,

    /// Order type override (market | limit)
    #[arg(long)]
    order_type: Option<OrderType>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection is made.
    tradesim_ws::init_crypto();

    let args = Args::parse();

    tradesim_telemetry::init_logging()?;

    info!("Starting tradesim v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %args.config, "Loading configuration");

    let mut config = tradesim_app::AppConfig::from_file(&args.config)?;
    if let Some(instrument) = args.instrument {
        config.feed.instrument = instrument;
    }
    if let Some(quantity) = args.quantity {
        config.order.quantity = quantity;
    }
    if let Some(order_type) = args.order_type {
        config.order.order_type = order_type;
    }

    let mut app = tradesim_app::Application::new(config)?;
    app.run().await?;

    info!("Shutdown complete");
    Ok(())
}
