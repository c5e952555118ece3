//! Proof-of-Weights Gateway Server
//!
//! Serves proof artifacts and forwards signed inputs to the local validator.

use anyhow::Result;
use clap::Parser;
use pow_gateway::{run_server, GatewayArgs, GatewayConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pow_gateway=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = GatewayArgs::parse();

    info!("Starting Proof-of-Weights Gateway");
    info!("  Validator path: {}", args.validator_path.display());

    let config = GatewayConfig::from(args);
    run_server(config).await
}
