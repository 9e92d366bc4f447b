mod bootstrap_helpers;
mod startup_config;

use anyhow::Result;
use clap::Parser;
use relay_cli::Cli;

use crate::bootstrap_helpers::install_relay_logging;
use crate::startup_config::build_gateway_config;

#[tokio::main]
async fn main() -> Result<()> {
    install_relay_logging()?;
    let cli = Cli::parse();
    let config = build_gateway_config(&cli)?;
    relay_gateway::run_gateway_server(config).await
}
