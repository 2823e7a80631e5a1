use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use issue_bridge::cli::{self, Command};
use issue_bridge::config;
use issue_bridge::providers::ProviderSelector;
use issue_bridge::transport::ReqwestTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = cli::parse_args(&args)?;
    if command == Command::Help {
        println!("{}", cli::usage());
        return Ok(());
    }

    let config = config::load_config()?;
    let selector = ProviderSelector::from_config(Arc::new(ReqwestTransport::new()), Arc::new(config));

    // Ctrl-C cancels the in-flight request
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    if let Some(details) = cli::run(&command, &selector, &cancel).await? {
        let json = serde_json::to_string_pretty(&details).context("Failed to serialize issue")?;
        println!("{json}");
    }

    Ok(())
}
