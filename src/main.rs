mod config;
mod credentials;
mod providers;
mod search;
mod tools;
mod usage;

pub const USER_AGENT: &str = concat!("quota-search/", env!("CARGO_PKG_VERSION"), " (MCP Server)");

use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use tools::QuotaSearch;
use tracing::info;

use config::{Args, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quota_search=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::resolve(&args).inspect_err(|e| tracing::error!("{e}"))?;

    info!("starting quota-search MCP server");

    let service = QuotaSearch::from_config(&config)
        .await?
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("failed to start server: {e}"))?;

    service.waiting().await?;
    info!("server stopped");
    Ok(())
}
