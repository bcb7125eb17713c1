//! hydra - aggregating reverse proxy for LLM providers.
//!
//! Server entry point: CLI parsing, logging setup, config load, and the
//! axum listener.

#![forbid(unsafe_code)]

mod middleware;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hydra_llm::Dispatcher;

/// Command-line options.
#[derive(Debug, Parser)]
#[command(name = "hydra", version, about = "Aggregating reverse proxy for LLM providers")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Path to the model configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hydra=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("reading config {}", cli.config.display()))?;
    let config = hydra_llm::config::from_yaml(&raw)?;

    for model in &config.models {
        info!(model = %model.name, "loaded model");
    }

    let auth_token = config
        .auth_token
        .clone()
        .filter(|token| !token.is_empty())
        .or_else(|| std::env::var("HYDRA_AUTH_TOKEN").ok());

    let dispatcher = Arc::new(Dispatcher::new(config)?);
    let app = server::routes(dispatcher, auth_token);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port))
        .await
        .with_context(|| format!("binding port {}", cli.port))?;
    info!(port = cli.port, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
