use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokengate::{Gateway, GatewayConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tokengate")]
#[command(about = "Token-gated entity store with per-endpoint quotas")]
struct Cli {
    /// JSON configuration file; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the admin and entity APIs over an in-memory engine
    Serve {
        #[arg(long)]
        listen: Option<String>,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}

fn load_config(path: Option<&Path>) -> Result<GatewayConfig> {
    let config = match path {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

async fn serve(mut config: GatewayConfig, listen: Option<String>) -> Result<()> {
    if let Some(listen) = listen {
        config.listen_addr = listen;
    }
    let addr = config.socket_addr()?;

    let gateway = Arc::new(Gateway::in_memory(&config)?);
    let app = tokengate::web::router(gateway);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, endpoints = config.url_endpoints.len(), "tokengate listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server error")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { listen } => serve(config, listen).await,
        Command::CheckConfig => {
            println!(
                "configuration ok: listen {} with {} billable endpoint(s)",
                config.listen_addr,
                config.url_endpoints.len()
            );
            Ok(())
        }
    }
}
