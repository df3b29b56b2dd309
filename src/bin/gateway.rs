#![forbid(unsafe_code)]

//! Entry point for the yt-dlp gateway service.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ytdlp_gateway::{
    api::{AppState, router},
    config::{ConfigOverrides, GatewayConfig, resolve_config},
    runner::probe_tool,
    security::ensure_not_root,
};

const DEFAULT_LOG_FILTER: &str = "ytdlp_gateway=info,gateway=info,tower_http=info";

/// Every flag falls back to the environment, then to `.env`, then to a
/// built-in default.
#[derive(Debug, Parser)]
#[command(name = "gateway", version, about = "HTTP gateway in front of yt-dlp")]
struct GatewayArgs {
    /// Address to listen on (GATEWAY_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (GATEWAY_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Required X-API-Key value; leave unset for open access (API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Cookie jar passed to yt-dlp when the file exists (COOKIES_PATH)
    #[arg(long)]
    cookies_path: Option<PathBuf>,

    /// yt-dlp program name or path (YTDLP_BIN)
    #[arg(long = "ytdlp")]
    ytdlp_program: Option<String>,

    /// Dotenv file read before the process environment is consulted
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl GatewayArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            api_key: self.api_key,
            cookies_path: self.cookies_path,
            ytdlp_program: self.ytdlp_program,
            host: self.host,
            port: self.port,
            env_path: self.env_file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = GatewayArgs::parse();
    ensure_not_root("gateway")?;

    let config = resolve_config(args.into_overrides()).context("resolving configuration")?;
    log_startup(&config).await;

    let addr = SocketAddr::new(config.host, config.port);
    let app = router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("gateway listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running gateway server")?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Reports the effective configuration. A missing yt-dlp is only a warning:
/// requests will fail individually until it is installed.
async fn log_startup(config: &GatewayConfig) {
    if config.api_key_required() {
        info!("API key authentication enabled");
    } else {
        warn!("no API key configured; /info and /extract are open to anyone");
    }
    match &config.cookies_path {
        Some(path) => info!(path = %path.display(), "cookie jar configured"),
        None => info!("no cookie jar configured"),
    }

    let program = config.ytdlp_program.clone();
    match tokio::task::spawn_blocking(move || probe_tool(&program)).await {
        Ok(Ok(version)) => info!(program = %config.ytdlp_program, %version, "found yt-dlp"),
        Ok(Err(err)) => warn!(program = %config.ytdlp_program, "yt-dlp probe failed: {err}"),
        Err(err) => warn!("yt-dlp probe task failed: {err}"),
    }
}

async fn shutdown_signal() {
    // Only graceful shutdown depends on this; Ctrl+C still ends the process.
    if let Err(err) = signal::ctrl_c().await {
        warn!("failed to install Ctrl+C handler: {err}");
    }
    info!("shutting down");
}
