#![forbid(unsafe_code)]

//! `aweb` — agent coordination server binary.
//!
//! Bootstraps configuration, connects the durable store, and starts the
//! HTTP/SSE surface.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use aweb::config::GlobalConfig;
use aweb::persistence::db;
use aweb::state::AppState;
use aweb::{http, AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "aweb", about = "Coordination substrate for AI agents", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Defaults to `config.toml` in the current working directory. A
    /// missing file falls back to built-in defaults.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the HTTP port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the durable-store path.
    #[arg(long)]
    db: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("aweb server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build runtime: {err}")))?
        .block_on(run(args))
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = if args.config.exists() {
        GlobalConfig::load_from_path(&args.config)?
    } else {
        info!(path = %args.config.display(), "no config file; using defaults");
        GlobalConfig::default()
    };
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(db_path) = args.db {
        config.database_path = db_path;
    }

    let pool = db::connect(&config.database_path).await?;
    info!(path = %config.database_path, "durable store ready");

    let state = Arc::new(AppState::new(Arc::new(config), Arc::new(pool)));

    let ct = CancellationToken::new();
    let shutdown_ct = ct.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown_ct.cancel();
        }
    });

    if let Err(err) = http::serve(state, ct).await {
        error!(%err, "server exited with error");
        return Err(err);
    }
    Ok(())
}
