//! Luckbox API Server Binary

use clap::Parser;
use luckbox::api::ApiServer;
use luckbox::config::{validate, ConfigLoader};
use luckbox::service::CasinoService;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "luckbox-api")]
#[command(about = "Luckbox provably fair wagering API", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Overrides server.host
    #[arg(long)]
    host: Option<String>,

    /// Overrides server.port
    #[arg(long)]
    port: Option<u16>,

    /// Allowed CORS origins (comma-separated, use * for all)
    #[arg(long)]
    cors_origins: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "luckbox=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(origins) = args.cors_origins {
        config.server.cors_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(timeout) = args.timeout {
        config.server.request_timeout_secs = timeout;
    }
    validate(&config)?;

    let service = Arc::new(CasinoService::in_memory(&config)?);
    info!(
        rtp_bps = config.house.rtp_bps,
        cases = service.catalog().cases().count(),
        "wagering core ready"
    );

    let housekeeping = service.clone().spawn_housekeeping(config.sweep_interval());
    let result = ApiServer::new(config.server.clone(), service).run().await;
    housekeeping.abort();
    result
}
