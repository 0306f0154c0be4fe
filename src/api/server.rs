//! API Server
//!
//! Router assembly, middleware stack and graceful shutdown.

use super::{
    handlers::AppState,
    middleware::{count_requests_middleware, create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::config::ServerConfig;
use crate::service::CasinoService;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

/// Build the application with its middleware stack.
pub fn create_app(service: Arc<CasinoService>, config: &ServerConfig) -> axum::Router {
    let metrics = service.metrics();
    let state = Arc::new(AppState {
        service,
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    // Each `.layer` wraps the ones before it, so the last added runs first.
    create_router(state)
        .layer(axum::middleware::from_fn_with_state(metrics, count_requests_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        // Preflight is answered here without reaching the timeout
        .layer(create_cors_layer(config.cors_origins.clone()))
        .layer(TraceLayer::new_for_http())
        // Outermost: timeouts and preflight responses carry the id too
        .layer(axum::middleware::from_fn(request_id_middleware))
}

pub struct ApiServer {
    config: ServerConfig,
    service: Arc<CasinoService>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, service: Arc<CasinoService>) -> Self {
        Self { config, service }
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.socket_addr()?;
        let app = create_app(self.service.clone(), &self.config);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "luckbox API listening");
        info!(
            cors = ?self.config.cors_origins,
            timeout_secs = self.config.request_timeout_secs,
            "server configuration"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }

    fn socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        )))
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received terminate signal"),
    }
}
