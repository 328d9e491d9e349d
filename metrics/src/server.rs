use crate::Metrics;
use anyhow::{Error as AnyhowError, Result};
use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct MetricsServerConfig {
    pub metrics_address: IpAddr,
    pub metrics_port: u16,
}

impl From<&MetricsServerConfig> for SocketAddr {
    fn from(config: &MetricsServerConfig) -> Self {
        SocketAddr::from((config.metrics_address, config.metrics_port))
    }
}

async fn prometheus_metrics_handler(
    State(metrics): State<Arc<Metrics>>,
) -> Result<String, (StatusCode, String)> {
    metrics.gather().map_err(|e| {
        warn!(error = %e, "Failed to encode metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(prometheus_metrics_handler))
        .with_state(metrics)
}

/// Serve `/metrics` until `shutdown` fires.
pub async fn run_metrics_server(
    config: MetricsServerConfig,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::from(&config);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Metrics server listening");

    axum::serve(listener, router(metrics).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(AnyhowError::new)?;

    Ok(())
}
