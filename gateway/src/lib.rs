pub mod adapt;
pub mod config;
pub mod emit;
pub mod errors;
pub mod metrics_defs;
pub mod operation;
pub mod reconcile;
pub mod service;
pub mod upstream;

#[cfg(test)]
pub mod testutils;

use crate::errors::GatewayError;
use crate::reconcile::FanOutCoordinator;
use crate::service::GatewayService;
use crate::upstream::UpstreamClient;
use shared::http::run_http_service;
use shared::metrics_defs::MetricType;
use std::sync::Arc;

fn describe_metrics() {
    for def in metrics_defs::ALL_METRICS {
        match def.metric_type {
            MetricType::Counter => metrics::describe_counter!(def.name, def.description),
            MetricType::Gauge => metrics::describe_gauge!(def.name, def.description),
            MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
        }
    }
}

/// Starts the gateway with a validated config and serves until the
/// listener fails.
pub async fn run(config: config::Config) -> Result<(), GatewayError> {
    describe_metrics();
    let client = UpstreamClient::new(config.upstream.http_timeout_secs)?;

    // validate() guarantees exactly two backends; order defines primacy
    let mut backends = config.backends.into_iter();
    let (primary, secondary) = match (backends.next(), backends.next()) {
        (Some(primary), Some(secondary)) => (primary, secondary),
        _ => {
            return Err(GatewayError::Internal(
                "config must define exactly two backends".to_string(),
            ));
        }
    };
    tracing::info!(
        primary = %primary.name,
        secondary = %secondary.name,
        "replicating operations across backend pair"
    );

    let coordinator = Arc::new(FanOutCoordinator::new(Arc::new(client), primary, secondary));
    let gateway_service = GatewayService::new(coordinator);
    run_http_service(&config.listener.host, config.listener.port, gateway_service).await
}
