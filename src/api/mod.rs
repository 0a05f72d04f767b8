pub mod handlers;
pub mod models;
pub mod router;

use crate::config::Config;
use crate::scheduler::SchedulerHandle;
use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use std::net::SocketAddr;

pub struct ApiServer {
    scheduler: SchedulerHandle,
}

impl ApiServer {
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self { scheduler }
    }

    /// Binds the server to the configured port and serves until Ctrl+C.
    /// Installs the global Prometheus recorder, so call it once per process.
    pub async fn run(self, config: &Config) -> anyhow::Result<()> {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        let app = router::build(self.scheduler)
            .route("/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));

        tracing::info!("API server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {e}");
                    std::future::pending::<()>().await;
                }
            })
            .await?;

        Ok(())
    }
}
