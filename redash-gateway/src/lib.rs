//! Redash Gateway Service Library
//!
//! This library provides the components of the query-execution gateway:
//! upstream access, job polling, partition fan-out, and HTTP handlers.

// Core modules
pub mod config;
pub mod dispatch;
pub mod fanout;
pub mod handlers;
pub mod metrics;
pub mod mock_upstream;
pub mod poller;
pub mod upstream;

// Re-export commonly used types
pub use config::GatewayConfig;
pub use dispatch::{Dispatcher, ExecuteOptions};
pub use metrics::GatewayMetricsCollector;
pub use poller::DispatchContext;
pub use upstream::{HttpUpstream, UpstreamClient};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: std::sync::Arc<GatewayConfig>,
    pub metrics: std::sync::Arc<GatewayMetricsCollector>,
}

impl AppState {
    /// Wire a dispatcher and metrics collector around an upstream client
    pub fn new(
        config: std::sync::Arc<GatewayConfig>,
        upstream: std::sync::Arc<dyn UpstreamClient>,
    ) -> Self {
        let metrics = std::sync::Arc::new(GatewayMetricsCollector::new());
        let dispatcher = Dispatcher::from_config(&config, upstream, metrics.clone());
        Self {
            dispatcher,
            config,
            metrics,
        }
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> axum::Router {
    use crate::handlers::*;
    use axum::routing::{get, post};
    use tower::ServiceBuilder;
    use tower_http::{cors::CorsLayer, trace::TraceLayer};

    axum::Router::new()
        .route(&state.config.health.health_path, get(health_handler))
        .route(&state.config.metrics.metrics_path, get(metrics_handler))
        .route("/api/v1/version", get(version_handler))
        .route("/api/queries/:query/results", post(execute_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
