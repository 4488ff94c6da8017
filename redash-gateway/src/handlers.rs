use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use redash_gateway_core::error::GatewayError;
use serde_json::{json, Value};
use std::{collections::HashMap, time::Instant};
use tracing::{debug, error, info, warn};

use crate::{dispatch::ExecuteOptions, poller::DispatchContext, AppState};

/// Query flag enabling strict empty-result rejection
const STRICT_EMPTY_FLAG: &str = "crashOnEmpty";

/// Health check endpoint
pub async fn health_handler() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "redash-gateway",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    if !state.config.metrics.enable_prometheus {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(state.metrics.prometheus_format())
}

/// Version endpoint
pub async fn version_handler() -> Json<Value> {
    Json(json!({
        "version": redash_gateway_core::VERSION,
        "service": "redash-gateway",
    }))
}

/// Query execution endpoint
pub async fn execute_handler(
    State(state): State<AppState>,
    Path(query_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let started = Instant::now();

    let credential = headers.get(header::AUTHORIZATION).cloned();
    let options = ExecuteOptions {
        strict_empty: params
            .get(STRICT_EMPTY_FLAG)
            .is_some_and(|flag| flag == "1" || flag.eq_ignore_ascii_case("true")),
    };
    debug!("Received execution request for query {}: {:?}", query_id, options);

    let ctx = DispatchContext::new(query_id.clone(), credential);
    match state.dispatcher.execute(&body, ctx, options).await {
        Ok(envelope) => {
            state.metrics.record_request(started.elapsed(), envelope.row_count());
            info!(
                "Query {} returned {} rows in {:?}",
                query_id,
                envelope.row_count(),
                started.elapsed()
            );
            debug!(
                "Request {} rows {:?}",
                String::from_utf8_lossy(&body),
                envelope.rows()
            );

            let payload = serde_json::to_value(&envelope).map_err(|err| {
                error_response(&GatewayError::internal(err.to_string()))
            })?;
            Ok(Json(payload))
        }
        Err(err) => {
            state.metrics.record_error(started.elapsed());
            match err.category() {
                "validation" | "empty_result" => warn!("Query {} failed: {}", query_id, err),
                _ => error!("Query {} failed: {}", query_id, err),
            }
            Err(error_response(&err))
        }
    }
}

/// Map an error to its HTTP status and JSON body
pub fn error_response(err: &GatewayError) -> (StatusCode, Json<Value>) {
    let status_code = match err.category() {
        "validation" => StatusCode::BAD_REQUEST,
        "upstream_unavailable" | "upstream_rejected" | "upstream_response" | "partition" => {
            StatusCode::BAD_GATEWAY
        }
        "job_timeout" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status_code,
        Json(json!({
            "error": "Query execution failed",
            "message": err.to_string(),
            "category": err.category()
        })),
    )
}
