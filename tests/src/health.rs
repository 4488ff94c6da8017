//! Health check tests

use crate::common::E2ETestConfig;
use serde_json::Value;
use tracing::info;

#[tokio::test]
#[ignore] // Run with --ignored flag, requires a running gateway
async fn test_gateway_health() {
    let config = E2ETestConfig::new();

    info!("Checking gateway health at {}", config.base_url);
    let response = config
        .client
        .get(config.url("/health"))
        .send()
        .await
        .expect("Failed to connect to gateway - is it running?");

    assert!(
        response.status().is_success(),
        "Gateway health check failed: {}",
        response.status()
    );

    let health: Value = response
        .json()
        .await
        .expect("Health response should be valid JSON");
    assert_eq!(health["service"], "redash-gateway");
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
#[ignore] // Run with --ignored flag, requires a running gateway
async fn test_gateway_metrics() {
    let config = E2ETestConfig::new();

    let response = config
        .client
        .get(config.url("/metrics"))
        .send()
        .await
        .expect("Failed to call metrics endpoint");
    assert!(response.status().is_success());

    let body = response.text().await.unwrap_or_default();
    assert!(body.contains("redash_gateway_requests_total"));
}
