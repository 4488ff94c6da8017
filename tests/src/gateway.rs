//! Query execution tests against a live gateway and Redash

use crate::common::E2ETestConfig;
use serde_json::{json, Value};
use tracing::info;

#[tokio::test]
#[ignore] // Run with --ignored flag, requires a running gateway
async fn test_execute_query_hides_query_text() {
    let config = E2ETestConfig::new();
    let (from, to) = config.time_range(60);

    let response = config
        .post_execute("")
        .json(&json!({"parameters": {"fromTime": from, "toTime": to}}))
        .send()
        .await
        .expect("Failed to call execution endpoint");

    let status = response.status();
    let body: Value = response.json().await.expect("Response should be JSON");
    assert!(status.is_success(), "Execution failed: {} {}", status, body);

    assert!(body["query_result"].get("query").is_none());
    assert!(body["query_result"].get("query_hash").is_none());
}

#[tokio::test]
#[ignore] // Run with --ignored flag, requires a running gateway
async fn test_execute_auto_parameters_and_split() {
    let config = E2ETestConfig::new();
    let (from, to) = config.time_range(24 * 60);

    let response = config
        .post_execute("")
        .json(&json!({
            "parameters": {
                "_agg": "auto",
                "_time": "auto",
                "_part": "auto",
                "fromTime": from,
                "toTime": to
            }
        }))
        .send()
        .await
        .expect("Failed to call execution endpoint");

    let status = response.status();
    let body: Value = response.json().await.expect("Response should be JSON");
    info!("Split execution answered {}", status);
    assert!(status.is_success(), "Execution failed: {} {}", status, body);
    assert!(body["query_result"]["data"].is_object());
}

#[tokio::test]
#[ignore] // Run with --ignored flag, requires a running gateway
async fn test_execute_malformed_body_is_rejected() {
    let config = E2ETestConfig::new();

    let response = config
        .post_execute("")
        .header("Content-Type", "application/json")
        .body("{\"parameters\": ")
        .send()
        .await
        .expect("Failed to call execution endpoint");

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("Error response should be JSON");
    assert_eq!(body["category"], "validation");
}
