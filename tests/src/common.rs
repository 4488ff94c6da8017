//! Common utilities for E2E tests

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_GATEWAY_BASE_URL: &str = "http://localhost:8080";

/// Layout of `fromTime` / `toTime` values sent by the tests
pub const TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

/// Test configuration and utilities
pub struct E2ETestConfig {
    pub client: Client,
    pub base_url: String,
    pub query_id: String,
    pub api_key: Option<String>,
}

impl E2ETestConfig {
    pub fn new() -> Self {
        // Fan-out and polling can take up to max_wait seconds
        let client = Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GATEWAY_BASE_URL.to_string()),
            query_id: std::env::var("GATEWAY_TEST_QUERY_ID").unwrap_or_else(|_| "1".to_string()),
            api_key: std::env::var("GATEWAY_TEST_API_KEY").ok(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn execute_url(&self) -> String {
        self.url(&format!("/api/queries/{}/results", self.query_id))
    }

    /// `fromTime` / `toTime` covering the last `minutes` minutes
    pub fn time_range(&self, minutes: i64) -> (String, String) {
        let to = Utc::now();
        let from = to - ChronoDuration::minutes(minutes);
        (
            from.format(TIME_LAYOUT).to_string(),
            to.format(TIME_LAYOUT).to_string(),
        )
    }

    pub fn post_execute(&self, query: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.post(format!("{}{}", self.execute_url(), query));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key);
        }
        request
    }
}

impl Default for E2ETestConfig {
    fn default() -> Self {
        Self::new()
    }
}
