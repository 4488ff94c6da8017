//! Scripted upstream for unit and integration testing
//!
//! Submissions (bodies carrying `max_age`) answer with a pending job named after
//! the request's `_part`. Each job reports a non-terminal status for the
//! configured number of polls, then a terminal one. Final fetches return the
//! rows scripted for that partition.

use async_trait::async_trait;
use redash_gateway_core::error::{GatewayError, GatewayResult};
use reqwest::header::HeaderValue;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::Duration,
};
use tracing::trace;

use crate::upstream::UpstreamClient;

/// Key used for requests without a `_part` parameter
pub const NO_PARTITION: &str = "none";

/// Result id reported by successful jobs
pub const MOCK_RESULT_ID: i64 = 42;

#[derive(Debug, Default)]
struct MockState {
    /// Rows per `_part` value
    rows: HashMap<String, Vec<Value>>,
    /// Job polls seen so far, per job id
    polls: HashMap<String, u32>,
    /// Bodies received by `execute_query`
    bodies: Vec<Value>,
    /// Credentials received by any call
    credentials: Vec<Option<HeaderValue>>,
}

/// In-memory upstream service
pub struct MockUpstream {
    state: Mutex<MockState>,
    pending_polls: u32,
    reject_body: Option<String>,
    failed_partitions: Vec<String>,
    submit_delays: HashMap<String, Duration>,
    unreachable: bool,
    job_polls: AtomicU64,
}

impl MockUpstream {
    /// Create a mock whose jobs finish on the first poll
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            pending_polls: 0,
            reject_body: None,
            failed_partitions: Vec::new(),
            submit_delays: HashMap::new(),
            unreachable: false,
            job_polls: AtomicU64::new(0),
        }
    }

    /// Rows returned for requests whose `_part` equals `partition`
    pub fn with_rows(self, partition: &str, rows: Value) -> Self {
        let rows = rows.as_array().cloned().unwrap_or_default();
        self.state
            .lock()
            .unwrap()
            .rows
            .insert(partition.to_string(), rows);
        self
    }

    /// Report a pending status this many times before finishing
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Answer submissions with this body and no job id
    pub fn with_rejection(mut self, body: &str) -> Self {
        self.reject_body = Some(body.to_string());
        self
    }

    /// Jobs for this partition end with status 4 and no result id
    pub fn with_failed_partition(mut self, partition: &str) -> Self {
        self.failed_partitions.push(partition.to_string());
        self
    }

    /// Delay submissions for this partition
    pub fn with_submit_delay(mut self, partition: &str, delay: Duration) -> Self {
        self.submit_delays.insert(partition.to_string(), delay);
        self
    }

    /// Fail every call as a transport error
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Total job polls served
    pub fn job_polls(&self) -> u64 {
        self.job_polls.load(Ordering::Relaxed)
    }

    /// Every body received by `execute_query`, in arrival order
    pub fn received_bodies(&self) -> Vec<Value> {
        self.state.lock().unwrap().bodies.clone()
    }

    /// Submission bodies (those carrying `max_age`)
    pub fn submissions(&self) -> Vec<Value> {
        self.received_bodies()
            .into_iter()
            .filter(|body| body.get("max_age").is_some())
            .collect()
    }

    /// Credentials received by any call
    pub fn received_credentials(&self) -> Vec<Option<HeaderValue>> {
        self.state.lock().unwrap().credentials.clone()
    }

    fn partition_of(body: &Value) -> String {
        body.get("parameters")
            .and_then(|p| p.get("_part"))
            .and_then(Value::as_str)
            .unwrap_or(NO_PARTITION)
            .to_string()
    }

    fn job_id(partition: &str) -> String {
        format!("job-{}", partition)
    }
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn execute_query(
        &self,
        query_id: &str,
        credential: Option<&HeaderValue>,
        body: Vec<u8>,
    ) -> GatewayResult<String> {
        if self.unreachable {
            return Err(GatewayError::upstream_unavailable("connection refused"));
        }

        let body: Value = serde_json::from_slice(&body)
            .map_err(|e| GatewayError::internal(format!("mock received invalid JSON: {}", e)))?;
        let partition = Self::partition_of(&body);
        let is_submission = body.get("max_age").is_some();

        {
            let mut state = self.state.lock().unwrap();
            state.bodies.push(body);
            state.credentials.push(credential.cloned());
        }

        if is_submission {
            if let Some(delay) = self.submit_delays.get(&partition) {
                tokio::time::sleep(*delay).await;
            }
            trace!("Mock: submission for query {} partition {}", query_id, partition);

            if let Some(reject) = &self.reject_body {
                return Ok(reject.clone());
            }
            return Ok(json!({"job": {"id": Self::job_id(&partition), "status": 1}}).to_string());
        }

        let rows = self
            .state
            .lock()
            .unwrap()
            .rows
            .get(&partition)
            .cloned()
            .unwrap_or_default();

        Ok(json!({
            "query_result": {
                "retrieved_at": "2021-03-01T00:00:00Z",
                "query_hash": format!("hash-{}", partition),
                "query": format!("SELECT * FROM events WHERE part = '{}'", partition),
                "runtime": 0.25,
                "data": {
                    "rows": rows,
                    "columns": [{"name": "name", "type": "string"}, {"name": "count", "type": "integer"}]
                },
                "id": MOCK_RESULT_ID,
                "data_source_id": 1
            }
        })
        .to_string())
    }

    async fn fetch_job(
        &self,
        job_id: &str,
        credential: Option<&HeaderValue>,
    ) -> GatewayResult<String> {
        if self.unreachable {
            return Err(GatewayError::upstream_unavailable("connection refused"));
        }
        self.job_polls.fetch_add(1, Ordering::Relaxed);

        let polls = {
            let mut state = self.state.lock().unwrap();
            state.credentials.push(credential.cloned());
            let polls = state.polls.entry(job_id.to_string()).or_insert(0);
            *polls += 1;
            *polls
        };

        if polls <= self.pending_polls {
            return Ok(json!({"job": {"id": job_id, "status": 2}}).to_string());
        }

        let failed = self
            .failed_partitions
            .iter()
            .any(|partition| Self::job_id(partition) == job_id);
        let job = if failed {
            json!({"id": job_id, "status": 4, "error": "Query execution failed"})
        } else {
            json!({"id": job_id, "status": 3, "query_result_id": MOCK_RESULT_ID})
        };

        Ok(json!({ "job": job }).to_string())
    }
}
