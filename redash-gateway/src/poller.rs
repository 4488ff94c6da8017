//! Job submission and status polling
//!
//! A query is submitted with a freshness marker, the returned job is polled at
//! a fixed interval until it reaches a terminal status, and the completed
//! result is then fetched with the marker removed.

use redash_gateway_core::{
    envelope::QueryResultEnvelope,
    error::{GatewayError, GatewayResult},
};
use reqwest::header::HeaderValue;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::{metrics::GatewayMetricsCollector, upstream::UpstreamClient};

/// Who is asking for which query.
///
/// The credential is the caller's raw `Authorization` header value, forwarded
/// byte for byte.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub query_id: String,
    pub credential: Option<HeaderValue>,
}

impl DispatchContext {
    pub fn new(query_id: impl Into<String>, credential: Option<HeaderValue>) -> Self {
        Self {
            query_id: query_id.into(),
            credential,
        }
    }

    pub fn credential(&self) -> Option<&HeaderValue> {
        self.credential.as_ref()
    }
}

/// Runs the submit / poll / fetch cycle for one query
pub struct JobPoller {
    upstream: Arc<dyn UpstreamClient>,
    metrics: Arc<GatewayMetricsCollector>,
    max_wait: u32,
    poll_interval: Duration,
}

impl JobPoller {
    pub fn new(
        upstream: Arc<dyn UpstreamClient>,
        metrics: Arc<GatewayMetricsCollector>,
        max_wait: u32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            upstream,
            metrics,
            max_wait,
            poll_interval,
        }
    }

    /// Submit `submit_body`, wait for the job, then fetch with `fetch_body`.
    ///
    /// Returns the raw body of the final fetch.
    pub async fn run(
        &self,
        ctx: &DispatchContext,
        submit_body: Vec<u8>,
        fetch_body: Vec<u8>,
    ) -> GatewayResult<String> {
        self.metrics.record_submission();
        let raw = self
            .upstream
            .execute_query(&ctx.query_id, ctx.credential(), submit_body)
            .await?;

        // Anything without a job id is an upstream rejection, whatever its shape
        let job_id = match serde_json::from_str::<QueryResultEnvelope>(&raw) {
            Ok(envelope) if !envelope.job.id.is_empty() => envelope.job.id,
            _ => return Err(GatewayError::UpstreamRejected(raw)),
        };
        debug!("Query {} submitted as job {}", ctx.query_id, job_id);

        let result_id = self.wait_for_job(ctx, &job_id).await?;
        if result_id == 0 {
            warn!("Job {} finished without a query result", job_id);
            return Err(GatewayError::EmptyJob { job_id });
        }
        debug!("Job {} produced query result {}", job_id, result_id);

        self.upstream
            .execute_query(&ctx.query_id, ctx.credential(), fetch_body)
            .await
    }

    /// Poll until a terminal status or `max_wait` polls; 0 means no result id
    async fn wait_for_job(&self, ctx: &DispatchContext, job_id: &str) -> GatewayResult<i64> {
        for attempt in 1..=self.max_wait {
            self.metrics.record_job_poll();
            let raw = self.upstream.fetch_job(job_id, ctx.credential()).await?;
            let envelope = QueryResultEnvelope::from_body(&raw)?;

            if envelope.job.is_terminal() {
                if !envelope.job.error.is_empty() {
                    warn!(
                        "Job {} ended with status {}: {}",
                        job_id, envelope.job.status, envelope.job.error
                    );
                }
                return Ok(envelope.job.result_id());
            }

            if attempt < self.max_wait {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        warn!("Job {} still pending after {} polls", job_id, self.max_wait);
        Ok(0)
    }
}
