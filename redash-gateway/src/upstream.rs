//! Upstream BI service client
//!
//! The gateway only needs two calls: submit/fetch query results and fetch job
//! status. Both return the raw response body so that upstream error payloads
//! can be surfaced to callers verbatim.

use async_trait::async_trait;
use redash_gateway_core::error::{GatewayError, GatewayResult};
use reqwest::{
    header::{self, HeaderValue},
    Client,
};
use std::time::Duration;
use tracing::{debug, trace};

/// Outbound calls against the upstream service
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// `POST /api/queries/{query_id}/results`
    async fn execute_query(
        &self,
        query_id: &str,
        credential: Option<&HeaderValue>,
        body: Vec<u8>,
    ) -> GatewayResult<String>;

    /// `GET /api/jobs/{job_id}`
    async fn fetch_job(
        &self,
        job_id: &str,
        credential: Option<&HeaderValue>,
    ) -> GatewayResult<String>;
}

/// HTTP implementation backed by `reqwest`
pub struct HttpUpstream {
    base_url: String,
    client: Client,
}

impl HttpUpstream {
    /// Create a new upstream client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn query_results_url(&self, query_id: &str) -> String {
        format!("{}/api/queries/{}/results", self.base_url, query_id)
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/api/jobs/{}", self.base_url, job_id)
    }

    async fn read_body(response: reqwest::Response) -> GatewayResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::upstream_unavailable(e.to_string()))?;
        trace!("Upstream answered {} with {} bytes", status, body.len());
        Ok(body)
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn execute_query(
        &self,
        query_id: &str,
        credential: Option<&HeaderValue>,
        body: Vec<u8>,
    ) -> GatewayResult<String> {
        let url = self.query_results_url(query_id);
        debug!("POST {} {}", url, String::from_utf8_lossy(&body));

        let mut request = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(credential) = credential {
            request = request.header(header::AUTHORIZATION, credential.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::upstream_unavailable(e.to_string()))?;

        Self::read_body(response).await
    }

    async fn fetch_job(
        &self,
        job_id: &str,
        credential: Option<&HeaderValue>,
    ) -> GatewayResult<String> {
        let url = self.job_url(job_id);
        trace!("GET {}", url);

        let mut request = self
            .client
            .get(&url)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(credential) = credential {
            request = request.header(header::AUTHORIZATION, credential.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::upstream_unavailable(e.to_string()))?;

        Self::read_body(response).await
    }
}
