//! Dispatch orchestration
//!
//! `execute` is the entry point for one inbound request. `dispatch` is the
//! recursive step: it resolves auto parameters, applies the split policy, and
//! either fans out (each partition re-entering `dispatch` with a concrete
//! `_part`, which can never split again) or runs the job poller directly.

use futures::future::{BoxFuture, FutureExt};
use redash_gateway_core::{
    envelope::QueryResultEnvelope,
    error::{GatewayError, GatewayResult},
    partition::{PartitionPlan, SplitPolicy},
    request::QueryRequest,
    rules::AutoParameterResolver,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    config::GatewayConfig,
    fanout::fan_out,
    metrics::GatewayMetricsCollector,
    poller::{DispatchContext, JobPoller},
    upstream::UpstreamClient,
};

/// Caller options that apply to the top-level request only
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Fail with `EmptyResult` instead of returning zero rows
    pub strict_empty: bool,
}

/// Top-level dispatcher; cheap to clone into partition tasks
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<AutoParameterResolver>,
    split_policy: Arc<SplitPolicy>,
    poller: Arc<JobPoller>,
    metrics: Arc<GatewayMetricsCollector>,
}

impl Dispatcher {
    pub fn new(
        resolver: AutoParameterResolver,
        split_policy: SplitPolicy,
        poller: JobPoller,
        metrics: Arc<GatewayMetricsCollector>,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            split_policy: Arc::new(split_policy),
            poller: Arc::new(poller),
            metrics,
        }
    }

    /// Build a dispatcher from configuration and an upstream client
    pub fn from_config(
        config: &GatewayConfig,
        upstream: Arc<dyn UpstreamClient>,
        metrics: Arc<GatewayMetricsCollector>,
    ) -> Self {
        let poller = JobPoller::new(
            upstream,
            metrics.clone(),
            config.dispatch.max_wait,
            config.poll_interval(),
        );
        Self::new(config.resolver(), config.split_policy(), poller, metrics)
    }

    pub fn metrics(&self) -> &GatewayMetricsCollector {
        &self.metrics
    }

    /// Handle one inbound request body and return the sanitized result
    pub async fn execute(
        &self,
        body: &[u8],
        ctx: DispatchContext,
        options: ExecuteOptions,
    ) -> GatewayResult<QueryResultEnvelope> {
        let request = QueryRequest::from_slice(body)?;

        let mut envelope = self.dispatch(request, Arc::new(ctx)).await?;
        envelope.sanitize();

        if options.strict_empty && envelope.row_count() == 0 {
            self.metrics.record_empty_result();
            return Err(GatewayError::EmptyResult);
        }

        Ok(envelope)
    }

    /// Dispatch one request, splitting it when its `_part` is `auto`
    pub fn dispatch(
        &self,
        request: QueryRequest,
        ctx: Arc<DispatchContext>,
    ) -> BoxFuture<'static, GatewayResult<QueryResultEnvelope>> {
        let this = self.clone();
        async move { this.dispatch_inner(request, ctx).await }.boxed()
    }

    async fn dispatch_inner(
        &self,
        mut request: QueryRequest,
        ctx: Arc<DispatchContext>,
    ) -> GatewayResult<QueryResultEnvelope> {
        if let Some(params) = request.parameters.as_mut() {
            self.resolver.resolve(params);

            match self.split_policy.plan(params) {
                PartitionPlan::FanOut => return fan_out(self, &request, &ctx).await,
                PartitionPlan::Collapsed => {
                    info!("Split not allowed for query {}, running unpartitioned", ctx.query_id)
                }
                PartitionPlan::Unchanged => {}
            }
        }

        let submit_body = request.with_freshness().to_vec()?;
        let fetch_body = request.without_freshness().to_vec()?;

        let raw = self.poller.run(&ctx, submit_body, fetch_body).await?;
        let envelope = QueryResultEnvelope::from_body(&raw)?;
        debug!(
            "Query {} partition {:?} returned {} rows",
            ctx.query_id,
            request.partition(),
            envelope.row_count()
        );

        Ok(envelope)
    }
}
