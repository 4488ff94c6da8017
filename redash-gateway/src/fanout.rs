//! Partition fan-out
//!
//! A splittable request is dispatched once per partition index, concurrently.
//! Join handles are awaited in partition order so every outcome lands in the
//! slot of the partition that produced it, independent of completion order.

use redash_gateway_core::{
    envelope::QueryResultEnvelope,
    error::{GatewayError, GatewayResult},
    merge::{merge_outcomes, PartitionOutcome},
    partition::PARTITION_COUNT,
    request::QueryRequest,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{dispatch::Dispatcher, poller::DispatchContext};

/// Dispatch every partition of `request` and merge the results
pub async fn fan_out(
    dispatcher: &Dispatcher,
    request: &QueryRequest,
    ctx: &Arc<DispatchContext>,
) -> GatewayResult<QueryResultEnvelope> {
    info!(
        "Splitting query {} into {} partitions",
        ctx.query_id, PARTITION_COUNT
    );
    dispatcher.metrics().record_fan_out(PARTITION_COUNT);

    let handles: Vec<_> = (0..PARTITION_COUNT)
        .map(|partition| {
            let dispatcher = dispatcher.clone();
            let ctx = Arc::clone(ctx);
            let request = request.for_partition(partition);
            tokio::spawn(async move { dispatcher.dispatch(request, ctx).await })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(PARTITION_COUNT);
    for (partition, handle) in handles.into_iter().enumerate() {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(GatewayError::internal(format!("partition task failed: {}", err))),
        };

        match &result {
            Ok(envelope) => {
                info!("Part {} returned {} rows", partition, envelope.row_count());
                debug!("Part {} rows {:?}", partition, envelope.rows());
            }
            Err(err) => info!("Part {} failed: {}", partition, err),
        }

        outcomes.push(PartitionOutcome::new(partition, result));
    }

    merge_outcomes(outcomes)
}
