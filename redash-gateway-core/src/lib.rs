//! # Redash Gateway Core Library
//!
//! Domain types and pure algorithms shared by the gateway service:
//!
//! - **Requests**: query-execution bodies with typed control parameters
//! - **Envelopes**: upstream job state and query results
//! - **Rules**: time-bucket and aggregation-function auto resolution
//! - **Partitioning**: the split policy and partition-ordered result merge

pub mod envelope;
pub mod error;
pub mod merge;
pub mod partition;
pub mod request;
pub mod rules;
pub mod time;

// Re-export commonly used types
pub use envelope::{Job, QueryResult, QueryResultEnvelope, Row};
pub use error::{GatewayError, GatewayResult, PartitionFailure};
pub use merge::{merge_outcomes, PartitionOutcome, ValueKind};
pub use partition::{PartitionPlan, SplitPolicy, PARTITION_COUNT};
pub use request::{QueryParameters, QueryRequest};
pub use rules::{AggFuncRule, AutoParameterResolver, TimeBucketRule};
pub use time::TimeLayout;

/// Version information for the gateway
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
