//! Error types for gateway dispatch operations

use std::fmt;
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// A single partition's failure, kept with the partition index it was dispatched as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFailure {
    pub partition: usize,
    pub message: String,
}

impl fmt::Display for PartitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition {}: {}", self.partition, self.message)
    }
}

/// Every way a dispatch can fail. All of them are terminal for the request.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Upstream unreachable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream answered without a job id. The body is kept verbatim.
    #[error("{0}")]
    UpstreamRejected(String),

    #[error("Invalid upstream response: {0}")]
    InvalidUpstreamResponse(String),

    #[error("Empty job {job_id}: no query result was produced")]
    EmptyJob { job_id: String },

    #[error("Partition dispatch failed: {}", join_failures(.0))]
    PartitionFailures(Vec<PartitionFailure>),

    #[error("Merge failed: row {row} exceeds baseline row count {baseline_rows}")]
    RowCountMismatch { row: usize, baseline_rows: usize },

    #[error("Merge failed: column '{column}' in row {row} has mismatched types")]
    TypeMismatch { row: usize, column: String },

    #[error("Merge failed: no partition returned rows")]
    NoPartitionRows,

    #[error("Empty result")]
    EmptyResult,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_failures(failures: &[PartitionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl GatewayError {
    /// Create a new malformed request error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedRequest(message.into())
    }

    /// Create a new upstream transport error
    pub fn upstream_unavailable<S: Into<String>>(message: S) -> Self {
        Self::UpstreamUnavailable(message.into())
    }

    /// Create a new invalid upstream response error
    pub fn invalid_upstream<S: Into<String>>(message: S) -> Self {
        Self::InvalidUpstreamResponse(message.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error category for status mapping and metrics
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::MalformedRequest(_) => "validation",
            GatewayError::UpstreamUnavailable(_) => "upstream_unavailable",
            GatewayError::UpstreamRejected(_) => "upstream_rejected",
            GatewayError::InvalidUpstreamResponse(_) => "upstream_response",
            GatewayError::EmptyJob { .. } => "job_timeout",
            GatewayError::PartitionFailures(_) => "partition",
            GatewayError::RowCountMismatch { .. } => "merge",
            GatewayError::TypeMismatch { .. } => "merge",
            GatewayError::NoPartitionRows => "merge",
            GatewayError::EmptyResult => "empty_result",
            GatewayError::Configuration(_) => "configuration",
            GatewayError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_failures_are_joined() {
        let err = GatewayError::PartitionFailures(vec![
            PartitionFailure {
                partition: 2,
                message: "Empty job j2: no query result was produced".to_string(),
            },
            PartitionFailure {
                partition: 7,
                message: "Upstream unreachable: connection refused".to_string(),
            },
        ]);

        assert_eq!(
            err.to_string(),
            "Partition dispatch failed: partition 2: Empty job j2: no query result was produced, \
             partition 7: Upstream unreachable: connection refused"
        );
        assert_eq!(err.category(), "partition");
    }

    #[test]
    fn test_rejected_body_is_verbatim() {
        let body = r#"{"message": "Query not found"}"#;
        let err = GatewayError::UpstreamRejected(body.to_string());
        assert_eq!(err.to_string(), body);
        assert_eq!(err.category(), "upstream_rejected");
    }
}
