//! Upstream response types: job state and query results

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, GatewayResult};

/// One result row: column name to value, in column order
pub type Row = Map<String, Value>;

/// Job status reported once the query finished successfully
pub const JOB_STATUS_SUCCEEDED: i64 = 3;

/// Job status reported once the query failed
pub const JOB_STATUS_FAILED: i64 = 4;

/// Asynchronous upstream execution task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub status: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_result_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Job {
    /// Succeeded and failed are both terminal; anything else is still pending
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JOB_STATUS_SUCCEEDED | JOB_STATUS_FAILED)
    }

    /// Result id, treating a missing id as zero
    pub fn result_id(&self) -> i64 {
        self.query_result_id.unwrap_or(0)
    }
}

/// Rows and column descriptors of a query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Row>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<Map<String, Value>>,
}

/// Completed query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_at: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query_hash: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<f64>,

    #[serde(default)]
    pub data: ResultData,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<i64>,
}

/// Upstream response wrapper around job state and result data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResultEnvelope {
    #[serde(default)]
    pub job: Job,

    #[serde(default)]
    pub query_result: QueryResult,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl QueryResultEnvelope {
    /// Parse an upstream response body
    pub fn from_body(body: &str) -> GatewayResult<Self> {
        serde_json::from_str(body).map_err(|e| GatewayError::invalid_upstream(e.to_string()))
    }

    /// Serialize as a response payload
    pub fn to_vec(&self) -> GatewayResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| GatewayError::internal(e.to_string()))
    }

    pub fn rows(&self) -> &[Row] {
        &self.query_result.data.rows
    }

    pub fn row_count(&self) -> usize {
        self.query_result.data.rows.len()
    }

    /// Clear the raw query text
    pub fn clear_query(&mut self) {
        self.query_result.query.clear();
    }

    /// Clear everything that must not be echoed back to clients
    pub fn sanitize(&mut self) {
        self.query_result.query.clear();
        self.query_result.query_hash.clear();
    }
}
