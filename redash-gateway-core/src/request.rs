//! Inbound query-execution request
//!
//! The request body is an open JSON document. Only the control keys under
//! `parameters` are typed; everything else is carried through verbatim, in the
//! order the caller sent it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, GatewayResult};

/// Literal value that asks the gateway to compute a parameter
pub const AUTO: &str = "auto";

/// `_part` value sent upstream when a request is not split
pub const UNPARTITIONED: &str = "-1";

/// Freshness marker injected on submission so the upstream re-runs the query
pub const FRESHNESS_MAX_AGE: u64 = 1;

/// Query-execution request body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<QueryParameters>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<Value>,

    /// Unrecognized top-level keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `parameters` object of a request.
///
/// Control keys keep whatever JSON the caller sent so they round-trip
/// unchanged; the accessors only see string values. Any other type reads as
/// absent, which means "not auto", "no bucket" or "unparseable time".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParameters {
    /// Table (time bucket) name, or `auto`
    #[serde(
        rename = "_agg",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub agg: Option<Value>,

    /// Aggregation function name, or `auto`
    #[serde(
        rename = "_time",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<Value>,

    /// Partition index, `auto`, or `-1`
    #[serde(
        rename = "_part",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub part: Option<Value>,

    /// Comma separated, possibly quoted, bucket list
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub bucket: Option<Value>,

    #[serde(
        rename = "fromTime",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub from_time: Option<Value>,

    #[serde(
        rename = "toTime",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub to_time: Option<Value>,

    /// Fallback end time used when `toTime` is missing
    #[serde(
        rename = "Time",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_fallback: Option<Value>,

    /// Caller parameters passed through unmodified
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keeps an explicit `null` as `Some(Value::Null)` instead of dropping the key
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn text(value: &Option<Value>) -> Option<&str> {
    value.as_ref().and_then(Value::as_str)
}

impl QueryRequest {
    /// Parse a raw request body
    pub fn from_slice(body: &[u8]) -> GatewayResult<Self> {
        serde_json::from_slice(body).map_err(|e| GatewayError::malformed(e.to_string()))
    }

    /// Serialize for sending upstream
    pub fn to_vec(&self) -> GatewayResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| GatewayError::internal(e.to_string()))
    }

    /// Copy of this request carrying the freshness marker
    pub fn with_freshness(&self) -> Self {
        Self {
            max_age: Some(Value::from(FRESHNESS_MAX_AGE)),
            ..self.clone()
        }
    }

    /// Copy of this request without any freshness marker
    pub fn without_freshness(&self) -> Self {
        Self {
            max_age: None,
            ..self.clone()
        }
    }

    /// Copy of this request pinned to one partition
    pub fn for_partition(&self, partition: usize) -> Self {
        let mut request = self.clone();
        request
            .parameters
            .get_or_insert_with(QueryParameters::default)
            .set_part(partition.to_string());
        request
    }

    /// The `_part` value, if any
    pub fn partition(&self) -> Option<&str> {
        self.parameters.as_ref().and_then(QueryParameters::part)
    }
}

impl QueryParameters {
    pub fn agg(&self) -> Option<&str> {
        text(&self.agg)
    }

    pub fn time(&self) -> Option<&str> {
        text(&self.time)
    }

    pub fn part(&self) -> Option<&str> {
        text(&self.part)
    }

    pub fn bucket(&self) -> Option<&str> {
        text(&self.bucket)
    }

    pub fn from_time(&self) -> Option<&str> {
        text(&self.from_time)
    }

    /// End of the requested range: `toTime` when present, otherwise `Time`
    pub fn end_time(&self) -> Option<&str> {
        match &self.to_time {
            Some(value) => value.as_str(),
            None => text(&self.time_fallback),
        }
    }

    pub fn set_agg(&mut self, agg: impl Into<String>) {
        self.agg = Some(Value::String(agg.into()));
    }

    pub fn set_time(&mut self, time: impl Into<String>) {
        self.time = Some(Value::String(time.into()));
    }

    pub fn set_part(&mut self, part: impl Into<String>) {
        self.part = Some(Value::String(part.into()));
    }

    /// Whether either `_agg` or `_time` asks for resolution
    pub fn wants_auto_resolution(&self) -> bool {
        self.agg() == Some(AUTO) || self.time() == Some(AUTO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_preserves_pass_through_keys() {
        let body = json!({
            "parameters": {
                "_agg": "auto",
                "fromTime": "2021-01-01 00:00:00",
                "country": "VN",
                "limit": 10
            },
            "id": 12,
            "apply_auto_limit": false
        })
        .to_string();

        let request = QueryRequest::from_slice(body.as_bytes()).unwrap();
        let params = request.parameters.as_ref().unwrap();
        assert_eq!(params.agg(), Some("auto"));
        assert_eq!(params.extra["country"], json!("VN"));
        assert_eq!(params.extra["limit"], json!(10));
        assert_eq!(request.extra["id"], json!(12));

        let round: Value = serde_json::from_slice(&request.to_vec().unwrap()).unwrap();
        assert_eq!(round["parameters"]["country"], json!("VN"));
        assert_eq!(round["apply_auto_limit"], json!(false));
        assert!(round.get("max_age").is_none());
    }

    #[test]
    fn test_malformed_body() {
        let err = QueryRequest::from_slice(b"{not json").unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_freshness_marker() {
        let request = QueryRequest::default().with_freshness();
        let value: Value = serde_json::from_slice(&request.to_vec().unwrap()).unwrap();
        assert_eq!(value["max_age"], json!(1));

        let stripped = request.without_freshness();
        assert!(stripped.max_age.is_none());
    }

    #[test]
    fn test_for_partition_overwrites_part() {
        let body = json!({"parameters": {"_part": "auto", "bucket": "a"}}).to_string();
        let request = QueryRequest::from_slice(body.as_bytes()).unwrap();

        let pinned = request.for_partition(7);
        assert_eq!(pinned.partition(), Some("7"));
        assert_eq!(request.partition(), Some("auto"));
    }

    #[test]
    fn test_end_time_falls_back_to_time() {
        let params = QueryParameters {
            time_fallback: Some(json!("2021-01-02 00:00:00")),
            ..Default::default()
        };
        assert_eq!(params.end_time(), Some("2021-01-02 00:00:00"));

        // a present but non-string toTime does not fall back
        let params = QueryParameters {
            to_time: Some(json!(1614556800)),
            time_fallback: Some(json!("2021-01-02 00:00:00")),
            ..Default::default()
        };
        assert_eq!(params.end_time(), None);
    }

    #[test]
    fn test_non_string_control_keys_round_trip() {
        let body = json!({
            "parameters": {
                "_agg": "auto",
                "_part": 3,
                "bucket": ["a", "b"],
                "fromTime": 1614556800,
                "toTime": null
            }
        })
        .to_string();

        let request = QueryRequest::from_slice(body.as_bytes()).unwrap();
        let params = request.parameters.as_ref().unwrap();
        assert_eq!(params.part(), None);
        assert_eq!(params.bucket(), None);
        assert_eq!(params.from_time(), None);
        assert!(params.wants_auto_resolution());

        let round: Value = serde_json::from_slice(&request.to_vec().unwrap()).unwrap();
        assert_eq!(round["parameters"]["_part"], json!(3));
        assert_eq!(round["parameters"]["bucket"], json!(["a", "b"]));
        assert_eq!(round["parameters"]["fromTime"], json!(1614556800));
        assert_eq!(round["parameters"]["toTime"], Value::Null);
        assert!(round["parameters"].as_object().unwrap().contains_key("toTime"));
    }
}
