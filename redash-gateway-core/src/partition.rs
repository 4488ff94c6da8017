//! Partition split policy

use crate::request::{QueryParameters, AUTO, UNPARTITIONED};

/// Fixed number of partitions a split request fans out to
pub const PARTITION_COUNT: usize = 10;

/// What the dispatcher should do with a request's `_part`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionPlan {
    /// `_part` is `auto` and splitting is allowed
    FanOut,
    /// `_part` was `auto` but splitting is forbidden; it now reads `-1`
    Collapsed,
    /// `_part` is absent or concrete; never split further
    Unchanged,
}

/// Decides whether a request may be sharded, based on its `bucket` field
#[derive(Debug, Clone, Default)]
pub struct SplitPolicy {
    allow: String,
}

impl SplitPolicy {
    pub fn new<S: Into<String>>(allow: S) -> Self {
        Self {
            allow: allow.into(),
        }
    }

    /// An empty allow-string permits everything; an empty bucket permits nothing.
    /// Otherwise any bucket token (quotes stripped) found in the allow-string permits.
    pub fn allows(&self, buckets: Option<&str>) -> bool {
        if self.allow.is_empty() {
            return true;
        }

        let buckets = buckets.unwrap_or("");
        if buckets.is_empty() {
            return false;
        }

        buckets
            .split(',')
            .map(|token| token.trim().replace(['\'', '"'], ""))
            .filter(|token| !token.is_empty())
            .any(|token| self.allow.contains(token.as_str()))
    }

    /// Apply the policy, rewriting `_part` to `-1` when an `auto` split is refused
    pub fn plan(&self, params: &mut QueryParameters) -> PartitionPlan {
        if params.part() != Some(AUTO) {
            return PartitionPlan::Unchanged;
        }

        if self.allows(params.bucket()) {
            PartitionPlan::FanOut
        } else {
            params.set_part(UNPARTITIONED);
            PartitionPlan::Collapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn params(part: Option<&str>, bucket: Option<&str>) -> QueryParameters {
        QueryParameters {
            part: part.map(Value::from),
            bucket: bucket.map(Value::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_allow_string_permits_everything() {
        let policy = SplitPolicy::default();
        assert!(policy.allows(None));
        assert!(policy.allows(Some("anything")));
    }

    #[test]
    fn test_missing_bucket_forbids() {
        let policy = SplitPolicy::new("'a','b'");
        assert!(!policy.allows(None));
        assert!(!policy.allows(Some("")));
    }

    #[test]
    fn test_bucket_token_match() {
        assert!(SplitPolicy::new("'a','b'").allows(Some("a,c")));
        assert!(SplitPolicy::new("'a','b'").allows(Some("'c','b'")));
        assert!(!SplitPolicy::new("'a'").allows(Some("c")));
        assert!(!SplitPolicy::new("'a'").allows(Some("c,")));
    }

    #[test]
    fn test_plan_fan_out() {
        let mut p = params(Some("auto"), Some("a,c"));
        assert_eq!(SplitPolicy::new("'a','b'").plan(&mut p), PartitionPlan::FanOut);
        assert_eq!(p.part(), Some("auto"));
    }

    #[test]
    fn test_plan_collapses_forbidden_split() {
        let mut p = params(Some("auto"), Some("c"));
        assert_eq!(SplitPolicy::new("'a'").plan(&mut p), PartitionPlan::Collapsed);
        assert_eq!(p.part(), Some("-1"));
    }

    #[test]
    fn test_plan_leaves_concrete_partition() {
        let policy = SplitPolicy::default();

        let mut p = params(Some("3"), Some("a"));
        assert_eq!(policy.plan(&mut p), PartitionPlan::Unchanged);
        assert_eq!(p.part(), Some("3"));

        let mut p = params(None, None);
        assert_eq!(policy.plan(&mut p), PartitionPlan::Unchanged);
        assert!(p.part.is_none());
    }

    #[test]
    fn test_plan_ignores_non_string_values() {
        let policy = SplitPolicy::new("'a'");

        let mut p = QueryParameters {
            part: Some(json!(3)),
            ..Default::default()
        };
        assert_eq!(policy.plan(&mut p), PartitionPlan::Unchanged);
        assert_eq!(p.part, Some(json!(3)));

        // a non-string bucket counts as no bucket
        let mut p = QueryParameters {
            part: Some(json!("auto")),
            bucket: Some(json!(["a"])),
            ..Default::default()
        };
        assert_eq!(policy.plan(&mut p), PartitionPlan::Collapsed);
        assert_eq!(p.part(), Some("-1"));
        assert_eq!(p.bucket, Some(json!(["a"])));
    }
}
