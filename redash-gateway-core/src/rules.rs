//! Time-bucket and aggregation-function rules
//!
//! Both rule lists are evaluated in configured order. Time buckets are
//! first-match; aggregation functions pick the rule with the largest block
//! count still under `max_block`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::request::{QueryParameters, AUTO};
use crate::time::TimeLayout;

/// `to_seconds` value marking an open-ended bucket
pub const OPEN_ENDED: i64 = -1;

/// Maps a time span to a table (bucket) name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucketRule {
    pub name: String,

    #[serde(alias = "from", rename = "fromSeconds")]
    pub from_seconds: i64,

    #[serde(alias = "to", rename = "toSeconds")]
    pub to_seconds: i64,
}

/// Maps a time span to an aggregation function name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggFuncRule {
    pub name: String,

    #[serde(alias = "time", rename = "thresholdSeconds")]
    pub threshold_seconds: i64,
}

impl TimeBucketRule {
    pub fn new<S: Into<String>>(name: S, from_seconds: i64, to_seconds: i64) -> Self {
        Self {
            name: name.into(),
            from_seconds,
            to_seconds,
        }
    }

    /// Exclusive on both ends
    pub fn matches(&self, diff: i64) -> bool {
        self.from_seconds < diff && (self.to_seconds > diff || self.to_seconds == OPEN_ENDED)
    }
}

impl AggFuncRule {
    pub fn new<S: Into<String>>(name: S, threshold_seconds: i64) -> Self {
        Self {
            name: name.into(),
            threshold_seconds,
        }
    }
}

/// First bucket whose range contains `diff`; empty name when none does
pub fn select_time_bucket(rules: &[TimeBucketRule], diff: i64) -> &str {
    rules
        .iter()
        .find(|rule| rule.matches(diff))
        .map(|rule| rule.name.as_str())
        .unwrap_or("")
}

/// Aggregation function with the largest block count under `max_block`.
///
/// A rule only qualifies with a positive block count that beats the best so
/// far, so ties keep the earlier rule. With no qualifying rule the last
/// configured rule is used. `None` only when `rules` is empty.
pub fn select_agg_func(rules: &[AggFuncRule], max_block: i64, diff: i64) -> Option<&str> {
    let mut selected = rules.last()?;
    let mut best_block = 0;

    for rule in rules.iter().filter(|rule| rule.threshold_seconds > 0) {
        let block = diff / rule.threshold_seconds;
        if block < max_block && block > best_block {
            selected = rule;
            best_block = block;
        }
    }

    Some(selected.name.as_str())
}

/// Resolves `_agg` / `_time` values of `auto` from the requested time span
#[derive(Debug, Clone)]
pub struct AutoParameterResolver {
    layout: TimeLayout,
    time_buckets: Vec<TimeBucketRule>,
    agg_funcs: Vec<AggFuncRule>,
    max_block: i64,
}

impl AutoParameterResolver {
    pub fn new(
        layout: TimeLayout,
        time_buckets: Vec<TimeBucketRule>,
        agg_funcs: Vec<AggFuncRule>,
        max_block: i64,
    ) -> Self {
        Self {
            layout,
            time_buckets,
            agg_funcs,
            max_block,
        }
    }

    /// Rewrite `auto` control values in place.
    ///
    /// Missing or unparseable timestamps leave the parameters untouched.
    pub fn resolve(&self, params: &mut QueryParameters) {
        if !params.wants_auto_resolution() {
            return;
        }

        let (Some(from), Some(to)) = (params.from_time(), params.end_time()) else {
            debug!("Skipping auto parameters: time range is incomplete");
            return;
        };

        let Some(diff) = self.layout.span_seconds(from, to) else {
            debug!(
                "Skipping auto parameters: '{}' / '{}' do not match layout '{}'",
                from,
                to,
                self.layout.format()
            );
            return;
        };

        if params.agg() == Some(AUTO) {
            let table = select_time_bucket(&self.time_buckets, diff);
            debug!("Resolved _agg for {}s span to '{}'", diff, table);
            params.set_agg(table);
        }

        if params.time() == Some(AUTO) {
            match select_agg_func(&self.agg_funcs, self.max_block, diff) {
                Some(func) => {
                    debug!("Resolved _time for {}s span to '{}'", diff, func);
                    params.set_time(func);
                }
                None => debug!("Skipping _time resolution: no aggregation rules configured"),
            }
        }
    }
}
