//! Row-wise merge of partition results
//!
//! Partitions are combined in partition-index order. Rows are matched by
//! position: numeric columns are summed, text columns are cleared, and
//! anything else keeps the baseline value.

use serde_json::{Number, Value};
use tracing::debug;

use crate::envelope::{QueryResultEnvelope, Row};
use crate::error::{GatewayError, GatewayResult, PartitionFailure};

/// Kind of a result value as far as merging is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Number,
    Other,
    /// The column is missing from the row
    Absent,
}

impl ValueKind {
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(_)) => ValueKind::Text,
            Some(Value::Number(_)) => ValueKind::Number,
            Some(_) => ValueKind::Other,
            None => ValueKind::Absent,
        }
    }
}

/// Result of dispatching one partition
#[derive(Debug)]
pub struct PartitionOutcome {
    pub partition: usize,
    pub result: GatewayResult<QueryResultEnvelope>,
}

impl PartitionOutcome {
    pub fn new(partition: usize, result: GatewayResult<QueryResultEnvelope>) -> Self {
        Self { partition, result }
    }
}

/// Join partition outcomes into one envelope.
///
/// Outcomes are ordered by partition index first. Any failure fails the whole
/// merge with every partition error listed; partitions without rows are skipped.
pub fn merge_outcomes(mut outcomes: Vec<PartitionOutcome>) -> GatewayResult<QueryResultEnvelope> {
    outcomes.sort_by_key(|outcome| outcome.partition);

    let mut failures = Vec::new();
    let mut envelopes = Vec::with_capacity(outcomes.len());

    for outcome in outcomes {
        match outcome.result {
            Ok(envelope) => envelopes.push(envelope),
            Err(err) => failures.push(PartitionFailure {
                partition: outcome.partition,
                message: err.to_string(),
            }),
        }
    }

    if !failures.is_empty() {
        return Err(GatewayError::PartitionFailures(failures));
    }

    merge_envelopes(envelopes)
}

/// Merge successful partition envelopes; the first one with rows is the baseline
pub fn merge_envelopes(envelopes: Vec<QueryResultEnvelope>) -> GatewayResult<QueryResultEnvelope> {
    let mut surviving = envelopes.into_iter().filter(|e| e.row_count() > 0);

    let mut merged = surviving.next().ok_or(GatewayError::NoPartitionRows)?;

    for envelope in surviving {
        merge_rows(&mut merged.query_result.data.rows, &envelope.query_result.data.rows)?;
    }

    debug!("Merged partitions into {} rows", merged.row_count());
    merged.clear_query();
    Ok(merged)
}

fn merge_rows(baseline: &mut [Row], incoming: &[Row]) -> GatewayResult<()> {
    let baseline_rows = baseline.len();

    for (index, row) in incoming.iter().enumerate() {
        let target = baseline.get_mut(index).ok_or(GatewayError::RowCountMismatch {
            row: index,
            baseline_rows,
        })?;

        for (column, value) in row {
            let current = target.get(column);
            let kind = ValueKind::of(Some(value));
            if ValueKind::of(current) != kind {
                return Err(GatewayError::TypeMismatch {
                    row: index,
                    column: column.clone(),
                });
            }

            match kind {
                ValueKind::Text => {
                    target.insert(column.clone(), Value::String(String::new()));
                }
                ValueKind::Number => {
                    let sum = add_numbers(current, value);
                    target.insert(column.clone(), sum);
                }
                ValueKind::Other | ValueKind::Absent => {}
            }
        }
    }

    Ok(())
}

/// Integers stay integers while they fit; everything else is summed as f64
fn add_numbers(current: Option<&Value>, incoming: &Value) -> Value {
    let (Some(Value::Number(a)), Value::Number(b)) = (current, incoming) else {
        return incoming.clone();
    };

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Value::from(sum);
        }
    }

    let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
    Number::from_f64(sum).map(Value::Number).unwrap_or(Value::Null)
}
