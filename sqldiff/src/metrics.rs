use std::sync::Once;

use metrics::{Unit, describe_counter};

static REGISTER_METRICS: Once = Once::new();

pub const SQLDIFF_ROWS_PROCESSED_TOTAL: &str = "sqldiff_rows_processed_total";
pub const SQLDIFF_DISCREPANCIES_TOTAL: &str = "sqldiff_discrepancies_total";
pub const SQLDIFF_REMOTE_CALLS_TOTAL: &str = "sqldiff_remote_calls_total";
pub const KIND_LABEL: &str = "kind";
pub const OPERATION_LABEL: &str = "operation";
pub const OUTCOME_LABEL: &str = "outcome";

/// Registers the metrics emitted by the worker.
///
/// Safe to call multiple times, the descriptions are registered only once.
pub(crate) fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            SQLDIFF_ROWS_PROCESSED_TOTAL,
            Unit::Count,
            "Total number of rows consumed from both sides of a diff"
        );

        describe_counter!(
            SQLDIFF_DISCREPANCIES_TOTAL,
            Unit::Count,
            "Total number of discrepancies found by diffs, labeled by kind"
        );

        describe_counter!(
            SQLDIFF_REMOTE_CALLS_TOTAL,
            Unit::Count,
            "Total number of replication control calls, labeled by operation and outcome"
        );
    });
}
