use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::{Side, SourceSpecConfig, ValidationError};

/// Configuration of a single SQL diff worker run.
///
/// Every row returned by the `subset` query must have a counterpart in the rows returned by the
/// `superset` query. Both queries must return rows sorted by their first `key_column_count`
/// columns.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SqlDiffWorkerConfig {
    /// Cell in which the checker replicas are looked up.
    pub cell: String,
    /// The source of truth.
    pub superset: SourceSpecConfig,
    /// The derived data whose rows must all exist in the superset.
    pub subset: SourceSpecConfig,
    /// Number of leading columns forming the comparison key.
    #[serde(default = "default_key_column_count")]
    pub key_column_count: usize,
    /// Upper bound, in milliseconds, of every replication control call.
    #[serde(default = "default_remote_call_timeout_ms")]
    pub remote_call_timeout_ms: u64,
    /// Time, in milliseconds, waited between freezing the subset and the superset replica.
    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,
    /// Upper bound, in milliseconds, of every compensating action run at cleanup.
    #[serde(default = "default_cleanup_action_timeout_ms")]
    pub cleanup_action_timeout_ms: u64,
    /// Maximum number of discrepancy records kept in a diff report.
    ///
    /// Counters in the report stay exact past this limit.
    #[serde(default = "default_max_recorded_discrepancies")]
    pub max_recorded_discrepancies: usize,
}

impl SqlDiffWorkerConfig {
    /// Default number of key columns.
    pub const DEFAULT_KEY_COLUMN_COUNT: usize = 1;
    /// Default timeout of replication control calls.
    pub const DEFAULT_REMOTE_CALL_TIMEOUT_MS: u64 = 60_000;
    /// Default settling interval between the two replication stops.
    pub const DEFAULT_SETTLE_INTERVAL_MS: u64 = 5_000;
    /// Default timeout of cleanup actions.
    pub const DEFAULT_CLEANUP_ACTION_TIMEOUT_MS: u64 = 30_000;
    /// Default cap on recorded discrepancies.
    pub const DEFAULT_MAX_RECORDED_DISCREPANCIES: usize = 1_000;

    /// Creates a configuration with default timeouts for the given cell and sources.
    pub fn new(
        cell: impl Into<String>,
        superset: SourceSpecConfig,
        subset: SourceSpecConfig,
    ) -> Self {
        Self {
            cell: cell.into(),
            superset,
            subset,
            key_column_count: Self::DEFAULT_KEY_COLUMN_COUNT,
            remote_call_timeout_ms: Self::DEFAULT_REMOTE_CALL_TIMEOUT_MS,
            settle_interval_ms: Self::DEFAULT_SETTLE_INTERVAL_MS,
            cleanup_action_timeout_ms: Self::DEFAULT_CLEANUP_ACTION_TIMEOUT_MS,
            max_recorded_discrepancies: Self::DEFAULT_MAX_RECORDED_DISCREPANCIES,
        }
    }

    pub fn remote_call_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_call_timeout_ms)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    pub fn cleanup_action_timeout(&self) -> Duration {
        Duration::from_millis(self.cleanup_action_timeout_ms)
    }

    /// Validates the loaded [`SqlDiffWorkerConfig`].
    ///
    /// A zero settling interval is accepted, it only widens the window between the two
    /// replication stops.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cell.trim().is_empty() {
            return Err(ValidationError::EmptyField("cell"));
        }

        self.superset.validate(Side::Superset)?;
        self.subset.validate(Side::Subset)?;

        if self.key_column_count == 0 {
            return Err(ValidationError::NoKeyColumns);
        }
        if self.remote_call_timeout_ms == 0 {
            return Err(ValidationError::ZeroDuration("remote_call_timeout_ms"));
        }
        if self.cleanup_action_timeout_ms == 0 {
            return Err(ValidationError::ZeroDuration("cleanup_action_timeout_ms"));
        }

        Ok(())
    }
}

fn default_key_column_count() -> usize {
    SqlDiffWorkerConfig::DEFAULT_KEY_COLUMN_COUNT
}

fn default_remote_call_timeout_ms() -> u64 {
    SqlDiffWorkerConfig::DEFAULT_REMOTE_CALL_TIMEOUT_MS
}

fn default_settle_interval_ms() -> u64 {
    SqlDiffWorkerConfig::DEFAULT_SETTLE_INTERVAL_MS
}

fn default_cleanup_action_timeout_ms() -> u64 {
    SqlDiffWorkerConfig::DEFAULT_CLEANUP_ACTION_TIMEOUT_MS
}

fn default_max_recorded_discrepancies() -> usize {
    SqlDiffWorkerConfig::DEFAULT_MAX_RECORDED_DISCREPANCIES
}
