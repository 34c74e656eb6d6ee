use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::types::{Row, Value};

/// Category of a row found to differ between two streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// A superset row has no counterpart in the subset.
    MissingFromSubset,
    /// A subset row has no counterpart in the superset.
    MissingFromSuperset,
    /// Both streams have the key but the remaining columns differ.
    ValueMismatch,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::MissingFromSubset => "missing_from_subset",
            DiscrepancyKind::MissingFromSuperset => "missing_from_superset",
            DiscrepancyKind::ValueMismatch => "value_mismatch",
        }
    }
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row that differs between the superset and the subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    /// Values of the key columns.
    pub key: Vec<Value>,
    pub superset_row: Option<Row>,
    pub subset_row: Option<Row>,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at key (", self.kind)?;
        for (i, value) in self.key.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")?;

        if let Some(row) = &self.superset_row {
            write!(f, " superset={row}")?;
        }
        if let Some(row) = &self.subset_row {
            write!(f, " subset={row}")?;
        }

        Ok(())
    }
}

/// Outcome of a diff between two streams.
///
/// Counters are exact. At most `max_recorded_discrepancies` [`Discrepancy`] records are
/// kept, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    processed_rows: u64,
    matching_rows: u64,
    mismatched_rows: u64,
    missing_from_superset: u64,
    missing_from_subset: u64,
    extra_superset_rows: u64,
    rows_per_second: f64,
    max_recorded_discrepancies: usize,
    discrepancies: Vec<Discrepancy>,
}

impl DiffReport {
    pub(crate) fn new(max_recorded_discrepancies: usize) -> Self {
        Self {
            max_recorded_discrepancies,
            ..Self::default()
        }
    }

    pub(crate) fn row_processed(&mut self) {
        self.processed_rows += 1;
    }

    pub(crate) fn row_matched(&mut self) {
        self.matching_rows += 1;
    }

    pub(crate) fn extra_superset_row(&mut self) {
        self.extra_superset_rows += 1;
    }

    pub(crate) fn record(&mut self, discrepancy: Discrepancy) {
        match discrepancy.kind {
            DiscrepancyKind::MissingFromSubset => self.missing_from_subset += 1,
            DiscrepancyKind::MissingFromSuperset => self.missing_from_superset += 1,
            DiscrepancyKind::ValueMismatch => self.mismatched_rows += 1,
        }

        if self.discrepancies.len() < self.max_recorded_discrepancies {
            self.discrepancies.push(discrepancy);
        }
    }

    pub(crate) fn complete(&mut self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        self.rows_per_second = if seconds > 0.0 {
            self.processed_rows as f64 / seconds
        } else {
            0.0
        };
    }

    /// Rows consumed from both streams.
    pub fn processed_rows(&self) -> u64 {
        self.processed_rows
    }

    pub fn matching_rows(&self) -> u64 {
        self.matching_rows
    }

    pub fn mismatched_rows(&self) -> u64 {
        self.mismatched_rows
    }

    pub fn missing_from_superset(&self) -> u64 {
        self.missing_from_superset
    }

    pub fn missing_from_subset(&self) -> u64 {
        self.missing_from_subset
    }

    /// Superset rows without a subset counterpart when the diff tolerates them.
    pub fn extra_superset_rows(&self) -> u64 {
        self.extra_superset_rows
    }

    pub fn rows_per_second(&self) -> f64 {
        self.rows_per_second
    }

    /// Recorded discrepancies, capped at the configured maximum.
    pub fn discrepancies(&self) -> &[Discrepancy] {
        &self.discrepancies
    }

    /// Total number of discrepancies found, recorded or not.
    pub fn discrepancy_count(&self) -> u64 {
        self.mismatched_rows + self.missing_from_superset + self.missing_from_subset
    }

    pub fn has_differences(&self) -> bool {
        self.discrepancy_count() > 0
    }

    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DiffReport{{{} processed, {} matching, {} mismatched, {} missing from superset, \
             {} missing from subset, {:.1} rows/s}}",
            self.processed_rows,
            self.matching_rows,
            self.mismatched_rows,
            self.missing_from_superset,
            self.missing_from_subset,
            self.rows_per_second
        )
    }
}
