use metrics::counter;
use std::cmp::Ordering;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::concurrency::shutdown::ShutdownRx;
use crate::diff::{DiffReport, Discrepancy, DiscrepancyKind};
use crate::error::{ErrorKind, SqlDiffResult};
use crate::metrics::{KIND_LABEL, SQLDIFF_DISCREPANCIES_TOTAL, SQLDIFF_ROWS_PROCESSED_TOTAL};
use crate::query::QueryResultReader;
use crate::types::{Row, compare_values};
use crate::{bail, sqldiff_error};

/// Default cap on the discrepancy records kept in a [`DiffReport`].
pub const DEFAULT_MAX_RECORDED_DISCREPANCIES: usize = 1000;

/// How superset rows without a subset counterpart are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffMode {
    /// Superset rows may have no counterpart, they are counted as extra rows.
    Subset,
    /// Superset rows without a counterpart are reported as missing from the subset.
    Full,
}

/// Merge-join over a superset and a subset stream, shared by both differs.
#[derive(Debug)]
struct MergeDiffer<R> {
    superset: R,
    subset: R,
    key_column_count: usize,
    max_recorded_discrepancies: usize,
    shutdown_rx: Option<ShutdownRx>,
    mode: DiffMode,
}

impl<R> MergeDiffer<R>
where
    R: QueryResultReader,
{
    fn try_new(
        mut superset: R,
        mut subset: R,
        key_column_count: usize,
        mode: DiffMode,
    ) -> SqlDiffResult<Self> {
        if let Err(err) = check_fields(&superset, &subset, key_column_count) {
            superset.close();
            subset.close();
            return Err(err);
        }

        Ok(Self {
            superset,
            subset,
            key_column_count,
            max_recorded_discrepancies: DEFAULT_MAX_RECORDED_DISCREPANCIES,
            shutdown_rx: None,
            mode,
        })
    }

    /// Runs the merge-join and closes both streams, whatever the outcome.
    async fn run(mut self) -> SqlDiffResult<DiffReport> {
        let result = self.merge().await;

        self.superset.close();
        self.subset.close();

        let report = result?;
        counter!(SQLDIFF_ROWS_PROCESSED_TOTAL).increment(report.processed_rows());
        for (kind, count) in [
            (DiscrepancyKind::MissingFromSubset, report.missing_from_subset()),
            (
                DiscrepancyKind::MissingFromSuperset,
                report.missing_from_superset(),
            ),
            (DiscrepancyKind::ValueMismatch, report.mismatched_rows()),
        ] {
            if count > 0 {
                counter!(SQLDIFF_DISCREPANCIES_TOTAL, KIND_LABEL => kind.as_str()).increment(count);
            }
        }

        info!(report = %report, "diff completed");

        Ok(report)
    }

    async fn merge(&mut self) -> SqlDiffResult<DiffReport> {
        let start = Instant::now();
        let mut report = DiffReport::new(self.max_recorded_discrepancies);
        let key_column_count = self.key_column_count;

        let mut superset_row = self.next_superset(&mut report).await?;
        let mut subset_row = self.next_subset(&mut report).await?;

        loop {
            match (superset_row.take(), subset_row.take()) {
                (None, None) => break,
                (Some(superset), None) => {
                    self.unmatched_superset_row(&mut report, superset);
                    superset_row = self.next_superset(&mut report).await?;
                }
                (None, Some(subset)) => {
                    self.record(
                        &mut report,
                        DiscrepancyKind::MissingFromSuperset,
                        None,
                        Some(subset),
                    );
                    subset_row = self.next_subset(&mut report).await?;
                }
                (Some(superset), Some(subset)) => {
                    match compare_values(
                        superset.key(key_column_count),
                        subset.key(key_column_count),
                    ) {
                        Ordering::Equal => {
                            if compare_values(
                                superset.non_key(key_column_count),
                                subset.non_key(key_column_count),
                            ) == Ordering::Equal
                            {
                                report.row_matched();
                            } else {
                                self.record(
                                    &mut report,
                                    DiscrepancyKind::ValueMismatch,
                                    Some(superset),
                                    Some(subset),
                                );
                            }
                            superset_row = self.next_superset(&mut report).await?;
                            subset_row = self.next_subset(&mut report).await?;
                        }
                        Ordering::Less => {
                            self.unmatched_superset_row(&mut report, superset);
                            subset_row = Some(subset);
                            superset_row = self.next_superset(&mut report).await?;
                        }
                        Ordering::Greater => {
                            self.record(
                                &mut report,
                                DiscrepancyKind::MissingFromSuperset,
                                None,
                                Some(subset),
                            );
                            superset_row = Some(superset);
                            subset_row = self.next_subset(&mut report).await?;
                        }
                    }
                }
            }
        }

        report.complete(start.elapsed());

        Ok(report)
    }

    fn unmatched_superset_row(&self, report: &mut DiffReport, superset: Row) {
        match self.mode {
            DiffMode::Subset => report.extra_superset_row(),
            DiffMode::Full => {
                self.record(report, DiscrepancyKind::MissingFromSubset, Some(superset), None)
            }
        }
    }

    fn record(
        &self,
        report: &mut DiffReport,
        kind: DiscrepancyKind,
        superset_row: Option<Row>,
        subset_row: Option<Row>,
    ) {
        let key = superset_row
            .as_ref()
            .or(subset_row.as_ref())
            .map(|row| row.key(self.key_column_count).to_vec())
            .unwrap_or_default();
        let discrepancy = Discrepancy {
            kind,
            key,
            superset_row,
            subset_row,
        };

        debug!(%discrepancy, "found discrepancy");
        report.record(discrepancy);
    }

    async fn next_superset(&mut self, report: &mut DiffReport) -> SqlDiffResult<Option<Row>> {
        self.check_shutdown()?;
        let row = self
            .superset
            .next_row()
            .await
            .map_err(|err| err.with_context("superset stream"))?;
        if row.is_some() {
            report.row_processed();
        }

        Ok(row)
    }

    async fn next_subset(&mut self, report: &mut DiffReport) -> SqlDiffResult<Option<Row>> {
        self.check_shutdown()?;
        let row = self
            .subset
            .next_row()
            .await
            .map_err(|err| err.with_context("subset stream"))?;
        if row.is_some() {
            report.row_processed();
        }

        Ok(row)
    }

    fn check_shutdown(&self) -> SqlDiffResult<()> {
        match &self.shutdown_rx {
            Some(shutdown_rx) => shutdown_rx
                .check_interrupted()
                .map_err(|err| err.with_context("diff stopped before reading the next row")),
            None => Ok(()),
        }
    }
}

/// Validates that two streams can be compared on `key_column_count` leading columns.
fn check_fields<R>(superset: &R, subset: &R, key_column_count: usize) -> SqlDiffResult<()>
where
    R: QueryResultReader,
{
    let superset_fields = superset.fields();
    let subset_fields = subset.fields();

    if superset_fields.len() != subset_fields.len() {
        bail!(
            ErrorKind::InvalidData,
            "Streams have a different number of columns",
            format!(
                "superset has {} columns, subset has {}",
                superset_fields.len(),
                subset_fields.len()
            )
        );
    }

    if key_column_count == 0 || key_column_count > superset_fields.len() {
        bail!(
            ErrorKind::InvalidData,
            "Invalid number of key columns",
            format!(
                "{key_column_count} key columns for {} columns",
                superset_fields.len()
            )
        );
    }

    let mismatch = superset_fields
        .iter()
        .zip(subset_fields)
        .find(|(superset, subset)| superset.column_type != subset.column_type);
    if let Some((superset, subset)) = mismatch {
        return Err(sqldiff_error!(
            ErrorKind::InvalidData,
            "Streams have different column types",
            format!(
                "superset column {} is {:?}, subset column {} is {:?}",
                superset.name, superset.column_type, subset.name, subset.column_type
            )
        ));
    }

    Ok(())
}

/// Checks that every subset row has an identical counterpart in the superset.
///
/// Both streams must be sorted ascending by their first `key_column_count` columns, which is
/// not verified: unsorted input gives meaningless reports. Superset rows without a subset
/// counterpart are only counted.
///
/// Both streams are closed when the differ fails to build and when [`RowSubsetDiffer::run`]
/// returns.
#[derive(Debug)]
pub struct RowSubsetDiffer<R> {
    inner: MergeDiffer<R>,
}

impl<R> RowSubsetDiffer<R>
where
    R: QueryResultReader,
{
    pub fn try_new(superset: R, subset: R, key_column_count: usize) -> SqlDiffResult<Self> {
        let inner = MergeDiffer::try_new(superset, subset, key_column_count, DiffMode::Subset)?;

        Ok(Self { inner })
    }

    pub fn with_max_recorded_discrepancies(mut self, max: usize) -> Self {
        self.inner.max_recorded_discrepancies = max;
        self
    }

    /// Makes the diff stop with [`ErrorKind::Interrupted`] once shutdown is signalled.
    ///
    /// The signal is checked before every read.
    pub fn with_shutdown(mut self, shutdown_rx: ShutdownRx) -> Self {
        self.inner.shutdown_rx = Some(shutdown_rx);
        self
    }

    pub async fn run(self) -> SqlDiffResult<DiffReport> {
        self.inner.run().await
    }
}

/// Checks that two streams hold the same rows.
///
/// Same preconditions and stream handling as [`RowSubsetDiffer`], but superset rows without
/// a counterpart are reported as [`DiscrepancyKind::MissingFromSubset`].
#[derive(Debug)]
pub struct RowDiffer<R> {
    inner: MergeDiffer<R>,
}

impl<R> RowDiffer<R>
where
    R: QueryResultReader,
{
    pub fn try_new(superset: R, subset: R, key_column_count: usize) -> SqlDiffResult<Self> {
        let inner = MergeDiffer::try_new(superset, subset, key_column_count, DiffMode::Full)?;

        Ok(Self { inner })
    }

    pub fn with_max_recorded_discrepancies(mut self, max: usize) -> Self {
        self.inner.max_recorded_discrepancies = max;
        self
    }

    pub fn with_shutdown(mut self, shutdown_rx: ShutdownRx) -> Self {
        self.inner.shutdown_rx = Some(shutdown_rx);
        self
    }

    pub async fn run(self) -> SqlDiffResult<DiffReport> {
        self.inner.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;
    use crate::query::QueryService;
    use crate::query::memory::{MemoryQueryResultReader, MemoryQueryService, MemoryTable};
    use crate::types::{ColumnField, ColumnType, TabletAlias, Value};

    fn fields() -> Vec<ColumnField> {
        vec![
            ColumnField::new("id", ColumnType::Int64),
            ColumnField::new("name", ColumnType::VarChar),
        ]
    }

    fn rows(rows: &[(i64, &str)]) -> Vec<Row> {
        rows.iter()
            .map(|(id, name)| Row::new(vec![Value::Int(*id), Value::from(*name)]))
            .collect()
    }

    async fn open(
        superset: MemoryTable,
        subset: MemoryTable,
    ) -> (
        MemoryQueryService,
        MemoryQueryResultReader,
        MemoryQueryResultReader,
    ) {
        let service = MemoryQueryService::new();
        let superset_alias = TabletAlias::new("zone1", 1);
        let subset_alias = TabletAlias::new("zone1", 2);
        service.set_table(superset_alias.clone(), superset).await;
        service.set_table(subset_alias.clone(), subset).await;

        let superset = service
            .open_query_stream(&superset_alias, "SELECT id, name FROM users ORDER BY id")
            .await
            .unwrap();
        let subset = service
            .open_query_stream(&subset_alias, "SELECT id, name FROM lookup ORDER BY id")
            .await
            .unwrap();

        (service, superset, subset)
    }

    async fn subset_diff(superset: &[(i64, &str)], subset: &[(i64, &str)]) -> DiffReport {
        let (service, superset, subset) = open(
            MemoryTable::new(fields(), rows(superset)),
            MemoryTable::new(fields(), rows(subset)),
        )
        .await;

        let report = RowSubsetDiffer::try_new(superset, subset, 1)
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(service.open_streams(), 0);

        report
    }

    #[tokio::test]
    async fn missing_subset_key_is_flagged_and_extra_superset_key_ignored() {
        let report = subset_diff(&[(1, "a"), (3, "c")], &[(1, "a"), (2, "b")]).await;

        assert_eq!(report.processed_rows(), 4);
        assert_eq!(report.matching_rows(), 1);
        assert_eq!(report.mismatched_rows(), 0);
        assert_eq!(report.missing_from_superset(), 1);
        assert_eq!(report.extra_superset_rows(), 1);
        assert_eq!(report.discrepancies().len(), 1);
        assert_eq!(
            report.discrepancies()[0].kind,
            DiscrepancyKind::MissingFromSuperset
        );
        assert_eq!(report.discrepancies()[0].key, vec![Value::Int(2)]);
    }

    #[tokio::test]
    async fn different_non_key_column_is_a_value_mismatch() {
        let report = subset_diff(&[(1, "z")], &[(1, "a")]).await;

        assert_eq!(report.mismatched_rows(), 1);
        let discrepancy = &report.discrepancies()[0];
        assert_eq!(discrepancy.kind, DiscrepancyKind::ValueMismatch);
        assert_eq!(discrepancy.key, vec![Value::Int(1)]);
        assert_eq!(
            discrepancy.superset_row,
            Some(Row::new(vec![Value::Int(1), Value::from("z")]))
        );
        assert_eq!(
            discrepancy.subset_row,
            Some(Row::new(vec![Value::Int(1), Value::from("a")]))
        );
    }

    #[tokio::test]
    async fn empty_subset_consumes_superset_without_discrepancies() {
        let report = subset_diff(&[(1, "a"), (2, "b"), (3, "c")], &[]).await;

        assert!(!report.has_differences());
        assert_eq!(report.processed_rows(), 3);
        assert_eq!(report.extra_superset_rows(), 3);
    }

    #[tokio::test]
    async fn subset_rows_after_superset_exhaustion_are_missing() {
        let report = subset_diff(&[(1, "a")], &[(1, "a"), (5, "e"), (6, "f")]).await;

        assert_eq!(report.missing_from_superset(), 2);
        assert_eq!(report.processed_rows(), 4);
    }

    #[tokio::test]
    async fn row_differ_reports_superset_only_rows() {
        let (_service, superset, subset) = open(
            MemoryTable::new(fields(), rows(&[(1, "a"), (2, "b"), (4, "d")])),
            MemoryTable::new(fields(), rows(&[(2, "b"), (3, "c")])),
        )
        .await;

        let report = RowDiffer::try_new(superset, subset, 1)
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(report.missing_from_subset(), 2);
        assert_eq!(report.missing_from_superset(), 1);
        assert_eq!(report.matching_rows(), 1);
        assert_eq!(report.extra_superset_rows(), 0);
        let kinds: Vec<_> = report.discrepancies().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiscrepancyKind::MissingFromSubset,
                DiscrepancyKind::MissingFromSuperset,
                DiscrepancyKind::MissingFromSubset,
            ]
        );
    }

    #[tokio::test]
    async fn read_error_fails_the_diff_and_closes_both_streams() {
        let (service, superset, subset) = open(
            MemoryTable::new(fields(), rows(&[(1, "a"), (2, "b"), (3, "c")])).failing_after(2),
            MemoryTable::new(fields(), rows(&[(1, "a"), (3, "c")])),
        )
        .await;

        let err = RowSubsetDiffer::try_new(superset, subset, 1)
            .unwrap()
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::QueryStreamFailed);
        assert!(err.detail().unwrap().starts_with("superset stream"));
        assert_eq!(service.open_streams(), 0);
    }

    #[tokio::test]
    async fn shutdown_interrupts_the_diff_before_reading() {
        let (service, superset, subset) = open(
            MemoryTable::new(fields(), rows(&[(1, "a")])),
            MemoryTable::new(fields(), rows(&[(1, "a")])),
        )
        .await;
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        shutdown_tx.shutdown();

        let err = RowSubsetDiffer::try_new(superset, subset, 1)
            .unwrap()
            .with_shutdown(shutdown_rx)
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Interrupted);
        assert_eq!(service.open_streams(), 0);
    }

    #[tokio::test]
    async fn incompatible_streams_are_rejected_and_closed() {
        let (service, superset, subset) = open(
            MemoryTable::new(fields(), vec![]),
            MemoryTable::new(vec![ColumnField::new("id", ColumnType::Int64)], vec![]),
        )
        .await;
        let err = RowSubsetDiffer::try_new(superset, subset, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(service.open_streams(), 0);

        let (service, superset, subset) = open(
            MemoryTable::new(fields(), vec![]),
            MemoryTable::new(
                vec![
                    ColumnField::new("id", ColumnType::Int64),
                    ColumnField::new("name", ColumnType::VarBinary),
                ],
                vec![],
            ),
        )
        .await;
        let err = RowSubsetDiffer::try_new(superset, subset, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(service.open_streams(), 0);
    }

    #[tokio::test]
    async fn key_column_count_must_fit_the_columns() {
        for key_column_count in [0, 3] {
            let (service, superset, subset) = open(
                MemoryTable::new(fields(), vec![]),
                MemoryTable::new(fields(), vec![]),
            )
            .await;

            let err = RowSubsetDiffer::try_new(superset, subset, key_column_count).unwrap_err();

            assert_eq!(err.kind(), ErrorKind::InvalidData);
            assert_eq!(service.open_streams(), 0);
        }
    }

    #[tokio::test]
    async fn composite_keys_compare_lexicographically() {
        let fields = vec![
            ColumnField::new("tenant", ColumnType::Int64),
            ColumnField::new("id", ColumnType::Int64),
            ColumnField::new("name", ColumnType::VarChar),
        ];
        let row = |tenant: i64, id: i64, name: &str| {
            Row::new(vec![Value::Int(tenant), Value::Int(id), Value::from(name)])
        };
        let (_service, superset, subset) = open(
            MemoryTable::new(fields.clone(), vec![row(1, 2, "a"), row(2, 1, "b")]),
            MemoryTable::new(fields, vec![row(1, 2, "a"), row(2, 1, "c")]),
        )
        .await;

        let report = RowSubsetDiffer::try_new(superset, subset, 2)
            .unwrap()
            .with_max_recorded_discrepancies(0)
            .run()
            .await
            .unwrap();

        assert_eq!(report.matching_rows(), 1);
        assert_eq!(report.mismatched_rows(), 1);
        assert!(report.discrepancies().is_empty());
    }
}
