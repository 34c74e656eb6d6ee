#![cfg(feature = "test-utils")]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqldiff::diff::{DiffReport, DiscrepancyKind, RowDiffer, RowSubsetDiffer};
use sqldiff::query::QueryService;
use sqldiff::query::memory::{MemoryQueryResultReader, MemoryQueryService, MemoryTable};
use sqldiff::test_utils::rows::{id_name_fields, id_name_rows};
use sqldiff::types::TabletAlias;
use sqldiff_telemetry::init_test_tracing;

/// Rows of both sides along with the counters a diff of them must produce.
#[derive(Debug, Default)]
struct Generated {
    superset: Vec<(i64, String)>,
    subset: Vec<(i64, String)>,
    matching: u64,
    mismatched: u64,
    superset_only: u64,
    subset_only: u64,
}

fn generate(rng: &mut StdRng, keys: i64) -> Generated {
    let mut generated = Generated::default();
    for key in 0..keys {
        let name = format!("name-{key}");
        match rng.random_range(0..5) {
            0 => {
                generated.superset.push((key, name.clone()));
                generated.subset.push((key, name));
                generated.matching += 1;
            }
            1 => {
                generated.superset.push((key, name.clone()));
                generated.subset.push((key, format!("{name}-stale")));
                generated.mismatched += 1;
            }
            2 => {
                generated.superset.push((key, name));
                generated.superset_only += 1;
            }
            3 => {
                generated.subset.push((key, name));
                generated.subset_only += 1;
            }
            _ => {}
        }
    }

    generated
}

async fn open(
    superset: &[(i64, String)],
    subset: &[(i64, String)],
) -> (
    MemoryQueryService,
    MemoryQueryResultReader,
    MemoryQueryResultReader,
) {
    let table = |rows: &[(i64, String)]| {
        let rows: Vec<_> = rows.iter().map(|(id, name)| (*id, name.as_str())).collect();
        MemoryTable::new(id_name_fields(), id_name_rows(&rows))
    };

    let service = MemoryQueryService::new();
    let superset_alias = TabletAlias::new("zone1", 1);
    let subset_alias = TabletAlias::new("zone1", 2);
    service.set_table(superset_alias.clone(), table(superset)).await;
    service.set_table(subset_alias.clone(), table(subset)).await;

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

async fn subset_diff(generated: &Generated) -> DiffReport {
    let (service, superset, subset) = open(&generated.superset, &generated.subset).await;
    let report = RowSubsetDiffer::try_new(superset, subset, 1)
        .unwrap()
        .with_max_recorded_discrepancies(usize::MAX)
        .run()
        .await
        .unwrap();
    assert_eq!(service.open_streams(), 0);

    report
}

#[tokio::test(flavor = "multi_thread")]
async fn subset_diff_partitions_every_row_exactly_once() {
    init_test_tracing();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..20 {
        let keys = rng.random_range(0..300);
        let generated = generate(&mut rng, keys);

        let report = subset_diff(&generated).await;

        let total_rows = (generated.superset.len() + generated.subset.len()) as u64;
        assert_eq!(report.processed_rows(), total_rows);
        assert_eq!(report.matching_rows(), generated.matching);
        assert_eq!(report.mismatched_rows(), generated.mismatched);
        assert_eq!(report.extra_superset_rows(), generated.superset_only);
        assert_eq!(report.missing_from_superset(), generated.subset_only);
        assert_eq!(report.missing_from_subset(), 0);
        assert_eq!(
            2 * report.matching_rows()
                + 2 * report.mismatched_rows()
                + report.extra_superset_rows()
                + report.missing_from_superset(),
            report.processed_rows()
        );
        assert_eq!(
            report.discrepancies().len() as u64,
            report.discrepancy_count()
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn full_diff_reports_both_directions() {
    init_test_tracing();
    let mut rng = StdRng::seed_from_u64(42);
    let generated = generate(&mut rng, 200);

    let (service, superset, subset) = open(&generated.superset, &generated.subset).await;
    let report = RowDiffer::try_new(superset, subset, 1)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.missing_from_subset(), generated.superset_only);
    assert_eq!(report.missing_from_superset(), generated.subset_only);
    assert_eq!(report.mismatched_rows(), generated.mismatched);
    assert_eq!(report.extra_superset_rows(), 0);
    assert!(
        report
            .discrepancies()
            .iter()
            .filter(|discrepancy| discrepancy.kind == DiscrepancyKind::MissingFromSubset)
            .all(|discrepancy| discrepancy.subset_row.is_none())
    );
    assert_eq!(service.open_streams(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn diffing_the_same_streams_twice_gives_the_same_report() {
    init_test_tracing();
    let mut rng = StdRng::seed_from_u64(7);
    let generated = generate(&mut rng, 150);

    let first = subset_diff(&generated).await;
    let second = subset_diff(&generated).await;

    assert_eq!(first.processed_rows(), second.processed_rows());
    assert_eq!(first.matching_rows(), second.matching_rows());
    assert_eq!(first.mismatched_rows(), second.mismatched_rows());
    assert_eq!(first.missing_from_superset(), second.missing_from_superset());
    assert_eq!(first.extra_superset_rows(), second.extra_superset_rows());
    assert_eq!(first.discrepancies(), second.discrepancies());
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_subset_has_no_discrepancies() {
    init_test_tracing();
    let superset: Vec<_> = (0..25).map(|id| (id, format!("name-{id}"))).collect();
    let generated = Generated {
        superset,
        ..Generated::default()
    };

    let report = subset_diff(&generated).await;

    assert!(!report.has_differences());
    assert_eq!(report.processed_rows(), 25);
    assert!(report.discrepancies().is_empty());
}
