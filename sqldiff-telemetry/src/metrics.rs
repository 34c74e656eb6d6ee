use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::trace;

/// Interval between two upkeep runs of the Prometheus recorder.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

// Installing the recorder can fail and succeeds at most once per process.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the global Prometheus recorder once and returns a handle to render metrics.
///
/// Spawns a background task running the recorder upkeep, so it must be called from within a
/// tokio runtime. Later calls return clones of the first handle.
pub fn init_metrics_handle(worker_name: Option<&str>) -> Result<PrometheusHandle, BuildError> {
    let mut prometheus_handle = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(handle) = &*prometheus_handle {
        return Ok(handle.clone());
    }

    let mut builder = PrometheusBuilder::new();
    if let Some(worker_name) = worker_name {
        builder = builder.add_global_label("worker", worker_name);
    }

    let handle = builder.install_recorder()?;
    *prometheus_handle = Some(handle.clone());

    let upkeep_handle = handle.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(UPKEEP_INTERVAL).await;
            trace!("running metrics upkeep");
            upkeep_handle.run_upkeep();
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recorder_is_installed_once_and_renders_counters() {
        let first = init_metrics_handle(Some("test")).unwrap();
        let second = init_metrics_handle(None).unwrap();

        metrics::counter!("sqldiff_telemetry_test_total").increment(3);

        let rendered = second.render();
        assert!(rendered.contains("sqldiff_telemetry_test_total"));
        assert!(rendered.contains("worker=\"test\""));
        assert_eq!(first.render(), rendered);
    }
}
