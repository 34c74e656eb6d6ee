use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::diff::DiffReport;
use crate::error::SqlDiffError;

/// Phase of a [`crate::workers::sql_diff::SqlDiffWorker`] run.
///
/// Phases only move forward and a run ends in exactly one of [`SqlDiffWorkerState::Done`] and
/// [`SqlDiffWorkerState::Error`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlDiffWorkerState {
    NotStarted,
    FindingTargets,
    SynchronizingReplication,
    Running,
    CleaningUp,
    Done,
    Error(SqlDiffError),
}

impl SqlDiffWorkerState {
    pub fn name(&self) -> &'static str {
        match self {
            SqlDiffWorkerState::NotStarted => "not started",
            SqlDiffWorkerState::FindingTargets => "finding target instances",
            SqlDiffWorkerState::SynchronizingReplication => "synchronizing replication",
            SqlDiffWorkerState::Running => "running the diff",
            SqlDiffWorkerState::CleaningUp => "cleaning up",
            SqlDiffWorkerState::Done => "done",
            SqlDiffWorkerState::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SqlDiffWorkerState::Done | SqlDiffWorkerState::Error(_))
    }

    fn rank(&self) -> u8 {
        match self {
            SqlDiffWorkerState::NotStarted => 0,
            SqlDiffWorkerState::FindingTargets => 1,
            SqlDiffWorkerState::SynchronizingReplication => 2,
            SqlDiffWorkerState::Running => 3,
            SqlDiffWorkerState::CleaningUp => 4,
            SqlDiffWorkerState::Done | SqlDiffWorkerState::Error(_) => 5,
        }
    }
}

impl fmt::Display for SqlDiffWorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serializable copy of a worker's status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlDiffWorkerStatusSnapshot {
    pub keyspace: String,
    pub shard: String,
    pub state: String,
    pub error: Option<String>,
    /// Report of the diff, present once the worker is done.
    pub report: Option<DiffReport>,
}

#[derive(Debug)]
struct Inner {
    state: SqlDiffWorkerState,
    report: Option<DiffReport>,
}

/// Status of a worker shared between the running worker and its observers.
///
/// The lock is only held to copy or replace the state, never across a remote call.
#[derive(Debug, Clone)]
pub struct SqlDiffWorkerStatus {
    keyspace: Arc<str>,
    shard: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

impl SqlDiffWorkerStatus {
    /// Creates the status of a worker checking the subset `keyspace`/`shard`.
    pub fn new(keyspace: &str, shard: &str) -> Self {
        Self {
            keyspace: Arc::from(keyspace),
            shard: Arc::from(shard),
            inner: Arc::new(Mutex::new(Inner {
                state: SqlDiffWorkerState::NotStarted,
                report: None,
            })),
        }
    }

    pub fn state(&self) -> SqlDiffWorkerState {
        self.lock().state.clone()
    }

    /// Returns the error the worker ended with, if any.
    pub fn error(&self) -> Option<SqlDiffError> {
        match &self.lock().state {
            SqlDiffWorkerState::Error(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Moves the worker to `state`.
    ///
    /// Transitions going backwards or leaving a terminal state are refused and `false` is
    /// returned.
    pub fn set_state(&self, state: SqlDiffWorkerState) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() || state.rank() < inner.state.rank() {
            warn!(
                from = %inner.state,
                to = %state,
                "refusing worker state transition"
            );

            return false;
        }

        info!(from = %inner.state, to = %state, "worker state changed");
        inner.state = state;

        true
    }

    /// Stores the report of the diff. Refused once the worker reached a terminal state or when a
    /// report is already stored.
    pub(crate) fn set_report(&self, report: DiffReport) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() || inner.report.is_some() {
            warn!(state = %inner.state, "refusing to replace the diff report");

            return false;
        }

        inner.report = Some(report);

        true
    }

    /// Returns the diff report once the worker is done.
    pub fn report(&self) -> Option<DiffReport> {
        let inner = self.lock();
        match inner.state {
            SqlDiffWorkerState::Done => inner.report.clone(),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SqlDiffWorkerStatusSnapshot {
        let (state, report) = {
            let inner = self.lock();
            (inner.state.clone(), inner.report.clone())
        };

        SqlDiffWorkerStatusSnapshot {
            keyspace: self.keyspace.to_string(),
            shard: self.shard.to_string(),
            state: state.name().to_string(),
            error: match &state {
                SqlDiffWorkerState::Error(err) => Some(err.to_string()),
                _ => None,
            },
            report: match state {
                SqlDiffWorkerState::Done => report,
                _ => None,
            },
        }
    }

    pub fn status_as_text(&self) -> String {
        let (state, report) = self.copy();

        let mut result = format!("Working on: {}/{}\n", self.keyspace, self.shard);
        result.push_str(&format!("State: {state}\n"));
        match state {
            SqlDiffWorkerState::Error(err) => result.push_str(&format!("Error: {err}\n")),
            SqlDiffWorkerState::Running => result.push_str("Running...\n"),
            SqlDiffWorkerState::Done => {
                result.push_str("Success.\n");
                if let Some(report) = report {
                    result.push_str(&format!("{report}\n"));
                }
            }
            _ => {}
        }

        result
    }

    pub fn status_as_html(&self) -> String {
        let (state, report) = self.copy();

        let mut result = format!(
            "<b>Working on:</b> {}/{}</br>\n",
            escape_html(&self.keyspace),
            escape_html(&self.shard)
        );
        result.push_str(&format!("<b>State:</b> {state}</br>\n"));
        match state {
            SqlDiffWorkerState::Error(err) => {
                result.push_str(&format!(
                    "<b>Error</b>: {}</br>\n",
                    escape_html(&err.to_string())
                ));
            }
            SqlDiffWorkerState::Running => result.push_str("<b>Running...</b></br>\n"),
            SqlDiffWorkerState::Done => {
                result.push_str("<b>Success.</b></br>\n");
                if let Some(report) = report {
                    result.push_str(&format!("{}</br>\n", escape_html(&report.to_string())));
                }
            }
            _ => {}
        }

        result
    }

    fn copy(&self) -> (SqlDiffWorkerState, Option<DiffReport>) {
        let inner = self.lock();
        (inner.state.clone(), inner.report.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sqldiff_error;

    #[test]
    fn state_only_moves_forward() {
        let status = SqlDiffWorkerStatus::new("lookup", "-80");

        assert!(status.set_state(SqlDiffWorkerState::FindingTargets));
        assert!(status.set_state(SqlDiffWorkerState::Running));
        assert!(!status.set_state(SqlDiffWorkerState::SynchronizingReplication));
        assert!(status.set_state(SqlDiffWorkerState::CleaningUp));
        assert!(status.set_state(SqlDiffWorkerState::Done));
        assert!(!status.set_state(SqlDiffWorkerState::Error(sqldiff_error!(
            ErrorKind::Unknown,
            "Late failure"
        ))));

        assert_eq!(status.state(), SqlDiffWorkerState::Done);
        assert!(status.error().is_none());
    }

    #[test]
    fn text_status_shows_target_phase_and_outcome() {
        let status = SqlDiffWorkerStatus::new("lookup", "-80");
        assert_eq!(
            status.status_as_text(),
            "Working on: lookup/-80\nState: not started\n"
        );

        status.set_state(SqlDiffWorkerState::Running);
        assert_eq!(
            status.status_as_text(),
            "Working on: lookup/-80\nState: running the diff\nRunning...\n"
        );

        status.set_state(SqlDiffWorkerState::Error(sqldiff_error!(
            ErrorKind::RemoteCallTimeout,
            "Remote call did not complete in time"
        )));
        assert_eq!(
            status.status_as_text(),
            "Working on: lookup/-80\nState: error\n\
             Error: RemoteCallTimeout: Remote call did not complete in time\n"
        );
    }

    #[test]
    fn done_status_includes_report_summary() {
        let status = SqlDiffWorkerStatus::new("lookup", "0");
        status.set_report(DiffReport::new(10));
        assert!(status.report().is_none());

        status.set_state(SqlDiffWorkerState::Done);

        let text = status.status_as_text();
        assert!(text.contains("Success.\nDiffReport{0 processed"));
        let snapshot = status.snapshot();
        assert_eq!(snapshot.state, "done");
        assert!(snapshot.report.is_some());
        assert!(status.report().is_some());
    }

    #[test]
    fn report_is_stored_once_and_not_after_termination() {
        let status = SqlDiffWorkerStatus::new("lookup", "0");
        assert!(status.set_report(DiffReport::new(10)));
        assert!(!status.set_report(DiffReport::new(10)));

        let finished = SqlDiffWorkerStatus::new("lookup", "0");
        finished.set_state(SqlDiffWorkerState::Done);
        assert!(!finished.set_report(DiffReport::new(10)));
        assert!(finished.report().is_none());
    }

    #[test]
    fn html_status_escapes_error_text() {
        let status = SqlDiffWorkerStatus::new("lookup", "0");
        status.set_state(SqlDiffWorkerState::Error(sqldiff_error!(
            ErrorKind::QueryFailed,
            "Query could not be started",
            "near <select>"
        )));

        assert_eq!(
            status.status_as_html(),
            "<b>Working on:</b> lookup/0</br>\n<b>State:</b> error</br>\n\
             <b>Error</b>: QueryFailed: Query could not be started -&gt; near &lt;select&gt;</br>\n"
        );
    }

    #[test]
    fn snapshot_serializes_error() {
        let status = SqlDiffWorkerStatus::new("lookup", "0");
        status.set_state(SqlDiffWorkerState::Error(sqldiff_error!(
            ErrorKind::Interrupted,
            "Worker was interrupted"
        )));

        let json = serde_json::to_value(status.snapshot()).unwrap();

        assert_eq!(json["state"], "error");
        assert_eq!(json["error"], "Interrupted: Worker was interrupted");
        assert!(json["report"].is_null());
    }
}
