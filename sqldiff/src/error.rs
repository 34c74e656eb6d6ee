use std::error;
use std::fmt;

/// Result type of the SQL diff worker operations.
pub type SqlDiffResult<T> = Result<T, SqlDiffError>;

/// Main error type of the SQL diff worker.
///
/// [`SqlDiffError`] is either a single classified error, with an optional dynamic detail, or
/// an aggregate of several errors. Aggregates are produced when more than one independent
/// operation fails, most notably when several compensating actions fail during cleanup.
#[derive(Debug, Clone)]
pub struct SqlDiffError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single {
        kind: ErrorKind,
        description: &'static str,
        detail: Option<String>,
    },
    Aggregate(Vec<SqlDiffError>),
}

/// Classification of [`SqlDiffError`]s.
///
/// The worker state machine is the only place deciding what a kind means for a run: every
/// kind ends the run in the error state, [`ErrorKind::Interrupted`] is reported for an
/// explicit cancellation and never for a timeout.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Topology
    ReplicaNotFound,

    // Replica control
    RemoteCallFailed,
    RemoteCallTimeout,

    // Query streams
    QueryFailed,
    QueryStreamFailed,

    // Run control
    Interrupted,
    CleanupFailed,
    InvalidState,
    WorkerPanic,

    // Rows and configuration
    InvalidData,
    ConfigError,

    Unknown,
}

impl SqlDiffError {
    fn single(kind: ErrorKind, description: &'static str, detail: Option<String>) -> Self {
        SqlDiffError {
            repr: ErrorRepr::Single {
                kind,
                description,
                detail,
            },
        }
    }

    /// Creates an [`SqlDiffError`] aggregating multiple errors.
    pub fn many(errors: Vec<SqlDiffError>) -> SqlDiffError {
        SqlDiffError {
            repr: ErrorRepr::Aggregate(errors),
        }
    }

    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregates, returns the kind of the first error or [`ErrorKind::Unknown`] if the
    /// aggregate is empty.
    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            ErrorRepr::Single { kind, .. } => *kind,
            ErrorRepr::Aggregate(errors) => errors
                .first()
                .map_or(ErrorKind::Unknown, SqlDiffError::kind),
        }
    }

    /// Returns all [`ErrorKind`]s contained in this error, flattening nested aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match &self.repr {
            ErrorRepr::Single { kind, .. } => vec![*kind],
            ErrorRepr::Aggregate(errors) => errors.iter().flat_map(SqlDiffError::kinds).collect(),
        }
    }

    /// Returns the dynamic detail of this error, or of the first aggregated error having one.
    pub fn detail(&self) -> Option<&str> {
        match &self.repr {
            ErrorRepr::Single { detail, .. } => detail.as_deref(),
            ErrorRepr::Aggregate(errors) => errors.iter().find_map(SqlDiffError::detail),
        }
    }

    /// Returns a copy of this error with `context` prepended to its detail.
    ///
    /// Used at call sites to name the replica or stream an error relates to without
    /// changing its kind.
    pub fn with_context(self, context: impl fmt::Display) -> SqlDiffError {
        self.prepend_context(&context.to_string())
    }

    fn prepend_context(self, context: &str) -> SqlDiffError {
        match self.repr {
            ErrorRepr::Single {
                kind,
                description,
                detail,
            } => {
                let detail = match detail {
                    Some(detail) => format!("{context}: {detail}"),
                    None => context.to_string(),
                };
                SqlDiffError::single(kind, description, Some(detail))
            }
            ErrorRepr::Aggregate(errors) => SqlDiffError::many(
                errors
                    .into_iter()
                    .map(|err| err.prepend_context(context))
                    .collect(),
            ),
        }
    }
}

/// Errors compare by kind only, descriptions and details are ignored.
impl PartialEq for SqlDiffError {
    fn eq(&self, other: &SqlDiffError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single { kind: a, .. }, ErrorRepr::Single { kind: b, .. }) => a == b,
            (ErrorRepr::Aggregate(a), ErrorRepr::Aggregate(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SqlDiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single {
                kind,
                description,
                detail,
            } => {
                write!(f, "{kind:?}: {description}")?;
                if let Some(detail) = detail {
                    write!(f, " -> {detail}")?;
                }
                Ok(())
            }
            ErrorRepr::Aggregate(errors) => match errors.as_slice() {
                [] => f.write_str("no errors were aggregated"),
                [error] => fmt::Display::fmt(error, f),
                errors => {
                    write!(f, "{} errors occurred:", errors.len())?;
                    for (position, error) in errors.iter().enumerate() {
                        write!(f, "\n  {}. {error}", position + 1)?;
                    }
                    Ok(())
                }
            },
        }
    }
}

impl error::Error for SqlDiffError {}

impl From<(ErrorKind, &'static str)> for SqlDiffError {
    fn from((kind, description): (ErrorKind, &'static str)) -> SqlDiffError {
        SqlDiffError::single(kind, description, None)
    }
}

impl From<(ErrorKind, &'static str, String)> for SqlDiffError {
    fn from((kind, description, detail): (ErrorKind, &'static str, String)) -> SqlDiffError {
        SqlDiffError::single(kind, description, Some(detail))
    }
}

impl From<sqldiff_config::shared::ValidationError> for SqlDiffError {
    fn from(err: sqldiff_config::shared::ValidationError) -> SqlDiffError {
        SqlDiffError::single(
            ErrorKind::ConfigError,
            "Invalid worker configuration",
            Some(err.to_string()),
        )
    }
}

/// Maps a failed worker task to [`ErrorKind::WorkerPanic`] or [`ErrorKind::Interrupted`].
impl From<tokio::task::JoinError> for SqlDiffError {
    fn from(err: tokio::task::JoinError) -> SqlDiffError {
        let (kind, description) = if err.is_cancelled() {
            (ErrorKind::Interrupted, "The worker task was aborted")
        } else {
            (ErrorKind::WorkerPanic, "The worker task panicked")
        };

        SqlDiffError::single(kind, description, Some(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, sqldiff_error};

    #[test]
    fn error_without_detail() {
        let err = SqlDiffError::from((ErrorKind::ReplicaNotFound, "No rdonly tablet found"));
        assert_eq!(err.kind(), ErrorKind::ReplicaNotFound);
        assert_eq!(err.detail(), None);
        assert_eq!(err.kinds(), vec![ErrorKind::ReplicaNotFound]);
        assert_eq!(err.to_string(), "ReplicaNotFound: No rdonly tablet found");
    }

    #[test]
    fn error_with_detail_is_displayed_after_an_arrow() {
        let err = SqlDiffError::from((
            ErrorKind::QueryStreamFailed,
            "Reading a row failed",
            "connection reset".to_string(),
        ));
        assert_eq!(err.detail(), Some("connection reset"));
        assert_eq!(
            err.to_string(),
            "QueryStreamFailed: Reading a row failed -> connection reset"
        );
    }

    #[test]
    fn aggregate_flattens_kinds_and_numbers_its_errors() {
        let cleanup_err = SqlDiffError::many(vec![
            SqlDiffError::from((ErrorKind::CleanupFailed, "Start replication failed")),
            SqlDiffError::from((
                ErrorKind::CleanupFailed,
                "Change type failed",
                "boom".to_string(),
            )),
        ]);
        let nested = SqlDiffError::many(vec![
            SqlDiffError::from((ErrorKind::RemoteCallFailed, "Stop replication failed")),
            cleanup_err.clone(),
        ]);

        assert_eq!(cleanup_err.kind(), ErrorKind::CleanupFailed);
        assert_eq!(cleanup_err.detail(), Some("boom"));
        assert_eq!(
            nested.kinds(),
            vec![
                ErrorKind::RemoteCallFailed,
                ErrorKind::CleanupFailed,
                ErrorKind::CleanupFailed
            ]
        );

        let display = cleanup_err.to_string();
        assert!(display.starts_with("2 errors occurred:"));
        assert!(display.contains("\n  2. CleanupFailed: Change type failed -> boom"));
    }

    #[test]
    fn empty_and_single_aggregates() {
        let empty = SqlDiffError::many(vec![]);
        assert_eq!(empty.kind(), ErrorKind::Unknown);
        assert!(empty.kinds().is_empty());
        assert_eq!(empty.detail(), None);

        let single = SqlDiffError::many(vec![SqlDiffError::from((
            ErrorKind::Interrupted,
            "Worker was interrupted",
        ))]);
        assert_eq!(single.to_string(), "Interrupted: Worker was interrupted");
    }

    #[test]
    fn context_is_prepended_without_changing_the_kind() {
        let err = SqlDiffError::from((ErrorKind::RemoteCallFailed, "Stop replication failed"))
            .with_context("zone1-0000000100");
        assert_eq!(err.kind(), ErrorKind::RemoteCallFailed);
        assert_eq!(err.detail(), Some("zone1-0000000100"));

        let err = err.with_context("subset");
        assert_eq!(err.detail(), Some("subset: zone1-0000000100"));
    }

    #[test]
    fn errors_compare_by_kind() {
        let interrupted = SqlDiffError::from((ErrorKind::Interrupted, "Interrupted"));
        let cancelled = SqlDiffError::from((ErrorKind::Interrupted, "Cancelled"));
        let timed_out = SqlDiffError::from((ErrorKind::RemoteCallTimeout, "Timed out"));

        assert_eq!(interrupted, cancelled);
        assert_ne!(interrupted, timed_out);
        assert_ne!(interrupted, SqlDiffError::many(vec![cancelled]));
    }

    #[test]
    fn macros_build_and_return_errors() {
        let err = sqldiff_error!(
            ErrorKind::InvalidData,
            "Column count mismatch",
            format!("superset has {} columns, subset has {}", 2, 3)
        );
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.detail(), Some("superset has 2 columns, subset has 3"));

        fn find_replica() -> SqlDiffResult<()> {
            bail!(ErrorKind::ReplicaNotFound, "No rdonly tablet found", "zone1/lookup/0");
        }

        let err = find_replica().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplicaNotFound);
        assert_eq!(err.detail(), Some("zone1/lookup/0"));
    }
}
