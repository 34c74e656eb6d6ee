use thiserror::Error;

/// Errors returned when a loaded configuration is not usable.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required string field was left empty.
    #[error("Invalid configuration: `{0}` must not be empty")]
    EmptyField(&'static str),

    /// The diff needs at least one key column.
    #[error("Invalid configuration: `key_column_count` must be at least 1")]
    NoKeyColumns,

    /// A duration that must be positive was set to zero.
    #[error("Invalid configuration: `{0}` must be greater than zero")]
    ZeroDuration(&'static str),
}
