//! Macros building [`crate::error::SqlDiffError`]s.

/// Creates an [`crate::error::SqlDiffError`] from an error kind, a static description and an
/// optional detail.
#[macro_export]
macro_rules! sqldiff_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::SqlDiffError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::SqlDiffError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Returns early from the current function with an [`crate::error::SqlDiffError`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::sqldiff_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::sqldiff_error!($kind, $desc, $detail))
    };
}
