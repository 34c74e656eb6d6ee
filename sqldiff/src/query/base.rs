use std::future::Future;

use crate::error::SqlDiffResult;
use crate::types::{ColumnField, Row, TabletAlias};

/// Ordered stream of rows produced by a query.
///
/// Rows are yielded in the order of the query's key columns. A reader holds a remote
/// stream open until [`QueryResultReader::close`] is called.
pub trait QueryResultReader {
    /// Column metadata of the rows produced by the stream.
    fn fields(&self) -> &[ColumnField];

    /// Returns the next row, or `None` once the stream is exhausted.
    fn next_row(&mut self) -> impl Future<Output = SqlDiffResult<Option<Row>>> + Send;

    /// Releases the stream. Calling it more than once has no effect.
    fn close(&mut self);
}

/// Opens query streams against tablets.
pub trait QueryService {
    type Reader: QueryResultReader + Send;

    /// Starts streaming the results of `sql` executed on the tablet with `alias`.
    fn open_query_stream(
        &self,
        alias: &TabletAlias,
        sql: &str,
    ) -> impl Future<Output = SqlDiffResult<Self::Reader>> + Send;
}
