use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, SqlDiffResult};
use crate::query::{QueryResultReader, QueryService};
use crate::types::{ColumnField, Row, TabletAlias};

/// Rows served for one tablet by [`MemoryQueryService`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub fields: Vec<ColumnField>,
    pub rows: Vec<Row>,
    /// When set, reading past this many rows fails with [`ErrorKind::QueryStreamFailed`].
    pub fail_after: Option<usize>,
}

impl MemoryTable {
    pub fn new(fields: Vec<ColumnField>, rows: Vec<Row>) -> Self {
        Self {
            fields,
            rows,
            fail_after: None,
        }
    }

    pub fn failing_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TabletAlias, MemoryTable>,
    failing_opens: HashMap<TabletAlias, usize>,
    queries: Vec<(TabletAlias, String)>,
}

#[derive(Debug, Default)]
struct StreamCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// In-memory [`QueryService`] returning the same table for every query sent to a tablet.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueryService {
    inner: Arc<Mutex<Inner>>,
    counters: Arc<StreamCounters>,
}

impl MemoryQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_table(&self, alias: TabletAlias, table: MemoryTable) {
        let mut inner = self.inner.lock().await;
        inner.tables.insert(alias, table);
    }

    /// Makes the next `count` opens against `alias` fail with [`ErrorKind::QueryFailed`].
    pub async fn fail_opens(&self, alias: TabletAlias, count: usize) {
        let mut inner = self.inner.lock().await;
        inner.failing_opens.insert(alias, count);
    }

    /// Returns every query received so far with the tablet it was sent to.
    pub async fn queries(&self) -> Vec<(TabletAlias, String)> {
        let inner = self.inner.lock().await;
        inner.queries.clone()
    }

    pub fn opened_streams(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed_streams(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Number of streams opened but not closed yet.
    pub fn open_streams(&self) -> usize {
        self.opened_streams() - self.closed_streams()
    }
}

impl QueryService for MemoryQueryService {
    type Reader = MemoryQueryResultReader;

    async fn open_query_stream(
        &self,
        alias: &TabletAlias,
        sql: &str,
    ) -> SqlDiffResult<Self::Reader> {
        let mut inner = self.inner.lock().await;
        inner.queries.push((alias.clone(), sql.to_string()));

        if let Some(remaining) = inner.failing_opens.get_mut(alias) {
            if *remaining > 0 {
                *remaining -= 1;
                bail!(
                    ErrorKind::QueryFailed,
                    "Query could not be started",
                    format!("injected failure on {alias}")
                );
            }
        }

        let Some(table) = inner.tables.get(alias) else {
            bail!(
                ErrorKind::QueryFailed,
                "Query could not be started",
                format!("no table registered for {alias}")
            );
        };

        self.counters.opened.fetch_add(1, Ordering::SeqCst);

        Ok(MemoryQueryResultReader {
            fields: table.fields.clone(),
            rows: table.rows.iter().cloned().collect(),
            fail_after: table.fail_after,
            read: 0,
            closed: false,
            counters: self.counters.clone(),
        })
    }
}

/// Reader over a snapshot of a [`MemoryTable`].
#[derive(Debug)]
pub struct MemoryQueryResultReader {
    fields: Vec<ColumnField>,
    rows: VecDeque<Row>,
    fail_after: Option<usize>,
    read: usize,
    closed: bool,
    counters: Arc<StreamCounters>,
}

impl MemoryQueryResultReader {
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl QueryResultReader for MemoryQueryResultReader {
    fn fields(&self) -> &[ColumnField] {
        &self.fields
    }

    async fn next_row(&mut self) -> SqlDiffResult<Option<Row>> {
        if self.closed {
            bail!(ErrorKind::InvalidState, "Query stream is already closed");
        }

        if self.fail_after == Some(self.read) {
            bail!(
                ErrorKind::QueryStreamFailed,
                "Query stream broke",
                format!("injected failure after {} rows", self.read)
            );
        }

        let row = self.rows.pop_front();
        if row.is_some() {
            self.read += 1;
        }

        Ok(row)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
