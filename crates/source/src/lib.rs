mod cursor;
mod load;
mod memory;
mod pg;
mod value;

pub use cursor::Cursor;
pub use load::{LoadError, LoadMode, LoadSummary, Roster, RowSink, load};
pub use memory::MemorySource;
pub use pg::{PgConfig, PgSource};
pub use value::{Row, Value};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("cannot connect to the database: {0}")]
    Connect(String),

    #[error("relation \"{0}\" does not exist")]
    RelationMissing(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Optional `LIMIT`/`OFFSET` window on a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

/// A `SELECT <columns> FROM <table>` with an optional window and an optional
/// equality filter on one column.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub table: &'a str,
    pub columns: &'a [String],
    pub page: Option<Page>,
    pub filter: Option<(&'a str, &'a Value)>,
}

impl<'a> Selection<'a> {
    pub fn all(table: &'a str, columns: &'a [String]) -> Self {
        Self {
            table,
            columns,
            page: None,
            filter: None,
        }
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.page = Some(Page { limit, offset });
        self
    }

    pub fn filter(mut self, column: &'a str, value: &'a Value) -> Self {
        self.filter = Some((column, value));
        self
    }
}

/// Row-fetch capability the cursor is built on.
///
/// Rows come back with exactly the selected columns, in the selected order.
/// Paginated selections must use a stable row order so consecutive pages
/// neither overlap nor skip rows.
pub trait RowSource {
    fn count(&mut self, table: &str) -> Result<usize, DataSourceError>;

    fn query(&mut self, selection: &Selection<'_>) -> Result<Vec<Row>, DataSourceError>;

    /// Distinct values of `column`, in a stable order.
    fn distinct(&mut self, table: &str, column: &str) -> Result<Vec<Value>, DataSourceError>;
}

impl<S: RowSource + ?Sized> RowSource for &mut S {
    fn count(&mut self, table: &str) -> Result<usize, DataSourceError> {
        (**self).count(table)
    }

    fn query(&mut self, selection: &Selection<'_>) -> Result<Vec<Row>, DataSourceError> {
        (**self).query(selection)
    }

    fn distinct(&mut self, table: &str, column: &str) -> Result<Vec<Value>, DataSourceError> {
        (**self).distinct(table, column)
    }
}
