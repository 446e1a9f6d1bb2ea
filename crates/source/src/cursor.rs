use std::num::NonZeroUsize;

use log::debug;

use crate::{DataSourceError, Row, RowSource, Selection, Value};

/// Paginated reader over one table.
///
/// Hands out successive batches of rows. With a grouping column set, batch
/// boundaries fall on group boundaries: whole groups are taken until the
/// batch holds at least the requested number of rows, so a batch may
/// overshoot the requested size but never splits a group.
pub struct Cursor<S> {
    source: S,
    table: String,
    columns: Vec<String>,
    grouping: Option<String>,
    len: usize,
    offset: usize,
    /// Distinct group values, fetched on the first grouped call.
    groups: Option<Vec<Value>>,
    group_idx: usize,
    exhausted: bool,
}

impl<S: RowSource> Cursor<S> {
    /// Counts the table once; the count is fixed for the cursor's lifetime.
    pub fn new(
        mut source: S,
        table: impl Into<String>,
        columns: Vec<String>,
        grouping: Option<String>,
    ) -> Result<Self, DataSourceError> {
        let table = table.into();
        let len = source.count(&table)?;

        debug!("[cursor] {table}: {len} rows, grouping={grouping:?}");

        Ok(Self {
            source,
            table,
            columns,
            grouping,
            len,
            offset: 0,
            groups: None,
            group_idx: 0,
            exhausted: false,
        })
    }

    /// Total row count taken when the cursor was opened.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fetch the next batch and whether more rows remain.
    ///
    /// `None` fetches everything in one call. Once a call has reported no
    /// more rows, later calls return an empty batch.
    pub fn get_data(
        &mut self,
        batch_size: Option<NonZeroUsize>,
    ) -> Result<(Vec<Row>, bool), DataSourceError> {
        if self.exhausted {
            return Ok((Vec::new(), false));
        }

        let (rows, has_more) = match (batch_size, self.grouping.clone()) {
            (None, _) => {
                let rows = self
                    .source
                    .query(&Selection::all(&self.table, &self.columns))?;
                (rows, false)
            }
            (Some(size), None) => self.next_page(size.get())?,
            (Some(size), Some(group_column)) => self.next_groups(size.get(), &group_column)?,
        };

        self.exhausted = !has_more;
        Ok((rows, has_more))
    }

    fn next_page(&mut self, size: usize) -> Result<(Vec<Row>, bool), DataSourceError> {
        let offset = self.offset;
        self.offset += size;

        let rows = self
            .source
            .query(&Selection::all(&self.table, &self.columns).page(size, offset))?;

        Ok((rows, self.offset < self.len))
    }

    fn next_groups(
        &mut self,
        size: usize,
        group_column: &str,
    ) -> Result<(Vec<Row>, bool), DataSourceError> {
        if self.groups.is_none() {
            let groups = self.source.distinct(&self.table, group_column)?;
            debug!("[cursor] {}: {} groups by {group_column}", self.table, groups.len());
            self.groups = Some(groups);
        }
        let groups = self.groups.as_deref().unwrap_or_default();

        let mut rows = Vec::new();
        while rows.len() < size && self.group_idx < groups.len() {
            let group = &groups[self.group_idx];
            self.group_idx += 1;

            let selection = Selection::all(&self.table, &self.columns).filter(group_column, group);
            rows.extend(self.source.query(&selection)?);
        }

        Ok((rows, self.group_idx < groups.len()))
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
