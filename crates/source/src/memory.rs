use std::collections::HashMap;

use crate::{DataSourceError, Row, RowSink, RowSource, Selection, Value, load::ADDRESS_COLUMN};

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Row source backed by in-process tables.
///
/// Row order is insertion order; distinct values come back in first-seen
/// order. Every call is counted so callers can assert how often the source
/// was hit.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<String, Table>,
    queries: usize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<C, R>(mut self, name: &str, columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Row>,
    {
        self.tables.insert(
            name.to_owned(),
            Table {
                columns: columns.into_iter().map(Into::into).collect(),
                rows: rows.into_iter().collect(),
            },
        );
        self
    }

    /// Number of `count`, `query` and `distinct` calls served so far.
    pub fn queries(&self) -> usize {
        self.queries
    }

    fn table(&self, name: &str) -> Result<&Table, DataSourceError> {
        self.tables
            .get(name)
            .ok_or_else(|| DataSourceError::RelationMissing(name.to_owned()))
    }
}

impl Table {
    fn position(&self, column: &str) -> Result<usize, DataSourceError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| DataSourceError::Query(format!("column \"{column}\" does not exist")))
    }
}

impl RowSource for MemorySource {
    fn count(&mut self, table: &str) -> Result<usize, DataSourceError> {
        self.queries += 1;
        Ok(self.table(table)?.rows.len())
    }

    fn query(&mut self, selection: &Selection<'_>) -> Result<Vec<Row>, DataSourceError> {
        self.queries += 1;
        let table = self.table(selection.table)?;

        let positions = selection
            .columns
            .iter()
            .map(|c| table.position(c))
            .collect::<Result<Vec<_>, _>>()?;

        let filter = match selection.filter {
            Some((column, value)) => Some((table.position(column)?, value)),
            None => None,
        };

        let matching = table
            .rows
            .iter()
            .filter(|row| filter.is_none_or(|(idx, value)| row.get(idx) == Some(value)));

        let (skip, take) = match selection.page {
            Some(page) => (page.offset, page.limit),
            None => (0, usize::MAX),
        };

        Ok(matching
            .skip(skip)
            .take(take)
            .map(|row| {
                positions
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect())
    }

    fn distinct(&mut self, table: &str, column: &str) -> Result<Vec<Value>, DataSourceError> {
        self.queries += 1;
        let table = self.table(table)?;
        let idx = table.position(column)?;

        let mut seen: Vec<Value> = Vec::new();
        for row in &table.rows {
            let value = row.get(idx).cloned().unwrap_or(Value::Null);
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        Ok(seen)
    }
}

impl RowSink for MemorySource {
    fn table_exists(&mut self, table: &str) -> Result<bool, DataSourceError> {
        self.queries += 1;
        Ok(self.tables.contains_key(table))
    }

    fn create_table(&mut self, table: &str, columns: &[String]) -> Result<(), DataSourceError> {
        self.queries += 1;
        if self.tables.contains_key(table) {
            return Err(DataSourceError::Query(format!(
                "relation \"{table}\" already exists"
            )));
        }
        self.tables.insert(
            table.to_owned(),
            Table {
                columns: columns.to_vec(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DataSourceError> {
        self.queries += 1;
        Ok(self.table(table)?.columns.clone())
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<usize, DataSourceError> {
        self.queries += 1;
        let target = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DataSourceError::RelationMissing(table.to_owned()))?;

        let positions = columns
            .iter()
            .map(|c| target.position(c))
            .collect::<Result<Vec<_>, _>>()?;
        let address = target.position(ADDRESS_COLUMN)?;

        let mut inserted = 0;
        for values in rows {
            let mut row = vec![Value::Null; target.columns.len()];
            for (&i, value) in positions.iter().zip(values) {
                row[i] = Value::Text(value.clone());
            }

            // ON CONFLICT (email) DO NOTHING
            if target.rows.iter().any(|r| r.get(address) == row.get(address)) {
                continue;
            }
            target.rows.push(row);
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
