use std::{collections::BTreeSet, io, path::Path};

use log::{debug, info};
use thiserror::Error;

use crate::DataSourceError;

/// Column every loaded table is keyed on.
pub const ADDRESS_COLUMN: &str = "email";
/// Short campus id, expanded to an address under [`CRSID_DOMAIN`].
pub const CRSID_COLUMN: &str = "crsid";
pub const CRSID_DOMAIN: &str = "cam.ac.uk";
/// Combined "last, first" name column, split on load.
pub const NAME_COLUMN: &str = "name";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read roster: {0}")]
    Csv(#[from] csv::Error),

    #[error("roster is empty")]
    Empty,

    #[error("roster must have exactly one of the columns email or crsid")]
    Address,

    #[error("roster must name people with either first_name and last_name, or name")]
    Names,

    #[error("roster row {row}: name '{value}' is not in the form 'last_name, first_name'")]
    NameFormat { row: usize, value: String },

    #[error("roster row {row} has {found} fields but the header has {expected}")]
    RowShape {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("table \"{0}\" already exists")]
    TableExists(String),

    #[error("table \"{0}\" does not exist")]
    TableMissing(String),

    #[error("table \"{table}\" has a column \"{column}\" the roster does not provide")]
    MissingColumn { table: String, column: String },

    #[error(transparent)]
    DataSource(#[from] DataSourceError),
}

/// Whether a load makes a new table or appends to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Create,
    Update,
}

/// Write side of a table store.
pub trait RowSink {
    fn table_exists(&mut self, table: &str) -> Result<bool, DataSourceError>;

    /// Create `table` with a serial id and one text column per entry of
    /// `columns`; the `email` column is unique.
    fn create_table(&mut self, table: &str, columns: &[String]) -> Result<(), DataSourceError>;

    /// Columns of `table` in table order, without the serial id.
    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DataSourceError>;

    /// Insert rows, skipping any whose `email` is already present. Returns
    /// how many were inserted.
    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<usize, DataSourceError>;
}

impl<S: RowSink + ?Sized> RowSink for &mut S {
    fn table_exists(&mut self, table: &str) -> Result<bool, DataSourceError> {
        (**self).table_exists(table)
    }

    fn create_table(&mut self, table: &str, columns: &[String]) -> Result<(), DataSourceError> {
        (**self).create_table(table, columns)
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DataSourceError> {
        (**self).table_columns(table)
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<usize, DataSourceError> {
        (**self).insert_rows(table, columns, rows)
    }
}

/// A validated CSV roster, already normalised to table columns: `crsid`
/// becomes `email` and `name` becomes `first_name` plus `last_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Roster {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)?;
        Self::from_csv(reader)
    }

    pub fn from_reader(input: impl io::Read) -> Result<Self, LoadError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(input);
        Self::from_csv(reader)
    }

    fn from_csv<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self, LoadError> {
        let header: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
        if header.iter().all(String::is_empty) {
            return Err(LoadError::Empty);
        }

        let present: BTreeSet<&str> = header.iter().map(String::as_str).collect();
        if present.contains(ADDRESS_COLUMN) == present.contains(CRSID_COLUMN) {
            return Err(LoadError::Address);
        }
        let combined = present.contains(NAME_COLUMN);
        if combined == present.contains("first_name") || combined == present.contains("last_name")
        {
            return Err(LoadError::Names);
        }

        let mut columns = Vec::with_capacity(header.len() + 1);
        for column in &header {
            match column.as_str() {
                CRSID_COLUMN => columns.push(ADDRESS_COLUMN.to_owned()),
                NAME_COLUMN => {
                    columns.push("first_name".to_owned());
                    columns.push("last_name".to_owned());
                }
                other => columns.push(other.to_owned()),
            }
        }

        let mut rows = Vec::new();
        for (n, record) in reader.records().enumerate() {
            let record = record?;
            // 1-based, counting the header line
            let row = n + 2;
            if record.len() != header.len() {
                return Err(LoadError::RowShape {
                    row,
                    expected: header.len(),
                    found: record.len(),
                });
            }

            let mut values = Vec::with_capacity(columns.len());
            for (column, field) in header.iter().zip(record.iter()) {
                match column.as_str() {
                    CRSID_COLUMN => values.push(format!("{field}@{CRSID_DOMAIN}")),
                    NAME_COLUMN => {
                        let (last, first) = split_name(field).ok_or_else(|| {
                            LoadError::NameFormat {
                                row,
                                value: field.to_owned(),
                            }
                        })?;
                        values.push(first.to_owned());
                        values.push(last.to_owned());
                    }
                    _ => values.push(field.to_owned()),
                }
            }
            rows.push(values);
        }

        debug!("[load] roster: {} rows, columns {columns:?}", rows.len());
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows restricted to `columns`, in that order.
    fn project(&self, table: &str, columns: &[String]) -> Result<Vec<Vec<String>>, LoadError> {
        let positions = columns
            .iter()
            .map(|column| {
                self.columns
                    .iter()
                    .position(|c| c == column)
                    .ok_or_else(|| LoadError::MissingColumn {
                        table: table.to_owned(),
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self
            .rows
            .iter()
            .map(|row| positions.iter().map(|&i| row[i].clone()).collect())
            .collect())
    }
}

/// "Smith, Ada" gives ("Smith", "Ada"). Empty pieces are skipped and
/// anything after the second piece is ignored.
fn split_name(name: &str) -> Option<(&str, &str)> {
    let mut parts = name.split(", ").map(str::trim).filter(|p| !p.is_empty());
    Some((parts.next()?, parts.next()?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    /// Rows whose address was already in the table.
    pub skipped: usize,
}

/// Write a roster into `table`.
///
/// `Create` fails if the table exists and creates it from the roster's
/// columns; `Update` fails if it does not exist. Either way every column of
/// the table must be present in the roster.
pub fn load<S: RowSink>(
    mut sink: S,
    table: &str,
    roster: &Roster,
    mode: LoadMode,
) -> Result<LoadSummary, LoadError> {
    let exists = sink.table_exists(table)?;
    match (mode, exists) {
        (LoadMode::Create, true) => return Err(LoadError::TableExists(table.to_owned())),
        (LoadMode::Update, false) => return Err(LoadError::TableMissing(table.to_owned())),
        (LoadMode::Create, false) => {
            sink.create_table(table, roster.columns())?;
            info!("Created table {table}");
        }
        (LoadMode::Update, true) => {}
    }

    let columns = sink.table_columns(table)?;
    let rows = roster.project(table, &columns)?;
    let inserted = sink.insert_rows(table, &columns, &rows)?;

    let summary = LoadSummary {
        inserted,
        skipped: rows.len().saturating_sub(inserted),
    };
    info!(
        "Loaded {} of {} roster rows into {table}, {} already present",
        summary.inserted,
        rows.len(),
        summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
