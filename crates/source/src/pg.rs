use log::debug;
use postgres::{Client, NoTls, error::SqlState, types::ToSql};

use crate::{DataSourceError, Row, RowSink, RowSource, Selection, Value, load::ADDRESS_COLUMN};

#[derive(Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

/// Row source over a PostgreSQL database, using the blocking client.
///
/// Every selected column is cast to `text`, so rows only ever hold
/// `Value::Text` or `Value::Null`. Paginated reads are ordered by `ctid`.
pub struct PgSource {
    client: Client,
}

impl PgSource {
    pub fn connect(cfg: &PgConfig) -> Result<Self, DataSourceError> {
        let client = postgres::Config::new()
            .host(&cfg.host)
            .port(cfg.port)
            .dbname(&cfg.dbname)
            .user(&cfg.user)
            .password(&cfg.password)
            .connect(NoTls)
            .map_err(|e| DataSourceError::Connect(e.to_string()))?;

        debug!("[pg] connected to {}:{}/{}", cfg.host, cfg.port, cfg.dbname);
        Ok(Self { client })
    }

    /// Close the connection, reporting any error from the server.
    pub fn close(self) -> Result<(), DataSourceError> {
        self.client
            .close()
            .map_err(|e| DataSourceError::Connect(e.to_string()))
    }
}

impl RowSource for PgSource {
    fn count(&mut self, table: &str) -> Result<usize, DataSourceError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let row = self
            .client
            .query_one(sql.as_str(), &[])
            .map_err(|e| classify(table, e))?;

        let n: i64 = row.try_get(0).map_err(|e| classify(table, e))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    fn query(&mut self, selection: &Selection<'_>) -> Result<Vec<Row>, DataSourceError> {
        let (sql, param) = select_sql(selection);
        debug!("[pg] {sql}");

        let rows = match &param {
            Some(p) => self.client.query(sql.as_str(), &[p]),
            None => self.client.query(sql.as_str(), &[]),
        }
        .map_err(|e| classify(selection.table, e))?;

        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| text_value(row, i))
                    .collect::<Result<Row, _>>()
                    .map_err(|e| classify(selection.table, e))
            })
            .collect()
    }

    fn distinct(&mut self, table: &str, column: &str) -> Result<Vec<Value>, DataSourceError> {
        let sql = format!(
            "SELECT DISTINCT {}::text FROM {} ORDER BY 1",
            quote_ident(column),
            quote_ident(table)
        );

        let rows = self
            .client
            .query(sql.as_str(), &[])
            .map_err(|e| classify(table, e))?;

        rows.iter()
            .map(|row| text_value(row, 0).map_err(|e| classify(table, e)))
            .collect()
    }
}

impl RowSink for PgSource {
    fn table_exists(&mut self, table: &str) -> Result<bool, DataSourceError> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_name = $1)",
                &[&table],
            )
            .map_err(|e| classify(table, e))?;

        row.try_get(0).map_err(|e| classify(table, e))
    }

    fn create_table(&mut self, table: &str, columns: &[String]) -> Result<(), DataSourceError> {
        let sql = create_sql(table, columns);
        debug!("[pg] {sql}");

        self.client
            .batch_execute(&sql)
            .map_err(|e| classify(table, e))
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DataSourceError> {
        let rows = self
            .client
            .query(
                "SELECT column_name::text FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = $1 \
                 ORDER BY ordinal_position",
                &[&table],
            )
            .map_err(|e| classify(table, e))?;

        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(|e| classify(table, e)))
            .filter(|column| !matches!(column, Ok(c) if c == SERIAL_COLUMN))
            .collect()
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<usize, DataSourceError> {
        let sql = insert_sql(table, columns);
        debug!("[pg] {sql}");

        // All rows or none.
        let mut tx = self.client.transaction().map_err(|e| classify(table, e))?;
        let statement = tx.prepare(&sql).map_err(|e| classify(table, e))?;

        let mut inserted = 0;
        for row in rows {
            let params: Vec<&(dyn ToSql + Sync)> =
                row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            inserted += tx
                .execute(&statement, &params)
                .map_err(|e| classify(table, e))?;
        }

        tx.commit().map_err(|e| classify(table, e))?;
        Ok(usize::try_from(inserted).unwrap_or_default())
    }
}

const SERIAL_COLUMN: &str = "id";

fn create_sql(table: &str, columns: &[String]) -> String {
    let mut defs = vec![format!("{} SERIAL PRIMARY KEY", quote_ident(SERIAL_COLUMN))];
    for column in columns {
        let unique = if column == ADDRESS_COLUMN { " UNIQUE" } else { "" };
        defs.push(format!("{} VARCHAR(255){unique}", quote_ident(column)));
    }
    format!("CREATE TABLE {} ({})", quote_ident(table), defs.join(", "))
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let params = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({names}) VALUES ({params}) ON CONFLICT ({}) DO NOTHING",
        quote_ident(table),
        quote_ident(ADDRESS_COLUMN)
    )
}

fn text_value(row: &postgres::Row, idx: usize) -> Result<Value, postgres::Error> {
    let v: Option<String> = row.try_get(idx)?;
    Ok(v.map_or(Value::Null, Value::Text))
}

/// Builds the SQL for a selection, plus the bound filter value if any.
fn select_sql(selection: &Selection<'_>) -> (String, Option<String>) {
    let columns = selection
        .columns
        .iter()
        .map(|c| format!("{}::text", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("SELECT {columns} FROM {}", quote_ident(selection.table));
    let mut param = None;

    if let Some((column, value)) = selection.filter {
        if value.is_null() {
            sql.push_str(&format!(" WHERE {} IS NULL", quote_ident(column)));
        } else {
            sql.push_str(&format!(" WHERE {}::text = $1", quote_ident(column)));
            param = Some(value.to_string());
        }
    }

    if let Some(page) = selection.page {
        sql.push_str(&format!(
            " ORDER BY ctid LIMIT {} OFFSET {}",
            page.limit, page.offset
        ));
    }

    (sql, param)
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn classify(table: &str, err: postgres::Error) -> DataSourceError {
    if err.code() == Some(&SqlState::UNDEFINED_TABLE) {
        return DataSourceError::RelationMissing(table.to_owned());
    }

    match err.as_db_error() {
        Some(db) => DataSourceError::Query(db.message().to_owned()),
        None => DataSourceError::Query(err.to_string()),
    }
}

#[cfg(test)]
#[path = "pg_tests.rs"]
mod tests;
