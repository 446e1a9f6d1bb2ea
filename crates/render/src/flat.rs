use courier_source::Row;

use crate::{Recipient, Render, RenderError, Template};

const ADDRESS_COLUMN: &str = "email";

/// One recipient per row; placeholders are filled from the row's columns
/// by name and the address comes from the `email` column.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flat;

impl Render for Flat {
    fn name(&self) -> &'static str {
        "default"
    }

    fn render(
        &self,
        rows: &[Row],
        columns: &[String],
        template: &str,
    ) -> Result<Vec<Recipient>, RenderError> {
        let template = Template::parse(template)?;
        let address_idx = columns
            .iter()
            .position(|c| c == ADDRESS_COLUMN)
            .ok_or_else(|| RenderError::MissingColumn(ADDRESS_COLUMN.to_owned()))?;

        let mut recipients = Vec::with_capacity(rows.len());
        for (n, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(RenderError::RowShape {
                    row: n,
                    expected: columns.len(),
                    found: row.len(),
                });
            }

            let address = row[address_idx].to_string();
            if address.trim().is_empty() {
                return Err(RenderError::MissingAddress { row: n });
            }

            let body = template.render(|name| {
                columns
                    .iter()
                    .position(|c| c == name)
                    .map(|i| row[i].to_string())
            })?;

            recipients.push(Recipient { address, body });
        }

        Ok(recipients)
    }
}

#[cfg(test)]
#[path = "flat_tests.rs"]
mod tests;
