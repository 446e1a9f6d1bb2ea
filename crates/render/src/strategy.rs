use courier_source::Row;
use thiserror::Error;

use crate::{Families, Flat, Recipient, RenderError};

/// Strategy names accepted by [`resolve`]. `default` is also what a missing
/// name resolves to.
pub const STRATEGIES: &[&str] = &["default", "families"];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown email sender '{0}', expected one of: default, families")]
pub struct UnknownStrategy(pub String);

/// Turns a batch of rows into ready-to-send recipients.
///
/// Implementations fail the whole batch on the first bad row rather than
/// skip it.
pub trait Render: Send + Sync {
    fn name(&self) -> &'static str;

    /// Column whose rows must never be split across batches.
    fn group_column(&self) -> Option<&str> {
        None
    }

    fn render(
        &self,
        rows: &[Row],
        columns: &[String],
        template: &str,
    ) -> Result<Vec<Recipient>, RenderError>;
}

/// Pick the renderer for a strategy name, once, before any rows are read.
///
/// `group_column` is the event's grouping column; grouped strategies use it
/// to find the group id of each row.
pub fn resolve(
    name: Option<&str>,
    group_column: Option<&str>,
) -> Result<Box<dyn Render>, UnknownStrategy> {
    match name.unwrap_or("default") {
        "default" => Ok(Box::new(Flat)),
        "families" => Ok(Box::new(Families::new(group_column))),
        other => Err(UnknownStrategy(other.to_owned())),
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
