mod families;
mod flat;
mod strategy;
mod template;

pub use families::Families;
pub use flat::Flat;
pub use strategy::{Render, STRATEGIES, UnknownStrategy, resolve};
pub use template::Template;

use thiserror::Error;

/// One rendered, ready-to-send email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
    pub body: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("malformed template at byte {position}: {reason}")]
    MalformedTemplate { position: usize, reason: &'static str },

    #[error("template placeholder {{{0}}} has no value")]
    MissingField(String),

    #[error("row {row} has {found} values but {expected} columns were selected")]
    RowShape {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("column '{0}' is required by this email sender but was not selected")]
    MissingColumn(String),

    #[error("row {row} has no email address")]
    MissingAddress { row: usize },

    #[error("row {row} has member role '{role}', expected 'parent' or 'child'")]
    UnknownRole { row: usize, role: String },
}
