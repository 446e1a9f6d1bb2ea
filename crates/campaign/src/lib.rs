mod plan;
mod run;

pub use plan::CampaignPlan;
pub use run::{CampaignOutcome, Gate, RunSummary, run};

use courier_engine::ReportError;
use courier_render::{RenderError, UnknownStrategy};
use courier_runtime::ConfigError;
use courier_source::DataSourceError;
use thiserror::Error;

/// Anything that stops a campaign. Per-recipient send failures never show
/// up here; they are recorded in the report instead.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl From<UnknownStrategy> for CampaignError {
    fn from(e: UnknownStrategy) -> Self {
        Self::Config(ConfigError::UnknownStrategy(e.0))
    }
}
