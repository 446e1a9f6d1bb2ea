use std::{num::NonZeroUsize, path::PathBuf};

use courier_engine::{EngineConfig, InlineImage, Letter};
use courier_runtime::{
    AccountDetails, ConfigError, DEFAULT_BAR_WIDTH, DEFAULT_BATCH_SIZE, DEFAULT_WORKERS,
    EventDetails, ProjectLayout,
};

/// Read-only description of one run, loaded once before anything is sent.
#[derive(Debug, Clone)]
pub struct CampaignPlan {
    pub event: EventDetails,
    /// Address every email is sent from.
    pub sender: String,
    pub image: Option<InlineImage>,
    /// Rows per batch; `None` sends everything as one batch.
    pub batch_size: Option<NonZeroUsize>,
    pub workers: usize,
    pub bar_width: usize,
    pub report_dir: PathBuf,
}

impl CampaignPlan {
    pub fn new(event: EventDetails, sender: impl Into<String>) -> Self {
        Self {
            event,
            sender: sender.into(),
            image: None,
            batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE),
            workers: DEFAULT_WORKERS,
            bar_width: DEFAULT_BAR_WIDTH,
            report_dir: PathBuf::from("."),
        }
    }

    /// Load the event descriptor and its attachment from a project.
    pub fn load(
        layout: &ProjectLayout,
        event_key: &str,
        account: &AccountDetails,
    ) -> Result<Self, ConfigError> {
        let event = layout.load_event(event_key)?;

        let image = match &event.attachment {
            Some(file_name) => Some(InlineImage::new(
                file_name.as_str(),
                layout.load_attachment(file_name)?,
            )),
            None => None,
        };

        Ok(Self {
            image,
            ..Self::new(event, account.email.as_str())
        })
    }

    /// `None` fetches and sends every row as one batch.
    pub fn with_batch_size(mut self, batch_size: Option<NonZeroUsize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_bar_width(mut self, bar_width: usize) -> Self {
        self.bar_width = bar_width;
        self
    }

    pub fn with_report_dir(mut self, report_dir: impl Into<PathBuf>) -> Self {
        self.report_dir = report_dir.into();
        self
    }

    pub fn letter(&self) -> Letter {
        Letter {
            from: self.sender.clone(),
            subject: self.event.subject.clone(),
            image: self.image.clone(),
        }
    }

    pub(crate) fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            workers: self.workers,
            bar_width: self.bar_width,
            report_dir: self.report_dir.clone(),
        }
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
