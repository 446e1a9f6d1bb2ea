use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use courier_engine::{Connector, ProgressSink, ReportFiles, SendEngine, minutes_seconds};
use courier_render::{Render, resolve};
use courier_source::{Cursor, RowSource};
use log::{error, info, warn};

use crate::{CampaignError, CampaignPlan};

/// Asks the operator whether to go ahead once the recipient count is known.
pub trait Gate {
    fn confirm(&mut self, count: usize) -> bool;
}

impl<F: FnMut(usize) -> bool> Gate for F {
    fn confirm(&mut self, count: usize) -> bool {
        self(count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignOutcome {
    /// The table was empty; nothing was sent and no connection was opened.
    NothingToSend,
    /// The operator declined to send to `count` rows.
    Declined { count: usize },
    Finished(RunSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows in the table when the run started.
    pub total: usize,
    pub batches: usize,
    pub sent: usize,
    pub attempted: usize,
    pub elapsed: Duration,
    /// An interrupt stopped the run before every batch was sent.
    pub interrupted: bool,
    pub connections_opened: usize,
    pub connections_replaced: usize,
    pub report: ReportFiles,
}

impl RunSummary {
    /// Human-readable closing line.
    pub fn line(&self) -> String {
        let (mins, secs) = minutes_seconds(self.elapsed);
        format!(
            "Emails sent in {} batch{}, time taken: {mins} minutes and {secs:.2} seconds",
            self.batches,
            if self.batches == 1 { "" } else { "es" }
        )
    }
}

/// Run one campaign from first fetch to written report.
///
/// The renderer is resolved and the table counted before anything else
/// happens. A fatal error from the row source or the renderer stops further
/// batches, but the engine is still shut down first so its connections are
/// closed and the report holds whatever was sent; the error is returned
/// afterwards. Setting `interrupt` stops new batches and fails queued tasks.
pub fn run<S, C>(
    plan: &CampaignPlan,
    source: S,
    connector: C,
    gate: &mut dyn Gate,
    sink: Box<dyn ProgressSink>,
    interrupt: Arc<AtomicBool>,
) -> Result<CampaignOutcome, CampaignError>
where
    S: RowSource,
    C: Connector,
{
    let event = &plan.event;
    let renderer = resolve(
        event.email_sender.as_deref(),
        event.grouping_requirement.as_deref(),
    )?;

    // A grouped renderer must see whole groups even if the event names no
    // grouping column of its own.
    let grouping = event
        .grouping_requirement
        .clone()
        .or_else(|| renderer.group_column().map(str::to_owned));
    let mut cursor = Cursor::new(source, event.table_name.as_str(), event.cols.clone(), grouping)?;

    let total = cursor.len();
    if total == 0 {
        info!("No emails found, table {} is empty", event.table_name);
        return Ok(CampaignOutcome::NothingToSend);
    }

    if !gate.confirm(total) {
        info!("Email sending terminated, emails not sent");
        return Ok(CampaignOutcome::Declined { count: total });
    }

    info!(
        "Starting email sending process for '{}' with the {} strategy: {total} rows from {}",
        event.name,
        renderer.name(),
        event.table_name
    );
    let started = Instant::now();

    let mut engine = SendEngine::new(
        connector,
        plan.letter(),
        plan.engine_config(),
        total,
        sink,
        Arc::clone(&interrupt),
    );

    let pumped = pump(plan, &mut cursor, renderer.as_ref(), &mut engine, &interrupt);
    let finished = engine.finish();

    if let Err(e) = pumped {
        if let Err(report_err) = finished {
            error!("{report_err}");
        }
        error!("Email sending aborted: {e}");
        return Err(e);
    }
    let engine_summary = finished?;

    let summary = RunSummary {
        total,
        batches: engine_summary.batches,
        sent: engine_summary.sent,
        attempted: engine_summary.attempted,
        elapsed: started.elapsed(),
        interrupted: interrupt.load(Ordering::Acquire),
        connections_opened: engine_summary.connections_opened,
        connections_replaced: engine_summary.connections_replaced,
        report: engine_summary.report,
    };

    let (mins, secs) = minutes_seconds(summary.elapsed);
    info!(
        "{}/{total} emails sent successfully in {} batch{}, time taken: {mins} minutes and {secs:.2} seconds",
        summary.sent,
        summary.batches,
        if summary.batches == 1 { "" } else { "es" }
    );

    Ok(CampaignOutcome::Finished(summary))
}

/// Fetch, render and send batches until the cursor runs dry.
fn pump<S: RowSource, C: Connector>(
    plan: &CampaignPlan,
    cursor: &mut Cursor<S>,
    renderer: &dyn Render,
    engine: &mut SendEngine<C>,
    interrupt: &AtomicBool,
) -> Result<(), CampaignError> {
    let mut has_more = true;

    while has_more {
        if interrupt.load(Ordering::Acquire) {
            warn!("Interrupted, no further batches will be sent");
            break;
        }

        let (rows, more) = cursor.get_data(plan.batch_size)?;
        has_more = more;
        if rows.is_empty() {
            continue;
        }

        let recipients = renderer.render(&rows, cursor.columns(), &plan.event.body)?;
        engine.submit_batch(recipients);
    }

    Ok(())
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
