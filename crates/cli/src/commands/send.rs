use std::{
    collections::BTreeSet,
    num::NonZeroUsize,
    path::PathBuf,
    process::ExitCode,
    time::{Duration, Instant},
};

use anyhow::{Context, bail};
use clap::Args;
use courier_campaign::{CampaignOutcome, CampaignPlan, Gate, RunSummary};
use courier_engine::{SmtpConnector, StdoutProgress};
use courier_runtime::{
    DEFAULT_BAR_WIDTH, DEFAULT_BATCH_SIZE, DEFAULT_WORKERS,
    history::{HistoryStore, ReportPaths, RunOutcome, RunRecord},
};
use courier_source::PgSource;
use dialoguer::{Confirm, Select};
use log::{error, info, warn};

use super::{ProjectArgs, pg_config};
use crate::signals;

#[derive(Debug, Args)]
pub struct SendArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Event to send; prompts when omitted
    #[arg(long, short = 'e')]
    pub event: Option<String>,

    /// Sending account; prompts when omitted
    #[arg(long, short = 'a')]
    pub account: Option<String>,

    /// Rows fetched and sent per batch
    #[arg(
        long,
        default_value_t = DEFAULT_BATCH_SIZE as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub batch_size: u64,

    /// Fetch and send every row as a single batch
    #[arg(long, conflicts_with = "batch_size")]
    pub no_batching: bool,

    /// Parallel send workers (and maximum open SMTP connections)
    #[arg(long, short = 'w', default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Width of the progress bar
    #[arg(long, default_value_t = DEFAULT_BAR_WIDTH)]
    pub bar_width: usize,

    /// Where successful_emails.csv and failed_emails.csv are written
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub report_dir: PathBuf,

    /// Timeout for each SMTP call; waits indefinitely when omitted
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Send without asking for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl SendArgs {
    /// `None` sends every row as a single batch.
    pub fn batch_size(&self) -> Option<NonZeroUsize> {
        if self.no_batching {
            return None;
        }
        usize::try_from(self.batch_size).ok().and_then(NonZeroUsize::new)
    }
}

pub fn run(args: SendArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("Email sending failed: {e:#}");
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Yes/no prompt shown once the recipient count is known.
struct Prompt {
    assume_yes: bool,
}

impl Gate for Prompt {
    fn confirm(&mut self, count: usize) -> bool {
        let suffix = if count == 1 { "" } else { "s" };

        let confirmed = self.assume_yes
            || Confirm::new()
                .with_prompt(format!("{count} email{suffix} will be sent. Continue?"))
                .default(false)
                .interact()
                .unwrap_or_else(|e| {
                    warn!("Confirmation prompt failed: {e}");
                    false
                });

        if confirmed {
            println!("Sending emails...");
        }
        confirmed
    }
}

fn choose(what: &str, options: BTreeSet<String>) -> anyhow::Result<String> {
    let options: Vec<String> = options.into_iter().collect();
    if options.is_empty() {
        bail!("no {what}s found in the project");
    }

    let picked = Select::new()
        .with_prompt(format!("Select an {what}"))
        .items(&options)
        .default(0)
        .interact()
        .with_context(|| format!("no {what} selected"))?;

    Ok(options[picked].clone())
}

fn execute(args: SendArgs) -> anyhow::Result<ExitCode> {
    let layout = args.project.layout();

    let event_key = match args.event.clone() {
        Some(key) => key,
        None => choose("event", layout.events()?)?,
    };
    let account_key = match args.account.clone() {
        Some(key) => key,
        None => choose("account", layout.accounts()?)?,
    };

    let account = layout.load_account(&account_key)?;
    let plan = CampaignPlan::load(&layout, &event_key, &account)?
        .with_batch_size(args.batch_size())
        .with_workers(args.workers)
        .with_bar_width(args.bar_width)
        .with_report_dir(&args.report_dir);
    let database = layout.load_database()?;

    let connector = SmtpConnector::new(
        account.smtp_host.as_str(),
        account.smtp_port,
        account.email.as_str(),
        account.password.as_str(),
        args.timeout_secs.map(Duration::from_secs),
    )
    .context("cannot set up the SMTP client")?;

    let interrupt = signals::install().context("cannot install signal handlers")?;

    let mut source = PgSource::connect(&pg_config(database))
        .context("cannot connect to the database")?;
    info!("Database connection opened");

    let started = Instant::now();
    let result = courier_campaign::run(
        &plan,
        &mut source,
        connector,
        &mut Prompt {
            assume_yes: args.yes,
        },
        Box::new(StdoutProgress::default()),
        interrupt,
    );

    match source.close() {
        Ok(()) => info!("Database connection closed"),
        Err(e) => warn!("Database connection did not close cleanly: {e}"),
    }

    let record = |outcome, summary: Option<&RunSummary>, error: Option<String>| {
        let Some(store) = HistoryStore::open() else {
            return;
        };
        let mut run = RunRecord::new(event_key.clone(), account_key.clone(), outcome, started.elapsed());
        if let Some(summary) = summary {
            run.total = summary.total;
            run.sent = summary.sent;
            run.failed = summary.attempted.saturating_sub(summary.sent);
            run.batches = summary.batches;
            run.reports = Some(ReportPaths {
                successes: summary.report.successes.clone(),
                failures: summary.report.failures.clone(),
            });
        }
        run.error = error;
        store.record(&run);
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            record(RunOutcome::Aborted, None, Some(format!("{e:#}")));
            info!("Finished email sending process");
            return Err(e).context(format!("campaign '{event_key}' aborted"));
        }
    };

    let code = match outcome {
        CampaignOutcome::NothingToSend => {
            println!("No emails found, table {event_key} is empty");
            ExitCode::from(1)
        }
        CampaignOutcome::Declined { .. } => {
            println!("Emails not sent");
            ExitCode::from(1)
        }
        CampaignOutcome::Finished(summary) => {
            println!("{}", summary.line());
            println!(
                "{}/{} emails sent successfully. Reports: {} and {}",
                summary.sent,
                summary.total,
                summary.report.successes.display(),
                summary.report.failures.display()
            );

            if summary.interrupted {
                record(RunOutcome::Interrupted, Some(&summary), None);
                eprintln!("[error] interrupted; unsent emails are listed in the failure report");
                ExitCode::from(2)
            } else {
                record(RunOutcome::Completed, Some(&summary), None);
                if summary.sent == 0 {
                    ExitCode::from(1)
                } else {
                    ExitCode::from(0)
                }
            }
        }
    };

    info!("Finished email sending process");
    Ok(code)
}

#[cfg(test)]
#[path = "send_tests.rs"]
mod tests;
