use std::process::ExitCode;

use clap::Args;
use courier_engine::minutes_seconds;
use courier_runtime::history::{HistoryStore, RunRecord};
use log::{error, info};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Only show runs of this event
    #[arg(long, short = 'e')]
    pub event: Option<String>,

    /// Number of runs to show
    #[arg(long, short = 'n', default_value_t = 10)]
    pub limit: usize,

    /// Forget all but the newest KEEP runs instead of listing
    #[arg(long, value_name = "KEEP", conflicts_with_all = ["event", "limit"])]
    pub prune: Option<usize>,
}

pub fn run(args: HistoryArgs) -> ExitCode {
    let Some(store) = HistoryStore::open() else {
        info!("Run history is switched off");
        println!("Run history is switched off");
        return ExitCode::from(0);
    };

    if let Some(keep) = args.prune {
        return match store.prune(keep) {
            Ok(dropped) => {
                println!("Forgot {dropped} run(s), {keep} at most remain");
                ExitCode::from(0)
            }
            Err(e) => {
                error!("Could not prune {}: {e}", store.path().display());
                eprintln!("[error] could not prune run history: {e}");
                ExitCode::from(1)
            }
        };
    }

    let (runs, hidden) = store.latest(args.event.as_deref(), args.limit);
    if runs.is_empty() {
        match &args.event {
            Some(event) => println!("No recorded runs of '{event}'"),
            None => println!("No recorded runs"),
        }
        return ExitCode::from(0);
    }

    for run in &runs {
        println!("{}\n", describe(run));
    }
    if hidden > 0 {
        println!("{hidden} older run(s) not shown, raise --limit to see them");
    }
    ExitCode::from(0)
}

/// One block per run: a heading, the counts, then where its output went.
fn describe(run: &RunRecord) -> String {
    let (mins, secs) = minutes_seconds(run.elapsed());
    let mut block = format!(
        "{}  {} from {}  [{}]\n  {} sent, {} failed, {} of {} rows in {} batch(es), {mins}m {secs:.0}s",
        run.started_at.format("%Y-%m-%d %H:%M"),
        run.event,
        run.account,
        run.outcome,
        run.sent,
        run.failed,
        run.attempted(),
        run.total,
        run.batches,
    );
    if let Some(reports) = &run.reports {
        block.push_str(&format!(
            "\n  reports: {} {}",
            reports.successes.display(),
            reports.failures.display()
        ));
    }
    if let Some(error) = &run.error {
        block.push_str(&format!("\n  error: {error}"));
    }
    block
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
