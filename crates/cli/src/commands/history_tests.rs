use std::time::Duration;

use courier_runtime::history::{ReportPaths, RunOutcome};

use super::*;

fn record(outcome: RunOutcome) -> RunRecord {
    RunRecord::new("welcome".into(), "club".into(), outcome, Duration::from_secs(75))
}

#[test]
fn finished_run_lists_counts_and_reports() {
    let mut run = record(RunOutcome::Interrupted);
    run.total = 40;
    run.sent = 18;
    run.failed = 2;
    run.batches = 1;
    run.reports = Some(ReportPaths {
        successes: "out/successful_emails.csv".into(),
        failures: "out/failed_emails.csv".into(),
    });

    let block = describe(&run);
    let lines: Vec<&str> = block.lines().collect();

    assert!(lines[0].ends_with("welcome from club  [interrupted]"), "{}", lines[0]);
    assert_eq!(lines[1], "  18 sent, 2 failed, 20 of 40 rows in 1 batch(es), 1m 15s");
    assert_eq!(lines[2], "  reports: out/successful_emails.csv out/failed_emails.csv");
    assert_eq!(lines.len(), 3);
}

#[test]
fn aborted_run_shows_its_error() {
    let mut run = record(RunOutcome::Aborted);
    run.error = Some("table welcome does not exist".into());

    let block = describe(&run);

    assert!(block.contains("[aborted]"));
    assert!(block.ends_with("\n  error: table welcome does not exist"), "{block}");
    assert!(!block.contains("reports:"));
}
