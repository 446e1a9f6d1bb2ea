use std::io::Write as _;

use serial_test::serial;
use tempfile::{TempDir, tempdir};

use super::*;

fn store() -> (HistoryStore, TempDir) {
    let dir = tempdir().expect("create temp dir");
    let store = HistoryStore::at(dir.path().join("state").join("history.log"));
    (store, dir)
}

fn finished(event: &str, sent: usize, failed: usize) -> RunRecord {
    RunRecord {
        total: sent + failed,
        sent,
        failed,
        batches: 1,
        reports: Some(ReportPaths {
            successes: "out/successful_emails.csv".into(),
            failures: "out/failed_emails.csv".into(),
        }),
        ..RunRecord::new(event.into(), "club".into(), RunOutcome::Completed, Duration::from_secs(2))
    }
}

#[test]
fn new_record_is_backdated_by_its_duration() {
    let before = Utc::now();
    let run = RunRecord::new("welcome".into(), "club".into(), RunOutcome::Aborted, Duration::from_secs(90));

    assert_eq!(run.format, HISTORY_FORMAT);
    assert_eq!(run.elapsed_ms, 90_000);
    assert_eq!(run.attempted(), 0);
    assert!(run.started_at <= before - TimeDelta::seconds(89));
    assert!(run.reports.is_none() && run.error.is_none());
}

#[test]
fn recorded_run_reads_back_with_its_reports() {
    let (store, _dir) = store();

    store.record(&finished("welcome", 38, 2));

    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].event, "welcome");
    assert_eq!(runs[0].attempted(), 40);
    assert_eq!(runs[0].outcome, RunOutcome::Completed);
    assert_eq!(
        runs[0].reports.as_ref().map(|r| r.failures.clone()),
        Some(PathBuf::from("out/failed_emails.csv"))
    );
}

#[test]
fn aborted_run_keeps_its_error_and_omits_reports() {
    let (store, _dir) = store();
    let mut run = RunRecord::new("gala".into(), "club".into(), RunOutcome::Aborted, Duration::ZERO);
    run.error = Some("table gala does not exist".into());

    store.record(&run);

    let line = fs::read_to_string(store.path()).expect("read log");
    assert!(line.contains("\"outcome\":\"aborted\""), "{line}");
    assert!(!line.contains("reports"), "{line}");
    assert_eq!(store.runs()[0].error.as_deref(), Some("table gala does not exist"));
}

#[test]
fn missing_log_has_no_runs() {
    let (store, _dir) = store();
    assert!(store.runs().is_empty());
    let (runs, hidden) = store.latest(None, 5);
    assert!(runs.is_empty());
    assert_eq!(hidden, 0);
}

#[test]
fn latest_is_newest_first_filtered_and_counts_the_rest() {
    let (store, _dir) = store();
    for (i, event) in ["welcome", "gala", "welcome", "welcome"].iter().enumerate() {
        store.record(&finished(event, i, 0));
    }

    let (runs, hidden) = store.latest(None, 2);
    assert_eq!(runs.iter().map(|r| r.sent).collect::<Vec<_>>(), vec![3, 2]);
    assert_eq!(hidden, 2);

    let (runs, hidden) = store.latest(Some("welcome"), 5);
    assert_eq!(runs.iter().map(|r| r.sent).collect::<Vec<_>>(), vec![3, 2, 0]);
    assert_eq!(hidden, 0);
}

#[test]
fn unreadable_lines_are_skipped() {
    let (store, _dir) = store();
    store.record(&finished("first", 1, 0));
    {
        let mut file = OpenOptions::new().append(true).open(store.path()).expect("open log");
        writeln!(file, "not json").expect("write junk");
        writeln!(file).expect("write blank");
    }
    store.record(&finished("second", 2, 0));

    let events: Vec<String> = store.runs().into_iter().map(|r| r.event).collect();
    assert_eq!(events, vec!["first", "second"]);
}

#[test]
fn prune_keeps_the_newest_runs() {
    let (store, _dir) = store();
    for i in 0..5 {
        store.record(&finished("welcome", i, 0));
    }

    assert_eq!(store.prune(2).expect("prune"), 3);
    assert_eq!(store.runs().iter().map(|r| r.sent).collect::<Vec<_>>(), vec![3, 4]);

    assert_eq!(store.prune(10).expect("prune again"), 0);
    assert_eq!(store.runs().len(), 2);
}

#[test]
fn prune_to_zero_removes_the_log() {
    let (store, _dir) = store();
    store.record(&finished("welcome", 1, 0));

    assert_eq!(store.prune(0).expect("prune"), 1);
    assert!(!store.path().exists());
    assert_eq!(store.prune(0).expect("already gone"), 0);
}

#[test]
fn outcome_serialises_in_snake_case() {
    assert_eq!(serde_json::to_string(&RunOutcome::Interrupted).expect("json"), "\"interrupted\"");
    assert_eq!(RunOutcome::Completed.to_string(), "completed");
}

#[test]
#[serial]
fn open_respects_the_history_switch() {
    unsafe { env::remove_var(HISTORY_ENV) };
    assert!(HistoryStore::open().is_some(), "recording is on by default");

    for off in ["0", "false", "FALSE"] {
        unsafe { env::set_var(HISTORY_ENV, off) };
        assert!(HistoryStore::open().is_none(), "{off} should switch recording off");
    }

    unsafe { env::set_var(HISTORY_ENV, "1") };
    assert!(HistoryStore::open().is_some());
    unsafe { env::remove_var(HISTORY_ENV) };
}
