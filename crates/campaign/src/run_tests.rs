use std::{fs, num::NonZeroUsize, sync::atomic::AtomicBool};

use courier_engine::{BufferedProgress, testkit::Script};
use courier_runtime::{ConfigError, EventDetails};
use courier_source::{DataSourceError, MemorySource, Value};
use tempfile::TempDir;

use super::*;

fn event(table: &str, cols: &[&str], body: &str) -> EventDetails {
    EventDetails {
        name: "Welcome night".into(),
        subject: "See you there".into(),
        attachment: None,
        cols: cols.iter().map(|c| c.to_string()).collect(),
        grouping_requirement: None,
        email_sender: None,
        body: body.into(),
        table_name: table.into(),
    }
}

fn guests(n: usize) -> MemorySource {
    let rows = (0..n).map(|i| vec![Value::from(format!("Guest{i}")), Value::from(format!("g{i}@x.com"))]);
    MemorySource::new().with_table("guests", ["first_name", "email"], rows)
}

fn plan(event: EventDetails, dir: &TempDir) -> CampaignPlan {
    CampaignPlan::new(event, "events@club.org")
        .with_batch_size(NonZeroUsize::new(4))
        .with_workers(2)
        .with_report_dir(dir.path())
}

fn go<S: RowSource>(
    plan: &CampaignPlan,
    source: S,
    script: &Script,
    interrupt: Arc<AtomicBool>,
) -> Result<CampaignOutcome, CampaignError> {
    run(
        plan,
        source,
        script.connector(),
        &mut |_: usize| true,
        Box::new(BufferedProgress::new()),
        interrupt,
    )
}

fn no_interrupt() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

#[test]
fn sends_every_row_in_batches() {
    let dir = TempDir::new().expect("tempdir");
    let script = Script::new();
    let plan = plan(event("guests", &["first_name", "email"], "Dear {first_name}"), &dir);

    let outcome = go(&plan, guests(10), &script, no_interrupt()).expect("run");

    let CampaignOutcome::Finished(summary) = outcome else {
        panic!("expected a finished run, got {outcome:?}");
    };
    assert_eq!(summary.total, 10);
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.sent, 10);
    assert_eq!(summary.attempted, 10);
    assert!(!summary.interrupted);
    assert!(summary.connections_opened <= 2);
    assert_eq!(script.delivered().len(), 10);
    assert_eq!(script.open_now(), 0);

    let successes = fs::read_to_string(&summary.report.successes).expect("report");
    assert_eq!(successes.lines().count(), 11);
}

#[test]
fn no_batching_sends_one_batch() {
    let dir = TempDir::new().expect("tempdir");
    let script = Script::new();
    let plan = plan(event("guests", &["first_name", "email"], "Hi"), &dir).with_batch_size(None);

    let outcome = go(&plan, guests(7), &script, no_interrupt()).expect("run");

    let CampaignOutcome::Finished(summary) = outcome else {
        panic!("expected a finished run, got {outcome:?}");
    };
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.sent, 7);
}

#[test]
fn empty_table_sends_nothing_and_opens_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let script = Script::new();
    let plan = plan(event("guests", &["first_name", "email"], "Hi"), &dir);

    let outcome = go(&plan, guests(0), &script, no_interrupt()).expect("run");

    assert_eq!(outcome, CampaignOutcome::NothingToSend);
    assert_eq!(script.connects(), 0);
    assert!(script.delivered().is_empty());
}

#[test]
fn declined_confirmation_sends_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let script = Script::new();
    let plan = plan(event("guests", &["first_name", "email"], "Hi"), &dir);

    let mut asked = None;
    let outcome = run(
        &plan,
        guests(3),
        script.connector(),
        &mut |count: usize| {
            asked = Some(count);
            false
        },
        Box::new(BufferedProgress::new()),
        no_interrupt(),
    )
    .expect("run");

    assert_eq!(outcome, CampaignOutcome::Declined { count: 3 });
    assert_eq!(asked, Some(3));
    assert_eq!(script.connects(), 0);
}

#[test]
fn unknown_strategy_fails_before_touching_the_source() {
    let dir = TempDir::new().expect("tempdir");
    let script = Script::new();
    let mut details = event("guests", &["first_name", "email"], "Hi");
    details.email_sender = Some("carrier_pigeon".into());
    let plan = plan(details, &dir);

    let err = go(&plan, MemorySource::new(), &script, no_interrupt()).expect_err("unknown strategy");

    assert!(matches!(
        err,
        CampaignError::Config(ConfigError::UnknownStrategy(ref name)) if name == "carrier_pigeon"
    ));
}

#[test]
fn missing_table_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let script = Script::new();
    let plan = plan(event("nowhere", &["first_name", "email"], "Hi"), &dir);

    let err = go(&plan, guests(3), &script, no_interrupt()).expect_err("missing table");

    assert!(matches!(
        err,
        CampaignError::DataSource(DataSourceError::RelationMissing(_))
    ));
    assert_eq!(script.connects(), 0);
}

#[test]
fn render_error_aborts_but_still_closes_and_reports() {
    let dir = TempDir::new().expect("tempdir");
    let script = Script::new();
    // Rows 4.. have no address, so the second batch fails to render.
    let rows = (0..8).map(|i| {
        let email = if i < 4 { Value::from(format!("g{i}@x.com")) } else { Value::Null };
        vec![Value::from(format!("Guest{i}")), email]
    });
    let source = MemorySource::new().with_table("guests", ["first_name", "email"], rows);
    let plan = plan(event("guests", &["first_name", "email"], "Dear {first_name}"), &dir);

    let err = go(&plan, source, &script, no_interrupt()).expect_err("render error");

    assert!(matches!(err, CampaignError::Render(_)));
    assert_eq!(script.delivered().len(), 4);
    assert_eq!(script.open_now(), 0);

    let successes = fs::read_to_string(dir.path().join("successful_emails.csv")).expect("report");
    assert_eq!(successes.lines().count(), 5);
}

#[test]
fn interrupt_stops_further_batches() {
    let dir = TempDir::new().expect("tempdir");
    let script = Script::new();
    let plan = plan(event("guests", &["first_name", "email"], "Hi"), &dir);
    let interrupt = Arc::new(AtomicBool::new(true));

    let outcome = go(&plan, guests(10), &script, interrupt).expect("run");

    let CampaignOutcome::Finished(summary) = outcome else {
        panic!("expected a finished run, got {outcome:?}");
    };
    assert!(summary.interrupted);
    assert_eq!(summary.batches, 0);
    assert_eq!(summary.attempted, 0);
    assert_eq!(script.connects(), 0);
}

fn families(details_grouping: Option<&str>) -> (MemorySource, EventDetails) {
    let cols = ["family_id", "first_name", "last_name", "email", "subject", "college", "member"];
    let mut rows = Vec::new();
    for family in 0..3i64 {
        for (n, role) in ["parent", "child", "child"].iter().enumerate() {
            rows.push(vec![
                Value::Int(family),
                Value::from(format!("F{family}M{n}")),
                Value::from("Smith"),
                Value::from(format!("f{family}m{n}@x.com")),
                Value::from("Maths"),
                Value::from("Trinity"),
                Value::from(*role),
            ]);
        }
    }
    let source = MemorySource::new().with_table("families", cols, rows);

    let mut details = event("families", &cols, "Dear {receiver}, {parents_table}{children_table}");
    details.grouping_requirement = details_grouping.map(str::to_owned);
    details.email_sender = Some("families".into());
    (source, details)
}

#[test]
fn grouped_campaign_keeps_families_together() {
    let dir = TempDir::new().expect("tempdir");
    let script = Script::new();
    let (source, details) = families(Some("family_id"));
    let plan = plan(details, &dir);

    let outcome = go(&plan, source, &script, no_interrupt()).expect("run");

    let CampaignOutcome::Finished(summary) = outcome else {
        panic!("expected a finished run, got {outcome:?}");
    };
    // Batch size 4 takes two families (6 rows), then the last one.
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.sent, 9);
}

#[test]
fn families_strategy_groups_batches_without_a_grouping_column() {
    let dir = TempDir::new().expect("tempdir");
    let script = Script::new();
    let (source, details) = families(None);
    let plan = plan(details, &dir);

    let outcome = go(&plan, source, &script, no_interrupt()).expect("run");

    let CampaignOutcome::Finished(summary) = outcome else {
        panic!("expected a finished run, got {outcome:?}");
    };
    // Split on row count alone, family 1 would straddle the first two batches.
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.sent, 9);
}

#[test]
fn summary_line_pluralises_batches() {
    let summary = |batches| RunSummary {
        total: 1,
        batches,
        sent: 1,
        attempted: 1,
        elapsed: Duration::from_secs(75),
        interrupted: false,
        connections_opened: 1,
        connections_replaced: 0,
        report: courier_engine::ReportFiles {
            successes: "s.csv".into(),
            failures: "f.csv".into(),
        },
    };

    assert_eq!(
        summary(1).line(),
        "Emails sent in 1 batch, time taken: 1 minutes and 15.00 seconds"
    );
    assert!(summary(3).line().starts_with("Emails sent in 3 batches,"));
}
