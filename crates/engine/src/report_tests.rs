use std::{sync::Arc, thread};

use super::*;

#[test]
fn records_from_many_threads_are_all_kept() {
    let report = Arc::new(Report::new());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let report = Arc::clone(&report);
            thread::spawn(move || {
                for i in 0..50 {
                    let address = format!("t{t}-{i}@x.com");
                    if i % 5 == 0 {
                        report.record_failure(&address, "550 rejected");
                    } else {
                        report.record_success(&address);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker");
    }

    assert_eq!(report.len(), 400);
    assert_eq!(report.failures().len(), 80);
    assert_eq!(report.successes().len(), 320);
}

#[test]
fn write_csv_numbers_rows_from_one() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let report = Report::new();
    report.record_success("ada@x.com");
    report.record_success("bob@x.com");
    report.record_failure("cy@x.com", "transmission failed: 550, mailbox unavailable");

    let files = report.write_csv(dir.path()).expect("write");

    let ok = fs::read_to_string(&files.successes).expect("read successes");
    assert_eq!(ok, "num,successful_emails\n1,ada@x.com\n2,bob@x.com\n");

    let failed = fs::read_to_string(&files.failures).expect("read failures");
    assert_eq!(
        failed,
        "num,failed_emails,error\n1,cy@x.com,\"transmission failed: 550, mailbox unavailable\"\n"
    );
}

#[test]
fn all_failures_produce_empty_success_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let report = Report::new();
    for i in 0..5 {
        report.record_failure(&format!("r{i}@x.com"), "connect failed");
    }

    let files = report.write_csv(&dir.path().join("reports")).expect("write");

    let ok = fs::read_to_string(&files.successes).expect("read successes");
    assert_eq!(ok.lines().count(), 1, "header only");

    let failed = fs::read_to_string(&files.failures).expect("read failures");
    assert_eq!(failed.lines().count(), 6, "header + 5 rows");
}
