use std::fs;

use tempfile::tempdir;

use super::*;
use crate::{MemorySource, RowSource, Selection, Value};

fn roster(csv: &str) -> Result<Roster, LoadError> {
    Roster::from_reader(csv.as_bytes())
}

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn crsid_and_combined_name_are_normalised() {
    let roster = roster("crsid,name,college\nab123,\"Lovelace, Ada\",Trinity\n").expect("roster");

    assert_eq!(roster.columns(), cols(&["email", "first_name", "last_name", "college"]));
    assert_eq!(
        roster.rows(),
        [vec![
            "ab123@cam.ac.uk".to_string(),
            "Ada".to_string(),
            "Lovelace".to_string(),
            "Trinity".to_string(),
        ]]
    );
}

#[test]
fn split_names_pass_through() {
    let roster = roster("first_name,last_name,email\nAda,Lovelace,ada@x.com\n").expect("roster");

    assert_eq!(roster.columns(), cols(&["first_name", "last_name", "email"]));
    assert_eq!(roster.len(), 1);
}

#[test]
fn address_column_must_appear_exactly_once() {
    for csv in [
        "first_name,last_name\nAda,Lovelace\n",
        "first_name,last_name,email,crsid\nAda,Lovelace,ada@x.com,ab123\n",
    ] {
        let err = roster(csv).expect_err("address rule");
        assert!(matches!(err, LoadError::Address), "{csv:?}: {err:?}");
    }
}

#[test]
fn names_must_be_split_or_combined_not_both() {
    for csv in [
        "email\nada@x.com\n",
        "email,first_name\nada@x.com,Ada\n",
        "email,name,first_name,last_name\nada@x.com,\"L, A\",A,L\n",
        "email,name,last_name\nada@x.com,\"L, A\",L\n",
    ] {
        let err = roster(csv).expect_err("name rule");
        assert!(matches!(err, LoadError::Names), "{csv:?}: {err:?}");
    }
}

#[test]
fn combined_name_needs_last_comma_first() {
    let err = roster("email,name\nada@x.com,\"Lovelace, Ada\"\nbob@x.com,Bob\n")
        .expect_err("bad name");

    assert!(
        matches!(err, LoadError::NameFormat { row: 3, ref value } if value == "Bob"),
        "{err:?}"
    );
}

#[test]
fn ragged_rows_are_rejected() {
    let err = roster("email,first_name,last_name\nada@x.com,Ada\n").expect_err("ragged");

    assert!(matches!(
        err,
        LoadError::RowShape {
            row: 2,
            expected: 3,
            found: 2
        }
    ));
}

#[test]
fn empty_file_is_rejected() {
    assert!(matches!(roster(""), Err(LoadError::Empty)));
}

#[test]
fn create_builds_the_table_and_update_skips_known_addresses() {
    let mut store = MemorySource::new();
    let first = roster("email,first_name,last_name\na@x.com,A,One\nb@x.com,B,Two\n").expect("roster");

    let summary = load(&mut store, "gala", &first, LoadMode::Create).expect("create");
    assert_eq!(summary, LoadSummary { inserted: 2, skipped: 0 });

    let second = roster("email,first_name,last_name\nb@x.com,B,Two\nc@x.com,C,Three\n").expect("roster");
    let summary = load(&mut store, "gala", &second, LoadMode::Update).expect("update");
    assert_eq!(summary, LoadSummary { inserted: 1, skipped: 1 });

    let columns = cols(&["email"]);
    let rows = store.query(&Selection::all("gala", &columns)).expect("query");
    assert_eq!(
        rows,
        vec![
            vec![Value::from("a@x.com")],
            vec![Value::from("b@x.com")],
            vec![Value::from("c@x.com")],
        ]
    );
}

#[test]
fn create_refuses_an_existing_table() {
    let mut store = MemorySource::new().with_table("gala", ["email"], Vec::new());
    let roster = roster("email,first_name,last_name\na@x.com,A,One\n").expect("roster");

    let err = load(&mut store, "gala", &roster, LoadMode::Create).expect_err("exists");
    assert!(matches!(err, LoadError::TableExists(ref t) if t == "gala"));
}

#[test]
fn update_refuses_a_missing_table() {
    let mut store = MemorySource::new();
    let roster = roster("email,first_name,last_name\na@x.com,A,One\n").expect("roster");

    let err = load(&mut store, "gala", &roster, LoadMode::Update).expect_err("missing");
    assert!(matches!(err, LoadError::TableMissing(ref t) if t == "gala"));
    assert!(!store.table_exists("gala").expect("exists"));
}

#[test]
fn update_needs_every_table_column() {
    let mut store = MemorySource::new().with_table(
        "gala",
        ["email", "first_name", "last_name", "college"],
        Vec::new(),
    );
    let roster = roster("email,first_name,last_name\na@x.com,A,One\n").expect("roster");

    let err = load(&mut store, "gala", &roster, LoadMode::Update).expect_err("column");
    assert!(
        matches!(err, LoadError::MissingColumn { ref column, .. } if column == "college"),
        "{err:?}"
    );
}

#[test]
fn roster_reads_from_a_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("gala.csv");
    fs::write(&path, "email , name\n a@x.com ,\"One, A\"\n").expect("write");

    let roster = Roster::from_path(&path).expect("roster");

    assert_eq!(roster.columns(), cols(&["email", "first_name", "last_name"]));
    assert_eq!(roster.rows()[0], ["a@x.com", "A", "One"]);
}
