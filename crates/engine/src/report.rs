use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use log::info;
use thiserror::Error;

pub const SUCCESS_FILE: &str = "successful_emails.csv";
pub const FAILURE_FILE: &str = "failed_emails.csv";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot create report directory {}: {source}", path.display())]
    Dir { path: PathBuf, source: io::Error },

    #[error("cannot write report {}: {source}", path.display())]
    Write { path: PathBuf, source: csv::Error },

    #[error("cannot flush report {}: {source}", path.display())]
    Flush { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub address: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub successes: PathBuf,
    pub failures: PathBuf,
}

/// Delivered and failed addresses, appended to from any worker.
///
/// Each list has its own lock, held only for the append.
#[derive(Debug, Default)]
pub struct Report {
    successes: Mutex<Vec<String>>,
    failures: Mutex<Vec<Failure>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, address: &str) {
        self.successes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(address.to_owned());
    }

    pub fn record_failure(&self, address: &str, error: impl ToString) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Failure {
                address: address.to_owned(),
                error: error.to_string(),
            });
    }

    pub fn successes(&self) -> Vec<String> {
        self.successes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Successes plus failures.
    pub fn len(&self) -> usize {
        let ok = self.successes.lock().unwrap_or_else(PoisonError::into_inner).len();
        let failed = self.failures.lock().unwrap_or_else(PoisonError::into_inner).len();
        ok + failed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write both lists as CSV files under `dir`, rows numbered from 1.
    ///
    /// Works on a snapshot, so no lock is held while writing.
    pub fn write_csv(&self, dir: &Path) -> Result<ReportFiles, ReportError> {
        fs::create_dir_all(dir).map_err(|source| ReportError::Dir {
            path: dir.to_path_buf(),
            source,
        })?;

        let files = ReportFiles {
            successes: dir.join(SUCCESS_FILE),
            failures: dir.join(FAILURE_FILE),
        };

        let successes = self.successes();
        write_rows(
            &files.successes,
            &["num", "successful_emails"],
            successes.iter().map(|a| vec![a.as_str()]),
        )?;

        let failures = self.failures();
        write_rows(
            &files.failures,
            &["num", "failed_emails", "error"],
            failures
                .iter()
                .map(|f| vec![f.address.as_str(), f.error.as_str()]),
        )?;

        info!(
            "Wrote email reports: {} successful, {} failed, in {}",
            successes.len(),
            failures.len(),
            dir.display()
        );
        Ok(files)
    }
}

fn write_rows<'a>(
    path: &Path,
    header: &[&str],
    rows: impl Iterator<Item = Vec<&'a str>>,
) -> Result<(), ReportError> {
    let csv_err = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(header).map_err(csv_err)?;

    for (i, fields) in rows.enumerate() {
        let num = (i + 1).to_string();
        let record = std::iter::once(num.as_str()).chain(fields);
        writer.write_record(record).map_err(csv_err)?;
    }

    writer.flush().map_err(|source| ReportError::Flush {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
