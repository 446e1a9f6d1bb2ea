//! Append-only log of campaign runs, one JSON object per line.

use std::{
    env,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::courier_dir;

/// Bumped whenever a field changes meaning.
pub const HISTORY_FORMAT: u8 = 2;

/// Set to `0` or `false` to stop recording runs.
pub const HISTORY_ENV: &str = "COURIER_HISTORY";

/// How a campaign run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Interrupted,
    Aborted,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Aborted => "aborted",
        })
    }
}

/// Where a run left its delivered and failed address lists.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReportPaths {
    pub successes: PathBuf,
    pub failures: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunRecord {
    pub format: u8,
    pub started_at: DateTime<Utc>,
    /// Event key, which is also the table name.
    pub event: String,
    pub account: String,
    /// Rows in the table when the run started.
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub batches: usize,
    pub elapsed_ms: u64,
    pub outcome: RunOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports: Option<ReportPaths>,
    /// Why an aborted run stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunRecord {
    /// A run that ends now after `elapsed`; counts start at zero.
    pub fn new(event: String, account: String, outcome: RunOutcome, elapsed: Duration) -> Self {
        let taken = TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::zero());
        Self {
            format: HISTORY_FORMAT,
            started_at: Utc::now() - taken,
            event,
            account,
            total: 0,
            sent: 0,
            failed: 0,
            batches: 0,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            outcome,
            reports: None,
            error: None,
        }
    }

    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

fn recording_disabled() -> bool {
    env::var(HISTORY_ENV).is_ok_and(|val| val == "0" || val.eq_ignore_ascii_case("false"))
}

/// The run log under the courier state directory.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// `None` when recording is switched off through [`HISTORY_ENV`].
    pub fn open() -> Option<Self> {
        if recording_disabled() {
            return None;
        }
        Some(Self::at(courier_dir().join("history.log")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one run. A failed write is logged and otherwise ignored; the
    /// run it describes has already happened.
    pub fn record(&self, run: &RunRecord) {
        if let Err(e) = self.append(run) {
            warn!("Could not record run of '{}' in {}: {e}", run.event, self.path.display());
        }
    }

    fn append(&self, run: &RunRecord) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_vec(run).map_err(io::Error::other)?;
        line.push(b'\n');

        // A single O_APPEND write per run; a torn last line is skipped on read.
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(&line)
    }

    /// Every readable run, oldest first.
    pub fn runs(&self) -> Vec<RunRecord> {
        let Ok(file) = File::open(&self.path) else {
            return Vec::new();
        };
        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                serde_json::from_str(&line)
                    .map_err(|e| debug!("Skipping unreadable history line: {e}"))
                    .ok()
            })
            .collect()
    }

    /// Up to `limit` runs, newest first, optionally for one event only,
    /// together with how many matching runs were left out.
    pub fn latest(&self, event: Option<&str>, limit: usize) -> (Vec<RunRecord>, usize) {
        let mut runs: Vec<RunRecord> = self
            .runs()
            .into_iter()
            .rev()
            .filter(|run| event.is_none_or(|key| run.event == key))
            .collect();
        let hidden = runs.len().saturating_sub(limit);
        runs.truncate(limit);
        (runs, hidden)
    }

    /// Keep only the newest `keep` runs and return how many were dropped.
    /// Unreadable lines are dropped too.
    pub fn prune(&self, keep: usize) -> io::Result<usize> {
        let runs = self.runs();
        let dropped = runs.len().saturating_sub(keep);

        if keep == 0 {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(dropped),
            };
        }
        if dropped == 0 {
            return Ok(0);
        }

        let mut kept = Vec::new();
        for run in &runs[dropped..] {
            serde_json::to_writer(&mut kept, run).map_err(io::Error::other)?;
            kept.push(b'\n');
        }
        let staging = self.path.with_extension("log.tmp");
        fs::write(&staging, kept)?;
        fs::rename(&staging, &self.path)?;
        Ok(dropped)
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
