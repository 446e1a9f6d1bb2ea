use std::{
    io::{self, Write},
    time::Duration,
};

/// Where the live progress line goes.
pub trait ProgressSink {
    /// Replace the current progress line.
    fn update(&mut self, line: &str);

    /// Called once when no more updates will come.
    fn finish(&mut self) {}
}

/// Single self-overwriting line on stdout.
#[derive(Debug, Default)]
pub struct StdoutProgress {
    last_len: usize,
}

impl ProgressSink for StdoutProgress {
    fn update(&mut self, line: &str) {
        // Pad over whatever was left of a longer previous line.
        let pad = self.last_len.saturating_sub(line.len());
        self.last_len = line.len();

        let mut out = io::stdout().lock();
        let _ = write!(out, "\r{line}{:pad$}", "");
        let _ = out.flush();
    }

    fn finish(&mut self) {
        if self.last_len > 0 {
            println!();
        }
    }
}

/// Keeps every line; for tests.
#[derive(Debug, Default)]
pub struct BufferedProgress {
    lines: Vec<String>,
    finished: bool,
}

impl BufferedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ProgressSink for BufferedProgress {
    fn update(&mut self, line: &str) {
        self.lines.push(line.to_owned());
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl<P: ProgressSink + ?Sized> ProgressSink for &mut P {
    fn update(&mut self, line: &str) {
        (**self).update(line)
    }

    fn finish(&mut self) {
        (**self).finish()
    }
}

/// Run-wide counters behind the progress line. Only the coordinating
/// thread touches them.
#[derive(Debug, Clone)]
pub struct Progress {
    total: usize,
    sent: usize,
    attempted: usize,
    batch: usize,
    width: usize,
}

impl Progress {
    pub fn new(total: usize, width: usize) -> Self {
        Self {
            total,
            sent: 0,
            attempted: 0,
            batch: 0,
            width,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn start_batch(&mut self) {
        self.batch += 1;
    }

    pub fn record(&mut self, delivered: bool) {
        self.attempted += 1;
        if delivered {
            self.sent += 1;
        }
    }

    /// Estimated time left: tasks not yet attempted times the mean time per
    /// attempt so far. `None` until something has been attempted.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        if self.attempted == 0 {
            return None;
        }
        let left = self.total.saturating_sub(self.attempted);
        Some(elapsed.mul_f64(left as f64 / self.attempted as f64))
    }

    pub fn bar(&self) -> String {
        let stars = if self.total == 0 {
            self.width
        } else {
            (self.sent * self.width / self.total).min(self.width)
        };
        format!("{}{}", "*".repeat(stars), "-".repeat(self.width - stars))
    }

    pub fn line(&self, elapsed: Duration) -> String {
        let mut line = format!(
            "Batch number {}, Progress: {} {}/{} emails sent",
            self.batch.max(1),
            self.bar(),
            self.sent,
            self.total
        );

        if let Some(left) = self.remaining(elapsed) {
            let (mins, secs) = minutes_seconds(left);
            line.push_str(&format!(
                ". Time remaining {mins} minutes and {} seconds",
                secs as u64
            ));
        }
        line
    }
}

/// Whole minutes and the leftover seconds.
pub fn minutes_seconds(d: Duration) -> (u64, f64) {
    let total = d.as_secs_f64();
    let mins = (total / 60.0).floor();
    (mins as u64, total - mins * 60.0)
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
