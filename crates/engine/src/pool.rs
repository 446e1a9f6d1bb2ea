use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use courier_render::Recipient;
use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, info};

use crate::{
    ledger::{ConnectionId, Lease, Ledger},
    progress::{Progress, ProgressSink, minutes_seconds},
    report::{Report, ReportError, ReportFiles},
    transport::{Connector, Letter, SendError},
};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads, each holding at most one connection.
    pub workers: usize,
    /// Characters in the progress bar.
    pub bar_width: usize,
    /// Directory the success/failure reports are written to.
    pub report_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchResult {
    pub sent: usize,
    pub attempted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSummary {
    pub batches: usize,
    pub sent: usize,
    pub attempted: usize,
    pub connections_opened: usize,
    /// Connections that failed a liveness check and were replaced mid-run.
    pub connections_replaced: usize,
    pub report: ReportFiles,
}

/// State every worker reads.
struct Shared<C: Connector> {
    connector: C,
    letter: Letter,
    report: Arc<Report>,
    ledger: Arc<Ledger>,
    interrupt: Arc<AtomicBool>,
}

/// Fixed pool of send workers fed batch by batch from one coordinating
/// thread.
///
/// Each worker lazily opens one connection and keeps it for every task it
/// runs. Before each send it checks the connection is alive; a dead one is closed and
/// replaced once, and if that replacement fails the task is recorded as
/// failed. Workers append outcomes to the shared [`Report`]; only the
/// coordinating thread advances the progress counters.
///
/// Dropping the engine without calling [`SendEngine::finish`] still closes
/// every connection and writes the report.
pub struct SendEngine<C: Connector> {
    jobs: Option<Sender<Recipient>>,
    done: Receiver<bool>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared<C>>,
    progress: Progress,
    started: Instant,
    sink: Box<dyn ProgressSink>,
    report_dir: PathBuf,
    finished: bool,
}

impl<C: Connector> SendEngine<C> {
    /// Spawn the worker pool. `total` is the expected number of sends, used
    /// only for the progress estimate.
    pub fn new(
        connector: C,
        letter: Letter,
        config: EngineConfig,
        total: usize,
        sink: Box<dyn ProgressSink>,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        let shared = Arc::new(Shared {
            connector,
            letter,
            report: Arc::new(Report::new()),
            ledger: Arc::new(Ledger::default()),
            interrupt,
        });

        let (job_tx, job_rx) = channel::unbounded::<Recipient>();
        let (done_tx, done_rx) = channel::unbounded::<bool>();

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                let jobs = job_rx.clone();
                let done = done_tx.clone();
                let shared = Arc::clone(&shared);

                thread::spawn(move || worker_loop(worker_id, &jobs, &done, &shared))
            })
            .collect();

        debug!("[engine] started {} workers", config.workers.max(1));

        Self {
            jobs: Some(job_tx),
            done: done_rx,
            workers,
            shared,
            progress: Progress::new(total, config.bar_width),
            started: Instant::now(),
            sink,
            report_dir: config.report_dir,
            finished: false,
        }
    }

    pub fn report(&self) -> &Arc<Report> {
        &self.shared.report
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Connections currently open across all workers.
    pub fn live_connections(&self) -> usize {
        self.shared.ledger.live()
    }

    /// Send one batch and block until every task in it has succeeded or
    /// failed. Completions are folded in as they arrive, in any order.
    pub fn submit_batch(&mut self, recipients: Vec<Recipient>) -> BatchResult {
        self.progress.start_batch();
        let batch_no = self.progress.batch();
        let batch_start = Instant::now();
        self.sink.update(&self.progress.line(self.started.elapsed()));

        let mut queued = 0;
        for recipient in recipients {
            let rejected = match &self.jobs {
                Some(jobs) => jobs.send(recipient).err().map(|e| e.into_inner()),
                None => Some(recipient),
            };

            match rejected {
                None => queued += 1,
                Some(recipient) => {
                    // No worker left to take it; it still counts as attempted.
                    error!("No send worker available for {}", recipient.address);
                    self.shared
                        .report
                        .record_failure(&recipient.address, "send workers have shut down");
                    self.fold(false);
                }
            }
        }

        let mut result = BatchResult::default();
        for _ in 0..queued {
            match self.done.recv() {
                Ok(delivered) => {
                    result.attempted += 1;
                    result.sent += usize::from(delivered);
                    self.fold(delivered);
                }
                Err(_) => {
                    error!(
                        "All send workers exited with {} emails of batch {batch_no} outstanding",
                        queued - result.attempted
                    );
                    break;
                }
            }
        }

        let (mins, secs) = minutes_seconds(batch_start.elapsed());
        info!(
            "Batch number {batch_no} sent. {}/{} sent successfully in {mins} minutes and {secs:.2} seconds",
            result.sent, result.attempted
        );

        result
    }

    fn fold(&mut self, delivered: bool) {
        self.progress.record(delivered);
        self.sink.update(&self.progress.line(self.started.elapsed()));
    }

    /// Stop the workers, which closes their connections, then write the
    /// report.
    pub fn finish(mut self) -> Result<EngineSummary, ReportError> {
        self.shutdown();
        self.finished = true;

        let report = self.shared.report.write_csv(&self.report_dir)?;

        Ok(EngineSummary {
            batches: self.progress.batch(),
            sent: self.progress.sent(),
            attempted: self.progress.attempted(),
            connections_opened: self.shared.ledger.opened(),
            connections_replaced: self.shared.ledger.replaced(),
            report,
        })
    }

    fn shutdown(&mut self) {
        // Closing the job channel ends every worker loop.
        let Some(jobs) = self.jobs.take() else {
            return;
        };
        drop(jobs);

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("A send worker panicked");
            }
        }
        self.sink.finish();

        info!(
            "Number of failed and restarted SMTP connections: {}",
            self.shared.ledger.replaced()
        );
    }
}

impl<C: Connector> Drop for SendEngine<C> {
    fn drop(&mut self) {
        self.shutdown();
        if self.finished {
            return;
        }
        if let Err(e) = self.shared.report.write_csv(&self.report_dir) {
            error!("Email report not written: {e}");
        }
    }
}

fn worker_loop<C: Connector>(
    worker_id: usize,
    jobs: &Receiver<Recipient>,
    done: &Sender<bool>,
    shared: &Shared<C>,
) {
    // The worker's only connection; dropping it closes it.
    let mut slot: Option<Lease<C::Connection>> = None;

    while let Ok(recipient) = jobs.recv() {
        let delivered = deliver(shared, &mut slot, &recipient);
        if done.send(delivered).is_err() {
            break;
        }
    }

    debug!("[engine] worker {worker_id} exiting");
}

fn deliver<C: Connector>(
    shared: &Shared<C>,
    slot: &mut Option<Lease<C::Connection>>,
    recipient: &Recipient,
) -> bool {
    if shared.interrupt.load(Ordering::Acquire) {
        shared
            .report
            .record_failure(&recipient.address, SendError::Interrupted);
        return false;
    }

    match attempt(shared, slot, recipient) {
        Ok(id) => {
            info!(
                "Email to {} sent successfully with SMTP connection {id}",
                recipient.address
            );
            shared.report.record_success(&recipient.address);
            true
        }
        Err(e) => {
            let conn = slot
                .as_ref()
                .map_or_else(|| "none".to_owned(), |lease| lease.id().to_string());
            error!(
                "Failed to send email to {} using SMTP connection {conn}: {e}",
                recipient.address
            );
            shared.report.record_failure(&recipient.address, &e);
            false
        }
    }
}

/// One send over the worker's connection, opening or replacing it first if
/// needed. At most one fresh connection is opened per task.
fn attempt<C: Connector>(
    shared: &Shared<C>,
    slot: &mut Option<Lease<C::Connection>>,
    recipient: &Recipient,
) -> Result<ConnectionId, SendError> {
    let lease = match slot.take() {
        Some(mut lease) => {
            if lease.is_alive() {
                lease
            } else {
                info!("SMTP connection {} failed its liveness check, reconnecting", lease.id());
                lease.retire_stale();
                Ledger::open(&shared.ledger, &shared.connector)?
            }
        }
        None => Ledger::open(&shared.ledger, &shared.connector)?,
    };

    let lease = slot.insert(lease);
    lease.send(&shared.letter.to(&recipient.address, &recipient.body))?;
    Ok(lease.id())
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
