use std::{
    collections::BTreeSet,
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use log::{info, warn};

use crate::transport::{Connection, Connector, SendError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Book-keeping for every connection the workers hold.
///
/// The live set never grows past the number of workers: a worker removes
/// its stale connection from the set before opening a replacement.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    live: Mutex<BTreeSet<ConnectionId>>,
    next_id: AtomicU64,
    opened: AtomicUsize,
    replaced: AtomicUsize,
}

impl Ledger {
    /// Open a connection and enter it in the live set.
    pub(crate) fn open<C: Connector>(
        this: &Arc<Self>,
        connector: &C,
    ) -> Result<Lease<C::Connection>, SendError> {
        let conn = connector.connect()?;
        let id = ConnectionId(this.next_id.fetch_add(1, Ordering::Relaxed));

        let live = {
            let mut set = this.live.lock().unwrap_or_else(PoisonError::into_inner);
            set.insert(id);
            set.len()
        };
        this.opened.fetch_add(1, Ordering::Relaxed);
        info!("SMTP connection {id} started, number of live connections: {live}");

        Ok(Lease {
            id,
            conn: Some(conn),
            ledger: Arc::clone(this),
        })
    }

    /// Number of connections currently held by workers.
    pub(crate) fn live(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    pub(crate) fn replaced(&self) -> usize {
        self.replaced.load(Ordering::Relaxed)
    }

    fn release<T: Connection>(&self, id: ConnectionId, conn: T) {
        let remaining = {
            let mut set = self.live.lock().unwrap_or_else(PoisonError::into_inner);
            set.remove(&id);
            set.len()
        };

        // Never close while holding the lock.
        match conn.close() {
            Ok(()) => info!("SMTP connection {id} stopped, remaining: {remaining}"),
            Err(e) => warn!("SMTP connection {id} did not close cleanly: {e}; remaining: {remaining}"),
        }
    }
}

/// A worker's claim on one live connection. Closing happens exactly once,
/// either through [`Lease::retire_stale`] or when the lease is dropped.
pub(crate) struct Lease<T: Connection> {
    id: ConnectionId,
    conn: Option<T>,
    ledger: Arc<Ledger>,
}

impl<T: Connection> Lease<T> {
    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn is_alive(&mut self) -> bool {
        self.conn.as_mut().is_some_and(|conn| conn.is_alive())
    }

    pub(crate) fn send(&mut self, message: &crate::Outgoing<'_>) -> Result<(), SendError> {
        match self.conn.as_mut() {
            Some(conn) => conn.send(message),
            None => Err(SendError::Transmit(format!("connection {} is closed", self.id))),
        }
    }

    /// Close this connection after a failed liveness check and count the replacement.
    /// The caller opens the new connection afterwards.
    pub(crate) fn retire_stale(mut self) {
        self.ledger.replaced.fetch_add(1, Ordering::Relaxed);
        if let Some(conn) = self.conn.take() {
            self.ledger.release(self.id, conn);
        }
    }
}

impl<T: Connection> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.ledger.release(self.id, conn);
        }
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
