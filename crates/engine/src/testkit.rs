//! Scripted in-memory transport for exercising the send engine without a
//! mail server.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::Duration,
};

use crate::transport::{Connection, Connector, Outgoing, SendError};

#[derive(Debug, Default)]
struct State {
    // knobs
    refuse_connects: usize,
    refuse_all_connects: bool,
    fail_checks: usize,
    fail_addresses: BTreeSet<String>,
    fail_all_sends: bool,
    fail_closes: bool,
    send_delay: Option<Duration>,

    // observations
    connects: usize,
    checks: usize,
    delivered: Vec<String>,
    closes: BTreeMap<usize, usize>,
    open_now: usize,
    max_open: usize,
}

/// Shared handle to a script; clones observe and steer the same state.
#[derive(Debug, Clone, Default)]
pub struct Script {
    state: Arc<Mutex<State>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn connector(&self) -> ScriptedConnector {
        ScriptedConnector {
            script: self.clone(),
        }
    }

    /// The next `n` connection attempts fail.
    pub fn refuse_connects(&self, n: usize) -> &Self {
        self.with(|s| s.refuse_connects = n);
        self
    }

    pub fn refuse_all_connects(&self) -> &Self {
        self.with(|s| s.refuse_all_connects = true);
        self
    }

    /// The next `n` liveness checks report a dead connection.
    pub fn fail_checks(&self, n: usize) -> &Self {
        self.with(|s| s.fail_checks = n);
        self
    }

    pub fn fail_sends_to(&self, address: &str) -> &Self {
        self.with(|s| s.fail_addresses.insert(address.to_owned()));
        self
    }

    pub fn fail_all_sends(&self) -> &Self {
        self.with(|s| s.fail_all_sends = true);
        self
    }

    pub fn fail_closes(&self) -> &Self {
        self.with(|s| s.fail_closes = true);
        self
    }

    pub fn send_delay(&self, delay: Duration) -> &Self {
        self.with(|s| s.send_delay = Some(delay));
        self
    }

    /// Successful connects.
    pub fn connects(&self) -> usize {
        self.with(|s| s.connects)
    }

    pub fn checks(&self) -> usize {
        self.with(|s| s.checks)
    }

    /// Addresses accepted, in acceptance order.
    pub fn delivered(&self) -> Vec<String> {
        self.with(|s| s.delivered.clone())
    }

    /// Close calls per connection serial.
    pub fn closes(&self) -> BTreeMap<usize, usize> {
        self.with(|s| s.closes.clone())
    }

    pub fn open_now(&self) -> usize {
        self.with(|s| s.open_now)
    }

    /// Highest number of simultaneously open connections seen.
    pub fn max_open(&self) -> usize {
        self.with(|s| s.max_open)
    }
}

pub struct ScriptedConnector {
    script: Script,
}

impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;

    fn connect(&self) -> Result<ScriptedConnection, SendError> {
        self.script.with(|s| {
            if s.refuse_all_connects {
                return Err(SendError::Connect("connection refused".into()));
            }
            if s.refuse_connects > 0 {
                s.refuse_connects -= 1;
                return Err(SendError::Connect("connection refused".into()));
            }

            s.connects += 1;
            s.open_now += 1;
            s.max_open = s.max_open.max(s.open_now);

            Ok(ScriptedConnection {
                serial: s.connects,
                script: self.script.clone(),
            })
        })
    }
}

pub struct ScriptedConnection {
    serial: usize,
    script: Script,
}

impl ScriptedConnection {
    pub fn serial(&self) -> usize {
        self.serial
    }
}

impl Connection for ScriptedConnection {
    fn is_alive(&mut self) -> bool {
        self.script.with(|s| {
            s.checks += 1;
            if s.fail_checks > 0 {
                s.fail_checks -= 1;
                false
            } else {
                true
            }
        })
    }

    fn send(&mut self, message: &Outgoing<'_>) -> Result<(), SendError> {
        if let Some(delay) = self.script.with(|s| s.send_delay) {
            thread::sleep(delay);
        }

        self.script.with(|s| {
            if s.fail_all_sends || s.fail_addresses.contains(message.to) {
                return Err(SendError::Transmit(format!("550 rejected {}", message.to)));
            }
            s.delivered.push(message.to.to_owned());
            Ok(())
        })
    }

    fn close(self) -> Result<(), SendError> {
        self.script.with(|s| {
            *s.closes.entry(self.serial).or_default() += 1;
            s.open_now -= 1;
            if s.fail_closes {
                Err(SendError::Transmit("421 already gone".into()))
            } else {
                Ok(())
            }
        })
    }
}
