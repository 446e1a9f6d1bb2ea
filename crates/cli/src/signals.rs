use std::{
    io,
    sync::{Arc, atomic::AtomicBool},
};

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

/// Exit status used when a second signal cuts a drain short.
pub const FORCED_EXIT: i32 = 130;

/// Routes SIGINT and SIGTERM into the returned flag.
///
/// The first signal only raises the flag so the run drains and writes its
/// reports. A second one exits with status 130 even if an SMTP or database
/// call is blocked.
pub fn install() -> io::Result<Arc<AtomicBool>> {
    let interrupt = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        // Registered before the flag handler so it sees the flag as it was
        // before this delivery.
        flag::register_conditional_shutdown(sig, FORCED_EXIT, Arc::clone(&interrupt))?;
        flag::register(sig, Arc::clone(&interrupt))?;
    }
    Ok(interrupt)
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
