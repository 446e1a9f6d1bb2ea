use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock, PoisonError},
};

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::{PROGRAM_LOG_FILE, PROGRAM_LOG_LEVEL, default_log_path};

/// Value of `COURIER_LOG_FILE` that routes log lines to stderr.
pub const STDERR_TARGET: &str = "-";

enum LogTarget {
    Stderr,
    File(Mutex<File>),
}

pub struct Logger {
    level: Level,
    target: LogTarget,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let msg = format!(
                "{} {} [{}] {}",
                timestamp,
                record.level(),
                record.target(),
                record.args()
            );

            match &self.target {
                LogTarget::Stderr => {
                    eprintln!("{msg}")
                }
                LogTarget::File(file) => {
                    let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
                    // Nowhere left to report a failed log write.
                    let _ = writeln!(file, "{msg}");
                }
            }
        }
    }

    fn flush(&self) {
        if let LogTarget::File(file) = &self.target {
            let _ = file.lock().unwrap_or_else(PoisonError::into_inner).flush();
        }
    }
}

fn get_level_from_env() -> Level {
    std::env::var(PROGRAM_LOG_LEVEL)
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .and_then(|filter| filter.to_level())
        .unwrap_or(Level::Info)
}

/// Where log lines should go: `None` means stderr.
fn get_path_from_env() -> Option<PathBuf> {
    match std::env::var_os(PROGRAM_LOG_FILE) {
        Some(v) if v == STDERR_TARGET => None,
        Some(v) if !v.is_empty() => Some(PathBuf::from(v)),
        _ => Some(default_log_path()),
    }
}

fn open_target(path: Option<&Path>) -> LogTarget {
    let Some(path) = path else {
        return LogTarget::Stderr;
    };

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => LogTarget::File(Mutex::new(file)),
        Err(e) => {
            eprintln!("[log] cannot open {}: {e}; logging to stderr", path.display());
            LogTarget::Stderr
        }
    }
}

pub fn init() -> Result<(), SetLoggerError> {
    _init(get_level_from_env(), get_path_from_env().as_deref())
}

pub fn _init(level: Level, path: Option<&Path>) -> Result<(), SetLoggerError> {
    static LOGGER: OnceLock<Logger> = OnceLock::new();

    // Only the first call installs the logger; later calls must not
    // move the max level away from the level the logger was built with.
    let init_call = LOGGER.get().is_none();

    let logger = LOGGER.get_or_init(|| Logger {
        level,
        target: open_target(path),
    });

    if init_call {
        log::set_logger(logger)?;
        log::set_max_level(logger.level.to_level_filter());
    }

    Ok(())
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
