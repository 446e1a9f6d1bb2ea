use std::path::PathBuf;

pub const PROGRAM_NAME: &str = "courier";
pub const PROGRAM_LOG_LEVEL: &str = "COURIER_LOG_LEVEL";
pub const PROGRAM_LOG_FILE: &str = "COURIER_LOG_FILE";
pub const PROJECT_ENV: &str = "COURIER_PROJECT";
pub const LOG_FILE_NAME: &str = "courier.log";

/// Rows fetched per cursor call.
pub const DEFAULT_BATCH_SIZE: usize = 40;
/// Send workers, and therefore the upper bound on live SMTP connections.
pub const DEFAULT_WORKERS: usize = 5;
/// Number of characters in the live progress bar.
pub const DEFAULT_BAR_WIDTH: usize = 30;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Per-user state directory holding the log file and the run history.
pub fn courier_dir() -> PathBuf {
    // XDG_STATE_HOME first, then whatever the platform calls its state dir
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME")
        && !xdg_state.is_empty()
    {
        return PathBuf::from(xdg_state).join(PROGRAM_NAME);
    }

    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PROGRAM_NAME)
}

pub fn default_log_path() -> PathBuf {
    courier_dir().join(LOG_FILE_NAME)
}

/// Project directory holding events, account details and attachments.
///
/// `COURIER_PROJECT` wins over the current working directory.
pub fn default_project_dir() -> PathBuf {
    std::env::var_os(PROJECT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
