mod config;
pub mod history;
pub mod logging;
pub mod project;

pub use config::{
    DEFAULT_BAR_WIDTH, DEFAULT_BATCH_SIZE, DEFAULT_DB_PORT, DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT,
    DEFAULT_WORKERS, PROGRAM_NAME, PROJECT_ENV, courier_dir, default_log_path, default_project_dir,
};
pub use project::{
    AccountDetails, ConfigError, DatabaseDetails, EventDetails, ProjectLayout,
};

pub use logging::init;
