//! On-disk project layout and the descriptors read from it.
//!
//! ```text
//! <project>/events/<key>/<key>.json
//! <project>/email_details/email_details_<account>.json
//! <project>/database_details/database_details.json
//! <project>/attachments/<file>
//! ```

use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;

use crate::config::{DEFAULT_DB_PORT, DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT};

const EVENTS_DIR: &str = "events";
const ACCOUNTS_DIR: &str = "email_details";
const DATABASE_DIR: &str = "database_details";
const ATTACHMENTS_DIR: &str = "attachments";

const ACCOUNT_PREFIX: &str = "email_details_";
const DESCRIPTOR_EXT: &str = ".json";
const EXAMPLE_KEY: &str = "example";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{what} not found at {}", path.display())]
    Missing { what: &'static str, path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Unreadable { path: PathBuf, source: io::Error },

    #[error("{} is not a valid {what}: {source}", path.display())]
    Malformed {
        what: &'static str,
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid {what}: {reason}")]
    Invalid { what: &'static str, reason: String },

    #[error("unknown email sender strategy '{0}'")]
    UnknownStrategy(String),
}

/// Everything needed to run one campaign against one table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EventDetails {
    /// Display name, used in logs and the run history.
    pub name: String,
    pub subject: String,
    /// File name under `attachments/`, sent inline as `cid:image`.
    pub attachment: Option<String>,
    /// Columns to select, in order. Placeholders in `body` refer to these.
    pub cols: Vec<String>,
    /// Column whose values must not be split across batches.
    pub grouping_requirement: Option<String>,
    /// Renderer strategy name; `None` means the flat default.
    pub email_sender: Option<String>,
    pub body: String,

    /// Filled from the event key, never read from the file.
    #[serde(skip)]
    pub table_name: String,
}

#[derive(Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AccountDetails {
    pub email: String,
    pub password: String,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

// The password must never reach a log line.
impl std::fmt::Debug for AccountDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountDetails")
            .field("email", &self.email)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseDetails {
    pub host: String,
    pub name: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
}

impl std::fmt::Debug for DatabaseDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseDetails")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

fn default_smtp_host() -> String {
    DEFAULT_SMTP_HOST.to_owned()
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_db_port() -> u16 {
    DEFAULT_DB_PORT
}

#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn event_path(&self, key: &str) -> PathBuf {
        self.root
            .join(EVENTS_DIR)
            .join(key)
            .join(format!("{key}{DESCRIPTOR_EXT}"))
    }

    /// CSV roster loaded into the event's table by `courier load`.
    pub fn roster_path(&self, key: &str) -> PathBuf {
        self.root.join(EVENTS_DIR).join(key).join(format!("{key}.csv"))
    }

    pub fn account_path(&self, account: &str) -> PathBuf {
        self.root
            .join(ACCOUNTS_DIR)
            .join(format!("{ACCOUNT_PREFIX}{account}{DESCRIPTOR_EXT}"))
    }

    pub fn database_path(&self) -> PathBuf {
        self.root
            .join(DATABASE_DIR)
            .join(format!("database_details{DESCRIPTOR_EXT}"))
    }

    pub fn attachment_path(&self, file_name: &str) -> PathBuf {
        self.root.join(ATTACHMENTS_DIR).join(file_name)
    }

    /// Event keys: directories under `events/`, minus hidden ones and `example`.
    pub fn events(&self) -> Result<BTreeSet<String>, ConfigError> {
        let dir = self.root.join(EVENTS_DIR);
        let names = list_dir(&dir, "events directory")?;

        Ok(names
            .into_iter()
            .filter(|name| !name.starts_with('.') && name != EXAMPLE_KEY)
            .collect())
    }

    /// Account names taken from `email_details_<account>.json` file names.
    pub fn accounts(&self) -> Result<BTreeSet<String>, ConfigError> {
        let dir = self.root.join(ACCOUNTS_DIR);
        let names = list_dir(&dir, "email details directory")?;

        Ok(names
            .iter()
            .filter_map(|name| {
                name.strip_prefix(ACCOUNT_PREFIX)?
                    .strip_suffix(DESCRIPTOR_EXT)
            })
            .filter(|account| !account.is_empty() && *account != EXAMPLE_KEY)
            .map(str::to_owned)
            .collect())
    }

    pub fn load_event(&self, key: &str) -> Result<EventDetails, ConfigError> {
        let mut event: EventDetails = read_descriptor(&self.event_path(key), "event descriptor")?;

        if event.cols.is_empty() {
            return Err(ConfigError::Invalid {
                what: "event descriptor",
                reason: format!("event '{key}' lists no columns"),
            });
        }
        if let Some(group) = &event.grouping_requirement
            && group.trim().is_empty()
        {
            return Err(ConfigError::Invalid {
                what: "event descriptor",
                reason: format!("event '{key}' has an empty grouping column"),
            });
        }

        event.table_name = key.to_owned();
        Ok(event)
    }

    pub fn load_account(&self, account: &str) -> Result<AccountDetails, ConfigError> {
        read_descriptor(&self.account_path(account), "account descriptor")
    }

    pub fn load_database(&self) -> Result<DatabaseDetails, ConfigError> {
        read_descriptor(&self.database_path(), "database descriptor")
    }

    /// Bytes of an event attachment, resolved under `attachments/`.
    pub fn load_attachment(&self, file_name: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.attachment_path(file_name);
        fs::read(&path).map_err(|source| classify_io(source, path, "attachment"))
    }
}

fn list_dir(dir: &Path, what: &'static str) -> Result<Vec<String>, ConfigError> {
    let rd = fs::read_dir(dir).map_err(|e| classify_io(e, dir.to_path_buf(), what))?;

    let mut names = Vec::new();
    for entry in rd {
        let entry = entry.map_err(|source| ConfigError::Unreadable {
            path: dir.to_path_buf(),
            source,
        })?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_owned());
        }
    }
    Ok(names)
}

fn read_descriptor<T: DeserializeOwned>(path: &Path, what: &'static str) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| classify_io(e, path.to_path_buf(), what))?;

    serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
        what,
        path: path.to_path_buf(),
        source,
    })
}

fn classify_io(err: io::Error, path: PathBuf, what: &'static str) -> ConfigError {
    if err.kind() == io::ErrorKind::NotFound {
        ConfigError::Missing { what, path }
    } else {
        ConfigError::Unreadable { path, source: err }
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
