pub mod events;
pub mod history;
pub mod load;
pub mod send;

use std::path::PathBuf;

use clap::{Args, Subcommand};
use courier_runtime::{DatabaseDetails, ProjectLayout, default_project_dir};
use courier_source::PgConfig;
pub use events::EventsArgs;
pub use history::HistoryArgs;
pub use load::LoadArgs;
pub use send::SendArgs;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one event's emails to every row of its table.
    ///
    /// Example:
    ///   courier send
    ///   courier send --event welcome --account club --yes
    ///   courier send --project ~/events --batch-size 100 --workers 8
    Send(SendArgs),

    /// Fill an event's table from its CSV roster.
    ///
    /// Example:
    ///   courier load --create welcome
    ///   courier load --update welcome --project ~/events
    Load(LoadArgs),

    /// List the events and sending accounts of a project.
    Events(EventsArgs),

    /// Show past campaign runs.
    History(HistoryArgs),
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Project directory holding events/, email_details/ and
    /// database_details/ [default: $COURIER_PROJECT or the current directory]
    #[arg(long, value_name = "DIR")]
    pub project: Option<PathBuf>,
}

impl ProjectArgs {
    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(self.project.clone().unwrap_or_else(default_project_dir))
    }
}

pub fn pg_config(details: DatabaseDetails) -> PgConfig {
    PgConfig {
        host: details.host,
        port: details.port,
        dbname: details.name,
        user: details.user,
        password: details.password,
    }
}
