use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{ArgGroup, Args};
use courier_source::{LoadMode, PgSource, Roster, load};
use log::{error, info, warn};

use super::{ProjectArgs, pg_config};

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("mode").required(true).args(["create", "update"])))]
pub struct LoadArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Event whose roster (events/<event>/<event>.csv) fills its table
    pub event: String,

    /// Create the table; fails if it already exists
    #[arg(long)]
    pub create: bool,

    /// Add to an existing table; rows whose email is already there are skipped
    #[arg(long)]
    pub update: bool,
}

impl LoadArgs {
    fn mode(&self) -> LoadMode {
        if self.create {
            LoadMode::Create
        } else {
            LoadMode::Update
        }
    }
}

pub fn run(args: LoadArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("Roster load failed: {e:#}");
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: LoadArgs) -> anyhow::Result<ExitCode> {
    let layout = args.project.layout();

    let path = layout.roster_path(&args.event);
    if !path.is_file() {
        bail!("no roster for event '{}' at {}", args.event, path.display());
    }
    let roster = Roster::from_path(&path)
        .with_context(|| format!("invalid roster {}", path.display()))?;

    let database = layout.load_database()?;
    let mut source = PgSource::connect(&pg_config(database))
        .context("cannot connect to the database")?;
    info!("Database connection opened");

    let loaded = load(&mut source, &args.event, &roster, args.mode());

    match source.close() {
        Ok(()) => info!("Database connection closed"),
        Err(e) => warn!("Database connection did not close cleanly: {e}"),
    }

    let summary = loaded.with_context(|| format!("cannot load roster into '{}'", args.event))?;
    println!(
        "Loaded {} rows into {} ({} already present)",
        summary.inserted, args.event, summary.skipped
    );

    Ok(ExitCode::from(0))
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
