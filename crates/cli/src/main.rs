use std::process::ExitCode;

use clap::Parser;

mod commands;
mod signals;

use commands::Command;
use courier_runtime::logging;

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "Personalised bulk email campaigns")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

fn main() -> ExitCode {
    logging::init().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Send(args) => commands::send::run(args),
        Command::Load(args) => commands::load::run(args),
        Command::Events(args) => commands::events::run(args),
        Command::History(args) => commands::history::run(args),
    }
}
