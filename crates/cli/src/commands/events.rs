use std::process::ExitCode;

use clap::Args;

use super::ProjectArgs;

#[derive(Debug, Args)]
pub struct EventsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub fn run(args: EventsArgs) -> ExitCode {
    let layout = args.project.layout();

    let events = match layout.events() {
        Ok(events) => events,
        Err(e) => {
            eprintln!("[error] {e}");
            return ExitCode::from(2);
        }
    };

    if events.is_empty() {
        println!("No events in {}", layout.root().display());
    } else {
        println!("{:<24}  {:<10}  NAME", "EVENT", "SENDER");
        println!("{}", "-".repeat(60));

        for key in &events {
            match layout.load_event(key) {
                Ok(event) => println!(
                    "{:<24}  {:<10}  {}",
                    key,
                    event.email_sender.as_deref().unwrap_or("default"),
                    event.name
                ),
                Err(e) => println!("{key:<24}  {:<10}  ({e})", "invalid"),
            }
        }
    }

    match layout.accounts() {
        Ok(accounts) if accounts.is_empty() => println!("\nNo sending accounts"),
        Ok(accounts) => {
            println!("\nAccounts:");
            for account in accounts {
                println!("  {account}");
            }
        }
        Err(e) => println!("\nAccounts: ({e})"),
    }

    ExitCode::from(0)
}
