mod audit;
mod cli;
mod commands;
mod config;
mod credentials;
mod env_file;
mod error;
mod logging;
mod profiles;
mod provider;
mod remote;
mod repl;
mod sync;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command, ConfigCommand, RemoteCommand};
use commands::App;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut app = App::load()?;

    match cli.command {
        None | Some(Command::Repl) => repl::run(&mut app)?,
        Some(Command::Profiles) => commands::profiles::run()?,
        Some(Command::List) => commands::list::run(&app)?,
        Some(Command::Add { path, profile }) => commands::map::add(&mut app, &path, &profile)?,
        Some(Command::Remove { path }) => commands::map::remove(&mut app, &path)?,
        Some(Command::Remote(sub)) => match sub {
            RemoteCommand::List => commands::remote::list(&app)?,
            RemoteCommand::Add { id, profile } => commands::remote::add(&mut app, &id, &profile)?,
            RemoteCommand::Remove { id } => commands::remote::remove(&mut app, &id)?,
        },
        Some(Command::Sync { target }) => commands::sync::run(&mut app, target.as_deref())?,
        Some(Command::Config(sub)) => match sub {
            ConfigCommand::ApiKey { key } => commands::config::api_key(&mut app, key)?,
            ConfigCommand::Logging { state, file } => {
                commands::config::logging(&mut app, state == "on", file)?
            }
            ConfigCommand::Show => commands::config::show(&app)?,
        },
    }

    Ok(())
}
