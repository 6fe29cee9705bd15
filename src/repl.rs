//! Interactive shell. Each line is tokenized and dispatched through a
//! name -> handler table; handlers forward to the same command functions the
//! one-shot CLI uses.

use anyhow::{anyhow, bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::commands::{self, App};
use crate::config;

const PROMPT: &str = "credsync> ";

pub enum Flow {
    Continue,
    Quit,
}

type Handler = fn(&mut App, &[String]) -> Result<Flow>;

struct Entry {
    name: &'static str,
    usage: &'static str,
    help: &'static str,
    handler: Handler,
}

const COMMANDS: &[Entry] = &[
    Entry { name: "help", usage: "help", help: "Show this list", handler: help },
    Entry { name: "profiles", usage: "profiles", help: "List AWS profiles", handler: profiles },
    Entry { name: "list", usage: "list", help: "Show all mappings", handler: list },
    Entry { name: "add", usage: "add <path> <profile>", help: "Map a .env file to a profile", handler: add },
    Entry { name: "remove", usage: "remove <path>", help: "Remove a file mapping", handler: remove },
    Entry {
        name: "remote",
        usage: "remote list | add <id> <profile> | remove <id>",
        help: "Manage remote environment mappings",
        handler: remote,
    },
    Entry {
        name: "sync",
        usage: "sync [path|id|profile]",
        help: "Refresh credentials in mapped destinations",
        handler: sync,
    },
    Entry {
        name: "config",
        usage: "config show | api-key [key] | logging on|off [file]",
        help: "View or change settings",
        handler: config_cmd,
    },
    Entry { name: "exit", usage: "exit", help: "Leave the shell", handler: quit },
    Entry { name: "quit", usage: "quit", help: "Leave the shell", handler: quit },
];

fn lookup(name: &str) -> Option<&'static Entry> {
    COMMANDS.iter().find(|e| e.name == name)
}

/// Tokenize and run one input line.
pub fn dispatch(app: &mut App, line: &str) -> Result<Flow> {
    let tokens = shellwords::split(line).map_err(|_| anyhow!("Unbalanced quotes"))?;
    let Some((name, args)) = tokens.split_first() else {
        return Ok(Flow::Continue);
    };
    match lookup(name) {
        Some(entry) => (entry.handler)(app, args),
        None => {
            println!("Unknown command '{}'. Type `help` for a list.", name);
            Ok(Flow::Continue)
        }
    }
}

pub fn run(app: &mut App) -> Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to initialise line editor")?;
    let history = config::history_path(&app.settings_path);
    let _ = editor.load_history(&history);

    println!("credsync {}. Type `help` for commands.", env!("CARGO_PKG_VERSION"));

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Keys typed inline are not kept in history.
        if !trimmed.starts_with("config api-key") {
            let _ = editor.add_history_entry(trimmed);
        }

        match dispatch(app, trimmed) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }

    if let Some(parent) = history.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = editor.save_history(&history);
    Ok(())
}

fn expect_args<'a>(args: &'a [String], count: usize, usage: &str) -> Result<&'a [String]> {
    if args.len() != count {
        bail!("Usage: {}", usage);
    }
    Ok(args)
}

fn usage_of(name: &str) -> &'static str {
    lookup(name).map(|e| e.usage).unwrap_or("")
}

fn help(_app: &mut App, _args: &[String]) -> Result<Flow> {
    for entry in COMMANDS {
        println!("  {:<52} {}", entry.usage, entry.help);
    }
    Ok(Flow::Continue)
}

fn profiles(_app: &mut App, args: &[String]) -> Result<Flow> {
    expect_args(args, 0, usage_of("profiles"))?;
    commands::profiles::run()?;
    Ok(Flow::Continue)
}

fn list(app: &mut App, args: &[String]) -> Result<Flow> {
    expect_args(args, 0, usage_of("list"))?;
    commands::list::run(app)?;
    Ok(Flow::Continue)
}

fn add(app: &mut App, args: &[String]) -> Result<Flow> {
    let args = expect_args(args, 2, usage_of("add"))?;
    commands::map::add(app, &args[0], &args[1])?;
    Ok(Flow::Continue)
}

fn remove(app: &mut App, args: &[String]) -> Result<Flow> {
    let args = expect_args(args, 1, usage_of("remove"))?;
    commands::map::remove(app, &args[0])?;
    Ok(Flow::Continue)
}

fn remote(app: &mut App, args: &[String]) -> Result<Flow> {
    let usage = usage_of("remote");
    match args.split_first() {
        Some((sub, rest)) if sub == "list" => {
            expect_args(rest, 0, usage)?;
            commands::remote::list(app)?;
        }
        Some((sub, rest)) if sub == "add" => {
            let rest = expect_args(rest, 2, usage)?;
            commands::remote::add(app, &rest[0], &rest[1])?;
        }
        Some((sub, rest)) if sub == "remove" => {
            let rest = expect_args(rest, 1, usage)?;
            commands::remote::remove(app, &rest[0])?;
        }
        _ => bail!("Usage: {}", usage),
    }
    Ok(Flow::Continue)
}

fn sync(app: &mut App, args: &[String]) -> Result<Flow> {
    if args.len() > 1 {
        bail!("Usage: {}", usage_of("sync"));
    }
    commands::sync::run(app, args.first().map(String::as_str))?;
    Ok(Flow::Continue)
}

fn config_cmd(app: &mut App, args: &[String]) -> Result<Flow> {
    let usage = usage_of("config");
    match args.split_first() {
        Some((sub, [])) if sub == "show" => commands::config::show(app)?,
        Some((sub, rest)) if sub == "api-key" && rest.len() <= 1 => {
            commands::config::api_key(app, rest.first().cloned())?
        }
        Some((sub, rest)) if sub == "logging" && !rest.is_empty() && rest.len() <= 2 => {
            let enabled = match rest[0].as_str() {
                "on" => true,
                "off" => false,
                _ => bail!("Usage: {}", usage),
            };
            commands::config::logging(app, enabled, rest.get(1).map(Into::into))?;
        }
        _ => bail!("Usage: {}", usage),
    }
    Ok(Flow::Continue)
}

fn quit(_app: &mut App, _args: &[String]) -> Result<Flow> {
    Ok(Flow::Quit)
}
