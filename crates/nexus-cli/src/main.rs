mod commands;
mod shell;

use anyhow::Result;
use clap::Parser;
use commands::{Command, Runner};
use nexus_app::{EditorSession, EditorSettings};
use nexus_events::{Event, EventBus, EventListener};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Character relationship graph editor", long_about = None)]
struct Args {
    /// Directory holding the autosave, view state and saved projects
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Run one command and exit; without one an interactive shell starts
    #[command(subcommand)]
    command: Option<Command>,
}

/// One line typed into the interactive shell.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

/// Prints user-facing notifications; everything else goes to the log.
struct Notifier;

impl EventListener for Notifier {
    fn handle_event(&mut self, event: &Event) {
        match event {
            Event::ShowInfo { message } | Event::ShowSuccess { message } => {
                println!("{message}")
            }
            Event::ShowWarning { message } => println!("warning: {message}"),
            Event::ShowError { message } => eprintln!("error: {message}"),
            Event::AutosaveFailed { error } => eprintln!("warning: autosave failed: {error}"),
            other => tracing::trace!("event: {:?}", other),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => EditorSettings::load_from(path),
        None => EditorSettings::load(),
    };
    if let Some(dir) = args.data_dir {
        settings.data_dir = dir;
    }

    let bus = EventBus::new();
    let session = EditorSession::open(settings, bus.clone())?;
    let mut runner = Runner::new(session)?;
    bus.drain();

    match args.command {
        Some(command) => {
            let result = runner.execute(command);
            bus.dispatch_to(&mut Notifier);
            result
        }
        None => run_shell(&mut runner, &bus),
    }
}

fn run_shell(runner: &mut Runner, bus: &EventBus) -> Result<()> {
    println!("Type `help` for commands, `quit` to exit.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let history = runner.session().history();
        print!(
            "nexus [{}/{}]> ",
            history.position() + 1,
            history.len()
        );
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        let line = line?;

        let words = match shell::tokenize(&line) {
            Ok(words) => words,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };
        match words.first().map(String::as_str) {
            None => continue,
            Some("quit" | "exit") => return Ok(()),
            _ => {}
        }

        match ShellLine::try_parse_from(&words) {
            Ok(parsed) => {
                if let Err(e) = runner.execute(parsed.command) {
                    eprintln!("error: {e:#}");
                }
            }
            Err(e) => {
                let _ = e.print();
            }
        }
        bus.dispatch_to(&mut Notifier);
    }
}
