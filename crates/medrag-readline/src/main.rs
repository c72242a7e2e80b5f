use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use medrag_application::SessionSync;
use medrag_core::session::{Message, Overview, RightPaneData, SessionSummary};
use medrag_infrastructure::{ClientConfig, FileStateRepository, HttpSessionApi, MedragPaths};

mod command;

use command::{COMMANDS, Command};

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Installs a daily-rolled file log under the config directory.
///
/// `RUST_LOG` overrides the default `medrag=info` filter. The returned guard
/// must live until exit so buffered lines are flushed.
fn init_logging(paths: &MedragPaths) -> Result<WorkerGuard> {
    let log_dir = paths.log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&log_dir, "medrag.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("medrag=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(guard)
}

fn print_summaries(summaries: &[SessionSummary], active: Option<&str>) {
    if summaries.is_empty() {
        println!("{}", "No sessions.".bright_black());
        return;
    }
    for (i, row) in summaries.iter().enumerate() {
        let marker = if active == Some(row.id.as_str()) { "*" } else { " " };
        println!(
            "{} {:>3}. {} {}",
            marker.bright_green(),
            i + 1,
            row.title.bold(),
            format!("({})", row.id).bright_black()
        );
    }
}

fn print_message(message: &Message) {
    if message.is_assistant() {
        for line in message.content.lines() {
            println!("{}", line.bright_blue());
        }
        if !message.references.is_empty() {
            println!(
                "{}",
                format!(
                    "[{} references, /refs {} to show]",
                    message.references.len(),
                    message.id
                )
                .bright_black()
            );
        }
    } else {
        println!("{}", format!("> {}", message.content).green());
    }
}

fn print_pane(pane: &RightPaneData) {
    if pane.is_empty() {
        println!("{}", "No references.".bright_black());
        return;
    }
    match &pane.overview {
        Some(Overview::Summary(text)) => println!("{}\n", text.bright_white()),
        Some(Overview::Structured {
            conclusion,
            key_findings,
            quality_and_limits,
        }) => {
            println!("{}", conclusion.bright_white().bold());
            for finding in key_findings {
                println!("  {}", format!("+ {finding}").white());
            }
            for limit in quality_and_limits {
                println!("  {}", format!("! {limit}").yellow());
            }
            println!();
        }
        None => {}
    }
    for (i, doc) in pane.results.iter().enumerate() {
        let meta = [
            doc.journal.clone(),
            doc.year.map(|y| y.to_string()),
            doc.score.map(|s| format!("score {s:.2}")),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" · ");
        println!("{:>3}. {}", i + 1, doc.title.bold());
        if !meta.is_empty() {
            println!("     {}", meta.bright_black());
        }
        if let Some(url) = &doc.url {
            println!("     {}", url.cyan());
        }
    }
    for item in &pane.booleans {
        println!("{}", format!("[{}] {}", item.group, item.query).magenta());
    }
}

fn print_help() {
    println!("{}", "Type a question to ask it in the active session.".bright_black());
    for line in [
        "/list [filter]     list sessions",
        "/new [title]       start a session",
        "/switch <n|id>     switch session",
        "/rename <title>    rename the active session",
        "/delete [id]       delete a session (default: active)",
        "/history           show the active conversation",
        "/refs [message]    show references",
        "quit               exit",
    ] {
        println!("  {}", line.bright_black());
    }
}

/// Resolves a `/switch` argument: a 1-based index into the last listing,
/// else a session id.
fn resolve_target(target: &str, listing: &[SessionSummary]) -> String {
    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| listing.get(i))
        .map(|row| row.id.clone())
        .unwrap_or_else(|| target.to_string())
}

async fn run_command(sync: &SessionSync, command: Command, listing: &mut Vec<SessionSummary>) {
    let active = sync.active_session_id().await;
    let outcome = match command {
        Command::List(filter) => match sync.list().await {
            Ok(rows) => {
                *listing = match filter {
                    Some(query) => sync.store().search(&query).await,
                    None => rows,
                };
                let active = sync.active_session_id().await;
                print_summaries(listing, active.as_deref());
                Ok(())
            }
            Err(err) => Err(err),
        },
        Command::New(title) => sync
            .create(title.as_deref().unwrap_or_default())
            .await
            .map(|session| println!("{}", format!("Started '{}'", session.title).bright_green())),
        Command::Switch(target) => {
            let id = resolve_target(&target, listing);
            sync.select(&id).await.map(|session| {
                println!("{}", format!("Switched to '{}'", session.title).bright_green());
                session.messages.iter().for_each(print_message);
            })
        }
        Command::Rename(title) => match active {
            Some(id) => sync
                .rename(&id, &title)
                .await
                .map(|()| println!("{}", format!("Renamed to '{title}'").bright_green())),
            None => {
                println!("{}", "No active session.".yellow());
                Ok(())
            }
        },
        Command::Delete(target) => match target.map(|t| resolve_target(&t, listing)).or(active.clone()) {
            Some(id) => match sync.delete(&id).await {
                Ok(()) => {
                    println!("{}", format!("Deleted {id}").bright_green());
                    listing.retain(|row| row.id != id);
                    if active.as_deref() != Some(id.as_str()) {
                        Ok(())
                    } else {
                        sync.remount().await.map(|next| {
                            if let Some(next) = next {
                                println!("{}", format!("Switched to {next}").bright_green());
                            }
                        })
                    }
                }
                Err(err) => Err(err),
            },
            None => {
                println!("{}", "No active session.".yellow());
                Ok(())
            }
        },
        Command::History => {
            match sync.active_session().await {
                Some(session) => session.messages.iter().for_each(print_message),
                None => println!("{}", "No active session.".yellow()),
            }
            Ok(())
        }
        Command::Refs(message_id) => {
            print_pane(&sync.right_pane(message_id.as_deref()).await);
            Ok(())
        }
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Ask(text) => match sync.send(None, &text).await {
            Ok(receipt) => {
                if let Some(assistant) = &receipt.assistant {
                    print_message(assistant);
                }
                Ok(())
            }
            Err(err) => Err(err),
        },
        Command::Unknown(line) => {
            println!("{}", format!("Unknown command: {line} (try /help)").bright_black());
            Ok(())
        }
        Command::Quit => Ok(()),
    };

    if let Err(err) = outcome {
        tracing::warn!("command failed: {}", err);
        eprintln!("{}", format!("Error: {err}").red());
    }
}

/// The main entry point for the MedRAG readline REPL.
///
/// Wires the HTTP backend and the file-backed active-session state into a
/// [`SessionSync`] engine, restores the last session, and runs a
/// rustyline loop with command completion and colored output.
#[tokio::main]
async fn main() -> Result<()> {
    // ===== Backend Initialization =====
    let paths = MedragPaths::new();
    let _log_guard = init_logging(&paths)?;

    let config = ClientConfig::load(&paths)?;
    tracing::info!("starting medrag against {}", config.api_base);
    let api = Arc::new(HttpSessionApi::new(&config)?);
    let state_repository = Arc::new(FileStateRepository::with_paths(&paths).await?);
    let sync = SessionSync::new(api, state_repository);

    let mut listing = Vec::new();
    if let Some(id) = sync.restore().await {
        if let Err(err) = sync.select(&id).await {
            eprintln!("{}", format!("Could not restore session {id}: {err}").yellow());
        }
    }
    match sync.list().await {
        Ok(rows) => {
            listing = rows;
            sync.auto_select().await?;
        }
        Err(err) => eprintln!("{}", format!("Could not load sessions: {err}").yellow()),
    }

    // ===== REPL Setup =====
    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    println!("{}", "=== MedRAG ===".bright_magenta().bold());
    println!("{}", "Ask a question, '/help' for commands, or 'quit' to exit.".bright_black());
    print_summaries(&listing, sync.active_session_id().await.as_deref());
    println!();

    // ===== Main REPL Loop =====
    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                let command = Command::parse(trimmed);
                if command == Command::Quit {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
                run_command(&sync, command, &mut listing).await;
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}
