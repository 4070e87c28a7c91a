mod config;
mod error;
mod executor;
mod safety;
mod session;
mod store;
mod suggest;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::io::{self, Write};
use std::path::PathBuf;

use config::Config;
use error::Error;
use executor::{ExecEvent, ExecutionUnit, OutputChunk};
use session::Session;
use store::Store;

#[derive(Parser)]
#[command(name = "cmdpad")]
#[command(version)]
#[command(about = "Interactive shell wrapper with saved aliases, history and favorites")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single command and exit
    Run {
        /// Command to execute (wrap commands with pipes in quotes)
        #[arg(required = true)]
        command: Vec<String>,
        /// Skip the risky-pattern confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Manage saved aliases
    Alias {
        #[command(subcommand)]
        action: AliasAction,
    },
    /// Show execution history, favorites first
    History {
        /// Only show commands containing this substring
        filter: Option<String>,
        /// Maximum number of rows
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Toggle the favorite flag on one history entry
    Favorite {
        /// Command text exactly as recorded
        command: String,
        /// Timestamp exactly as printed by `history` (RFC 3339)
        timestamp: String,
    },
    /// Print suggestion candidates for the current directory
    Suggest {
        /// Only show candidates containing this substring
        input: Option<String>,
    },
}

#[derive(Subcommand)]
enum AliasAction {
    /// Save a new alias
    Add {
        alias: String,
        command: String,
        #[arg(default_value = "")]
        description: String,
    },
    /// Edit an existing alias; omitted fields keep their value
    Edit {
        alias: String,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long)]
        command: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete an alias
    Rm { alias: String },
    /// List aliases, optionally filtered
    List { query: Option<String> },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::new()?;
    let store = Store::open(&Config::db_path())?;
    let mut session = Session::new(store, config)?;

    match cli.command {
        None => {
            repl(&mut session)?;
            // The next session starts where this one ended.
            session.snapshot_config().save()
        }
        Some(Commands::Run { command, yes }) => {
            let command = command.join(" ");
            run_once(&session, &command, yes)
        }
        Some(Commands::Alias { action }) => alias_command(&session, action),
        Some(Commands::History { filter, limit }) => {
            let limit = limit.unwrap_or(session.config().display.history_limit);
            let entries = session.store().list_history(filter.as_deref(), limit)?;
            for entry in entries {
                let star = if entry.favorite { "★" } else { " " };
                println!(
                    "{} {}  {}",
                    star.yellow(),
                    entry.timestamp.to_rfc3339().dimmed(),
                    entry.command
                );
            }
            Ok(())
        }
        Some(Commands::Favorite { command, timestamp }) => {
            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| anyhow::anyhow!("invalid timestamp: {}", e))?
                .with_timezone(&Utc);
            session.store().toggle_favorite(&command, timestamp)?;
            Ok(())
        }
        Some(Commands::Suggest { input }) => {
            let set = session.suggestions()?;
            let mut candidates: Vec<String> = match input {
                Some(input) => set
                    .into_iter()
                    .filter(|c| suggest::matches(&input, c))
                    .collect(),
                None => set.into_iter().collect(),
            };
            candidates.sort();
            for candidate in candidates {
                println!("{}", candidate);
            }
            Ok(())
        }
    }
}

fn alias_command(session: &Session, action: AliasAction) -> Result<()> {
    let store = session.store();
    match action {
        AliasAction::Add {
            alias,
            command,
            description,
        } => {
            store.save_alias(&alias, &command, &description)?;
            println!("{}", format!("alias '{}' saved", alias).green());
        }
        AliasAction::Edit {
            alias,
            rename,
            command,
            description,
        } => {
            let current = store
                .find_alias(&alias)?
                .ok_or(Error::AliasNotFound(alias.clone()))?;
            store.update_alias(
                &alias,
                rename.as_deref().unwrap_or(&current.alias),
                command.as_deref().unwrap_or(&current.command),
                description.as_deref().unwrap_or(&current.description),
            )?;
            println!("{}", format!("alias '{}' updated", alias).green());
        }
        AliasAction::Rm { alias } => {
            store.delete_alias(&alias)?;
            println!("{}", format!("alias '{}' removed", alias).green());
        }
        AliasAction::List { query } => {
            let aliases = store.search_aliases(query.as_deref().unwrap_or(""))?;
            for alias in aliases {
                if alias.description.is_empty() {
                    println!("{}  {}", alias.alias.green().bold(), alias.command);
                } else {
                    println!(
                        "{}  {}  {}",
                        alias.alias.green().bold(),
                        alias.command,
                        format!("# {}", alias.description).dimmed()
                    );
                }
            }
        }
    }
    Ok(())
}

fn run_once(session: &Session, command: &str, yes: bool) -> Result<()> {
    let confirm = |cmd: &str| yes || confirm_risky(cmd);
    match session.execute(command, confirm) {
        Ok(unit) => {
            stream_events(unit);
            Ok(())
        }
        Err(Error::ConfirmationDeclined) => {
            println!("{}", "cancelled".yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Tab-completion for the interactive prompt, fed by the live suggestion
/// set: alias keys, recent history and working-directory entries.
struct PromptHelper {
    store: Store,
    working_dir: PathBuf,
    history_depth: usize,
}

impl Completer for PromptHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // A store hiccup degrades to "no candidates", never an input error.
        let (start, candidates) =
            suggest::complete_line(&self.store, &self.working_dir, self.history_depth, line, pos)
                .unwrap_or((pos, Vec::new()));
        let pairs = candidates
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for PromptHelper {
    type Hint = String;
}
impl Highlighter for PromptHelper {}
impl Validator for PromptHelper {}
impl Helper for PromptHelper {}

/// Interactive session: a line editor with completion, `cd` and `theme`
/// handled locally, everything else dispatched through the session.
/// Errors are status lines, never fatal.
fn repl(session: &mut Session) -> Result<()> {
    let mut editor = Editor::<PromptHelper, DefaultHistory>::new()?;
    editor.set_helper(Some(PromptHelper {
        store: session.store().clone(),
        working_dir: session.working_dir().to_path_buf(),
        history_depth: session.config().display.suggestion_history,
    }));

    loop {
        // Keep the completer pointed at the directory `cd` may have changed.
        if let Some(helper) = editor.helper_mut() {
            helper.working_dir = session.working_dir().to_path_buf();
        }

        let prompt = format!("{}> ", session.working_dir().display());
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}", e.to_string().red());
                continue;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match line {
            "exit" | "quit" => break,
            _ if line.starts_with("theme ") => {
                let name = line["theme ".len()..].trim().to_string();
                session.set_theme(name);
                println!("theme set to {}", session.theme());
            }
            _ if line == "cd" || line.starts_with("cd ") => {
                let target = line.strip_prefix("cd").unwrap_or("").trim();
                let target = if target.is_empty() {
                    dirs::home_dir().unwrap_or_else(|| session.working_dir().to_path_buf())
                } else {
                    target.into()
                };
                if let Err(e) = session.set_working_dir(target) {
                    eprintln!("{}", e.to_string().red());
                }
            }
            _ => match session.execute(line, confirm_risky) {
                Ok(unit) => stream_events(unit),
                Err(Error::ConfirmationDeclined) => println!("{}", "cancelled".yellow()),
                Err(e) => eprintln!("{}", e.to_string().red()),
            },
        }
    }
    Ok(())
}

fn stream_events(unit: ExecutionUnit) {
    for event in unit.events().iter() {
        match event {
            ExecEvent::Output(OutputChunk::Clear) => {
                // ANSI clear screen plus cursor home.
                print!("\x1b[2J\x1b[H");
                let _ = io::stdout().flush();
            }
            ExecEvent::Output(OutputChunk::Text(text)) => {
                if text.ends_with('\n') {
                    print!("{}", text);
                } else {
                    println!("{}", text);
                }
            }
            ExecEvent::Completed => break,
        }
    }
}

fn confirm_risky(command: &str) -> bool {
    print!(
        "{} ",
        format!(
            "'{}' chains commands with |, & or ; — run anyway? [y/N]",
            command
        )
        .yellow()
    );
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    let answer = input.trim().to_lowercase();
    answer == "y" || answer == "yes"
}
