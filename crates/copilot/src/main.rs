//! copilotctl - terminal client for the Risk RAG Copilot service
//!
//! One-shot commands for health, stats, index rebuilds, uploads and asks,
//! plus an interactive chat that keeps the last ten exchanges on screen.

use std::env;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use copilot::app::{Action, ActionOutcome, Copilot};
use copilot::config::{APP_NAME, AppConfig, AppPaths};
use copilot::controller::AskOutcome;
use copilot::gateway::Attachment;
use copilot::notify::{NotificationSink, Severity};
use copilot::render::{JsonPresenter, Presenter, TerminalPresenter};

const BUSY_NOTICE: &str = "Still answering the previous question";

const CHAT_HELP: &str = "\
Type a question and press enter. Commands:
  /health          check service health
  /stats           refresh index statistics
  /rebuild         rebuild the index
  /upload [PATH]   upload a PDF
  /history         reprint the conversation
  /help            show this help
  /quit            leave the chat";

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            let _ = writeln!(io::stderr(), "Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let paths = AppPaths::discover(cli.common.config.clone())?;
    let mut config = copilot::config::load(&paths)?;
    if let Some(server) = &cli.common.server {
        config.server.url = server.clone();
    }
    init_logging(&cli.common, &config);
    debug!("config file: {}", paths.config_file.display());

    let job = match cli.command {
        Command::Config { command } => {
            handle_config(&paths, &config, command, cli.common.json)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "copilotctl", &mut io::stdout());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Chat => Job::Chat,
        Command::Health => Job::Action(Action::CheckHealth),
        Command::Stats => Job::Action(Action::RefreshStats),
        Command::Rebuild => Job::Action(Action::RebuildIndex),
        Command::Upload { path } => Job::Upload(path),
        Command::Ask { question } => Job::Action(Action::Ask(question.join(" "))),
    };

    async_main(config, job, cli.common.json)
}

/// Work that needs the async runtime.
enum Job {
    Chat,
    Upload(Option<PathBuf>),
    Action(Action),
}

#[tokio::main]
async fn async_main(config: AppConfig, job: Job, json: bool) -> Result<ExitCode> {
    let copilot = Copilot::connect(&config);
    debug!(server = %config.server.url, "connected");

    let action = match job {
        Job::Chat => return handle_chat(copilot, json).await,
        Job::Upload(path) => Action::Upload(read_attachment(path.as_deref()).await?),
        Job::Action(action) => action,
    };

    let outcome = copilot.dispatch(action).await;
    debug!(?outcome, "action finished");
    presenter(json).render(&copilot.snapshot().await)?;

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[derive(Debug, Parser)]
#[command(
    name = "copilotctl",
    author,
    version,
    about = "Terminal client for the Risk RAG Copilot service - ask questions, upload documents, manage the index.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Copilot server URL (overrides the config file)
    #[arg(long, short = 's', env = "COPILOT_SERVER_URL", global = true)]
    server: Option<String>,
    /// Override the config file path
    #[arg(long, short = 'c', value_name = "PATH", env = "COPILOT_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -v)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON
    #[arg(long, global = true)]
    json: bool,
    /// Disable ANSI colors in log output
    #[arg(long = "no-color", global = true)]
    no_color: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check service health
    Health,
    /// Show index statistics
    Stats,
    /// Rebuild the document index
    Rebuild,
    /// Upload a PDF to the index
    Upload {
        /// File to upload
        path: Option<PathBuf>,
    },
    /// Ask a single question
    Ask {
        /// The question (words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive chat session
    Chat,
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
    /// Regenerate the default configuration file
    Reset,
}

fn init_logging(common: &CommonOpts, config: &AppConfig) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    if common.quiet {
        return;
    }

    let level = effective_log_level(common, &config.logging.level);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}={level},copilotctl={level}")));

    // Logs go to stderr; stdout carries the rendered conversation.
    if common.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .ok();
    } else {
        let disable_color =
            common.no_color || env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_ansi(!disable_color),
            )
            .try_init()
            .ok();
    }
}

fn effective_log_level<'a>(common: &CommonOpts, configured: &'a str) -> &'a str {
    if common.trace {
        "trace"
    } else if common.debug {
        "debug"
    } else {
        match common.verbose {
            0 => configured,
            1 => "debug",
            _ => "trace",
        }
    }
}

fn handle_config(
    paths: &AppPaths,
    config: &AppConfig,
    command: ConfigCommand,
    json: bool,
) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(config).context("serializing config to JSON")?
                );
            } else {
                print!(
                    "{}",
                    toml::to_string_pretty(config).context("serializing config to TOML")?
                );
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Reset => {
            copilot::config::write_default_config(&paths.config_file)?;
            println!("Wrote {}", paths.config_file.display());
            Ok(())
        }
    }
}

fn presenter(json: bool) -> Box<dyn Presenter> {
    if json {
        Box::new(JsonPresenter::new(io::stdout()))
    } else {
        Box::new(TerminalPresenter::new(io::stdout()))
    }
}

async fn read_attachment(path: Option<&Path>) -> Result<Option<Attachment>> {
    match path {
        Some(path) => Ok(Some(Attachment::from_path(path).await?)),
        None => Ok(None),
    }
}

/// A parsed line of chat input.
#[derive(Debug, PartialEq)]
enum Input {
    Empty,
    Help,
    History,
    Quit,
    Upload(Option<PathBuf>),
    Action(Action),
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Action(Action::Ask(line.to_string()));
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));
    match name {
        "health" => Input::Action(Action::CheckHealth),
        "stats" => Input::Action(Action::RefreshStats),
        "rebuild" => Input::Action(Action::RebuildIndex),
        "upload" if rest.is_empty() => Input::Upload(None),
        "upload" => Input::Upload(Some(PathBuf::from(shellexpand::tilde(rest).as_ref()))),
        "history" => Input::History,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    }
}

async fn handle_chat(copilot: Copilot, json: bool) -> Result<ExitCode> {
    let mut view = presenter(json);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<ActionOutcome>();
    let mut outstanding = 0_usize;

    copilot.initialize().await;
    view.render(&copilot.snapshot().await)?;
    if !json {
        println!("{CHAT_HELP}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut reading = true;

    while reading || outstanding > 0 {
        tokio::select! {
            line = lines.next_line(), if reading => {
                let Some(line) = line.context("reading stdin")? else {
                    reading = false;
                    continue;
                };
                let action = match parse_input(&line) {
                    Input::Empty => None,
                    Input::Help => {
                        println!("{CHAT_HELP}");
                        None
                    }
                    Input::History => {
                        view.replay(&copilot.snapshot().await)?;
                        None
                    }
                    Input::Quit => {
                        reading = false;
                        None
                    }
                    Input::Unknown(name) => {
                        copilot
                            .notices()
                            .notify(&format!("Unknown command /{name}, try /help"), Severity::Info);
                        None
                    }
                    Input::Upload(path) => match read_attachment(path.as_deref()).await {
                        Ok(file) => Some(Action::Upload(file)),
                        Err(err) => {
                            copilot.notices().error(&format!("{err:#}"));
                            None
                        }
                    },
                    Input::Action(action) => Some(action),
                };

                if let Some(action) = action {
                    outstanding += 1;
                    let copilot = copilot.clone();
                    let done_tx = done_tx.clone();
                    tokio::spawn(async move {
                        let outcome = copilot.dispatch(action).await;
                        let _ = done_tx.send(outcome);
                    });
                    // Let a freshly spawned ask append its pending exchange first.
                    tokio::task::yield_now().await;
                }
            }
            Some(outcome) = done_rx.recv() => {
                outstanding -= 1;
                debug!(?outcome, "action finished");
                if outcome == ActionOutcome::Ask(AskOutcome::Busy) {
                    copilot.notices().notify(BUSY_NOTICE, Severity::Info);
                }
            }
        }

        view.render(&copilot.snapshot().await)?;
    }

    Ok(ExitCode::SUCCESS)
}
