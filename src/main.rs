use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod artifact_io;
mod config;
mod errors;
mod events;
mod headless;
mod markdown;
mod protocol;
mod questions;
mod runner;
mod stats;
mod steps;
mod text_layout;
mod theme;
mod tui;
mod ui;
mod workflow;

use app::App;
use artifact_io::open_append;
use config::Config;
use errors::{CliError, WorkflowError};
use protocol::ProtocolFrontend;
use theme::Theme;
use workflow::{Workflow, WorkflowOutcome, WorkflowRun};

const LOG_ENV: &str = "SPECDRIVE_LOG";
const TUI_LOG_FILE: &str = "specdrive.log";

#[derive(Debug, Parser)]
#[command(name = "specdrive", version)]
#[command(about = "Drive a coding agent through spec, plan and implement workflows")]
struct Cli {
    /// Project root; relative paths below resolve against it
    #[arg(long, value_name = "DIR", default_value = ".")]
    project: PathBuf,

    /// How to interact with the run
    #[arg(long, value_enum, default_value_t = FrontendKind::Auto)]
    frontend: FrontendKind,

    /// Answer given to every question in headless mode
    #[arg(long, value_name = "TEXT", default_value = "")]
    default_answer: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FrontendKind {
    /// Terminal UI when stdout is a TTY, headless otherwise
    Auto,
    Terminal,
    Headless,
    /// Line-delimited JSON envelopes on stdin/stdout
    Protocol,
}

impl FrontendKind {
    fn resolve(self, stdout_is_tty: bool) -> Self {
        match self {
            Self::Auto if stdout_is_tty => Self::Terminal,
            Self::Auto => Self::Headless,
            other => other,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a spec interactively, one section at a time
    New {
        /// Spec name, written to .specdrive/specs/<name>.md
        name: String,
    },
    /// Generate .specdrive/plans/<spec>/plan.md from a spec file
    Plan {
        /// Spec file, relative to the project root
        spec_file: PathBuf,
    },
    /// Execute a plan
    Implement {
        /// Plan directory, path relative to the project root, or plan name
        plan: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let frontend = cli.frontend.resolve(io::stdout().is_terminal());
    match run(&cli, frontend) {
        Ok(outcome) => {
            if frontend != FrontendKind::Protocol
                && let Some(artifact) = &outcome.artifact
            {
                println!("{}", artifact.display());
            }
            ExitCode::SUCCESS
        }
        Err(CliError::Workflow(WorkflowError::Cancelled)) => {
            if frontend != FrontendKind::Protocol {
                eprintln!("cancelled");
            }
            ExitCode::from(130)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, frontend: FrontendKind) -> Result<WorkflowOutcome, CliError> {
    let project = resolve_project(&cli.project)?;
    let config = Config::load(&project)?;
    init_logging(frontend, &config, &project);

    let runner = runner::new_runner(&config)?;
    let workflow = build_workflow(&cli.command, &project)?;
    info!(command = %workflow.command, project = %project.display(), ?frontend, "starting");
    let theme_index = Theme::initial_index(&config.tui.theme);
    let mut run = WorkflowRun::new(workflow, config, &project);

    let outcome = match frontend {
        FrontendKind::Terminal | FrontendKind::Auto => {
            let app = tui::run(App::new(run, theme_index), runner.as_ref())?;
            app.into_result()?
        }
        FrontendKind::Headless => headless::run_to_writer(
            &mut run,
            runner.as_ref(),
            &mut io::stdout().lock(),
            &cli.default_answer,
        )?,
        FrontendKind::Protocol => {
            ProtocolFrontend::new(io::stdin().lock(), io::stdout().lock())
                .run(&mut run, runner.as_ref())?
        }
    };
    Ok(outcome)
}

fn resolve_project(project: &Path) -> Result<PathBuf, CliError> {
    project.canonicalize().map_err(|err| {
        CliError::Usage(format!("project directory {}: {err}", project.display()))
    })
}

fn build_workflow(command: &Commands, project: &Path) -> Result<Workflow, CliError> {
    match command {
        Commands::New { name } => {
            let name = name.trim();
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(CliError::Usage(format!("invalid spec name '{name}'")));
            }
            Ok(steps::spec_creator_workflow(name, project))
        }
        Commands::Plan { spec_file } => Ok(steps::plan_workflow(spec_file, project)),
        Commands::Implement { plan } => {
            let plan_dir = steps::resolve_plan_dir(plan, project).map_err(CliError::Usage)?;
            Ok(steps::implement_workflow(&plan_dir))
        }
    }
}

// Headless and protocol runs log to stderr. The terminal UI owns the screen, so it logs to a
// file in the debug log directory, or not at all when debugging is off.
fn init_logging(frontend: FrontendKind, config: &Config, project: &Path) {
    let default_level = if config.debug.enabled { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let initialized = match frontend {
        FrontendKind::Terminal | FrontendKind::Auto => {
            let Some(log_dir) = config.log_dir(project) else {
                return;
            };
            match open_append(&log_dir.join(TUI_LOG_FILE)) {
                Ok(file) => builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init(),
                Err(err) => {
                    eprintln!("failed to open log file in {}: {err}", log_dir.display());
                    return;
                }
            }
        }
        FrontendKind::Headless | FrontendKind::Protocol => {
            builder.with_writer(io::stderr).try_init()
        }
    };
    if let Err(err) = initialized {
        eprintln!("failed to initialize logging: {err}");
    }
}

#[cfg(test)]
#[path = "../tests/unit/main_launch_tests.rs"]
mod launch_tests;
