use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("unsupported agent backend '{0}'")]
    UnsupportedBackend(String),
    #[error("failed to start agent '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("agent process exited with {status}{}", stderr_suffix(.stderr))]
    Exit { status: String, stderr: String },
    #[error("agent output stream failed: {0}")]
    Io(#[from] io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("{0}")]
    AgentReported(String),
    #[error("agent completed without producing a result")]
    NoResult,
    #[error("step '{step}' could not start: {message}")]
    StepBuild { step: String, message: String },
    #[error("{0}")]
    Completion(String),
    #[error("step '{step}' cannot resume: the agent never reported a session id")]
    MissingSession { step: String },
    #[error("workflow has no steps")]
    Empty,
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("{0}")]
    Usage(String),
    #[error("terminal: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
