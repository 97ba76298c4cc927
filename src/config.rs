use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::errors::ConfigError;

pub const PROJECT_DIR: &str = ".specdrive";
pub const CONFIG_FILE: &str = "config.toml";

fn env_var_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env var regex must compile"))
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub debug: DebugConfig,
    pub tui: TuiConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    pub backend: String,
    pub command: String,
    pub args: Vec<String>,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub dangerously_skip_permissions: bool,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_dir: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TuiConfig {
    pub theme: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            backend: "claude".to_string(),
            command: "claude".to_string(),
            args: vec![
                "--output-format".to_string(),
                "stream-json".to_string(),
                "--verbose".to_string(),
            ],
            allowed_tools: [
                "Task", "Bash", "Read", "Write", "Edit", "Glob", "Grep", "WebFetch", "WebSearch",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            disallowed_tools: Vec::new(),
            dangerously_skip_permissions: false,
            model: None,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: format!("{PROJECT_DIR}/logs"),
        }
    }
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            theme: "dracula".to_string(),
        }
    }
}

impl Config {
    pub fn config_path(project: &Path) -> PathBuf {
        project.join(PROJECT_DIR).join(CONFIG_FILE)
    }

    pub fn load(project: &Path) -> Result<Self, ConfigError> {
        let path = Self::config_path(project);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(&expand_env_vars(text))
    }

    pub fn log_dir(&self, project: &Path) -> Option<PathBuf> {
        let dir = self.debug.log_dir.trim();
        if !self.debug.enabled || dir.is_empty() {
            return None;
        }
        Some(project.join(dir))
    }
}

pub fn expand_env_vars(text: &str) -> String {
    env_var_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
#[path = "../tests/unit/config_tests.rs"]
mod tests;
