use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};

use serde_json::Value;

use crate::config::Config;
use crate::errors::RunnerError;

pub mod claude;

pub use claude::ClaudeRunner;

const TOOL_DETAIL_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    System,
    Assistant,
    ToolResult,
    Result,
    Error,
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub session_id: Option<String>,
    pub text: String,
    pub tool_uses: Vec<ToolUse>,
    pub is_error: bool,
    pub tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub name: String,
    pub input: Value,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            session_id: None,
            text: String::new(),
            tool_uses: Vec::new(),
            is_error: false,
            tokens: None,
        }
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let value: Value = serde_json::from_str(trimmed).ok()?;
        let object = value.as_object()?;
        let raw_kind = object
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut event = Self::new(EventKind::Other(raw_kind.to_string()));
        event.session_id = object
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string);

        match raw_kind {
            "system" => event.kind = EventKind::System,
            "assistant" => {
                event.kind = EventKind::Assistant;
                let blocks = content_blocks(&value);
                event.text = blocks
                    .iter()
                    .filter(|block| block_type(block) == Some("text"))
                    .filter_map(|block| block.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n");
                event.tool_uses = blocks
                    .iter()
                    .filter(|block| block_type(block) == Some("tool_use"))
                    .filter_map(|block| {
                        let name = block.get("name")?.as_str()?;
                        Some(ToolUse {
                            name: name.to_string(),
                            input: block.get("input").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect();
            }
            "user" => {
                if content_blocks(&value)
                    .iter()
                    .any(|block| block_type(block) == Some("tool_result"))
                {
                    event.kind = EventKind::ToolResult;
                }
            }
            "result" => {
                event.kind = EventKind::Result;
                event.text = object
                    .get("result")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                event.is_error = object
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                event.tokens = object.get("usage").and_then(usage_tokens);
            }
            "error" => {
                event.kind = EventKind::Error;
                event.is_error = true;
                event.text = error_message(object.get("error").or_else(|| object.get("message")));
            }
            _ => {}
        }
        Some(event)
    }

    pub fn text_content(&self) -> &str {
        if self.kind == EventKind::Assistant {
            &self.text
        } else {
            ""
        }
    }

    pub fn result_text(&self) -> &str {
        if self.kind == EventKind::Result {
            &self.text
        } else {
            ""
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == EventKind::Result
    }

    pub fn is_failure(&self) -> bool {
        self.kind == EventKind::Error || (self.is_terminal() && self.is_error)
    }
}

fn content_blocks(value: &Value) -> &[Value] {
    value
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn block_type(block: &Value) -> Option<&str> {
    block.get("type").and_then(Value::as_str)
}

fn usage_tokens(usage: &Value) -> Option<u64> {
    let input = usage.get("input_tokens").and_then(Value::as_u64);
    let output = usage.get("output_tokens").and_then(Value::as_u64);
    match (input, output) {
        (None, None) => None,
        (input, output) => Some(input.unwrap_or(0) + output.unwrap_or(0)),
    }
}

fn error_message(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_else(|| other.to_string()),
        None => "agent reported an error".to_string(),
    }
}

impl ToolUse {
    fn detail_key(&self) -> Option<&'static str> {
        match self.name.as_str() {
            "Bash" => Some("command"),
            "Read" | "Write" | "Edit" => Some("file_path"),
            "Glob" | "Grep" => Some("pattern"),
            "WebFetch" => Some("url"),
            "WebSearch" => Some("query"),
            "Task" => Some("description"),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        let detail = match self.detail_key() {
            Some(key) => self.input.get(key).map(value_text),
            None => self
                .input
                .as_object()
                .and_then(|object| object.values().next())
                .map(value_text),
        }
        .unwrap_or_default();
        let detail = detail.trim();
        if detail.is_empty() {
            return self.name.clone();
        }
        format!("{}  {}", self.name, truncate_chars(detail, TOOL_DETAIL_MAX_CHARS))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompts {
    pub user: String,
    pub system: String,
}

impl Prompts {
    pub fn new(user: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            system: system.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub prompts: Prompts,
    pub config: Config,
    pub session_id: Option<String>,
    pub cwd: PathBuf,
    pub log_file: Option<PathBuf>,
    pub prompt_dump: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(prompts: Prompts, config: Config, cwd: impl Into<PathBuf>) -> Self {
        Self {
            prompts,
            config,
            session_id: None,
            cwd: cwd.into(),
            log_file: None,
            prompt_dump: None,
        }
    }
}

/// Starts one agent turn. Implementations must return immediately and stream from a producer
/// thread.
pub trait Runner: Send + Sync {
    fn run(&self, opts: RunOptions) -> Turn;
}

/// Consumer side of a running turn. `events` closes when the process has exited; `errors`
/// then holds at most one failure.
#[derive(Debug)]
pub struct Turn {
    pub events: Receiver<Event>,
    pub errors: Receiver<RunnerError>,
}

pub struct TurnSink {
    events: Sender<Event>,
    errors: SyncSender<RunnerError>,
}

impl Turn {
    pub fn channel() -> (TurnSink, Turn) {
        let (event_tx, event_rx) = mpsc::channel();
        let (error_tx, error_rx) = mpsc::sync_channel(1);
        (
            TurnSink {
                events: event_tx,
                errors: error_tx,
            },
            Turn {
                events: event_rx,
                errors: error_rx,
            },
        )
    }

    pub fn next_event(&self) -> Option<Event> {
        self.events.recv().ok()
    }

    // The turn's failure, if any. Only meaningful after `next_event` returned `None`.
    pub fn close_error(&self) -> Option<RunnerError> {
        self.errors.recv().ok()
    }
}

impl TurnSink {
    pub fn emit(&self, event: Event) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn finish(self, outcome: Result<(), RunnerError>) {
        if let Err(err) = outcome {
            let _ = self.errors.try_send(err);
        }
    }
}

pub fn new_runner(config: &Config) -> Result<Box<dyn Runner>, RunnerError> {
    match config.agent.backend.trim() {
        "" | "claude" => Ok(Box::new(ClaudeRunner)),
        other => Err(RunnerError::UnsupportedBackend(other.to_string())),
    }
}

#[cfg(test)]
#[path = "../tests/unit/runner_tests.rs"]
mod tests;
