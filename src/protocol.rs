use std::io::{self, BufRead, Write};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::WorkflowError;
use crate::questions::Question;
use crate::runner::Runner;
use crate::workflow::{Frontend, Notice, WorkflowOutcome, WorkflowRun, drive};

pub const PROTOCOL_VERSION: u32 = 1;

pub const RUN_STARTED: &str = "run.started";
pub const RUN_PROGRESS: &str = "run.progress";
pub const RUN_QUESTION: &str = "run.question";
pub const RUN_ARTIFACT: &str = "run.artifact";
pub const RUN_COMPLETED: &str = "run.completed";
pub const RUN_FAILED: &str = "run.failed";
pub const RUN_CANCELLED: &str = "run.cancelled";

pub const RUN_START: &str = "run.start";
pub const RUN_INPUT: &str = "run.input";
pub const RUN_CANCEL: &str = "run.cancel";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u32,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub ts: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(kind: &str, run_id: &str, payload: Value) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            id: Uuid::new_v4().to_string(),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            kind: kind.to_string(),
            run_id: run_id.to_string(),
            payload,
        }
    }
}

enum Inbound {
    Answer(String),
    Cancel,
}

pub struct ProtocolFrontend<R: BufRead, W: Write> {
    input: R,
    output: W,
    run_id: String,
    terminal_sent: bool,
}

impl<R: BufRead, W: Write> ProtocolFrontend<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            run_id: Uuid::new_v4().to_string(),
            terminal_sent: false,
        }
    }

    #[cfg(test)]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run(
        &mut self,
        run: &mut WorkflowRun,
        runner: &dyn Runner,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let started = json!({
            "workflow": run.command(),
            "steps": run.step_count(),
        });
        self.emit(RUN_STARTED, started);
        let outcome = drive(run, runner, self);
        match &outcome {
            Ok(done) => {
                if let Some(artifact) = &done.artifact {
                    self.emit(RUN_ARTIFACT, json!({ "path": artifact.display().to_string() }));
                }
                self.emit_terminal(
                    RUN_COMPLETED,
                    json!({
                        "result": done.result_text,
                        "artifact": done.artifact.as_ref().map(|path| path.display().to_string()),
                    }),
                );
            }
            Err(WorkflowError::Cancelled) => self.emit_terminal(RUN_CANCELLED, json!({})),
            Err(err) => self.emit_terminal(RUN_FAILED, json!({ "message": err.to_string() })),
        }
        outcome
    }

    fn emit_terminal(&mut self, kind: &str, payload: Value) {
        if self.terminal_sent {
            return;
        }
        self.terminal_sent = true;
        self.emit(kind, payload);
    }

    fn emit(&mut self, kind: &str, payload: Value) {
        let envelope = Envelope::new(kind, &self.run_id, payload);
        if let Err(err) = self.write_envelope(&envelope) {
            warn!(kind, error = %err, "failed to write protocol envelope");
        }
    }

    fn write_envelope(&mut self, envelope: &Envelope) -> io::Result<()> {
        let line = serde_json::to_string(envelope).map_err(io::Error::other)?;
        writeln!(self.output, "{line}")?;
        self.output.flush()
    }

    fn read_inbound(&mut self) -> Inbound {
        let mut line = String::new();
        loop {
            line.clear();
            match self.input.read_line(&mut line) {
                Ok(0) => return Inbound::Cancel,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "failed to read protocol input");
                    return Inbound::Cancel;
                }
            }
            if line.trim().is_empty() {
                continue;
            }
            let envelope: Envelope = match serde_json::from_str(line.trim()) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(error = %err, "ignoring malformed protocol line");
                    continue;
                }
            };
            if envelope.v != PROTOCOL_VERSION {
                warn!(version = envelope.v, "ignoring envelope with unsupported version");
                continue;
            }
            match envelope.kind.as_str() {
                RUN_INPUT => {
                    let answer = envelope
                        .payload
                        .get("answer")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    return Inbound::Answer(answer.to_string());
                }
                RUN_CANCEL => return Inbound::Cancel,
                RUN_START => debug!("run already started from the command line"),
                other => warn!(kind = other, "ignoring unexpected inbound envelope"),
            }
        }
    }
}

impl<R: BufRead, W: Write> Frontend for ProtocolFrontend<R, W> {
    fn on_notice(&mut self, notice: &Notice) {
        let payload = match notice {
            Notice::Preamble(text) | Notice::Text(text) => json!({ "kind": "text", "text": text }),
            Notice::Tool(description) => json!({ "kind": "tool", "text": description }),
            Notice::Session(session) => json!({ "kind": "session", "session_id": session }),
            Notice::StepStarted {
                index,
                total,
                label,
            } => json!({ "kind": "step_started", "step": index + 1, "total": total, "label": label }),
            Notice::StepCompleted { index, label, .. } => {
                json!({ "kind": "step_completed", "step": index + 1, "label": label })
            }
            // Questions are announced when an answer is actually requested.
            Notice::Questions(_) => return,
        };
        self.emit(RUN_PROGRESS, payload);
    }

    fn on_question(&mut self, pending: &[Question]) -> Option<String> {
        self.emit(RUN_QUESTION, json!({ "questions": pending }));
        match self.read_inbound() {
            Inbound::Answer(answer) => Some(answer),
            Inbound::Cancel => None,
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/protocol_tests.rs"]
mod tests;
