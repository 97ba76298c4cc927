use std::io::Cursor;
use std::sync::Mutex;

use super::*;
use crate::config::Config;
use crate::runner::{Event, EventKind, Prompts, RunOptions, Turn};
use crate::workflow::{Step, Workflow};

const QUESTION_TEXT: &str = r#"<!--QUESTION:{"questions":[{"question":"Proceed?","header":"Go"}]}-->"#;

/// First turn asks one question, later turns finish.
struct AskingRunner {
    calls: Mutex<Vec<RunOptions>>,
}

impl AskingRunner {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl Runner for AskingRunner {
    fn run(&self, opts: RunOptions) -> Turn {
        let mut calls = self.calls.lock().expect("calls lock");
        calls.push(opts);
        let (sink, turn) = Turn::channel();
        let mut system = Event::new(EventKind::System);
        system.session_id = Some("sess-proto".to_string());
        sink.emit(system);
        let mut text = Event::new(EventKind::Assistant);
        let mut result = Event::new(EventKind::Result);
        if calls.len() == 1 {
            text.text = QUESTION_TEXT.to_string();
        } else {
            text.text = "finished".to_string();
            result.text = "ok".to_string();
        }
        sink.emit(text);
        sink.emit(result);
        sink.finish(Ok(()));
        turn
    }
}

fn workflow_run() -> WorkflowRun {
    let workflow = Workflow::new("plan").with_step(Step::new("Planning", |_, _| {
        Ok(Prompts::new("make a plan", ""))
    }));
    WorkflowRun::new(workflow, Config::default(), "/tmp")
}

fn envelopes(output: &[u8]) -> Vec<Envelope> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid envelope line"))
        .collect()
}

fn kinds(envelopes: &[Envelope]) -> Vec<&str> {
    envelopes.iter().map(|envelope| envelope.kind.as_str()).collect()
}

fn inbound(kind: &str, payload: Value) -> String {
    let envelope = Envelope::new(kind, "caller", payload);
    format!("{}\n", serde_json::to_string(&envelope).expect("serialize inbound"))
}

#[test]
fn answered_run_completes_with_single_terminal_event() {
    let input = format!(
        "{}not json\n{}",
        inbound(RUN_START, json!({})),
        inbound(RUN_INPUT, json!({"answer": "yes"}))
    );
    let runner = AskingRunner::new();
    let mut output = Vec::new();
    let mut run = workflow_run();
    let (run_id, outcome) = {
        let mut frontend = ProtocolFrontend::new(Cursor::new(input), &mut output);
        let run_id = frontend.run_id().to_string();
        (run_id, frontend.run(&mut run, &runner))
    };

    let outcome = outcome.expect("run succeeds");

    assert_eq!(outcome.result_text, "ok");
    let sent = envelopes(&output);
    let kinds = kinds(&sent);
    assert_eq!(kinds.first(), Some(&RUN_STARTED));
    assert_eq!(kinds.last(), Some(&RUN_COMPLETED));
    assert!(kinds.contains(&RUN_QUESTION));
    let terminal = kinds
        .iter()
        .filter(|kind| [RUN_COMPLETED, RUN_FAILED, RUN_CANCELLED].contains(kind))
        .count();
    assert_eq!(terminal, 1);
    assert!(sent.iter().all(|envelope| envelope.v == PROTOCOL_VERSION));
    assert!(sent.iter().all(|envelope| envelope.run_id == run_id));
    let calls = runner.calls.lock().expect("calls lock");
    assert_eq!(calls[1].prompts.user, "yes");
    assert_eq!(calls[1].session_id.as_deref(), Some("sess-proto"));
}

#[test]
fn question_payload_lists_pending_questions() {
    let input = inbound(RUN_INPUT, json!({"answer": "yes"}));
    let mut output = Vec::new();
    let mut run = workflow_run();
    ProtocolFrontend::new(Cursor::new(input), &mut output)
        .run(&mut run, &AskingRunner::new())
        .expect("run succeeds");

    let sent = envelopes(&output);
    let question = sent
        .iter()
        .find(|envelope| envelope.kind == RUN_QUESTION)
        .expect("question envelope");
    assert_eq!(question.payload["questions"][0]["header"], "Go");
    assert_eq!(question.payload["questions"][0]["kind"], "text");
}

#[test]
fn cancel_message_ends_run_as_cancelled() {
    let input = inbound(RUN_CANCEL, json!({}));
    let mut output = Vec::new();
    let mut run = workflow_run();

    let err = ProtocolFrontend::new(Cursor::new(input), &mut output)
        .run(&mut run, &AskingRunner::new())
        .expect_err("cancelled");

    assert!(matches!(err, WorkflowError::Cancelled));
    let sent = envelopes(&output);
    assert_eq!(kinds(&sent).last(), Some(&RUN_CANCELLED));
}

#[test]
fn end_of_input_while_waiting_cancels() {
    let mut output = Vec::new();
    let mut run = workflow_run();
    let result = ProtocolFrontend::new(Cursor::new(String::new()), &mut output)
        .run(&mut run, &AskingRunner::new());
    assert!(matches!(result, Err(WorkflowError::Cancelled)));
}

#[test]
fn failures_are_reported_once_with_message() {
    let workflow = Workflow::new("plan")
        .with_step(Step::new("Broken", |_, _| Err("missing spec".to_string())));
    let mut run = WorkflowRun::new(workflow, Config::default(), "/tmp");
    let mut output = Vec::new();

    ProtocolFrontend::new(Cursor::new(String::new()), &mut output)
        .run(&mut run, &AskingRunner::new())
        .expect_err("fails");

    let sent = envelopes(&output);
    assert_eq!(kinds(&sent), vec![RUN_STARTED, RUN_FAILED]);
    let message = sent[1].payload["message"].as_str().expect("message");
    assert!(message.contains("missing spec"));
}

#[test]
fn completed_run_reports_artifact_before_completion() {
    let workflow = Workflow::new("plan")
        .with_step(Step::new("Planning", |_, _| Ok(Prompts::new("go", ""))))
        .with_completion(|| Ok(Some(std::path::PathBuf::from("/tmp/plans/x"))));
    let mut run = WorkflowRun::new(workflow, Config::default(), "/tmp");
    let input = inbound(RUN_INPUT, json!({"answer": "yes"}));
    let mut output = Vec::new();

    ProtocolFrontend::new(Cursor::new(input), &mut output)
        .run(&mut run, &AskingRunner::new())
        .expect("run succeeds");

    let sent = envelopes(&output);
    let kinds = kinds(&sent);
    let artifact_at = kinds.iter().position(|kind| *kind == RUN_ARTIFACT);
    let completed_at = kinds.iter().position(|kind| *kind == RUN_COMPLETED);
    assert!(artifact_at.is_some() && artifact_at < completed_at);
    assert_eq!(sent[artifact_at.unwrap_or(0)].payload["path"], "/tmp/plans/x");
}
