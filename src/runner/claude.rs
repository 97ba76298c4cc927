use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;

use chrono::Local;
use tracing::{debug, info, warn};

use super::{Event, RunOptions, Runner, Turn, TurnSink};
use crate::artifact_io::{open_append, render_prompt_dump, session_separator, write_text_file};
use crate::errors::RunnerError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeRunner;

impl Runner for ClaudeRunner {
    fn run(&self, opts: RunOptions) -> Turn {
        let (sink, turn) = Turn::channel();
        thread::spawn(move || {
            let outcome = run_turn(&opts, &sink);
            if let Err(err) = &outcome {
                warn!(error = %err, "agent turn failed");
            }
            sink.finish(outcome);
        });
        turn
    }
}

pub fn build_args(opts: &RunOptions) -> Vec<String> {
    let agent = &opts.config.agent;
    let mut args = agent.args.clone();
    args.push("-p".to_string());
    args.push(opts.prompts.user.clone());
    if !opts.prompts.system.is_empty() {
        args.push("--system-prompt".to_string());
        args.push(opts.prompts.system.clone());
    }
    if !agent.allowed_tools.is_empty() {
        args.push("--allowedTools".to_string());
        args.push(agent.allowed_tools.join(","));
    }
    if !agent.disallowed_tools.is_empty() {
        args.push("--disallowedTools".to_string());
        args.push(agent.disallowed_tools.join(","));
    }
    if agent.dangerously_skip_permissions {
        args.push("--dangerously-skip-permissions".to_string());
    }
    if let Some(model) = agent
        .model
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        args.push("--model".to_string());
        args.push(model.to_string());
    }
    if let Some(session) = opts.session_id.as_deref().filter(|id| !id.is_empty()) {
        args.push("--resume".to_string());
        args.push(session.to_string());
    }
    args
}

fn run_turn(opts: &RunOptions, sink: &TurnSink) -> Result<(), RunnerError> {
    if let Some(path) = &opts.prompt_dump {
        let dump = render_prompt_dump(&opts.prompts.user, &opts.prompts.system);
        if let Err(err) = write_text_file(path, &dump) {
            warn!(path = %path.display(), error = %err, "failed to write prompt dump");
        }
    }

    let program = opts.config.agent.command.clone();
    info!(
        program = %program,
        cwd = %opts.cwd.display(),
        resume = opts.session_id.as_deref().unwrap_or(""),
        "starting agent turn"
    );
    let mut child = Command::new(&program)
        .args(build_args(opts))
        .current_dir(&opts.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stderr_reader = child.stderr.take().map(spawn_stderr_collector);
    let mut log = open_raw_log(opts);
    let read_outcome = forward_stdout(&mut child, sink, log.as_mut());

    let status = child.wait()?;
    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    read_outcome?;
    if !status.success() {
        return Err(RunnerError::Exit {
            status: status.to_string(),
            stderr,
        });
    }
    debug!(%status, "agent turn finished");
    Ok(())
}

// Forwards parsed events in order. Keeps draining after the consumer has gone so the child
// never blocks on a full pipe.
fn forward_stdout(
    child: &mut Child,
    sink: &TurnSink,
    mut log: Option<&mut File>,
) -> Result<(), RunnerError> {
    let Some(stdout) = child.stdout.take() else {
        return Ok(());
    };
    let mut consumer_gone = false;
    for chunk in BufReader::new(stdout).split(b'\n') {
        let chunk = chunk?;
        let line = String::from_utf8_lossy(&chunk);
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if let Some(file) = log.as_deref_mut()
            && let Err(err) = writeln!(file, "{line}")
        {
            warn!(error = %err, "failed to append raw agent output");
            log = None;
        }
        let Some(event) = Event::parse_line(line) else {
            warn!(line = %preview(line), "skipping malformed agent output line");
            continue;
        };
        debug!(kind = ?event.kind, "agent event");
        if !consumer_gone && !sink.emit(event) {
            debug!("event consumer disconnected; draining remaining output");
            consumer_gone = true;
        }
    }
    Ok(())
}

fn spawn_stderr_collector<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = reader.read_to_end(&mut bytes);
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

fn open_raw_log(opts: &RunOptions) -> Option<File> {
    let path = opts.log_file.as_ref()?;
    let mut file = match open_append(path) {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to open agent log");
            return None;
        }
    };
    if opts.session_id.is_none() {
        let _ = file.write_all(session_separator(Local::now()).as_bytes());
    }
    Some(file)
}

fn preview(line: &str) -> String {
    line.chars().take(120).collect()
}
