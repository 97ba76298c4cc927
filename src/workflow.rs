use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::artifact_io::{agent_log_path, prompt_dump_path};
use crate::config::Config;
use crate::errors::{RunnerError, WorkflowError};
use crate::questions::{self, Question};
use crate::runner::{Event, Prompts, RunOptions, Runner};
use crate::stats::{StatsCollector, UsageSnapshot, UsageStats};

pub const ANSWER_SEPARATOR: &str = "\n\n---\n\n";

pub type StepBuilder = Box<dyn Fn(&Config, &Path) -> Result<Prompts, String> + Send>;
pub type Completion = Box<dyn FnOnce() -> Result<Option<PathBuf>, String> + Send>;

pub struct Step {
    pub status_label: String,
    pub build: StepBuilder,
    pub log_file: Option<PathBuf>,
}

impl Step {
    pub fn new(
        status_label: impl Into<String>,
        build: impl Fn(&Config, &Path) -> Result<Prompts, String> + Send + 'static,
    ) -> Self {
        Self {
            status_label: status_label.into(),
            build: Box::new(build),
            log_file: None,
        }
    }

    #[cfg(test)]
    pub fn with_log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }
}

pub struct Workflow {
    pub command: String,
    pub preamble: Option<String>,
    pub log_file: Option<PathBuf>,
    pub steps: Vec<Step>,
    pub on_done: Option<Completion>,
}

impl Workflow {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            preamble: None,
            log_file: None,
            steps: Vec::new(),
            on_done: None,
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_completion(
        mut self,
        on_done: impl FnOnce() -> Result<Option<PathBuf>, String> + Send + 'static,
    ) -> Self {
        self.on_done = Some(Box::new(on_done));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Idle,
    Running,
    AwaitingAnswer,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Preamble(String),
    StepStarted {
        index: usize,
        total: usize,
        label: String,
    },
    Session(String),
    Tool(String),
    Text(String),
    Questions(Vec<Question>),
    StepCompleted {
        index: usize,
        label: String,
        result: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOutcome {
    pub artifact: Option<PathBuf>,
    pub result_text: String,
}

#[derive(Debug)]
pub enum Transition {
    StartTurn(RunOptions),
    AwaitAnswer,
    Completed(WorkflowOutcome),
    Halted,
}

pub struct WorkflowRun {
    command: String,
    preamble: Option<String>,
    log_file: Option<PathBuf>,
    steps: Vec<Step>,
    on_done: Option<Completion>,
    config: Config,
    cwd: PathBuf,
    step_index: usize,
    turn_number: usize,
    state: StepState,
    session_id: Option<String>,
    output: String,
    pending: VecDeque<Question>,
    answers: Vec<String>,
    result: Option<String>,
    turn_open: bool,
    notices: Vec<Notice>,
    stats: Box<dyn StatsCollector>,
}

impl WorkflowRun {
    pub fn new(workflow: Workflow, config: Config, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: workflow.command,
            preamble: workflow.preamble,
            log_file: workflow.log_file,
            steps: workflow.steps,
            on_done: workflow.on_done,
            config,
            cwd: cwd.into(),
            step_index: 0,
            turn_number: 0,
            state: StepState::Idle,
            session_id: None,
            output: String::new(),
            pending: VecDeque::new(),
            answers: Vec::new(),
            result: None,
            turn_open: false,
            notices: Vec::new(),
            stats: Box::new(UsageStats::new()),
        }
    }

    #[cfg(test)]
    pub fn with_stats(mut self, stats: Box<dyn StatsCollector>) -> Self {
        self.stats = stats;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_label(&self) -> &str {
        self.steps
            .get(self.step_index)
            .map(|step| step.status_label.as_str())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[cfg(test)]
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn pending_questions(&mut self) -> &[Question] {
        self.pending.make_contiguous()
    }

    pub fn active_question(&self) -> Option<&Question> {
        self.pending.front()
    }

    pub fn is_turn_open(&self) -> bool {
        self.turn_open
    }

    pub fn stats(&self) -> UsageSnapshot {
        self.stats.snapshot()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn start(&mut self) -> Result<Transition, WorkflowError> {
        if self.steps.is_empty() {
            self.state = StepState::Failed;
            return Err(WorkflowError::Empty);
        }
        info!(command = %self.command, steps = self.steps.len(), "starting workflow");
        if let Some(preamble) = self.preamble.clone() {
            self.notices.push(Notice::Preamble(preamble));
        }
        self.begin_step(0)
    }

    pub fn on_event(&mut self, event: &Event) -> Result<(), WorkflowError> {
        if matches!(self.state, StepState::Failed | StepState::Completed) {
            return Ok(());
        }
        debug!(kind = ?event.kind, step = self.step_index, "workflow event");
        self.stats.record(event);

        if self.session_id.is_none()
            && let Some(session) = &event.session_id
        {
            self.session_id = Some(session.clone());
            self.notices.push(Notice::Session(session.clone()));
        }

        for tool in &event.tool_uses {
            self.notices.push(Notice::Tool(tool.describe()));
        }

        let text = event.text_content();
        if !text.is_empty() {
            if !self.output.is_empty() {
                self.output.push('\n');
            }
            self.output.push_str(text);
            self.notices.push(Notice::Text(text.to_string()));
            let found = questions::detect(text);
            if !found.is_empty() {
                debug!(count = found.len(), "agent asked questions");
                self.pending.extend(found.iter().cloned());
                self.notices.push(Notice::Questions(found));
            }
        }

        if event.is_failure() {
            let message = if event.text.trim().is_empty() {
                "agent reported an error".to_string()
            } else {
                event.text.clone()
            };
            warn!(step = self.step_index, %message, "agent reported an error");
            self.fail();
            return Err(WorkflowError::AgentReported(message));
        }
        if event.is_terminal() {
            self.result = Some(event.result_text().to_string());
        }
        Ok(())
    }

    pub fn on_turn_closed(
        &mut self,
        error: Option<RunnerError>,
    ) -> Result<Transition, WorkflowError> {
        self.turn_open = false;
        if matches!(self.state, StepState::Failed | StepState::Completed) {
            return Ok(Transition::Halted);
        }
        if let Some(err) = error {
            self.fail();
            return Err(err.into());
        }
        if !self.pending.is_empty() {
            self.state = StepState::AwaitingAnswer;
            return Ok(Transition::AwaitAnswer);
        }
        if !self.answers.is_empty() {
            return self.resume_options().map(Transition::StartTurn);
        }
        match self.result.take() {
            Some(result) => self.complete_step(result),
            None => {
                self.fail();
                Err(WorkflowError::NoResult)
            }
        }
    }

    /// Answers the active question. Returns the resume turn once every pending question is
    /// answered and no turn is streaming; otherwise the answer is buffered. Fails the step when
    /// the agent never reported a session to resume.
    pub fn submit_answer(
        &mut self,
        answer: impl Into<String>,
    ) -> Result<Option<RunOptions>, WorkflowError> {
        if matches!(self.state, StepState::Failed | StepState::Completed) {
            return Ok(None);
        }
        if self.pending.pop_front().is_none() {
            return Ok(None);
        }
        self.answers.push(answer.into());
        if !self.pending.is_empty() || self.turn_open {
            return Ok(None);
        }
        self.resume_options().map(Some)
    }

    pub fn cancel(&mut self) -> WorkflowError {
        info!(command = %self.command, "workflow cancelled");
        self.fail();
        WorkflowError::Cancelled
    }

    fn fail(&mut self) {
        self.state = StepState::Failed;
        self.pending.clear();
        self.answers.clear();
        self.result = None;
    }

    fn begin_step(&mut self, index: usize) -> Result<Transition, WorkflowError> {
        let step = &self.steps[index];
        let label = step.status_label.clone();
        let prompts = (step.build)(&self.config, &self.cwd).map_err(|message| {
            WorkflowError::StepBuild {
                step: label.clone(),
                message,
            }
        });
        self.step_index = index;
        self.session_id = None;
        self.output.clear();
        self.pending.clear();
        self.answers.clear();
        self.result = None;
        self.turn_number = 0;
        let prompts = match prompts {
            Ok(prompts) => prompts,
            Err(err) => {
                self.fail();
                return Err(err);
            }
        };
        info!(step = index + 1, total = self.steps.len(), %label, "starting step");
        self.notices.push(Notice::StepStarted {
            index,
            total: self.steps.len(),
            label,
        });
        Ok(Transition::StartTurn(self.turn_options(prompts)))
    }

    fn resume_options(&mut self) -> Result<RunOptions, WorkflowError> {
        let Some(session) = self.session_id.clone() else {
            let step = self.step_label().to_string();
            warn!(step = self.step_index + 1, %step, "answers ready but no session to resume");
            self.fail();
            return Err(WorkflowError::MissingSession { step });
        };
        let prompt = std::mem::take(&mut self.answers).join(ANSWER_SEPARATOR);
        info!(step = self.step_index + 1, %session, "resuming session with answers");
        Ok(self.turn_options(Prompts::new(prompt, "")))
    }

    fn turn_options(&mut self, prompts: Prompts) -> RunOptions {
        self.turn_number += 1;
        self.state = StepState::Running;
        self.turn_open = true;
        self.result = None;
        let mut opts = RunOptions::new(prompts, self.config.clone(), self.cwd.clone());
        opts.session_id = self.session_id.clone();
        opts.log_file = self.resolve_log_file();
        if self.config.debug.enabled {
            opts.prompt_dump = Some(prompt_dump_path(
                &self.cwd,
                &self.command,
                self.step_index + 1,
                self.turn_number,
            ));
        }
        opts
    }

    fn resolve_log_file(&self) -> Option<PathBuf> {
        self.steps
            .get(self.step_index)
            .and_then(|step| step.log_file.clone())
            .or_else(|| self.log_file.clone())
            .or_else(|| {
                let dir = self.config.log_dir(&self.cwd)?;
                Some(agent_log_path(
                    &dir,
                    &self.config.agent.command,
                    &self.command,
                    Local::now(),
                ))
            })
    }

    fn complete_step(&mut self, result: String) -> Result<Transition, WorkflowError> {
        let index = self.step_index;
        let label = self.step_label().to_string();
        info!(step = index + 1, %label, "step completed");
        self.notices.push(Notice::StepCompleted {
            index,
            label,
            result: result.clone(),
        });
        if index + 1 < self.steps.len() {
            return self.begin_step(index + 1);
        }

        let artifact = match self.on_done.take() {
            Some(on_done) => match on_done() {
                Ok(artifact) => artifact,
                Err(message) => {
                    self.fail();
                    return Err(WorkflowError::Completion(message));
                }
            },
            None => None,
        };
        self.state = StepState::Completed;
        info!(command = %self.command, usage = %self.stats.snapshot().summary(), "workflow completed");
        Ok(Transition::Completed(WorkflowOutcome {
            artifact,
            result_text: result,
        }))
    }
}

pub trait Frontend {
    fn on_notice(&mut self, notice: &Notice);

    /// Answers the first of `pending`. `None` cancels the run.
    fn on_question(&mut self, pending: &[Question]) -> Option<String>;
}

pub fn drive(
    run: &mut WorkflowRun,
    runner: &dyn Runner,
    frontend: &mut dyn Frontend,
) -> Result<WorkflowOutcome, WorkflowError> {
    let started = run.start();
    flush_notices(run, frontend);
    let mut transition = started?;
    loop {
        transition = match transition {
            Transition::StartTurn(opts) => {
                let turn = runner.run(opts);
                while let Some(event) = turn.next_event() {
                    let applied = run.on_event(&event);
                    flush_notices(run, frontend);
                    applied?;
                }
                let closed = run.on_turn_closed(turn.close_error());
                flush_notices(run, frontend);
                closed?
            }
            Transition::AwaitAnswer => Transition::StartTurn(collect_answers(run, frontend)?),
            Transition::Completed(outcome) => return Ok(outcome),
            Transition::Halted => return Err(WorkflowError::Cancelled),
        };
    }
}

fn collect_answers(
    run: &mut WorkflowRun,
    frontend: &mut dyn Frontend,
) -> Result<RunOptions, WorkflowError> {
    while !run.pending_questions().is_empty() {
        let Some(answer) = frontend.on_question(run.pending_questions()) else {
            return Err(run.cancel());
        };
        if let Some(opts) = run.submit_answer(answer)? {
            return Ok(opts);
        }
    }
    Err(WorkflowError::NoResult)
}

fn flush_notices(run: &mut WorkflowRun, frontend: &mut dyn Frontend) {
    for notice in run.drain_notices() {
        frontend.on_notice(&notice);
    }
}

#[cfg(test)]
#[path = "../tests/unit/workflow_tests.rs"]
mod tests;
