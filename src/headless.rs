use std::io::Write;

use tracing::{debug, info};

use crate::errors::WorkflowError;
use crate::questions::Question;
use crate::runner::Runner;
use crate::workflow::{Frontend, Notice, WorkflowOutcome, WorkflowRun, drive};

pub struct Headless<T, Q>
where
    T: FnMut(&str),
    Q: FnMut(&[Question]) -> String,
{
    on_text: T,
    on_question: Q,
}

impl<T, Q> Headless<T, Q>
where
    T: FnMut(&str),
    Q: FnMut(&[Question]) -> String,
{
    pub fn new(on_text: T, on_question: Q) -> Self {
        Self {
            on_text,
            on_question,
        }
    }

    pub fn run(
        &mut self,
        run: &mut WorkflowRun,
        runner: &dyn Runner,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        drive(run, runner, self)
    }
}

impl<T, Q> Frontend for Headless<T, Q>
where
    T: FnMut(&str),
    Q: FnMut(&[Question]) -> String,
{
    fn on_notice(&mut self, notice: &Notice) {
        match notice {
            Notice::Preamble(text) | Notice::Text(text) => (self.on_text)(text),
            Notice::StepStarted {
                index,
                total,
                label,
            } => info!(step = index + 1, total, %label, "step started"),
            Notice::Tool(description) => debug!(tool = %description, "tool use"),
            Notice::Session(session) => debug!(%session, "session captured"),
            Notice::Questions(_) => {}
            Notice::StepCompleted { index, label, .. } => {
                info!(step = index + 1, %label, "step completed")
            }
        }
    }

    fn on_question(&mut self, pending: &[Question]) -> Option<String> {
        Some((self.on_question)(pending))
    }
}

pub fn run_to_writer<W: Write>(
    run: &mut WorkflowRun,
    runner: &dyn Runner,
    out: &mut W,
    default_answer: &str,
) -> Result<WorkflowOutcome, WorkflowError> {
    // Both callbacks print, so they share the writer through a RefCell.
    let out = std::cell::RefCell::new(out);
    let mut frontend = Headless::new(
        |text: &str| {
            let mut out = out.borrow_mut();
            let _ = writeln!(out, "{text}");
            let _ = out.flush();
        },
        |pending: &[Question]| {
            if let Some(question) = pending.first() {
                let mut out = out.borrow_mut();
                let _ = writeln!(out, "\n[Question] {}", question.question);
                for (index, option) in question.options.iter().enumerate() {
                    let _ = writeln!(out, "  {}. {}", index + 1, option.label);
                }
                let _ = out.flush();
            }
            default_answer.to_string()
        },
    );
    frontend.run(run, runner)
}
