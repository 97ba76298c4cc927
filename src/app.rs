use std::cell::Cell;
use std::path::Path;

use tracing::{debug, info};

use crate::errors::{RunnerError, WorkflowError};
use crate::events::AppEvent;
use crate::questions::{self, OTHER_OPTION_LABEL, Question};
use crate::runner::{Event, RunOptions, Turn};
use crate::stats::UsageSnapshot;
use crate::text_layout::wrap_word_with_positions;
use crate::theme::{THEME_NAMES, Theme};
use crate::workflow::{Notice, StepState, Transition, WorkflowOutcome, WorkflowRun};

const PAGE_LINES: u16 = 10;
const WHEEL_LINES: u16 = 3;

// Messages the terminal loop feeds into `App::update`. A turn's channels only ever travel
// inside `AgentEvent`; the app hands them straight back in `Command::ReadNext`.
#[derive(Debug)]
pub enum Msg {
    Key(AppEvent),
    AgentEvent { event: Event, turn: Turn },
    TurnClosed { error: Option<RunnerError> },
}

#[derive(Debug)]
pub enum Command {
    None,
    StartTurn(RunOptions),
    ReadNext(Turn),
    Quit,
}

pub fn read_next(turn: Turn) -> Msg {
    match turn.next_event() {
        Some(event) => Msg::AgentEvent { event, turn },
        None => Msg::TurnClosed {
            error: turn.close_error(),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Output,
    Agent,
    Answer,
    Tool,
    Step,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub kind: LineKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewMetrics {
    pub output_rows: u16,
    pub output_height: u16,
    pub input_width: u16,
}

impl ViewMetrics {
    fn max_scroll(&self) -> u16 {
        self.output_rows.saturating_sub(self.output_height)
    }
}

pub struct App {
    pub running: bool,
    run: WorkflowRun,
    lines: Vec<OutputLine>,
    tool_line: Option<String>,
    follow: bool,
    detail: bool,
    scroll: u16,
    theme_index: usize,
    note: Option<String>,
    failure: Option<WorkflowError>,
    outcome: Option<WorkflowOutcome>,
    selected: usize,
    other_mode: bool,
    input: String,
    cursor: usize,
    cursor_goal_col: Option<u16>,
    metrics: Cell<ViewMetrics>,
}

impl App {
    pub fn new(run: WorkflowRun, theme_index: usize) -> Self {
        Self {
            running: true,
            run,
            lines: Vec::new(),
            tool_line: None,
            follow: true,
            detail: false,
            scroll: 0,
            theme_index,
            note: None,
            failure: None,
            outcome: None,
            selected: 0,
            other_mode: false,
            input: String::new(),
            cursor: 0,
            cursor_goal_col: None,
            metrics: Cell::new(ViewMetrics::default()),
        }
    }

    pub fn start(&mut self) -> Command {
        let started = self.run.start();
        self.absorb_notices();
        self.apply(started)
    }

    pub fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Key(event) => self.on_key(event),
            Msg::AgentEvent { event, turn } => {
                self.note = None;
                let applied = self.run.on_event(&event);
                self.absorb_notices();
                match applied {
                    Ok(()) => Command::ReadNext(turn),
                    Err(err) => {
                        // The turn is dropped here; its process finishes on its own.
                        self.fail(err);
                        Command::None
                    }
                }
            }
            Msg::TurnClosed { error } => {
                let closed = self.run.on_turn_closed(error);
                self.absorb_notices();
                self.apply(closed)
            }
        }
    }

    pub fn into_result(mut self) -> Result<WorkflowOutcome, WorkflowError> {
        if let Some(outcome) = self.outcome.take() {
            return Ok(outcome);
        }
        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }
        Err(self.run.cancel())
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    pub fn visible_lines(&self) -> impl Iterator<Item = &OutputLine> {
        self.lines
            .iter()
            .filter(|line| self.detail || line.kind != LineKind::Tool)
    }

    pub fn tool_line(&self) -> Option<&str> {
        if self.detail {
            return None;
        }
        self.tool_line.as_deref()
    }

    pub fn active_question(&self) -> Option<&Question> {
        if self.is_finished() {
            return None;
        }
        self.run.active_question()
    }

    pub fn is_editing_text(&self) -> bool {
        self.active_question()
            .is_some_and(|question| !question.is_choice() || self.other_mode)
    }

    pub fn is_other_mode(&self) -> bool {
        self.other_mode
    }

    pub fn selected_option(&self) -> usize {
        self.selected
    }

    pub fn choice_labels(&self) -> Vec<String> {
        let Some(question) = self.active_question() else {
            return Vec::new();
        };
        question
            .options
            .iter()
            .map(|option| option.label.clone())
            .chain(std::iter::once(OTHER_OPTION_LABEL.to_string()))
            .collect()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_cursor_line_col(&self, width: u16) -> (u16, u16) {
        let positions = wrap_word_with_positions(&self.input, width.max(1)).positions;
        positions
            .get(self.cursor)
            .copied()
            .unwrap_or_else(|| positions.last().copied().unwrap_or_default())
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    pub fn is_detail(&self) -> bool {
        self.detail
    }

    pub fn theme(&self) -> Theme {
        Theme::by_index(self.theme_index)
    }

    pub fn is_finished(&self) -> bool {
        self.failure.is_some() || self.outcome.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn stats(&self) -> UsageSnapshot {
        self.run.stats()
    }

    pub fn status_text(&self) -> String {
        if self.failure.is_some() {
            return "error  press q to exit".to_string();
        }
        if self.outcome.is_some() {
            return "done  press q to exit".to_string();
        }
        if let Some(note) = &self.note {
            return note.clone();
        }
        let label = self.run.step_label();
        if self.run.state() == StepState::AwaitingAnswer && !self.run.is_turn_open() {
            format!("? waiting for answer  {label}")
        } else {
            format!("* thinking  {label}")
        }
    }

    pub fn output_scroll(&self) -> u16 {
        let max = self.metrics.get().max_scroll();
        if self.follow { max } else { self.scroll.min(max) }
    }

    pub fn set_view_metrics(&self, metrics: ViewMetrics) {
        self.metrics.set(metrics);
    }

    fn on_key(&mut self, event: AppEvent) -> Command {
        if event == AppEvent::Tick {
            return Command::None;
        }
        if event == AppEvent::Quit {
            return self.quit();
        }
        if self.failure.is_some() {
            return match event {
                AppEvent::InputChar('q' | 'Q') => self.quit(),
                _ => Command::None,
            };
        }
        if self.active_question().is_some() {
            if self.is_editing_text() {
                return self.on_text_key(event);
            }
            return self.on_choice_key(event);
        }
        self.on_browse_key(event)
    }

    fn on_browse_key(&mut self, event: AppEvent) -> Command {
        self.note = None;
        match event {
            AppEvent::InputChar('q' | 'Q') => return self.quit(),
            AppEvent::InputChar('t' | 'T') => self.cycle_theme(),
            AppEvent::InputChar('f' | 'F') => self.follow = !self.follow,
            AppEvent::InputChar('v' | 'V') => self.detail = !self.detail,
            AppEvent::MoveUp | AppEvent::InputChar('k') => self.scroll_up(1),
            AppEvent::MoveDown | AppEvent::InputChar('j') => self.scroll_down(1),
            AppEvent::PageUp => self.scroll_up(PAGE_LINES),
            AppEvent::PageDown => self.scroll_down(PAGE_LINES),
            AppEvent::ScrollUp => self.scroll_up(WHEEL_LINES),
            AppEvent::ScrollDown => self.scroll_down(WHEEL_LINES),
            _ => {}
        }
        Command::None
    }

    fn on_choice_key(&mut self, event: AppEvent) -> Command {
        let entries = self.choice_labels().len();
        match event {
            AppEvent::InputChar(c) if c.is_ascii_digit() => {
                let number = c.to_digit(10).unwrap_or(0) as usize;
                if (1..=entries).contains(&number) {
                    self.selected = number - 1;
                    return self.choose_selected();
                }
            }
            AppEvent::MoveUp => self.selected = self.selected.saturating_sub(1),
            AppEvent::MoveDown => {
                self.selected = (self.selected + 1).min(entries.saturating_sub(1));
            }
            AppEvent::Submit => return self.choose_selected(),
            AppEvent::InputChar('t' | 'T') => self.cycle_theme(),
            AppEvent::InputChar('f' | 'F') => self.follow = !self.follow,
            AppEvent::InputChar('v' | 'V') => self.detail = !self.detail,
            AppEvent::PageUp => self.scroll_up(PAGE_LINES),
            AppEvent::PageDown => self.scroll_down(PAGE_LINES),
            AppEvent::ScrollUp => self.scroll_up(WHEEL_LINES),
            AppEvent::ScrollDown => self.scroll_down(WHEEL_LINES),
            _ => {}
        }
        Command::None
    }

    fn on_text_key(&mut self, event: AppEvent) -> Command {
        match event {
            AppEvent::InputChar(c) => self.input_char(c),
            AppEvent::Backspace => self.backspace_input(),
            AppEvent::CursorLeft => self.move_cursor_left(),
            AppEvent::CursorRight => self.move_cursor_right(),
            AppEvent::MoveUp => self.move_cursor_up(),
            AppEvent::MoveDown => self.move_cursor_down(),
            AppEvent::Submit if self.other_mode => return self.submit_input(),
            AppEvent::Submit => self.input_char('\n'),
            AppEvent::SubmitText => return self.submit_input(),
            AppEvent::Cancel if self.other_mode => {
                self.other_mode = false;
                self.clear_input();
            }
            AppEvent::Cancel => self.clear_input(),
            AppEvent::PageUp => self.scroll_up(PAGE_LINES),
            AppEvent::PageDown => self.scroll_down(PAGE_LINES),
            AppEvent::ScrollUp => self.scroll_up(WHEEL_LINES),
            AppEvent::ScrollDown => self.scroll_down(WHEEL_LINES),
            _ => {}
        }
        Command::None
    }

    fn choose_selected(&mut self) -> Command {
        let labels = self.choice_labels();
        if self.selected + 1 >= labels.len() {
            self.other_mode = true;
            self.clear_input();
            return Command::None;
        }
        match labels.get(self.selected) {
            Some(label) => self.submit_answer(label.clone()),
            None => Command::None,
        }
    }

    fn submit_input(&mut self) -> Command {
        if self.input.trim().is_empty() {
            return Command::None;
        }
        let answer = self.input.trim_end().to_string();
        self.submit_answer(answer)
    }

    fn submit_answer(&mut self, answer: String) -> Command {
        self.push_line(LineKind::Answer, answer_preview(&answer));
        self.clear_input();
        self.other_mode = false;
        self.selected = 0;
        let resume = self
            .run
            .submit_answer(answer)
            .map(|opts| opts.map_or(Transition::AwaitAnswer, Transition::StartTurn));
        self.absorb_notices();
        self.apply(resume)
    }

    fn quit(&mut self) -> Command {
        info!("terminal frontend quitting");
        self.running = false;
        Command::Quit
    }

    fn cycle_theme(&mut self) {
        self.theme_index = Theme::next_index(self.theme_index);
        self.note = Some(format!(
            "theme: {}  (t to cycle)",
            THEME_NAMES[self.theme_index]
        ));
    }

    fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.output_scroll().saturating_sub(lines);
        self.follow = false;
    }

    fn scroll_down(&mut self, lines: u16) {
        let max = self.metrics.get().max_scroll();
        self.scroll = self.output_scroll().saturating_add(lines).min(max);
    }

    fn apply(&mut self, transition: Result<Transition, WorkflowError>) -> Command {
        match transition {
            Ok(Transition::StartTurn(opts)) => Command::StartTurn(opts),
            Ok(Transition::AwaitAnswer) | Ok(Transition::Halted) => Command::None,
            Ok(Transition::Completed(outcome)) => {
                self.tool_line = None;
                let line = match &outcome.artifact {
                    Some(path) => completed_line(path),
                    None => "• completed".to_string(),
                };
                self.push_line(LineKind::Success, line);
                self.outcome = Some(outcome);
                Command::None
            }
            Err(err) => {
                self.fail(err);
                Command::None
            }
        }
    }

    fn fail(&mut self, err: WorkflowError) {
        self.tool_line = None;
        self.push_line(LineKind::Error, format!("• {err}"));
        self.failure = Some(err);
    }

    fn absorb_notices(&mut self) {
        for notice in self.run.drain_notices() {
            match notice {
                Notice::Preamble(text) => {
                    self.push_line(LineKind::Output, text.trim_end().to_string());
                    self.push_line(LineKind::Output, String::new());
                }
                Notice::StepStarted {
                    index,
                    total,
                    label,
                } => {
                    if total > 1 {
                        self.push_line(
                            LineKind::Step,
                            format!("── step {}/{total}: {label}", index + 1),
                        );
                    }
                }
                Notice::Session(session) => debug!(%session, "session captured"),
                Notice::Tool(description) => {
                    self.push_line(LineKind::Tool, format!("  ⚙ {description}"));
                    self.tool_line = Some(description);
                }
                Notice::Text(text) => {
                    self.tool_line = None;
                    let text = questions::strip_markers(&text);
                    if !text.trim().is_empty() {
                        self.push_line(LineKind::Agent, text.trim().to_string());
                    }
                }
                Notice::Questions(found) => {
                    debug!(count = found.len(), "questions pending");
                }
                Notice::StepCompleted { .. } => self.tool_line = None,
            }
        }
    }

    fn push_line(&mut self, kind: LineKind, text: String) {
        self.lines.push(OutputLine { kind, text });
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
        self.cursor_goal_col = None;
    }

    fn input_char(&mut self, c: char) {
        let byte_idx = char_to_byte_idx(&self.input, self.cursor);
        self.input.insert(byte_idx, c);
        self.cursor += 1;
        self.cursor_goal_col = None;
    }

    fn backspace_input(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = char_to_byte_idx(&self.input, self.cursor - 1);
        let end = char_to_byte_idx(&self.input, self.cursor);
        self.input.drain(start..end);
        self.cursor -= 1;
        self.cursor_goal_col = None;
    }

    fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor_goal_col = None;
    }

    fn move_cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
        self.cursor_goal_col = None;
    }

    fn move_cursor_up(&mut self) {
        let positions = self.input_positions();
        let (line, col) = positions[self.cursor];
        if line == 0 {
            return;
        }
        let goal_col = self.cursor_goal_col.unwrap_or(col);
        self.cursor = nearest_index_for_line_col(&positions, line - 1, goal_col);
        self.cursor_goal_col = Some(goal_col);
    }

    fn move_cursor_down(&mut self) {
        let positions = self.input_positions();
        let (line, col) = positions[self.cursor];
        let last_line = positions.last().map(|(l, _)| *l).unwrap_or(0);
        if line >= last_line {
            return;
        }
        let goal_col = self.cursor_goal_col.unwrap_or(col);
        self.cursor = nearest_index_for_line_col(&positions, line + 1, goal_col);
        self.cursor_goal_col = Some(goal_col);
    }

    fn input_positions(&self) -> Vec<(u16, u16)> {
        let width = match self.metrics.get().input_width {
            0 => u16::MAX,
            width => width,
        };
        wrap_word_with_positions(&self.input, width).positions
    }
}

pub fn answer_preview(answer: &str) -> String {
    let mut lines = answer.lines();
    let first = lines.next().unwrap_or_default();
    let count = 1 + lines.count();
    if count > 1 {
        format!("> {first} ({count} lines)")
    } else {
        format!("> {first}")
    }
}

fn completed_line(path: &Path) -> String {
    format!("• completed  output: {}", path.display())
}

fn char_to_byte_idx(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(s.len())
}

fn nearest_index_for_line_col(positions: &[(u16, u16)], target_line: u16, goal_col: u16) -> usize {
    let on_line = || {
        positions
            .iter()
            .enumerate()
            .filter(move |(_, (line, _))| *line == target_line)
    };
    on_line()
        .filter(|(_, (_, col))| *col <= goal_col)
        .max_by_key(|(_, (_, col))| *col)
        .or_else(|| on_line().next())
        .map(|(idx, _)| idx)
        .unwrap_or(positions.len().saturating_sub(1))
}

#[cfg(test)]
#[path = "../tests/unit/app_tests.rs"]
mod tests;
