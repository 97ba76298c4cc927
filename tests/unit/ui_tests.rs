use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::buffer::Buffer;

use super::*;
use crate::app::{Command, Msg};
use crate::config::Config;
use crate::events::AppEvent;
use crate::runner::{Event, EventKind, Prompts, ToolUse, Turn};
use crate::workflow::{Step, Workflow, WorkflowRun};

fn started_app() -> App {
    let workflow = Workflow::new("plan")
        .with_step(Step::new("drafting plan", |_, _| Ok(Prompts::new("go", ""))))
        .with_completion(|| Ok(Some(std::path::PathBuf::from("/tmp/out"))));
    let mut app = App::new(
        WorkflowRun::new(workflow, Config::default(), std::env::temp_dir()),
        0,
    );
    assert!(matches!(app.start(), Command::StartTurn(_)));
    app
}

fn feed(app: &mut App, event: Event) {
    let (_sink, turn) = Turn::channel();
    app.update(Msg::AgentEvent { event, turn });
}

fn assistant(text: &str) -> Event {
    let mut event = Event::new(EventKind::Assistant);
    event.text = text.to_string();
    event
}

fn render_text(app: &App, width: u16, height: u16) -> String {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).expect("test terminal should initialize");
    terminal
        .draw(|frame| render(frame, app))
        .expect("render should succeed");
    buffer_to_string(terminal.backend().buffer())
}

fn buffer_to_string(buffer: &Buffer) -> String {
    let mut text = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

#[test]
fn status_bar_shows_step_stats_and_hints() {
    let app = started_app();
    let text = render_text(&app, 100, 10);
    let status = text.lines().last().unwrap_or_default();
    assert!(status.contains("* thinking  drafting plan"), "{status}");
    assert!(status.contains("0 tokens · 0 tools"), "{status}");
    assert!(status.contains("f: disable follow"));
    assert!(status.contains("v: detail"));
}

#[test]
fn agent_paragraphs_render_behind_one_bullet() {
    let mut app = started_app();
    feed(&mut app, assistant("first paragraph\n\nsecond paragraph"));
    let text = render_text(&app, 60, 10);
    assert!(text.contains("• first paragraph"), "{text}");
    assert!(text.contains("  second paragraph"), "{text}");
    assert_eq!(text.matches('•').count(), 1);
}

#[test]
fn agent_markdown_is_styled_instead_of_shown_literally() {
    let mut app = started_app();
    feed(&mut app, assistant("## Plan\n\n**Bold** and `code`"));
    let backend = TestBackend::new(60, 10);
    let mut terminal = Terminal::new(backend).expect("test terminal should initialize");
    terminal
        .draw(|frame| render(frame, &app))
        .expect("render should succeed");
    let buffer = terminal.backend().buffer();
    let text = buffer_to_string(buffer);

    assert!(text.contains("Plan"), "{text}");
    assert!(text.contains("Bold and code"), "{text}");
    assert!(!text.contains("**Bold**"), "{text}");
    assert!(!text.contains("`code`"), "{text}");

    let (x, y) = (0..buffer.area.height)
        .flat_map(|y| (0..buffer.area.width).map(move |x| (x, y)))
        .find(|&(x, y)| {
            buffer[(x, y)].symbol() == "B" && buffer[(x + 1, y)].symbol() == "o"
        })
        .expect("bold text on screen");
    assert!(buffer[(x, y)].modifier.contains(Modifier::BOLD));
}

#[test]
fn long_markdown_lines_wrap_inside_the_output_pane() {
    let mut app = started_app();
    feed(&mut app, assistant("alpha beta gamma delta epsilon"));
    let text = render_text(&app, 20, 8);
    assert!(text.contains("• alpha beta gamma"), "{text}");
    assert!(text.contains("delta epsilon"), "{text}");
}

#[test]
fn text_question_renders_prompt_and_text_area_hint() {
    let mut app = started_app();
    feed(
        &mut app,
        assistant(r#"<!--QUESTION:{"questions":[{"question":"What is it?","header":"Overview","type":"text"}]}-->"#),
    );
    app.update(Msg::Key(AppEvent::InputChar('h')));
    app.update(Msg::Key(AppEvent::InputChar('i')));
    let text = render_text(&app, 100, 16);
    assert!(text.contains("Overview: What is it?"));
    assert!(text.contains("ctrl+d or ctrl+s to submit"));
    assert!(text.contains("hi"));
    assert!(!text.contains("QUESTION"));
}

#[test]
fn choice_question_lists_numbered_options_and_other() {
    let mut app = started_app();
    feed(
        &mut app,
        assistant(r#"<!--QUESTION:{"questions":[{"question":"Which?","header":"Approach","type":"choice","options":[{"label":"Fast","description":"quick"},{"label":"Safe"}]}]}-->"#),
    );
    let text = render_text(&app, 100, 16);
    assert!(text.contains("Approach: Which?"));
    assert!(text.contains("› 1. Fast  quick"));
    assert!(text.contains("  2. Safe"));
    assert!(text.contains("3. Other (type your own answer)"));
    assert!(text.contains("1-3: choose"));
}

#[test]
fn tool_line_renders_above_status_in_simple_mode() {
    let mut app = started_app();
    let mut event = Event::new(EventKind::Assistant);
    event.tool_uses.push(ToolUse {
        name: "Bash".to_string(),
        input: serde_json::json!({"command": "cargo fmt"}),
    });
    feed(&mut app, event);
    let text = render_text(&app, 80, 8);
    let rows: Vec<&str> = text.lines().collect();
    assert!(rows[rows.len() - 2].starts_with("⚙ Bash  cargo fmt"));

    app.update(Msg::Key(AppEvent::InputChar('v')));
    let text = render_text(&app, 80, 8);
    assert!(text.contains("  ⚙ Bash  cargo fmt"));
    assert!(text.contains("v: simple"));
}

#[test]
fn render_reports_metrics_so_follow_shows_latest_lines() {
    let mut app = started_app();
    for index in 0..20 {
        feed(&mut app, assistant(&format!("line {index}")));
    }
    let text = render_text(&app, 40, 6);
    assert!(text.contains("line 19"));
    assert!(text.contains("line 15"));
    assert!(!text.contains("line 14"));
    assert_eq!(app.output_scroll(), 15);
}

#[test]
fn completed_run_shows_success_line_and_done_status() {
    let mut app = started_app();
    let mut result = Event::new(EventKind::Result);
    result.text = "ok".to_string();
    feed(&mut app, result);
    app.update(Msg::TurnClosed { error: None });
    let text = render_text(&app, 80, 8);
    assert!(text.contains("• completed  output: /tmp/out"));
    assert!(text.contains("done  press q to exit"));
}
