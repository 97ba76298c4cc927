use ratatui::prelude::*;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Padding, Paragraph};

use crate::app::{App, LineKind, OutputLine, ViewMetrics};
use crate::markdown::render_markdown;
use crate::questions::Question;
use crate::text_layout::{wrap_lines, wrap_styled_line, wrap_word_with_positions};
use crate::theme::Theme;

const MAX_INPUT_TEXT_LINES: u16 = 5;
const TEXT_PADDING: u16 = 1;
const STATUS_HEIGHT: u16 = 1;
const TOOL_LINE_HEIGHT: u16 = 1;
const TEXT_HINT: &str = "ctrl+d or ctrl+s to submit  •  enter for newline  •  esc to clear";
const OTHER_HINT: &str = "enter to submit  •  esc to go back";
const BULLET: &str = "• ";
const CONTINUATION: &str = "  ";

pub fn render(frame: &mut Frame, app: &App) {
    let theme = app.theme();
    let area = frame.area();
    let width = area.width.max(1);

    let tool_height = if app.tool_line().is_some() {
        TOOL_LINE_HEIGHT
    } else {
        0
    };
    let panel_height = app
        .active_question()
        .map(|question| question_panel_height(app, question, width))
        .unwrap_or(0)
        .min(area.height.saturating_sub(STATUS_HEIGHT + tool_height + 1));

    let [output_area, tool_area, panel_area, status_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(tool_height),
        Constraint::Length(panel_height),
        Constraint::Length(STATUS_HEIGHT),
    ])
    .areas(area);

    render_output(frame, output_area, app, &theme);
    if let Some(tool) = app.tool_line() {
        frame.render_widget(
            Paragraph::new(format!("⚙ {tool}"))
                .style(Style::default().bg(theme.panel_bg).fg(theme.answer_fg)),
            tool_area,
        );
    }
    if let Some(question) = app.active_question()
        && panel_area.height > 0
    {
        render_question_panel(frame, panel_area, app, question, &theme);
    }
    render_status_bar(frame, status_area, app, &theme);
}

fn render_output(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let text_width = area.width.saturating_sub(TEXT_PADDING * 2).max(1);
    let rows = output_rows(app, text_width, theme);
    let mut metrics = ViewMetrics {
        output_rows: rows.len().min(u16::MAX as usize) as u16,
        output_height: area.height,
        input_width: 0,
    };
    if app.is_editing_text() {
        metrics.input_width = input_text_width(area.width);
    }
    app.set_view_metrics(metrics);

    frame.render_widget(
        Paragraph::new(Text::from(rows))
            .scroll((app.output_scroll(), 0))
            .block(Block::default().padding(Padding::horizontal(TEXT_PADDING))),
        area,
    );
}

fn output_rows(app: &App, width: u16, theme: &Theme) -> Vec<Line<'static>> {
    let mut rows = Vec::new();
    for line in app.visible_lines() {
        let style = line_style(line.kind, theme);
        match line.kind {
            LineKind::Output | LineKind::Agent => {
                for styled in markdown_lines(line, style) {
                    rows.extend(wrap_styled_line(&styled, width));
                }
            }
            _ => {
                for row in wrap_lines(&line.text, width) {
                    rows.push(Line::from(Span::styled(row, style)));
                }
            }
        }
    }
    rows
}

fn markdown_lines(line: &OutputLine, base: Style) -> Vec<Line<'static>> {
    if line.text.is_empty() {
        return vec![Line::default()];
    }
    let bulleted = line.kind == LineKind::Agent;
    render_markdown(&line.text)
        .into_iter()
        .enumerate()
        .map(|(index, rendered)| {
            let mut spans = Vec::with_capacity(rendered.spans.len() + 1);
            if bulleted {
                let prefix = if index == 0 { BULLET } else { CONTINUATION };
                spans.push(Span::styled(prefix, base));
            }
            spans.extend(
                rendered
                    .spans
                    .into_iter()
                    .map(|span| Span::styled(span.content, base.patch(span.style))),
            );
            Line::from(spans)
        })
        .collect()
}

fn line_style(kind: LineKind, theme: &Theme) -> Style {
    match kind {
        LineKind::Output | LineKind::Agent => Style::default().fg(theme.output_fg),
        LineKind::Answer => Style::default().fg(theme.answer_fg),
        LineKind::Tool => Style::default().fg(theme.muted_fg),
        LineKind::Step => Style::default()
            .fg(theme.question_fg)
            .add_modifier(Modifier::BOLD),
        LineKind::Success => Style::default().fg(theme.success_fg),
        LineKind::Error => Style::default().fg(theme.error_fg),
    }
}

fn question_panel_height(app: &App, question: &Question, width: u16) -> u16 {
    let inner_width = width.saturating_sub(TEXT_PADDING * 2).max(1);
    let prompt_rows = wrap_lines(&question_prompt(question), inner_width).len() as u16;
    // Top border, prompt, body, hint.
    1 + prompt_rows + question_body_height(app, width) + 1
}

fn question_body_height(app: &App, width: u16) -> u16 {
    if app.is_editing_text() {
        let lines = wrap_word_with_positions(app.input(), input_text_width(width)).line_count;
        lines.clamp(1, MAX_INPUT_TEXT_LINES)
    } else {
        app.choice_labels().len() as u16
    }
}

fn question_prompt(question: &Question) -> String {
    if question.header.trim().is_empty() {
        question.question.clone()
    } else {
        format!("{}: {}", question.header, question.question)
    }
}

fn input_text_width(panel_width: u16) -> u16 {
    panel_width.saturating_sub(TEXT_PADDING * 4).max(1)
}

fn render_question_panel(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    question: &Question,
    theme: &Theme,
) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(theme.answer_fg))
        .padding(Padding::horizontal(TEXT_PADDING));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    let prompt_rows = wrap_lines(&question_prompt(question), inner.width.max(1));
    let body_height = question_body_height(app, area.width);
    let [prompt_area, body_area, hint_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(body_height),
        Constraint::Length(1),
    ])
    .areas(inner);

    let header_len = question.header.chars().count();
    let prompt: Vec<Line> = prompt_rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            if index == 0 && header_len > 0 && row.chars().count() > header_len {
                let split = row
                    .char_indices()
                    .nth(header_len)
                    .map(|(byte, _)| byte)
                    .unwrap_or(row.len());
                let (header, rest) = row.split_at(split);
                Line::from(vec![
                    Span::styled(
                        header.to_string(),
                        Style::default()
                            .fg(theme.question_fg)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(rest.to_string(), Style::default().fg(theme.output_fg)),
                ])
            } else {
                Line::from(Span::styled(row, Style::default().fg(theme.output_fg)))
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(prompt), prompt_area);

    let hint = if app.is_editing_text() {
        render_text_area(frame, body_area, app, theme);
        if app.is_other_mode() {
            OTHER_HINT.to_string()
        } else {
            TEXT_HINT.to_string()
        }
    } else {
        render_choices(frame, body_area, app, question, theme);
        format!(
            "1-{}: choose  •  ↑/↓ + enter: select",
            app.choice_labels().len()
        )
    };
    frame.render_widget(
        Paragraph::new(hint).style(Style::default().fg(theme.muted_fg)),
        hint_area,
    );
}

fn render_choices(frame: &mut Frame, area: Rect, app: &App, question: &Question, theme: &Theme) {
    let lines: Vec<Line> = app
        .choice_labels()
        .into_iter()
        .enumerate()
        .map(|(index, label)| {
            let selected = index == app.selected_option();
            let marker = if selected { "›" } else { " " };
            let style = if selected {
                Style::default()
                    .fg(theme.question_fg)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.output_fg)
            };
            let mut spans = vec![Span::styled(
                format!("{marker} {}. {label}", index + 1),
                style,
            )];
            if let Some(option) = question.options.get(index)
                && !option.description.is_empty()
            {
                spans.push(Span::styled(
                    format!("  {}", option.description),
                    Style::default().fg(theme.muted_fg),
                ));
            }
            Line::from(spans)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_text_area(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let text_width = area.width.saturating_sub(TEXT_PADDING * 2).max(1);
    let wrapped = wrap_word_with_positions(app.input(), text_width);
    let (cursor_line, cursor_col) = app.input_cursor_line_col(text_width);
    let visible = area.height.max(1);
    let scroll = cursor_line
        .saturating_sub(visible.saturating_sub(1))
        .min(wrapped.line_count.saturating_sub(visible));

    frame.render_widget(
        Paragraph::new(wrapped.rendered)
            .style(Style::default().bg(theme.panel_bg).fg(theme.answer_fg))
            .scroll((scroll, 0))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.panel_bg))
                    .padding(Padding::horizontal(TEXT_PADDING)),
            ),
        area,
    );

    let inner = area.inner(Margin {
        horizontal: TEXT_PADDING,
        vertical: 0,
    });
    if inner.width > 0 && inner.height > 0 {
        frame.set_cursor_position((
            inner
                .x
                .saturating_add(cursor_col.min(inner.width.saturating_sub(1))),
            inner.y.saturating_add(cursor_line.saturating_sub(scroll)),
        ));
    }
}

fn render_status_bar(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let status_fg = if app.is_failed() {
        theme.error_fg
    } else if app.is_finished() {
        theme.success_fg
    } else {
        theme.muted_fg
    };
    let follow_hint = if app.is_following() {
        "f: disable follow"
    } else {
        "f: enable follow"
    };
    let detail_hint = if app.is_detail() {
        "v: simple"
    } else {
        "v: detail"
    };
    let line = Line::from(vec![
        Span::styled(app.status_text(), Style::default().fg(status_fg)),
        Span::styled(
            format!(
                "  {}  {follow_hint}  {detail_hint}",
                app.stats().summary()
            ),
            Style::default().fg(theme.muted_fg),
        ),
    ]);
    frame.render_widget(
        Paragraph::new(line).style(Style::default().bg(theme.panel_bg)),
        area,
    );
}

#[cfg(test)]
#[path = "../tests/unit/ui_tests.rs"]
mod tests;
