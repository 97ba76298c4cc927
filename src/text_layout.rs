use ratatui::style::Style;
use ratatui::text::{Line, Span};

#[derive(Debug, Clone)]
pub struct WrappedText {
    pub rendered: String,
    pub positions: Vec<(u16, u16)>,
    pub line_count: u16,
}

pub fn wrap_word_with_positions(text: &str, width: u16) -> WrappedText {
    let width = width.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut rendered = String::with_capacity(text.len());
    let mut positions = Vec::with_capacity(chars.len() + 1);
    let mut cursor = (0u16, 0u16);

    positions.push(cursor);
    for (idx, ch) in chars.iter().copied().enumerate() {
        if ch == '\n' {
            break_line(&mut rendered, &mut cursor);
            positions.push(cursor);
            continue;
        }
        if cursor.1 >= width || starts_overflowing_word(&chars, idx, cursor.1, width) {
            break_line(&mut rendered, &mut cursor);
        }
        rendered.push(ch);
        cursor.1 = cursor.1.saturating_add(1);
        if cursor.1 >= width {
            break_line(&mut rendered, &mut cursor);
        }
        positions.push(cursor);
    }

    let line_count = cursor.0.saturating_add(1);
    WrappedText {
        rendered,
        positions,
        line_count,
    }
}

pub fn wrap_lines(text: &str, width: u16) -> Vec<String> {
    let width = width.max(1);
    text.split('\n')
        .flat_map(|line| {
            let wrapped = wrap_word_with_positions(line, width).rendered;
            let rows: Vec<String> = wrapped.split('\n').map(str::to_string).collect();
            // A line that exactly fills the width leaves a trailing empty row.
            match rows.as_slice() {
                [.., last] if rows.len() > 1 && last.is_empty() => {
                    rows[..rows.len() - 1].to_vec()
                }
                _ => rows,
            }
        })
        .collect()
}

pub fn wrap_styled_line(line: &Line<'_>, width: u16) -> Vec<Line<'static>> {
    let styled: Vec<(char, Style)> = line
        .spans
        .iter()
        .flat_map(|span| {
            let style = line.style.patch(span.style);
            span.content
                .chars()
                .filter(|ch| *ch != '\n')
                .map(move |ch| (ch, style))
        })
        .collect();
    let plain: String = styled.iter().map(|(ch, _)| *ch).collect();
    let wrapped = wrap_word_with_positions(&plain, width).rendered;

    let mut rows = Vec::new();
    let mut row: Vec<Span<'static>> = Vec::new();
    let mut chars = styled.into_iter();
    for ch in wrapped.chars() {
        if ch == '\n' {
            rows.push(Line::from(std::mem::take(&mut row)));
            continue;
        }
        let Some((ch, style)) = chars.next() else {
            break;
        };
        match row.last_mut() {
            Some(span) if span.style == style => span.content.to_mut().push(ch),
            _ => row.push(Span::styled(ch.to_string(), style)),
        }
    }
    if !row.is_empty() || rows.is_empty() {
        rows.push(Line::from(row));
    }
    rows
}

fn break_line(rendered: &mut String, cursor: &mut (u16, u16)) {
    rendered.push('\n');
    cursor.0 = cursor.0.saturating_add(1);
    cursor.1 = 0;
}

fn starts_overflowing_word(chars: &[char], idx: usize, col: u16, width: u16) -> bool {
    if col == 0 || chars[idx].is_whitespace() {
        return false;
    }
    if idx > 0 && !chars[idx - 1].is_whitespace() {
        return false;
    }
    let word_len = chars[idx..]
        .iter()
        .take_while(|c| !c.is_whitespace())
        .count() as u16;
    word_len <= width && col.saturating_add(word_len) > width
}
