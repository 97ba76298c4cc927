use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui_core::style as core_style;

pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let parsed = tui_markdown::from_str(text);
    parsed
        .lines
        .iter()
        .map(|line| {
            let line_style = parsed.style.patch(line.style);
            let spans: Vec<Span<'static>> = line
                .spans
                .iter()
                .map(|span| {
                    Span::styled(
                        span.content.to_string(),
                        convert_style(line_style.patch(span.style)),
                    )
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn convert_style(style: core_style::Style) -> Style {
    let mut converted = Style::default()
        .add_modifier(Modifier::from_bits_truncate(style.add_modifier.bits()))
        .remove_modifier(Modifier::from_bits_truncate(style.sub_modifier.bits()));
    if let Some(fg) = style.fg {
        converted = converted.fg(convert_color(fg));
    }
    if let Some(bg) = style.bg {
        converted = converted.bg(convert_color(bg));
    }
    converted
}

fn convert_color(color: core_style::Color) -> Color {
    use core_style::Color as C;
    match color {
        C::Reset => Color::Reset,
        C::Black => Color::Black,
        C::Red => Color::Red,
        C::Green => Color::Green,
        C::Yellow => Color::Yellow,
        C::Blue => Color::Blue,
        C::Magenta => Color::Magenta,
        C::Cyan => Color::Cyan,
        C::Gray => Color::Gray,
        C::DarkGray => Color::DarkGray,
        C::LightRed => Color::LightRed,
        C::LightGreen => Color::LightGreen,
        C::LightYellow => Color::LightYellow,
        C::LightBlue => Color::LightBlue,
        C::LightMagenta => Color::LightMagenta,
        C::LightCyan => Color::LightCyan,
        C::White => Color::White,
        C::Rgb(r, g, b) => Color::Rgb(r, g, b),
        C::Indexed(index) => Color::Indexed(index),
    }
}
