use std::io;
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Tick,
    Quit,
    MoveUp,
    MoveDown,
    CursorLeft,
    CursorRight,
    PageUp,
    PageDown,
    ScrollUp,
    ScrollDown,
    InputChar(char),
    Backspace,
    Submit,
    SubmitText,
    Cancel,
}

pub(crate) fn map_key_event(key_event: KeyEvent) -> AppEvent {
    if key_event.kind != KeyEventKind::Press {
        return AppEvent::Tick;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) {
        return match key_event.code {
            KeyCode::Char('c') => AppEvent::Quit,
            KeyCode::Char('s') | KeyCode::Char('d') => AppEvent::SubmitText,
            KeyCode::Char('u') => AppEvent::PageUp,
            KeyCode::Up => AppEvent::PageUp,
            KeyCode::Down => AppEvent::PageDown,
            _ => AppEvent::Tick,
        };
    }

    match key_event.code {
        KeyCode::PageUp => AppEvent::PageUp,
        KeyCode::PageDown => AppEvent::PageDown,
        KeyCode::Up => AppEvent::MoveUp,
        KeyCode::Down => AppEvent::MoveDown,
        KeyCode::Left => AppEvent::CursorLeft,
        KeyCode::Right => AppEvent::CursorRight,
        KeyCode::Backspace => AppEvent::Backspace,
        KeyCode::Enter => AppEvent::Submit,
        KeyCode::Esc => AppEvent::Cancel,
        KeyCode::Char(c) => AppEvent::InputChar(c),
        _ => AppEvent::Tick,
    }
}

pub(crate) fn map_mouse_event(mouse_event: MouseEvent) -> AppEvent {
    match mouse_event.kind {
        MouseEventKind::ScrollUp => AppEvent::ScrollUp,
        MouseEventKind::ScrollDown => AppEvent::ScrollDown,
        _ => AppEvent::Tick,
    }
}

pub fn poll_event(timeout: Duration) -> io::Result<Option<AppEvent>> {
    if !event::poll(timeout)? {
        return Ok(None);
    }
    let event = match event::read()? {
        Event::Key(key_event) => map_key_event(key_event),
        Event::Mouse(mouse_event) => map_mouse_event(mouse_event),
        _ => AppEvent::Tick,
    };
    Ok(Some(event))
}
