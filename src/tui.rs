use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::cursor::SetCursorStyle;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use tracing::debug;

use crate::app::{App, Command, Msg, read_next};
use crate::events;
use crate::runner::{Runner, Turn};
use crate::ui;

const FRAME: Duration = Duration::from_millis(16);

pub fn run(app: App, runner: &dyn Runner) -> io::Result<App> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        SetCursorStyle::SteadyBar
    )?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    let result = run_app(&mut terminal, app, runner);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        SetCursorStyle::DefaultUserShape,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    runner: &dyn Runner,
) -> io::Result<App> {
    let (msg_tx, msg_rx) = mpsc::channel();
    let reads = spawn_reader(msg_tx);

    let mut pending = vec![app.start()];
    loop {
        if !execute_all(&mut pending, runner, &reads) || !app.running {
            return Ok(app);
        }
        terminal.draw(|frame| ui::render(frame, &app))?;

        while let Some(event) = events::poll_event(Duration::ZERO)? {
            pending.push(app.update(Msg::Key(event)));
        }

        if !pump_agent_messages(
            &mut app,
            &mut pending,
            runner,
            &reads,
            &msg_rx,
            Instant::now() + FRAME,
        ) {
            return Ok(app);
        }
    }
}

// Agent events are applied as fast as the reader delivers them until `deadline`. Returns `false`
// once the loop should stop.
fn pump_agent_messages(
    app: &mut App,
    pending: &mut Vec<Command>,
    runner: &dyn Runner,
    reads: &Sender<Turn>,
    msg_rx: &Receiver<Msg>,
    deadline: Instant,
) -> bool {
    loop {
        if !execute_all(pending, runner, reads) || !app.running {
            return false;
        }
        let Some(wait) = deadline.checked_duration_since(Instant::now()) else {
            return true;
        };
        match msg_rx.recv_timeout(wait) {
            Ok(msg) => pending.push(app.update(msg)),
            Err(RecvTimeoutError::Timeout) => return true,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(wait);
                return true;
            }
        }
    }
}

fn execute_all(pending: &mut Vec<Command>, runner: &dyn Runner, reads: &Sender<Turn>) -> bool {
    pending
        .drain(..)
        .all(|command| execute_command(command, runner, reads))
}

fn spawn_reader(msg_tx: Sender<Msg>) -> Sender<Turn> {
    let (read_tx, read_rx) = mpsc::channel::<Turn>();
    thread::spawn(move || {
        for turn in read_rx {
            if msg_tx.send(read_next(turn)).is_err() {
                break;
            }
        }
    });
    read_tx
}

fn execute_command(command: Command, runner: &dyn Runner, reads: &Sender<Turn>) -> bool {
    match command {
        Command::None => true,
        Command::StartTurn(opts) => {
            debug!(session = ?opts.session_id, "starting agent turn");
            reads.send(runner.run(opts)).is_ok()
        }
        Command::ReadNext(turn) => reads.send(turn).is_ok(),
        Command::Quit => false,
    }
}
