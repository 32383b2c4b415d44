//! Interactive terminal loop
//!
//! Keys are read one at a time so history navigation and tab completion
//! work the way they do in the HUD. Key input and session events are
//! awaited together, so a close request takes effect without waiting for
//! the next keypress. When stdin is not a terminal, input is read line by
//! line instead.

use anyhow::Result;
use console::Term;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use apex_hud_core::events::HudEvent;
use apex_hud_core::session::{SubmitOutcome, TerminalSession};
use apex_hud_core::terminal::messages;

use crate::render::{write_block, LineRenderer};

const PROMPT: &str = "> ";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Leaves raw mode when dropped
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

enum Flow {
    Continue,
    Exit,
}

pub async fn run(mut session: TerminalSession, initial: Option<&str>, prewarm: bool) -> Result<()> {
    let term = Term::stdout();
    let mut renderer = LineRenderer::new();
    let mut events = session.events().subscribe();

    session.start().await;
    show(&session, &term, &mut renderer)?;

    if let Some(input) = initial {
        submit(&mut session, &term, &mut renderer, input).await?;
    }

    let result = if term.is_term() {
        if prewarm {
            session.prewarm();
        }
        interactive(&mut session, &term, &mut renderer, &mut events).await
    } else {
        piped(&mut session, &term, &mut renderer, &mut events).await
    };

    session.teardown();
    result
}

async fn interactive(
    session: &mut TerminalSession,
    term: &Term,
    renderer: &mut LineRenderer,
    events: &mut Receiver<HudEvent>,
) -> Result<()> {
    let _raw = RawModeGuard::enable()?;
    let (key_tx, mut keys) = mpsc::unbounded_channel();
    let reader = spawn_key_reader(key_tx);

    let result = key_loop(session, term, renderer, events, &mut keys).await;
    reader.abort();
    term.clear_line()?;
    result
}

async fn key_loop(
    session: &mut TerminalSession,
    term: &Term,
    renderer: &mut LineRenderer,
    events: &mut Receiver<HudEvent>,
    keys: &mut mpsc::UnboundedReceiver<KeyEvent>,
) -> Result<()> {
    loop {
        term.clear_line()?;
        term.write_str(&format!("{}{}", PROMPT, session.draft()))?;

        let flow = tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    term.clear_line()?;
                    on_event(term, renderer, event)?
                }
                Err(RecvError::Lagged(_)) => Flow::Continue,
                Err(RecvError::Closed) => Flow::Exit,
            },
            key = keys.recv() => match key {
                Some(key) => on_key(session, term, renderer, key).await?,
                None => Flow::Exit,
            },
        };
        if let Flow::Exit = flow {
            return Ok(());
        }
    }
}

fn spawn_key_reader(tx: mpsc::UnboundedSender<KeyEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if event::poll(POLL_INTERVAL).unwrap_or(false) {
                match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        if tx.send(key).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Key input failed: {}", e);
                        break;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
}

async fn on_key(
    session: &mut TerminalSession,
    term: &Term,
    renderer: &mut LineRenderer,
    key: KeyEvent,
) -> Result<Flow> {
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Ok(Flow::Exit);
        }
        KeyCode::Enter => {
            let input = session.draft().to_string();
            term.clear_line()?;
            if is_exit(&input) {
                return Ok(Flow::Exit);
            }
            submit(session, term, renderer, &input).await?;
        }
        KeyCode::Up => {
            session.history_up();
        }
        KeyCode::Down => {
            session.history_down();
        }
        KeyCode::PageUp | KeyCode::PageDown => {
            let page = usize::from(term.size().0).saturating_sub(2).max(1);
            let max_offset = session.visible_lines().len().saturating_sub(1);
            let offset = if key.code == KeyCode::PageUp {
                (session.scroll_offset() + page).min(max_offset)
            } else {
                session.scroll_offset().saturating_sub(page)
            };
            session.set_scroll_offset(offset);
            renderer.redraw(term, &session.visible_lines(), offset)?;
        }
        KeyCode::Tab => {
            if session.complete_input().is_none() {
                term.clear_line()?;
                show(session, term, renderer)?;
            }
        }
        KeyCode::Backspace => {
            let mut draft = session.draft().to_string();
            draft.pop();
            session.set_draft(draft);
        }
        KeyCode::Esc => session.set_draft(""),
        KeyCode::Char(c) if !c.is_control() => {
            let mut draft = session.draft().to_string();
            draft.push(c);
            session.set_draft(draft);
        }
        _ => {}
    }
    Ok(Flow::Continue)
}

async fn piped(
    session: &mut TerminalSession,
    term: &Term,
    renderer: &mut LineRenderer,
    events: &mut Receiver<HudEvent>,
) -> Result<()> {
    let stdin = std::io::stdin();
    loop {
        let mut line = String::new();
        let read = tokio::task::block_in_place(|| stdin.lock().read_line(&mut line))?;
        if read == 0 || is_exit(&line) {
            return Ok(());
        }
        submit(session, term, renderer, &line).await?;
        if drain_events(term, renderer, events)? {
            return Ok(());
        }
    }
}

async fn submit(
    session: &mut TerminalSession,
    term: &Term,
    renderer: &mut LineRenderer,
    input: &str,
) -> Result<()> {
    if term.is_term() {
        term.write_str(&renderer.note(messages::THINKING))?;
    }
    let was_scrolled = session.scroll_offset() > 0;
    let outcome = session.submit(input).await;
    if term.is_term() {
        term.clear_line()?;
    }

    if outcome == SubmitOutcome::Busy {
        write_block(term, &renderer.note(messages::ALREADY_PROCESSING))?;
    }
    if was_scrolled && session.scroll_offset() == 0 {
        renderer.redraw(term, &session.visible_lines(), 0)?;
    } else {
        show(session, term, renderer)?;
    }
    Ok(())
}

/// Print new lines, or repaint when the view is scrolled back
fn show(session: &TerminalSession, term: &Term, renderer: &mut LineRenderer) -> Result<()> {
    match session.scroll_offset() {
        0 => renderer.print_new(term, &session.visible_lines())?,
        offset => renderer.redraw(term, &session.visible_lines(), offset)?,
    }
    Ok(())
}

fn on_event(term: &Term, renderer: &LineRenderer, event: HudEvent) -> Result<Flow> {
    match event {
        HudEvent::Navigate(path) => {
            write_block(term, &renderer.note(&format!("[navigate] {}", path)))?;
            Ok(Flow::Continue)
        }
        HudEvent::CloseRequested => {
            write_block(term, &renderer.note("[closing]"))?;
            Ok(Flow::Exit)
        }
        _ => Ok(Flow::Continue),
    }
}

/// Returns true when the host was asked to close
fn drain_events(
    term: &Term,
    renderer: &LineRenderer,
    events: &mut Receiver<HudEvent>,
) -> Result<bool> {
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Flow::Exit = on_event(term, renderer, event)? {
                    return Ok(true);
                }
            }
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(false),
        }
    }
}

fn is_exit(input: &str) -> bool {
    matches!(input.trim(), "exit" | "quit")
}
