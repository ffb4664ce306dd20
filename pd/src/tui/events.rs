//! Terminal input for the TUI
//!
//! Crossterm reads block, so a dedicated thread polls the terminal and
//! forwards what the App understands over a tokio channel; the runner
//! `select!`s on it next to the completion channel. With bracketed paste on,
//! pasted text arrives as one [`Event::Paste`] instead of a burst of keys
//! whose newlines would submit a half-typed answer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as TermEvent, KeyEvent, KeyEventKind};
use eyre::Result;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    Paste(String),
    Resize(u16, u16),
    /// Nothing happened within the tick interval
    Tick,
}

/// Map a terminal event; `None` for what the TUI ignores
///
/// Key releases and repeats are dropped here (terminals with the kitty
/// protocol report them), as are mouse and focus events.
pub fn translate(event: TermEvent) -> Option<Event> {
    match event {
        TermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
        TermEvent::Paste(text) => Some(Event::Paste(text)),
        TermEvent::Resize(width, height) => Some(Event::Resize(width, height)),
        _ => None,
    }
}

/// Input thread handle; the thread exits when this is dropped
pub struct TerminalEvents {
    rx: mpsc::UnboundedReceiver<Event>,
    stop: Arc<AtomicBool>,
}

impl TerminalEvents {
    pub fn spawn(tick_rate: Duration) -> Result<Self> {
        debug!(?tick_rate, "TerminalEvents::spawn: called");
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        thread::Builder::new()
            .name("pd-input".to_string())
            .spawn(move || poll_loop(&tx, tick_rate, &flag))?;
        Ok(Self { rx, stop })
    }

    pub async fn next(&mut self) -> Result<Event> {
        self.rx.recv().await.ok_or_else(|| eyre::eyre!("Terminal input closed"))
    }
}

impl Drop for TerminalEvents {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn poll_loop(tx: &mpsc::UnboundedSender<Event>, tick_rate: Duration, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        let event = match event::poll(tick_rate) {
            Ok(true) => match event::read() {
                Ok(raw) => match translate(raw) {
                    Some(event) => event,
                    None => continue,
                },
                Err(e) => {
                    warn!(error = %e, "poll_loop: read failed");
                    continue;
                }
            },
            Ok(false) => Event::Tick,
            Err(e) => {
                // The terminal is gone; closing the channel ends the runner
                warn!(error = %e, "poll_loop: poll failed, stopping");
                break;
            }
        };
        if tx.send(event).is_err() {
            break;
        }
    }
    debug!("poll_loop: stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEventState, KeyModifiers, MouseEvent, MouseEventKind};

    fn key(kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code: KeyCode::Char('j'),
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_only_key_presses_pass() {
        let press = key(KeyEventKind::Press);
        assert_eq!(translate(TermEvent::Key(press)), Some(Event::Key(press)));
        assert_eq!(translate(TermEvent::Key(key(KeyEventKind::Release))), None);
        assert_eq!(translate(TermEvent::Key(key(KeyEventKind::Repeat))), None);
    }

    #[test]
    fn test_paste_and_resize_pass_mouse_and_focus_do_not() {
        assert_eq!(
            translate(TermEvent::Paste("Garden plan".to_string())),
            Some(Event::Paste("Garden plan".to_string()))
        );
        assert_eq!(translate(TermEvent::Resize(80, 24)), Some(Event::Resize(80, 24)));
        assert_eq!(translate(TermEvent::FocusGained), None);
        let click = MouseEvent {
            kind: MouseEventKind::Moved,
            column: 1,
            row: 1,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(translate(TermEvent::Mouse(click)), None);
    }
}
