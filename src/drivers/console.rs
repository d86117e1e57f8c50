use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::cursor::Show;
use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, SetTitle};
use crossterm::{execute, terminal};
use ratatui::backend::CrosstermBackend;
use ratatui::{Frame, Terminal};

use super::{InputDriver, OutputDriver};

/// Reads crossterm events, dropping key releases and folding Shift+Tab into
/// BackTab so bindings see one shape per key on every platform.
#[derive(Debug, Default)]
pub struct ConsoleInputDriver;

impl ConsoleInputDriver {
    pub fn new() -> Self {
        Self
    }

    fn normalize(evt: Event) -> Option<Event> {
        match evt {
            Event::Key(mut key) => {
                if key.kind == KeyEventKind::Release {
                    return None;
                }
                if key.code == KeyCode::Tab && key.modifiers.contains(KeyModifiers::SHIFT) {
                    key.code = KeyCode::BackTab;
                    key.modifiers.remove(KeyModifiers::SHIFT);
                }
                Some(Event::Key(key))
            }
            // no mouse support; keep them out of the loop entirely
            Event::Mouse(_) => None,
            other => Some(other),
        }
    }
}

impl InputDriver for ConsoleInputDriver {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        crossterm::event::poll(timeout)
    }

    fn read(&mut self) -> io::Result<Event> {
        loop {
            if let Some(normalized) = Self::normalize(crossterm::event::read()?) {
                return Ok(normalized);
            }
        }
    }
}

/// Owns the terminal for the lifetime of the client.
///
/// [`OutputDriver::enter`] switches to the alternate screen in raw mode
/// with bracketed paste, so a pasted block arrives as one event instead of
/// a stream of Enter presses. Dropping the driver restores the terminal
/// even when the client unwinds.
pub struct ConsoleOutputDriver {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    raw: bool,
}

impl ConsoleOutputDriver {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            terminal: Terminal::new(CrosstermBackend::new(io::stdout()))?,
            raw: false,
        })
    }

    fn set_raw(&mut self, raw: bool) -> io::Result<()> {
        if self.raw == raw {
            return Ok(());
        }
        let backend = self.terminal.backend_mut();
        if raw {
            execute!(backend, EnterAlternateScreen, EnableBracketedPaste, SetTitle("term-chat"))?;
            terminal::enable_raw_mode()?;
        } else {
            terminal::disable_raw_mode()?;
            execute!(backend, DisableBracketedPaste, LeaveAlternateScreen, Show)?;
        }
        self.raw = raw;
        tracing::debug!(raw, "terminal mode changed");
        Ok(())
    }
}

impl OutputDriver for ConsoleOutputDriver {
    fn enter(&mut self) -> io::Result<()> {
        self.set_raw(true)?;
        self.terminal.clear()
    }

    fn exit(&mut self) -> io::Result<()> {
        self.set_raw(false)
    }

    fn draw<F>(&mut self, render: F) -> io::Result<()>
    where
        F: FnOnce(&mut Frame<'_>),
    {
        self.terminal.draw(render)?;
        Ok(())
    }
}

impl Drop for ConsoleOutputDriver {
    fn drop(&mut self) {
        if let Err(err) = self.set_raw(false) {
            tracing::warn!(%err, "could not restore terminal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, MouseEvent, MouseEventKind};

    #[test]
    fn release_key_is_dropped() {
        let mut key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert!(ConsoleInputDriver::normalize(Event::Key(key)).is_none());
    }

    #[test]
    fn shift_tab_becomes_backtab() {
        let key = KeyEvent::new(KeyCode::Tab, KeyModifiers::SHIFT);
        match ConsoleInputDriver::normalize(Event::Key(key)) {
            Some(Event::Key(k)) => {
                assert_eq!(k.code, KeyCode::BackTab);
                assert!(!k.modifiers.contains(KeyModifiers::SHIFT));
            }
            other => panic!("expected key, got {other:?}"),
        }
    }

    #[test]
    fn mouse_events_are_dropped() {
        let evt = Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(crossterm::event::MouseButton::Left),
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        });
        assert!(ConsoleInputDriver::normalize(evt).is_none());
    }
}
