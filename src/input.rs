//! The input line: editing, submitted-line history and tab completion.
//!
//! Completion works on the word under construction. The first word of a
//! `/command` line completes against the command table and, in a room
//! configuration window, the form's field tags. Any later word (and plain
//! text) completes against the nicks of the current room and the roster.

use std::time::Instant;

use crossterm::event::{KeyEvent, KeyEventKind, KeyModifiers};

use crate::autocomplete::Autocomplete;
use crate::command;
use crate::context::AppContext;
use crate::event::outbound;
use crate::event_loop::ControlFlow;
use crate::keybindings::{Action, KeyBindings};

/// Submitted lines kept for Up/Down recall.
const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Default)]
pub struct InputLine {
    chars: Vec<char>,
    cursor: usize,
    history: Vec<String>,
    history_pos: Option<usize>,
    /// Line being edited before history recall started.
    stash: String,
    completion: Option<Completion>,
}

#[derive(Debug)]
struct Completion {
    /// Text before the word being completed.
    head: String,
    prefix: String,
    /// Whether a nick completed at the start of a line gets ": ".
    address: bool,
    candidates: Autocomplete,
}

impl InputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn set_text(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
    }

    pub fn insert(&mut self, c: char) {
        self.completion = None;
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        self.completion = None;
        if self.cursor > 0 {
            self.cursor -= 1;
            self.chars.remove(self.cursor);
        }
    }

    pub fn delete(&mut self) {
        self.completion = None;
        if self.cursor < self.chars.len() {
            self.chars.remove(self.cursor);
        }
    }

    pub fn delete_word(&mut self) {
        self.completion = None;
        let mut start = self.cursor;
        while start > 0 && self.chars[start - 1].is_whitespace() {
            start -= 1;
        }
        while start > 0 && !self.chars[start - 1].is_whitespace() {
            start -= 1;
        }
        self.chars.drain(start..self.cursor);
        self.cursor = start;
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.chars.len();
    }

    pub fn clear(&mut self) {
        self.completion = None;
        self.chars.clear();
        self.cursor = 0;
    }

    /// Takes the line for processing and records it in the history.
    pub fn submit(&mut self) -> String {
        let line = self.text();
        self.clear();
        self.history_pos = None;
        if !line.trim().is_empty() && self.history.last() != Some(&line) {
            self.history.push(line.clone());
            if self.history.len() > HISTORY_LIMIT {
                self.history.remove(0);
            }
        }
        line
    }

    pub fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let pos = match self.history_pos {
            None => {
                self.stash = self.text();
                self.history.len() - 1
            }
            Some(pos) => pos.saturating_sub(1),
        };
        self.history_pos = Some(pos);
        let line = self.history[pos].clone();
        self.set_text(&line);
    }

    pub fn history_next(&mut self) {
        let Some(pos) = self.history_pos else {
            return;
        };
        if pos + 1 < self.history.len() {
            self.history_pos = Some(pos + 1);
            let line = self.history[pos + 1].clone();
            self.set_text(&line);
        } else {
            self.history_pos = None;
            let stash = std::mem::take(&mut self.stash);
            self.set_text(&stash);
        }
    }

    /// Completes the word before the cursor. Repeated calls cycle through
    /// the candidates.
    pub fn complete(&mut self, ctx: &mut AppContext) {
        if self.completion.is_none() {
            self.completion = Some(self.start_completion(ctx));
        }
        let Some(completion) = self.completion.as_mut() else {
            return;
        };
        let Some(word) = completion.candidates.complete(&completion.prefix) else {
            return;
        };
        let mut text = format!("{}{word}", completion.head);
        if completion.address {
            text.push_str(": ");
        }
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
    }

    fn start_completion(&self, ctx: &mut AppContext) -> Completion {
        let before: String = self.chars[..self.cursor].iter().collect();
        let split = before
            .rfind(char::is_whitespace)
            .map(|idx| idx + before[idx..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        let (head, prefix) = before.split_at(split);
        let mut candidates = Autocomplete::new();
        let mut address = false;

        if head.is_empty() && prefix.starts_with('/') {
            for name in ctx.commands.matches(prefix) {
                candidates.add(name);
            }
            for tag in ctx.windows.form_fields().matches(prefix) {
                candidates.add(tag);
            }
        } else {
            if let Some(room) = ctx.windows.current_window().as_room()
                && let Some(state) = ctx.rooms.get(&room.roomjid)
            {
                let own = state.nick.as_str();
                for occupant in state.occupants() {
                    if occupant.nick.starts_with(prefix) && occupant.nick != own {
                        candidates.add(occupant.nick.clone());
                    }
                }
                address = head.is_empty();
            }
            if head.starts_with('/') {
                for contact in ctx.roster.contacts() {
                    if contact.barejid.starts_with(prefix) {
                        candidates.add(contact.barejid.clone());
                    }
                    if let Some(name) = &contact.name
                        && name.starts_with(prefix)
                    {
                        candidates.add(name.clone());
                    }
                }
            }
        }
        Completion {
            head: head.to_string(),
            prefix: prefix.to_string(),
            address,
            candidates,
        }
    }

    /// Applies one key press. Returns [`ControlFlow::Quit`] only when a
    /// submitted `/quit` (or the quit binding) asks for it.
    pub fn handle_key(
        &mut self,
        ctx: &mut AppContext,
        bindings: &KeyBindings,
        key: KeyEvent,
        now: Instant,
    ) -> ControlFlow {
        if key.kind == KeyEventKind::Release {
            return ControlFlow::Continue;
        }
        ctx.keystroke(now);
        ctx.state.request_redraw();

        match bindings.action_for_key(&key) {
            Some(Action::Quit) => return command::process_input(ctx, "/quit"),
            Some(Action::Submit) => {
                let line = self.submit();
                tracing::debug!(len = line.len(), "line submitted");
                return command::process_input(ctx, &line);
            }
            Some(Action::Complete) => self.complete(ctx),
            Some(Action::SwitchWindow(slot)) => {
                if !ctx.focus(slot) {
                    tracing::debug!(slot, "no window in slot");
                }
            }
            Some(Action::PrevWindow) => {
                let slot = ctx.windows.cycle(false);
                ctx.focus(slot);
            }
            Some(Action::NextWindow) => {
                let slot = ctx.windows.cycle(true);
                ctx.focus(slot);
            }
            Some(Action::Backspace) => self.backspace(),
            Some(Action::Delete) => self.delete(),
            Some(Action::CursorLeft) => self.left(),
            Some(Action::CursorRight) => self.right(),
            Some(Action::CursorHome) => self.home(),
            Some(Action::CursorEnd) => self.end(),
            Some(Action::ClearLine) => self.clear(),
            Some(Action::DeleteWord) => self.delete_word(),
            Some(Action::HistoryPrev) => self.history_prev(),
            Some(Action::HistoryNext) => self.history_next(),
            // scrolling is owned by the runner, which sees the key first
            Some(Action::ScrollPageUp | Action::ScrollPageDown) => {}
            None => {
                if let crossterm::event::KeyCode::Char(c) = key.code
                    && !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    self.insert(c);
                    if !self.text().starts_with('/') {
                        outbound::typing_activity(ctx, now);
                    }
                }
            }
        }
        ControlFlow::Continue
    }
}
