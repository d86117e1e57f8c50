//! The application context handed to both dispatchers.
//!
//! Everything the client mutates lives here: the window registry, session
//! and room state, and the collaborators (transport, encryption engines,
//! preferences, chat log, notifier). Nothing is global, so tests can swap any
//! collaborator for a double.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::autocomplete::Autocomplete;
use crate::constants::CONSOLE_SLOT;
use crate::encryption::{EncryptionEngine, EncryptionMode, UnavailableEngine};
use crate::error::RegistryError;
use crate::history::{ChatLog, HistoryLine, MemoryChatLog};
use crate::jid::Jid;
use crate::notify::{Notifier, SilentNotifier};
use crate::prefs::{MemoryPreferences, Pref, Preferences};
use crate::protocol::{ConnectionState, OutboundAction, Transport};
use crate::roster::{Presence, Roster};
use crate::muc::RoomTracker;
use crate::session::{ChatState, SessionTracker};
use crate::state::{AppState, AutoAway};
use crate::theme::Theme;
use crate::window::{BufferLine, ChatWindow, Window, WindowKey, WindowPayload, WindowRegistry};

/// How [`AppContext::output_window`] treats a matching window that is not
/// focused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Only a focused match counts; otherwise the line goes to the console.
    Focused,
    /// Any open match counts.
    AnyOpen,
}

pub struct AppContext {
    pub windows: WindowRegistry,
    pub sessions: SessionTracker,
    pub rooms: RoomTracker,
    pub roster: Roster,
    pub prefs: Box<dyn Preferences>,
    pub chat_log: Box<dyn ChatLog>,
    pub transport: Box<dyn Transport>,
    pub otr: Box<dyn EncryptionEngine>,
    pub pgp: Box<dyn EncryptionEngine>,
    pub notifier: Box<dyn Notifier>,
    pub state: AppState,
    /// Command names offered by tab completion.
    pub commands: Autocomplete,
    pub presence: Presence,
    pub status: Option<String>,
    /// Account used by `/connect` without arguments.
    pub default_account: Option<Jid>,
    next_id: u64,
}

impl AppContext {
    /// A context around `transport` with in-memory preferences and chat log,
    /// no encryption engines and silent notifications.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            windows: WindowRegistry::new(),
            sessions: SessionTracker::new(),
            rooms: RoomTracker::new(),
            roster: Roster::new(),
            prefs: Box::new(MemoryPreferences::new()),
            chat_log: Box::new(MemoryChatLog::new()),
            transport,
            otr: Box::new(UnavailableEngine::otr()),
            pgp: Box::new(UnavailableEngine::pgp()),
            notifier: Box::new(SilentNotifier),
            state: AppState::default(),
            commands: crate::command::command_completer(),
            presence: Presence::Online,
            status: None,
            default_account: None,
            next_id: 0,
        }
    }

    pub fn with_prefs(mut self, prefs: impl Preferences + 'static) -> Self {
        self.prefs = Box::new(prefs);
        self
    }

    pub fn with_chat_log(mut self, log: impl ChatLog + 'static) -> Self {
        self.chat_log = Box::new(log);
        self
    }

    pub fn with_otr(mut self, engine: impl EncryptionEngine + 'static) -> Self {
        self.otr = Box::new(engine);
        self
    }

    pub fn with_pgp(mut self, engine: impl EncryptionEngine + 'static) -> Self {
        self.pgp = Box::new(engine);
        self
    }

    pub fn with_account(mut self, account: Jid) -> Self {
        self.default_account = Some(account);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    // ---- connection -------------------------------------------------------

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn connected(&self) -> bool {
        self.transport.state() == ConnectionState::Connected
    }

    pub fn account_bare(&self) -> String {
        self.transport
            .account()
            .map(|jid| jid.barejid())
            .unwrap_or_default()
    }

    /// Hands an action to the transport, reporting failures in the console.
    pub fn send(&mut self, action: OutboundAction) -> bool {
        match self.transport.send(action) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "send failed");
                self.cons_show_error(format!("Failed to send: {err}"));
                false
            }
        }
    }

    pub fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("term-chat-{}", self.next_id)
    }

    pub fn engine(&self, mode: EncryptionMode) -> Option<&dyn EncryptionEngine> {
        match mode {
            EncryptionMode::Otr => Some(self.otr.as_ref()),
            EncryptionMode::Pgp => Some(self.pgp.as_ref()),
            EncryptionMode::None => None,
        }
    }

    // ---- output -----------------------------------------------------------

    pub fn print(&mut self, slot: usize, line: BufferLine) {
        match self.windows.get_mut(slot) {
            Some(window) => window.print(line),
            None => {
                tracing::warn!(slot, text = %line.text, "print to missing window");
                return;
            }
        }
        self.windows.touch(slot);
        self.state.request_redraw();
    }

    pub fn win_show(&mut self, slot: usize, show_char: char, theme: Theme, text: impl Into<String>) {
        self.print(slot, BufferLine::new(show_char, theme, text));
    }

    pub fn cons_show(&mut self, text: impl Into<String>) {
        self.win_show(CONSOLE_SLOT, '-', Theme::Text, text);
    }

    pub fn cons_show_error(&mut self, text: impl Into<String>) {
        self.win_show(CONSOLE_SLOT, '-', Theme::Error, text);
    }

    pub fn cons_bad_cmd_usage(&mut self, command: &str) {
        self.cons_show(format!("Invalid usage, see '/help {command}' for details."));
    }

    pub fn current_print(&mut self, text: impl Into<String>) {
        let slot = self.windows.current();
        self.win_show(slot, '-', Theme::Text, text);
    }

    pub fn current_error(&mut self, text: impl Into<String>) {
        let slot = self.windows.current();
        self.win_show(slot, '-', Theme::Error, text);
    }

    /// Picks the window a line about `jid` belongs in.
    ///
    /// Candidates are tried in order: the chat window for the bare address,
    /// the private window for the full address, the room window for the bare
    /// address. The console is the fallback.
    pub fn output_window(&self, jid: &Jid, policy: OutputPolicy) -> usize {
        let bare = jid.barejid();
        let candidates = [
            Some(WindowKey::Chat(bare.clone())),
            jid.fulljid().map(WindowKey::Private),
            Some(WindowKey::Room(bare)),
        ];
        let current = self.windows.current();
        candidates
            .into_iter()
            .flatten()
            .filter_map(|key| self.windows.lookup(&key))
            .find(|slot| policy == OutputPolicy::AnyOpen || *slot == current)
            .unwrap_or(CONSOLE_SLOT)
    }

    /// Display name for a one-to-one sender: roster name, optionally with
    /// the resource appended.
    pub fn msg_display_name(&self, barejid: &str, resource: Option<&str>) -> String {
        let name = self.roster.display_name(barejid);
        match resource {
            Some(res) if self.prefs.get_bool(Pref::ResourceMessage) => format!("{name}/{res}"),
            _ => name,
        }
    }

    // ---- windows ----------------------------------------------------------

    fn create_window(&mut self, payload: WindowPayload) -> Option<usize> {
        match self.windows.create(payload) {
            Ok(slot) => {
                self.state.request_redraw();
                Some(slot)
            }
            Err(err) => {
                tracing::warn!(%err, "window not created");
                self.cons_show_error("Window limit reached, close a window with /close to open another.");
                None
            }
        }
    }

    /// The chat window for `barejid`, opened (with logged history) if it does
    /// not exist yet.
    pub fn ensure_chat(&mut self, barejid: &str) -> Option<usize> {
        if let Some(slot) = self.windows.lookup(&WindowKey::Chat(barejid.to_string())) {
            return Some(slot);
        }
        let slot = self.create_window(WindowPayload::Chat(ChatWindow::new(barejid)))?;
        self.show_history(slot, barejid);
        Some(slot)
    }

    pub fn ensure_private(&mut self, fulljid: &str) -> Option<usize> {
        self.create_window(WindowPayload::Private(crate::window::PrivateWindow::new(fulljid)))
    }

    pub fn ensure_room(&mut self, roomjid: &str) -> Option<usize> {
        let show = self.prefs.get_bool(Pref::Occupants);
        let show_jid = self.prefs.get_bool(Pref::OccupantsJid);
        self.create_window(WindowPayload::Room(crate::window::RoomWindow::new(
            roomjid, show, show_jid,
        )))
    }

    pub fn ensure_trace(&mut self) -> Option<usize> {
        self.create_window(WindowPayload::ProtocolTrace)
    }

    /// Replays the chat log into a chat window, once per window.
    pub fn show_history(&mut self, slot: usize, barejid: &str) {
        if !(self.prefs.get_bool(Pref::History) && self.prefs.get_bool(Pref::Chlog)) {
            return;
        }
        let Some(chat) = self.windows.get_mut(slot).and_then(Window::as_chat_mut) else {
            return;
        };
        if chat.history_shown {
            return;
        }
        chat.history_shown = true;
        let account = self.account_bare();
        let lines = match self.chat_log.replay(&account, barejid) {
            Ok(lines) => lines,
            Err(err) => {
                tracing::warn!(%err, barejid, "could not read chat log");
                self.win_show(slot, '!', Theme::Error, format!("Could not load history: {err}"));
                return;
            }
        };
        let me = account;
        for entry in lines {
            let theme = if entry.from == me || entry.from == "me" {
                Theme::TextMe
            } else {
                Theme::TextThem
            };
            let line = BufferLine::new('-', theme, entry.text)
                .from(entry.from)
                .at(entry.time);
            if let Some(window) = self.windows.get_mut(slot) {
                window.print(line);
            }
        }
        self.state.request_redraw();
    }

    pub fn focus(&mut self, slot: usize) -> bool {
        match self.windows.set_current(slot) {
            Ok(()) => {
                if let Some(chat) = self.windows.get_mut(slot).and_then(Window::as_chat_mut) {
                    chat.typing = false;
                }
                self.state.request_redraw();
                true
            }
            Err(_) => false,
        }
    }

    /// Closes a window, leaving its room or ending its chat session first
    /// when connected.
    pub fn close_window(&mut self, slot: usize) -> Result<Window, RegistryError> {
        if slot == CONSOLE_SLOT {
            return Err(RegistryError::ConsoleProtected);
        }
        let window = self.windows.get(slot).ok_or(RegistryError::NotFound)?;
        if window.as_room_config().is_some_and(|conf| conf.is_modified()) {
            return Err(RegistryError::UnsavedChanges);
        }
        let key = window.key();
        if self.connected() {
            match &key {
                WindowKey::Room(room) if self.rooms.is_active(room) => self.leave_room(room),
                WindowKey::Chat(barejid) => self.end_chat_session(barejid),
                _ => {}
            }
        }
        let closed = self.windows.close(slot)?;
        self.state.request_redraw();
        Ok(closed)
    }

    pub fn leave_room(&mut self, room: &str) {
        if let Some(left) = self.rooms.leave(room) {
            self.send(OutboundAction::LeaveRoom {
                room: room.to_string(),
                nick: left.nick,
            });
        }
    }

    fn end_chat_session(&mut self, barejid: &str) {
        if self.otr.is_secure(barejid)
            && let Err(err) = self.otr.end(barejid)
        {
            tracing::warn!(%err, barejid, "could not end OTR session");
        }
        let gone = self
            .windows
            .chat_mut(barejid)
            .and_then(|chat| chat.state.gone(Instant::now()));
        if let Some(state) = gone {
            self.send_chat_state(barejid, state);
        }
        self.sessions.remove(barejid);
    }

    /// The address one-to-one messages to `barejid` should go to.
    pub fn chat_address(&self, barejid: &str) -> String {
        match self.sessions.get(barejid) {
            Some(session) => format!("{barejid}/{}", session.resource),
            None => barejid.to_string(),
        }
    }

    pub fn send_chat_state(&mut self, barejid: &str, state: ChatState) {
        if !self.connected() || !self.prefs.get_bool(Pref::States) {
            return;
        }
        if self.sessions.get(barejid).is_some_and(|s| !s.send_states) {
            return;
        }
        let to = self.chat_address(barejid);
        self.send(OutboundAction::ChatState { to, state });
    }

    // ---- logs -------------------------------------------------------------

    fn append_log(&mut self, counterpart: &str, from: &str, text: &str, time: DateTime<Local>) {
        let account = self.account_bare();
        let line = HistoryLine {
            time,
            from: from.to_string(),
            text: text.to_string(),
        };
        if let Err(err) = self.chat_log.append(&account, counterpart, line) {
            tracing::warn!(%err, counterpart, "chat log append failed");
            self.cons_show_error(format!("Could not write chat log: {err}"));
        }
    }

    /// Logs a one-to-one line when `chlog` is on. Encrypted lines follow the
    /// engine's log setting: `on`, `off` or `redact`.
    pub fn log_chat(
        &mut self,
        counterpart: &str,
        from: &str,
        text: &str,
        mode: EncryptionMode,
        time: DateTime<Local>,
    ) {
        if !self.prefs.get_bool(Pref::Chlog) {
            return;
        }
        let setting = match mode {
            EncryptionMode::None => "on".to_string(),
            EncryptionMode::Otr => self.prefs.get_string(Pref::OtrLog),
            EncryptionMode::Pgp => self.prefs.get_string(Pref::PgpLog),
        };
        match setting.as_str() {
            "on" => self.append_log(counterpart, from, text, time),
            "redact" => self.append_log(counterpart, from, "[redacted]", time),
            _ => {}
        }
    }

    pub fn log_room(&mut self, room: &str, nick: &str, text: &str, time: DateTime<Local>) {
        if self.prefs.get_bool(Pref::Grlog) {
            self.append_log(room, nick, text, time);
        }
    }

    // ---- timers -----------------------------------------------------------

    /// Runs chat-state and auto-away timers.
    pub fn tick(&mut self, now: Instant) {
        let gone = self.prefs.get_int(Pref::Gone);
        let gone_after = (gone > 0).then(|| Duration::from_secs(gone as u64 * 60));
        let mut transitions = Vec::new();
        for (_, window) in self.windows.iter_mut() {
            if let Some(chat) = window.as_chat_mut()
                && let Some(state) = chat.state.idle(now, gone_after)
            {
                transitions.push((chat.barejid.clone(), state));
            }
        }
        for (barejid, state) in transitions {
            self.send_chat_state(&barejid, state);
        }
        self.check_auto_away(now);
    }

    fn check_auto_away(&mut self, now: Instant) {
        if !self.connected()
            || self.state.auto_away() != AutoAway::Inactive
            || !matches!(self.presence, Presence::Online | Presence::Chat)
        {
            return;
        }
        let mode = self.prefs.get_string(Pref::AutoawayMode);
        if mode == "off" {
            return;
        }
        let minutes = self.prefs.get_int(Pref::AutoawayTime).max(1) as u64;
        let idle = self.state.idle_for(now);
        if idle < Duration::from_secs(minutes * 60) {
            return;
        }
        let message = Some(self.prefs.get_string(Pref::AutoawayMessage)).filter(|m| !m.is_empty());
        match mode.as_str() {
            "away" => {
                self.send(OutboundAction::Presence {
                    presence: Presence::Away,
                    status: message.clone(),
                    idle_secs: idle.as_secs(),
                });
                self.state.set_auto_away(AutoAway::Away);
                match message {
                    Some(msg) => self.cons_show(format!(
                        "Idle for {minutes} minutes, status set to away (\"{msg}\")."
                    )),
                    None => self.cons_show(format!("Idle for {minutes} minutes, status set to away.")),
                }
            }
            "idle" => {
                self.send(OutboundAction::Presence {
                    presence: self.presence,
                    status: self.status.clone(),
                    idle_secs: idle.as_secs(),
                });
                self.state.set_auto_away(AutoAway::Idle);
                self.cons_show(format!("Idle for {minutes} minutes, status remains online."));
            }
            other => tracing::warn!(mode = other, "unknown auto-away mode"),
        }
    }

    /// Records user input, undoing any auto-away presence.
    pub fn keystroke(&mut self, now: Instant) {
        let previous = self.state.keystroke(now);
        if previous == AutoAway::Inactive || !self.connected() {
            return;
        }
        if previous == AutoAway::Away && !self.prefs.get_bool(Pref::AutoawayCheck) {
            return;
        }
        self.send(OutboundAction::Presence {
            presence: self.presence,
            status: self.status.clone(),
            idle_secs: 0,
        });
        match previous {
            AutoAway::Away => self.cons_show("No longer idle, status set to online."),
            _ => self.cons_show("No longer idle."),
        }
    }

    /// Forgets everything tied to the connection. Windows stay open.
    pub fn clear_connection_state(&mut self) {
        self.sessions.clear();
        self.rooms.clear();
        self.roster.clear();
        self.state.set_auto_away(AutoAway::Inactive);
        self.state.request_redraw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LoopbackTransport;

    fn ctx() -> AppContext {
        AppContext::new(Box::new(LoopbackTransport::connected(
            Jid::parse("me@x.org/pc").unwrap(),
        )))
    }

    #[test]
    fn output_window_precedence() {
        let mut ctx = ctx();
        let bob = Jid::parse("bob@x.org/phone").unwrap();
        assert_eq!(ctx.output_window(&bob, OutputPolicy::AnyOpen), CONSOLE_SLOT);
        let chat = ctx.ensure_chat("bob@x.org").unwrap();
        assert_eq!(ctx.output_window(&bob, OutputPolicy::AnyOpen), chat);
        // not focused, so focused policy falls back to console
        assert_eq!(ctx.output_window(&bob, OutputPolicy::Focused), CONSOLE_SLOT);
        ctx.focus(chat);
        assert_eq!(ctx.output_window(&bob, OutputPolicy::Focused), chat);
    }

    #[test]
    fn private_beats_room_for_occupant() {
        let mut ctx = ctx();
        let room = ctx.ensure_room("r@c.x.org").unwrap();
        let occupant = Jid::parse("r@c.x.org/bob").unwrap();
        assert_eq!(ctx.output_window(&occupant, OutputPolicy::AnyOpen), room);
        let private = ctx.ensure_private("r@c.x.org/bob").unwrap();
        assert_eq!(ctx.output_window(&occupant, OutputPolicy::AnyOpen), private);
    }

    #[test]
    fn closing_chat_sends_gone() {
        let transport = LoopbackTransport::connected(Jid::parse("me@x.org/pc").unwrap());
        let handle = transport.clone();
        let mut ctx = AppContext::new(Box::new(transport));
        ctx.prefs.set_bool(Pref::States, true);
        let slot = ctx.ensure_chat("bob@x.org").unwrap();
        ctx.close_window(slot).unwrap();
        assert!(handle.sent().contains(&OutboundAction::ChatState {
            to: "bob@x.org".into(),
            state: ChatState::Gone
        }));
    }

    #[test]
    fn auto_away_and_back() {
        let mut ctx = ctx();
        ctx.prefs.set_string(Pref::AutoawayMode, "away");
        ctx.prefs.set_int(Pref::AutoawayTime, 1);
        let t0 = Instant::now();
        ctx.keystroke(t0);
        ctx.tick(t0 + Duration::from_secs(30));
        assert_eq!(ctx.state.auto_away(), AutoAway::Inactive);
        ctx.tick(t0 + Duration::from_secs(61));
        assert_eq!(ctx.state.auto_away(), AutoAway::Away);
        assert!(
            ctx.windows
                .console()
                .buffer
                .contains_text("Idle for 1 minutes, status set to away.")
        );
        ctx.keystroke(t0 + Duration::from_secs(62));
        assert!(
            ctx.windows
                .console()
                .buffer
                .contains_text("No longer idle, status set to online.")
        );
    }
}
