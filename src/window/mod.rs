//! Virtual windows: one per conversation, room, form or trace console.
//!
//! Each window carries a kind-specific payload in a closed [`WindowPayload`]
//! enum. Code that does not care about the kind talks to [`Window`] through
//! its unread/buffer surface; code that does narrows with `match` or the
//! `as_*` accessors.

pub mod buffer;
pub mod form;
pub mod registry;

use std::fmt;
use std::time::Instant;

pub use buffer::{BufferLine, WindowBuffer};
pub use form::DataForm;
pub use registry::WindowRegistry;

use crate::encryption::EncryptionState;
use crate::session::ChatStateMachine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Console,
    Chat,
    Private,
    Room,
    RoomConfig,
    ProtocolTrace,
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WindowKind::Console => "console",
            WindowKind::Chat => "chat",
            WindowKind::Private => "private",
            WindowKind::Room => "room",
            WindowKind::RoomConfig => "room config",
            WindowKind::ProtocolTrace => "xml console",
        })
    }
}

/// Natural key of a window. At most one window exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WindowKey {
    Console,
    Chat(String),
    Private(String),
    Room(String),
    RoomConfig(String),
    ProtocolTrace,
}

impl WindowKey {
    pub fn kind(&self) -> WindowKind {
        match self {
            WindowKey::Console => WindowKind::Console,
            WindowKey::Chat(_) => WindowKind::Chat,
            WindowKey::Private(_) => WindowKind::Private,
            WindowKey::Room(_) => WindowKind::Room,
            WindowKey::RoomConfig(_) => WindowKind::RoomConfig,
            WindowKey::ProtocolTrace => WindowKind::ProtocolTrace,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatWindow {
    pub barejid: String,
    pub encryption: EncryptionState,
    /// Resource pinned with `/resource set`, used for the title bar.
    pub resource_override: Option<String>,
    pub state: ChatStateMachine,
    pub history_shown: bool,
    /// Set while the counterpart is composing and this window is focused.
    pub typing: bool,
}

impl ChatWindow {
    pub fn new(barejid: impl Into<String>) -> Self {
        Self {
            barejid: barejid.into(),
            encryption: EncryptionState::default(),
            resource_override: None,
            state: ChatStateMachine::new(Instant::now()),
            history_shown: false,
            typing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateWindow {
    pub fulljid: String,
    /// The occupant left the room; sending is refused until they return.
    pub occupant_offline: bool,
    pub room_left: bool,
}

impl PrivateWindow {
    pub fn new(fulljid: impl Into<String>) -> Self {
        Self {
            fulljid: fulljid.into(),
            occupant_offline: false,
            room_left: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomWindow {
    pub roomjid: String,
    pub show_occupants: bool,
    pub show_occupant_jids: bool,
}

impl RoomWindow {
    pub fn new(roomjid: impl Into<String>, show_occupants: bool, show_occupant_jids: bool) -> Self {
        Self {
            roomjid: roomjid.into(),
            show_occupants,
            show_occupant_jids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfigWindow {
    pub roomjid: String,
    pub form: DataForm,
}

impl RoomConfigWindow {
    pub fn new(roomjid: impl Into<String>, form: DataForm) -> Self {
        Self {
            roomjid: roomjid.into(),
            form,
        }
    }

    pub fn is_modified(&self) -> bool {
        self.form.is_modified()
    }

    pub fn field_commands(&self) -> impl Iterator<Item = String> + '_ {
        self.form.tags().map(|tag| format!("/{tag}"))
    }
}

#[derive(Debug, Clone)]
pub enum WindowPayload {
    Console,
    Chat(ChatWindow),
    Private(PrivateWindow),
    Room(RoomWindow),
    RoomConfig(RoomConfigWindow),
    ProtocolTrace,
}

impl WindowPayload {
    pub fn key(&self) -> WindowKey {
        match self {
            WindowPayload::Console => WindowKey::Console,
            WindowPayload::Chat(chat) => WindowKey::Chat(chat.barejid.clone()),
            WindowPayload::Private(private) => WindowKey::Private(private.fulljid.clone()),
            WindowPayload::Room(room) => WindowKey::Room(room.roomjid.clone()),
            WindowPayload::RoomConfig(conf) => WindowKey::RoomConfig(conf.roomjid.clone()),
            WindowPayload::ProtocolTrace => WindowKey::ProtocolTrace,
        }
    }

    pub fn kind(&self) -> WindowKind {
        self.key().kind()
    }
}

#[derive(Debug, Clone)]
pub struct Window {
    unread: u32,
    /// Set by the registry whenever the window receives attention; drives
    /// prune retention.
    pub(crate) last_activity: u64,
    pub buffer: WindowBuffer,
    pub payload: WindowPayload,
}

impl Window {
    pub fn new(payload: WindowPayload) -> Self {
        Self {
            unread: 0,
            last_activity: 0,
            buffer: WindowBuffer::default(),
            payload,
        }
    }

    pub fn kind(&self) -> WindowKind {
        self.payload.kind()
    }

    pub fn key(&self) -> WindowKey {
        self.payload.key()
    }

    pub fn mark_unread(&mut self) {
        self.unread = self.unread.saturating_add(1);
    }

    pub fn clear_unread(&mut self) {
        self.unread = 0;
    }

    pub fn unread_count(&self) -> u32 {
        self.unread
    }

    pub fn print(&mut self, line: BufferLine) {
        self.buffer.push(line);
    }

    /// Tab and title-bar label.
    pub fn title(&self) -> String {
        match &self.payload {
            WindowPayload::Console => "Console".to_string(),
            WindowPayload::Chat(chat) => match &chat.resource_override {
                Some(res) => format!("{}/{res}", chat.barejid),
                None => chat.barejid.clone(),
            },
            WindowPayload::Private(private) => private.fulljid.clone(),
            WindowPayload::Room(room) => room.roomjid.clone(),
            WindowPayload::RoomConfig(conf) => {
                let star = if conf.is_modified() { " *" } else { "" };
                format!("{} config{star}", conf.roomjid)
            }
            WindowPayload::ProtocolTrace => "XML Console".to_string(),
        }
    }

    pub fn as_chat(&self) -> Option<&ChatWindow> {
        match &self.payload {
            WindowPayload::Chat(chat) => Some(chat),
            _ => None,
        }
    }

    pub fn as_chat_mut(&mut self) -> Option<&mut ChatWindow> {
        match &mut self.payload {
            WindowPayload::Chat(chat) => Some(chat),
            _ => None,
        }
    }

    pub fn as_private(&self) -> Option<&PrivateWindow> {
        match &self.payload {
            WindowPayload::Private(private) => Some(private),
            _ => None,
        }
    }

    pub fn as_private_mut(&mut self) -> Option<&mut PrivateWindow> {
        match &mut self.payload {
            WindowPayload::Private(private) => Some(private),
            _ => None,
        }
    }

    pub fn as_room(&self) -> Option<&RoomWindow> {
        match &self.payload {
            WindowPayload::Room(room) => Some(room),
            _ => None,
        }
    }

    pub fn as_room_mut(&mut self) -> Option<&mut RoomWindow> {
        match &mut self.payload {
            WindowPayload::Room(room) => Some(room),
            _ => None,
        }
    }

    pub fn as_room_config(&self) -> Option<&RoomConfigWindow> {
        match &self.payload {
            WindowPayload::RoomConfig(conf) => Some(conf),
            _ => None,
        }
    }

    pub fn as_room_config_mut(&mut self) -> Option<&mut RoomConfigWindow> {
        match &mut self.payload {
            WindowPayload::RoomConfig(conf) => Some(conf),
            _ => None,
        }
    }
}

/// Formats a slot the way users type it: slot 10 is shown as `0`.
pub fn display_slot(slot: usize) -> String {
    if slot == 10 {
        "0".to_string()
    } else {
        slot.to_string()
    }
}

/// Inverse of [`display_slot`].
pub fn parse_slot(raw: &str) -> Option<usize> {
    match raw.trim().parse::<usize>().ok()? {
        0 => Some(10),
        n => Some(n),
    }
}
