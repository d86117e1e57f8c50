use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::error::ProtocolError;
use crate::jid::Jid;
use crate::muc::{Affiliation, Role};
use crate::window::form::{DataForm, FieldType, FormField};

use super::{
    ConnectionState, InboundEvent, OutboundAction, RoomEvent, TraceDirection, Transport,
};

/// In-process transport with no network behind it.
///
/// Every action is recorded and echoed to the trace stream. Room joins and
/// configuration requests are answered the way a permissive server would, so
/// the client is usable offline; everything else only arrives through
/// [`LoopbackTransport::push`].
///
/// Clones share state, so a test can keep a handle after boxing the
/// transport into the application context.
#[derive(Debug, Default, Clone)]
pub struct LoopbackTransport {
    inner: Rc<RefCell<Loopback>>,
}

#[derive(Debug, Default)]
struct Loopback {
    state: ConnectionState,
    account: Option<Jid>,
    inbound: VecDeque<InboundEvent>,
    sent: Vec<OutboundAction>,
    /// Rooms answered as newly created, i.e. requiring configuration.
    locked_rooms: Vec<String>,
    /// Our own role and affiliation in each joined room.
    joined: HashMap<String, (Role, Affiliation)>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that is already logged in as `jid`.
    pub fn connected(jid: Jid) -> Self {
        let transport = Self::new();
        {
            let mut inner = transport.inner.borrow_mut();
            inner.state = ConnectionState::Connected;
            inner.account = Some(jid);
        }
        transport
    }

    pub fn push(&self, event: InboundEvent) {
        self.inner.borrow_mut().inbound.push_back(event);
    }

    pub fn sent(&self) -> Vec<OutboundAction> {
        self.inner.borrow().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<OutboundAction> {
        std::mem::take(&mut self.inner.borrow_mut().sent)
    }

    /// Joins to `room` will report that it needs configuring.
    pub fn lock_room(&self, room: &str) {
        self.inner.borrow_mut().locked_rooms.push(room.to_string());
    }
}

impl Loopback {
    fn answer(&mut self, action: &OutboundAction) {
        match action {
            OutboundAction::JoinRoom { room, nick, .. } => {
                let config_required = self.locked_rooms.iter().any(|r| r == room);
                let (role, affiliation) = if config_required {
                    (Role::Moderator, Affiliation::Owner)
                } else {
                    (Role::Participant, Affiliation::None)
                };
                self.joined.insert(room.clone(), (role, affiliation));
                self.inbound.push_back(InboundEvent::Room(RoomEvent::SelfPresence {
                    room: room.clone(),
                    nick: nick.clone(),
                    role,
                    affiliation,
                    config_required,
                    actor: None,
                    reason: None,
                }));
            }
            OutboundAction::ChangeNick { room, nick } => {
                let (role, affiliation) = self
                    .joined
                    .get(room)
                    .copied()
                    .unwrap_or((Role::Participant, Affiliation::None));
                self.inbound.push_back(InboundEvent::Room(RoomEvent::SelfPresence {
                    room: room.clone(),
                    nick: nick.clone(),
                    role,
                    affiliation,
                    config_required: false,
                    actor: None,
                    reason: None,
                }));
            }
            OutboundAction::RequestRoomConfig { room } => {
                self.inbound.push_back(InboundEvent::Room(RoomEvent::ConfigForm {
                    room: room.clone(),
                    form: default_room_form(room),
                }));
            }
            OutboundAction::SubmitRoomConfig { room, .. } => {
                self.locked_rooms.retain(|r| r != room);
                self.inbound
                    .push_back(InboundEvent::Room(RoomEvent::ConfigSubmitted { room: room.clone() }));
            }
            OutboundAction::LeaveRoom { room, .. } => {
                self.joined.remove(room);
            }
            OutboundAction::AcceptRoomDefaults { room } => {
                self.locked_rooms.retain(|r| r != room);
            }
            _ => {}
        }
    }
}

fn default_room_form(room: &str) -> DataForm {
    let name = room.split('@').next().unwrap_or(room);
    DataForm::new(
        Some(format!("Configuration for \"{room}\" Room")),
        Some("Complete this form to modify the configuration of your room.".into()),
        vec![
            FormField::new("FORM_TYPE", FieldType::Hidden)
                .with_value("http://jabber.org/protocol/muc#roomconfig"),
            FormField::new("muc#roomconfig_roomname", FieldType::TextSingle)
                .with_label("Natural-Language Room Name")
                .with_value(name),
            FormField::new("muc#roomconfig_roomdesc", FieldType::TextMulti)
                .with_label("Short Description of Room"),
            FormField::new("muc#roomconfig_persistentroom", FieldType::Boolean)
                .with_label("Make Room Persistent?")
                .with_value("0"),
            FormField::new("muc#roomconfig_whois", FieldType::ListSingle)
                .with_label("Who May Discover Real JIDs?")
                .with_option("moderators", Some("Moderators Only"))
                .with_option("anyone", Some("Anyone"))
                .with_value("moderators"),
            FormField::new("muc#roomconfig_roomadmins", FieldType::JidMulti)
                .with_label("Room Admins"),
        ],
    )
}

impl Transport for LoopbackTransport {
    fn state(&self) -> ConnectionState {
        self.inner.borrow().state
    }

    fn account(&self) -> Option<Jid> {
        self.inner.borrow().account.clone()
    }

    fn connect(&mut self, jid: Jid, _password: Option<&str>) -> Result<(), ProtocolError> {
        tracing::info!(%jid, "loopback connect");
        let mut inner = self.inner.borrow_mut();
        inner.state = ConnectionState::Connecting;
        inner.account = Some(jid.clone());
        inner.inbound.push_back(InboundEvent::LoginSuccess { jid });
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.state = ConnectionState::Disconnected;
        inner.account = None;
        inner.inbound.clear();
        inner.joined.clear();
    }

    fn send(&mut self, action: OutboundAction) -> Result<(), ProtocolError> {
        let mut inner = self.inner.borrow_mut();
        if inner.state != ConnectionState::Connected {
            return Err(ProtocolError::NotConnected);
        }
        inner.inbound.push_back(InboundEvent::Trace {
            direction: TraceDirection::Sent,
            stanza: format!("{action:?}"),
        });
        inner.answer(&action);
        inner.sent.push(action);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<InboundEvent> {
        let mut inner = self.inner.borrow_mut();
        let event = inner.inbound.pop_front()?;
        if matches!(event, InboundEvent::LoginSuccess { .. }) {
            inner.state = ConnectionState::Connected;
        }
        Some(event)
    }
}
