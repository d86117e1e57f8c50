//! The seam between the client core and the wire protocol.
//!
//! A [`Transport`] delivers already-parsed [`InboundEvent`]s and accepts
//! [`OutboundAction`]s; stanza encoding, TLS and reconnection live behind it.

pub mod loopback;

use std::fmt;

use chrono::{DateTime, Local};

use crate::error::ProtocolError;
use crate::jid::Jid;
use crate::muc::{Affiliation, OccupantUpdate, Role};
use crate::roster::{Presence, Resource};
use crate::session::ChatState;
use crate::window::DataForm;

pub use loopback::LoopbackTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDirection {
    Sent,
    Received,
}

impl fmt::Display for TraceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TraceDirection::Sent => "SENT:",
            TraceDirection::Received => "RECV:",
        })
    }
}

/// A one-to-one message, live or delayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sender, normally with the sending resource.
    pub from: Jid,
    pub body: String,
    pub id: Option<String>,
    /// Armoured payload for PGP-encrypted messages; `body` then holds the
    /// fallback text.
    pub encrypted: Option<String>,
    /// Original send time for messages delivered from offline storage.
    pub delay: Option<DateTime<Local>>,
    pub receipt_requested: bool,
}

impl ChatMessage {
    pub fn new(from: Jid, body: impl Into<String>) -> Self {
        Self {
            from,
            body: body.into(),
            id: None,
            encrypted: None,
            delay: None,
            receipt_requested: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Subscribe,
    Subscribed,
    Unsubscribed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// Our own presence in the room. The first one completes the join.
    SelfPresence {
        room: String,
        nick: String,
        role: Role,
        affiliation: Affiliation,
        config_required: bool,
        actor: Option<String>,
        reason: Option<String>,
    },
    OccupantPresence {
        room: String,
        nick: String,
        update: OccupantUpdate,
        actor: Option<String>,
        reason: Option<String>,
    },
    /// The leave half of an occupant's rename.
    OccupantNickChange {
        room: String,
        old_nick: String,
        new_nick: String,
    },
    OccupantOffline {
        room: String,
        nick: String,
    },
    OccupantKicked {
        room: String,
        nick: String,
        actor: Option<String>,
        reason: Option<String>,
    },
    OccupantBanned {
        room: String,
        nick: String,
        actor: Option<String>,
        reason: Option<String>,
    },
    SelfKicked {
        room: String,
        actor: Option<String>,
        reason: Option<String>,
    },
    SelfBanned {
        room: String,
        actor: Option<String>,
        reason: Option<String>,
    },
    Destroyed {
        room: String,
        reason: Option<String>,
        new_room: Option<String>,
        password: Option<String>,
    },
    Subject {
        room: String,
        nick: Option<String>,
        subject: Option<String>,
    },
    Broadcast {
        room: String,
        message: String,
    },
    History {
        room: String,
        nick: String,
        time: DateTime<Local>,
        message: String,
    },
    Message {
        room: String,
        nick: String,
        message: String,
    },
    JoinError {
        room: String,
        error: String,
    },
    Info {
        room: String,
        identities: Vec<String>,
        features: Vec<String>,
    },
    ConfigForm {
        room: String,
        form: DataForm,
    },
    ConfigFormError {
        room: String,
        message: String,
    },
    ConfigSubmitted {
        room: String,
    },
    ConfigSubmitError {
        room: String,
        message: String,
    },
    AffiliationList {
        room: String,
        affiliation: Affiliation,
        jids: Vec<String>,
    },
    RoleList {
        room: String,
        role: Role,
        nicks: Vec<String>,
    },
    AffiliationSetError {
        room: String,
        jid: String,
        affiliation: Affiliation,
        error: String,
    },
    RoleSetError {
        room: String,
        nick: String,
        role: Role,
        error: String,
    },
    KickError {
        room: String,
        nick: String,
        error: String,
    },
}

/// Notifications raised by the negotiating encryption engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionEvent {
    Secured { barejid: String, trusted: bool },
    Insecure { barejid: String },
    Trusted { barejid: String },
    Untrusted { barejid: String },
    SmpRequested { barejid: String, question: Option<String> },
    SmpSucceeded { barejid: String },
    SmpFailed { barejid: String },
    SmpAborted { barejid: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    LoginSuccess {
        jid: Jid,
    },
    LoginFailed,
    LostConnection,
    Message(ChatMessage),
    /// A copy of a message another of our resources received.
    CarbonReceived(ChatMessage),
    /// A copy of a message another of our resources sent.
    CarbonSent {
        to: String,
        body: String,
    },
    PrivateMessage {
        from: Jid,
        body: String,
        delay: Option<DateTime<Local>>,
    },
    Receipt {
        from: String,
        id: String,
    },
    ChatState {
        from: Jid,
        state: ChatState,
    },
    ContactOnline {
        barejid: String,
        resource: Resource,
    },
    ContactOffline {
        barejid: String,
        resource: String,
        status: Option<String>,
    },
    RosterPush {
        barejid: String,
        name: Option<String>,
        groups: Vec<String>,
        subscription: String,
        pending_out: bool,
    },
    RosterRemove {
        barejid: String,
    },
    Subscription {
        from: String,
        kind: SubscriptionKind,
    },
    Invite {
        from: String,
        room: String,
        reason: Option<String>,
        password: Option<String>,
    },
    Room(RoomEvent),
    SoftwareVersion {
        from: Jid,
        name: String,
        version: Option<String>,
        os: Option<String>,
    },
    DiscoInfo {
        from: String,
        identities: Vec<String>,
        features: Vec<String>,
    },
    DiscoItems {
        from: String,
        items: Vec<(String, Option<String>)>,
    },
    /// An error stanza, optionally attributed to a sender.
    Error {
        from: Option<String>,
        message: String,
    },
    Trace {
        direction: TraceDirection,
        stanza: String,
    },
    Encryption(EncryptionEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Chat,
    Private,
    Groupchat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    Request,
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoKind {
    Info,
    Items,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    Message {
        to: String,
        body: String,
        id: String,
        kind: MessageKind,
        request_receipt: bool,
    },
    ChatState {
        to: String,
        state: ChatState,
    },
    Receipt {
        to: String,
        id: String,
    },
    Presence {
        presence: Presence,
        status: Option<String>,
        idle_secs: u64,
    },
    Subscription {
        to: String,
        action: SubscriptionAction,
    },
    JoinRoom {
        room: String,
        nick: String,
        password: Option<String>,
    },
    LeaveRoom {
        room: String,
        nick: String,
    },
    ChangeNick {
        room: String,
        nick: String,
    },
    SetSubject {
        room: String,
        subject: Option<String>,
    },
    Kick {
        room: String,
        nick: String,
        reason: Option<String>,
    },
    SetAffiliation {
        room: String,
        jid: String,
        affiliation: Affiliation,
        reason: Option<String>,
    },
    SetRole {
        room: String,
        nick: String,
        role: Role,
        reason: Option<String>,
    },
    ListAffiliation {
        room: String,
        affiliation: Affiliation,
    },
    ListRole {
        room: String,
        role: Role,
    },
    RequestRoomInfo {
        room: String,
    },
    RequestRoomConfig {
        room: String,
    },
    SubmitRoomConfig {
        room: String,
        form: DataForm,
    },
    CancelRoomConfig {
        room: String,
    },
    AcceptRoomDefaults {
        room: String,
    },
    DestroyRoom {
        room: String,
    },
    Invite {
        room: String,
        contact: String,
        reason: Option<String>,
    },
    Disco {
        jid: String,
        kind: DiscoKind,
    },
    SoftwareVersion {
        jid: String,
    },
}

pub trait Transport {
    fn state(&self) -> ConnectionState;

    /// The address we are logged in as, once connected.
    fn account(&self) -> Option<Jid>;

    /// Starts connecting. May block while credentials or the network are
    /// dealt with; completion is reported with [`InboundEvent::LoginSuccess`].
    fn connect(&mut self, jid: Jid, password: Option<&str>) -> Result<(), ProtocolError>;

    fn disconnect(&mut self);

    fn send(&mut self, action: OutboundAction) -> Result<(), ProtocolError>;

    /// Never blocks.
    fn poll_event(&mut self) -> Option<InboundEvent>;
}
