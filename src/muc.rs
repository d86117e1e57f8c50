//! Joined rooms and their occupant rosters.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Role {
    Moderator,
    Participant,
    Visitor,
    #[default]
    None,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Moderator, Role::Participant, Role::Visitor, Role::None];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Moderator => "moderator",
            Role::Participant => "participant",
            Role::Visitor => "visitor",
            Role::None => "none",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL.into_iter().find(|r| r.as_str() == s).ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Affiliation {
    Owner,
    Admin,
    Member,
    Outcast,
    #[default]
    None,
}

impl Affiliation {
    pub const ALL: [Affiliation; 5] = [
        Affiliation::Owner,
        Affiliation::Admin,
        Affiliation::Member,
        Affiliation::Outcast,
        Affiliation::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Affiliation::Owner => "owner",
            Affiliation::Admin => "admin",
            Affiliation::Member => "member",
            Affiliation::Outcast => "outcast",
            Affiliation::None => "none",
        }
    }
}

impl fmt::Display for Affiliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Affiliation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Affiliation::ALL.into_iter().find(|a| a.as_str() == s).ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    pub nick: String,
    pub jid: Option<String>,
    pub role: Role,
    pub affiliation: Affiliation,
    pub show: Option<String>,
    pub status: Option<String>,
}

/// Presence data for an occupant as delivered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OccupantUpdate {
    pub jid: Option<String>,
    pub role: Role,
    pub affiliation: Affiliation,
    pub show: Option<String>,
    pub status: Option<String>,
}

/// Role and affiliation fields that differ between two presences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeChange {
    Role(Role),
    Affiliation(Affiliation),
    Both(Role, Affiliation),
}

impl PrivilegeChange {
    pub fn diff(
        old_role: Role,
        old_affiliation: Affiliation,
        role: Role,
        affiliation: Affiliation,
    ) -> Option<Self> {
        match (old_role != role, old_affiliation != affiliation) {
            (true, true) => Some(PrivilegeChange::Both(role, affiliation)),
            (true, false) => Some(PrivilegeChange::Role(role)),
            (false, true) => Some(PrivilegeChange::Affiliation(affiliation)),
            (false, false) => None,
        }
    }
}

/// Result of applying an occupant presence to the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    Joined,
    NickChanged { old_nick: String },
    PresenceChanged,
    Privileges(PrivilegeChange),
    Unchanged,
}

#[derive(Debug, Clone, Default)]
pub struct Room {
    pub roomjid: String,
    pub nick: String,
    pub password: Option<String>,
    pub autojoin: bool,
    pub role: Role,
    pub affiliation: Affiliation,
    roster: BTreeMap<String, Occupant>,
    roster_complete: bool,
    pub subject: Option<String>,
    pending_subject: Option<(Option<String>, String)>,
    pending_broadcasts: Vec<String>,
    requires_config: bool,
    pending_nick: Option<String>,
    /// new nick -> old nick, awaiting the join half of an occupant rename
    nick_changes: HashMap<String, String>,
}

impl Room {
    pub fn new(roomjid: &str, nick: &str, password: Option<String>, autojoin: bool) -> Self {
        Self {
            roomjid: roomjid.to_string(),
            nick: nick.to_string(),
            password,
            autojoin,
            ..Self::default()
        }
    }

    pub fn roster_complete(&self) -> bool {
        self.roster_complete
    }

    pub fn set_roster_complete(&mut self) {
        self.roster_complete = true;
    }

    pub fn requires_config(&self) -> bool {
        self.requires_config
    }

    pub fn set_requires_config(&mut self, required: bool) {
        self.requires_config = required;
    }

    pub fn occupant(&self, nick: &str) -> Option<&Occupant> {
        self.roster.get(nick)
    }

    pub fn contains_nick(&self, nick: &str) -> bool {
        self.roster.contains_key(nick)
    }

    pub fn occupants(&self) -> impl Iterator<Item = &Occupant> {
        self.roster.values()
    }

    pub fn occupants_by_role(&self, role: Role) -> impl Iterator<Item = &Occupant> {
        self.roster.values().filter(move |o| o.role == role)
    }

    /// Applies a presence for `nick`, returning what changed.
    pub fn update_occupant(&mut self, nick: &str, update: OccupantUpdate) -> RosterChange {
        let old_nick = self.nick_changes.remove(nick);
        let change = match self.roster.get(nick) {
            None => match old_nick {
                Some(old_nick) => RosterChange::NickChanged { old_nick },
                None => RosterChange::Joined,
            },
            Some(prev) => {
                if prev.show != update.show || prev.status != update.status {
                    RosterChange::PresenceChanged
                } else {
                    match PrivilegeChange::diff(
                        prev.role,
                        prev.affiliation,
                        update.role,
                        update.affiliation,
                    ) {
                        Some(diff) => RosterChange::Privileges(diff),
                        None => RosterChange::Unchanged,
                    }
                }
            }
        };
        self.roster.insert(
            nick.to_string(),
            Occupant {
                nick: nick.to_string(),
                jid: update.jid,
                role: update.role,
                affiliation: update.affiliation,
                show: update.show,
                status: update.status,
            },
        );
        change
    }

    pub fn remove_occupant(&mut self, nick: &str) -> Option<Occupant> {
        self.roster.remove(nick)
    }

    /// The leave half of an occupant rename: drop the old nick and remember
    /// it until the new nick's presence arrives.
    pub fn occupant_nick_change_start(&mut self, old_nick: &str, new_nick: &str) {
        self.roster.remove(old_nick);
        self.nick_changes
            .insert(new_nick.to_string(), old_nick.to_string());
    }

    pub fn set_pending_nick(&mut self, nick: &str) {
        self.pending_nick = Some(nick.to_string());
    }

    pub fn is_nick_change_pending(&self) -> bool {
        self.pending_nick.is_some()
    }

    /// Completes our own rename. Returns the new nick.
    pub fn complete_nick_change(&mut self) -> Option<String> {
        let nick = self.pending_nick.take()?;
        self.roster.remove(&self.nick);
        self.nick = nick.clone();
        Some(nick)
    }

    pub fn set_pending_subject(&mut self, nick: Option<String>, subject: String) {
        self.pending_subject = Some((nick, subject));
    }

    pub fn take_pending_subject(&mut self) -> Option<(Option<String>, String)> {
        self.pending_subject.take()
    }

    pub fn queue_broadcast(&mut self, message: String) {
        self.pending_broadcasts.push(message);
    }

    pub fn take_pending_broadcasts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_broadcasts)
    }

    /// Whether `message` mentions our nick as a whole word,
    /// case-insensitively.
    pub fn mentions_me(&self, message: &str) -> bool {
        let nick = self.nick.to_lowercase();
        if nick.is_empty() {
            return false;
        }
        let lower = message.to_lowercase();
        lower.match_indices(&nick).any(|(at, _)| {
            let before = lower[..at].chars().next_back();
            let after = lower[at + nick.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
    }
}

/// All rooms we are in or joining, plus outstanding invitations.
#[derive(Debug, Default)]
pub struct RoomTracker {
    rooms: BTreeMap<String, Room>,
    invites: BTreeMap<String, Option<String>>,
}

impl RoomTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, roomjid: &str, nick: &str, password: Option<String>, autojoin: bool) {
        tracing::debug!(room = roomjid, nick, autojoin, "joining room");
        self.rooms
            .insert(roomjid.to_string(), Room::new(roomjid, nick, password, autojoin));
    }

    pub fn leave(&mut self, roomjid: &str) -> Option<Room> {
        self.rooms.remove(roomjid)
    }

    pub fn get(&self, roomjid: &str) -> Option<&Room> {
        self.rooms.get(roomjid)
    }

    pub fn get_mut(&mut self, roomjid: &str) -> Option<&mut Room> {
        self.rooms.get_mut(roomjid)
    }

    pub fn is_active(&self, roomjid: &str) -> bool {
        self.rooms.contains_key(roomjid)
    }

    pub fn nick(&self, roomjid: &str) -> Option<&str> {
        self.rooms.get(roomjid).map(|r| r.nick.as_str())
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
        self.invites.clear();
    }

    pub fn add_invite(&mut self, roomjid: &str, password: Option<String>) {
        self.invites.insert(roomjid.to_string(), password);
    }

    pub fn remove_invite(&mut self, roomjid: &str) -> bool {
        self.invites.remove(roomjid).is_some()
    }

    pub fn invite_password(&self, roomjid: &str) -> Option<&str> {
        self.invites.get(roomjid).and_then(|p| p.as_deref())
    }

    pub fn invites(&self) -> impl Iterator<Item = &str> {
        self.invites.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(role: Role, affiliation: Affiliation) -> OccupantUpdate {
        OccupantUpdate {
            role,
            affiliation,
            ..OccupantUpdate::default()
        }
    }

    #[test]
    fn roster_change_detection() {
        let mut room = Room::new("r@c.x", "me", None, false);
        assert_eq!(
            room.update_occupant("bob", update(Role::Participant, Affiliation::None)),
            RosterChange::Joined
        );
        assert_eq!(
            room.update_occupant("bob", update(Role::Moderator, Affiliation::None)),
            RosterChange::Privileges(PrivilegeChange::Role(Role::Moderator))
        );
        assert_eq!(
            room.update_occupant("bob", update(Role::Participant, Affiliation::Admin)),
            RosterChange::Privileges(PrivilegeChange::Both(Role::Participant, Affiliation::Admin))
        );
        let away = OccupantUpdate {
            show: Some("away".into()),
            ..update(Role::Participant, Affiliation::Admin)
        };
        assert_eq!(room.update_occupant("bob", away.clone()), RosterChange::PresenceChanged);
        assert_eq!(room.update_occupant("bob", away), RosterChange::Unchanged);
    }

    #[test]
    fn occupant_rename_is_two_phase() {
        let mut room = Room::new("r@c.x", "me", None, false);
        room.update_occupant("bob", OccupantUpdate::default());
        room.occupant_nick_change_start("bob", "robert");
        assert!(!room.contains_nick("bob"));
        assert_eq!(
            room.update_occupant("robert", OccupantUpdate::default()),
            RosterChange::NickChanged {
                old_nick: "bob".into()
            }
        );
    }

    #[test]
    fn own_nick_change_completes() {
        let mut room = Room::new("r@c.x", "me", None, false);
        room.set_pending_nick("myself");
        assert!(room.is_nick_change_pending());
        assert_eq!(room.complete_nick_change().as_deref(), Some("myself"));
        assert_eq!(room.nick, "myself");
        assert!(room.complete_nick_change().is_none());
    }

    #[test]
    fn mention_needs_word_boundary() {
        let room = Room::new("r@c.x", "Ann", None, false);
        assert!(room.mentions_me("hey ann, look"));
        assert!(!room.mentions_me("planning ahead"));
        assert!(room.mentions_me("ANN"));
    }

    #[test]
    fn pending_join_queues_drain_once() {
        let mut room = Room::new("r@c.x", "me", None, false);
        room.set_pending_subject(None, "topic".into());
        room.queue_broadcast("one".into());
        room.queue_broadcast("two".into());
        assert_eq!(room.take_pending_subject(), Some((None, "topic".into())));
        assert_eq!(room.take_pending_broadcasts(), vec!["one", "two"]);
        assert!(room.take_pending_subject().is_none());
        assert!(room.take_pending_broadcasts().is_empty());
    }
}
