//! Per-counterpart conversation state.
//!
//! [`ChatStateMachine`] tracks what we advertise to a counterpart (typing,
//! paused, gone ...). [`SessionTracker`] remembers which resource a
//! conversation is bound to and the last state the counterpart advertised.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::constants::{INACTIVE_TIMEOUT, PAUSED_TIMEOUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChatState {
    #[default]
    Active,
    Composing,
    Paused,
    Inactive,
    Gone,
}

impl fmt::Display for ChatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChatState::Active => "active",
            ChatState::Composing => "composing",
            ChatState::Paused => "paused",
            ChatState::Inactive => "inactive",
            ChatState::Gone => "gone",
        };
        f.write_str(s)
    }
}

impl FromStr for ChatState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ChatState::Active),
            "composing" => Ok(ChatState::Composing),
            "paused" => Ok(ChatState::Paused),
            "inactive" => Ok(ChatState::Inactive),
            "gone" => Ok(ChatState::Gone),
            _ => Err(()),
        }
    }
}

/// Local chat state for one conversation.
///
/// Every method returns the state that should be advertised, or `None` when
/// nothing changed.
#[derive(Debug, Clone)]
pub struct ChatStateMachine {
    state: ChatState,
    since: Instant,
}

impl ChatStateMachine {
    pub fn new(now: Instant) -> Self {
        Self {
            state: ChatState::Active,
            since: now,
        }
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    fn enter(&mut self, state: ChatState, now: Instant) -> Option<ChatState> {
        self.since = now;
        if self.state == state {
            return None;
        }
        self.state = state;
        Some(state)
    }

    /// A keystroke was made in the conversation's input line.
    pub fn typing(&mut self, now: Instant) -> Option<ChatState> {
        self.enter(ChatState::Composing, now)
    }

    /// A message was sent; the user is engaged again.
    pub fn active(&mut self, now: Instant) -> Option<ChatState> {
        self.enter(ChatState::Active, now)
    }

    /// The window was closed or the session ended.
    pub fn gone(&mut self, now: Instant) -> Option<ChatState> {
        self.enter(ChatState::Gone, now)
    }

    /// Advances timers. `gone_after` of `None` disables the gone transition.
    pub fn idle(&mut self, now: Instant, gone_after: Option<Duration>) -> Option<ChatState> {
        let elapsed = now.saturating_duration_since(self.since);
        match self.state {
            ChatState::Composing if elapsed >= PAUSED_TIMEOUT => {
                self.enter(ChatState::Paused, now)
            }
            ChatState::Paused if elapsed >= INACTIVE_TIMEOUT => {
                self.enter(ChatState::Inactive, now)
            }
            ChatState::Active | ChatState::Inactive => match gone_after {
                Some(limit) if elapsed >= limit => self.enter(ChatState::Gone, now),
                _ => None,
            },
            _ => None,
        }
    }
}

/// What is known about a counterpart's live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub barejid: String,
    pub resource: String,
    /// The user pinned this resource with `/resource set`.
    pub resource_override: bool,
    /// Whether the counterpart understands chat-state notifications.
    pub send_states: bool,
    pub recipient_state: Option<ChatState>,
}

#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<String, ChatSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, barejid: &str) -> Option<&ChatSession> {
        self.sessions.get(barejid)
    }

    /// Records that `resource` is the one we are talking to.
    ///
    /// A pinned resource is only replaced by another explicit pin.
    pub fn on_message(&mut self, barejid: &str, resource: &str, send_states: bool) {
        match self.sessions.get_mut(barejid) {
            Some(session) if session.resource_override && session.resource != resource => {}
            Some(session) => {
                session.resource = resource.to_string();
                session.send_states = send_states;
            }
            None => {
                tracing::debug!(barejid, resource, "chat session started");
                self.sessions.insert(
                    barejid.to_string(),
                    ChatSession {
                        barejid: barejid.to_string(),
                        resource: resource.to_string(),
                        resource_override: false,
                        send_states,
                        recipient_state: None,
                    },
                );
            }
        }
    }

    pub fn pin_resource(&mut self, barejid: &str, resource: &str) {
        self.sessions.insert(
            barejid.to_string(),
            ChatSession {
                barejid: barejid.to_string(),
                resource: resource.to_string(),
                resource_override: true,
                send_states: true,
                recipient_state: None,
            },
        );
    }

    pub fn set_recipient_state(&mut self, barejid: &str, resource: Option<&str>, state: ChatState) {
        if let Some(session) = self.sessions.get_mut(barejid) {
            if resource.is_none_or(|r| r == session.resource) {
                session.recipient_state = Some(state);
            }
        } else if let Some(resource) = resource {
            self.on_message(barejid, resource, true);
            if let Some(session) = self.sessions.get_mut(barejid) {
                session.recipient_state = Some(state);
            }
        }
    }

    /// Whether the bound resource differs from `resource`. A gone
    /// notification from another resource is not shown.
    pub fn is_other_resource(&self, barejid: &str, resource: Option<&str>) -> bool {
        match (self.sessions.get(barejid), resource) {
            (Some(session), Some(resource)) => session.resource != resource,
            _ => false,
        }
    }

    pub fn remove(&mut self, barejid: &str) -> Option<ChatSession> {
        self.sessions.remove(barejid)
    }

    /// Drops the session if it is bound to `resource` (the resource went
    /// offline). Returns whether a pinned resource was released.
    pub fn resource_offline(&mut self, barejid: &str, resource: &str) -> bool {
        match self.sessions.get(barejid) {
            Some(session) if session.resource == resource => {
                let pinned = session.resource_override;
                self.sessions.remove(barejid);
                pinned
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composing_pauses_then_goes_inactive() {
        let t0 = Instant::now();
        let mut sm = ChatStateMachine::new(t0);
        assert_eq!(sm.typing(t0), Some(ChatState::Composing));
        // repeated keystrokes don't re-advertise
        assert_eq!(sm.typing(t0 + Duration::from_secs(1)), None);
        assert_eq!(sm.idle(t0 + Duration::from_secs(5), None), None);
        let t1 = t0 + Duration::from_secs(1) + PAUSED_TIMEOUT;
        assert_eq!(sm.idle(t1, None), Some(ChatState::Paused));
        let t2 = t1 + INACTIVE_TIMEOUT;
        assert_eq!(sm.idle(t2, None), Some(ChatState::Inactive));
        assert_eq!(sm.idle(t2 + Duration::from_secs(3600), None), None);
    }

    #[test]
    fn gone_after_configured_period() {
        let t0 = Instant::now();
        let mut sm = ChatStateMachine::new(t0);
        let gone = Some(Duration::from_secs(600));
        assert_eq!(sm.idle(t0 + Duration::from_secs(599), gone), None);
        assert_eq!(sm.idle(t0 + Duration::from_secs(600), gone), Some(ChatState::Gone));
        assert_eq!(sm.state(), ChatState::Gone);
        assert_eq!(sm.active(t0 + Duration::from_secs(700)), Some(ChatState::Active));
    }

    #[test]
    fn pinned_resource_survives_other_messages() {
        let mut sessions = SessionTracker::new();
        sessions.pin_resource("bob@x.org", "phone");
        sessions.on_message("bob@x.org", "laptop", true);
        assert_eq!(sessions.get("bob@x.org").unwrap().resource, "phone");
        assert!(sessions.is_other_resource("bob@x.org", Some("laptop")));
        assert!(sessions.resource_offline("bob@x.org", "phone"));
        assert!(sessions.get("bob@x.org").is_none());
    }

    #[test]
    fn recipient_state_from_unknown_contact_starts_session() {
        let mut sessions = SessionTracker::new();
        sessions.set_recipient_state("amy@x.org", Some("pc"), ChatState::Composing);
        let session = sessions.get("amy@x.org").unwrap();
        assert_eq!(session.resource, "pc");
        assert_eq!(session.recipient_state, Some(ChatState::Composing));
    }
}
