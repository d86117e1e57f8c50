//! Outbound messages and presence.
//!
//! Callers check connection state and window kind first; these functions
//! only route the payload through the right encryption engine, hand it to
//! the transport and echo it locally.

use std::time::Instant;

use chrono::Local;

use crate::context::AppContext;
use crate::encryption::EncryptionMode;
use crate::prefs::Pref;
use crate::protocol::{MessageKind, OutboundAction};
use crate::roster::Presence;
use crate::theme::Theme;
use crate::window::{BufferLine, WindowKey};

/// Sends a one-to-one message, opening the chat window if needed. Returns
/// whether the message left the client.
pub fn send_chat(ctx: &mut AppContext, barejid: &str, message: &str) -> bool {
    let Some(slot) = ctx.ensure_chat(barejid) else {
        return false;
    };
    let mode = ctx
        .windows
        .chat(barejid)
        .map(|chat| chat.encryption.mode())
        .unwrap_or_default();

    let body = match mode {
        EncryptionMode::Pgp => ctx.pgp.encode(barejid, message),
        EncryptionMode::Otr => ctx.otr.encode(barejid, message),
        EncryptionMode::None => {
            if ctx.prefs.get_string(Pref::OtrPolicy) == "always" {
                ctx.win_show(
                    slot,
                    '!',
                    Theme::Error,
                    "Failed to send message. OTR policy set to: always",
                );
                return false;
            }
            Ok(message.to_string())
        }
    };
    let body = match body {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(%err, barejid, ?mode, "encode failed");
            ctx.win_show(slot, '!', Theme::Error, err.to_string());
            return false;
        }
    };

    let id = ctx.next_id();
    let request_receipt = ctx.prefs.get_bool(Pref::ReceiptsRequest);
    let to = ctx.chat_address(barejid);
    if !ctx.send(OutboundAction::Message {
        to,
        body,
        id: id.clone(),
        kind: MessageKind::Chat,
        request_receipt,
    }) {
        return false;
    }

    // the message itself carries "active"
    if let Some(chat) = ctx.windows.chat_mut(barejid) {
        chat.state.active(Instant::now());
    }
    ctx.log_chat(barejid, "me", message, mode, Local::now());

    let show_char = if mode == EncryptionMode::None { '-' } else { '~' };
    let mut line = BufferLine::new(show_char, Theme::TextMe, message).from("me");
    if request_receipt {
        line = line.awaiting_receipt(id);
    }
    ctx.print(slot, line);
    true
}

/// Sends a private message to a room occupant.
pub fn send_private(ctx: &mut AppContext, fulljid: &str, message: &str) -> bool {
    let Some(slot) = ctx.ensure_private(fulljid) else {
        return false;
    };
    let (room, nick) = fulljid.split_once('/').unwrap_or((fulljid, ""));
    let refusal = match ctx.windows.private_mut(fulljid) {
        Some(private) if private.room_left => Some(format!(
            "Unable to send message, you are no longer present in room {room}."
        )),
        Some(private) if private.occupant_offline => Some(format!(
            "Unable to send message, {nick} is no longer present in room."
        )),
        _ => None,
    };
    if let Some(refusal) = refusal {
        ctx.win_show(slot, '-', Theme::Error, refusal);
        return false;
    }
    let id = ctx.next_id();
    if !ctx.send(OutboundAction::Message {
        to: fulljid.to_string(),
        body: message.to_string(),
        id,
        kind: MessageKind::Private,
        request_receipt: false,
    }) {
        return false;
    }
    ctx.print(slot, BufferLine::new('-', Theme::TextMe, message).from("me"));
    true
}

/// Sends a groupchat message. The room echoes it back, so nothing is printed
/// here.
pub fn send_room_message(ctx: &mut AppContext, room: &str, message: &str) -> bool {
    if !ctx.rooms.is_active(room) {
        tracing::warn!(room, "message for a room we are not in");
        if let Some(slot) = ctx.windows.lookup(&WindowKey::Room(room.to_string())) {
            ctx.win_show(slot, '-', Theme::Error, format!("You are not in room {room}."));
        }
        return false;
    }
    let id = ctx.next_id();
    ctx.send(OutboundAction::Message {
        to: room.to_string(),
        body: message.to_string(),
        id,
        kind: MessageKind::Groupchat,
        request_receipt: false,
    })
}

/// Sets our availability and broadcasts it.
pub fn send_presence(ctx: &mut AppContext, presence: Presence, status: Option<String>) {
    if !ctx.send(OutboundAction::Presence {
        presence,
        status: status.clone(),
        idle_secs: 0,
    }) {
        return;
    }
    ctx.presence = presence;
    ctx.status = status.clone();
    match status {
        Some(status) => ctx.cons_show(format!("Status set to {presence}, \"{status}\"")),
        None => ctx.cons_show(format!("Status set to {presence}")),
    }
}

/// Local typing in the current chat window. Sends "composing" when `outtype`
/// is on and the state machine moves.
pub fn typing_activity(ctx: &mut AppContext, now: Instant) {
    if !ctx.connected() || !ctx.prefs.get_bool(Pref::Outtype) {
        return;
    }
    let current = ctx.windows.current();
    let transition = ctx
        .windows
        .get_mut(current)
        .and_then(|window| window.as_chat_mut())
        .and_then(|chat| chat.state.typing(now).map(|state| (chat.barejid.clone(), state)));
    if let Some((barejid, state)) = transition {
        ctx.send_chat_state(&barejid, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{Decoded, EncryptionEngine, StartOutcome};
    use crate::error::EncryptionError;
    use crate::jid::Jid;
    use crate::protocol::LoopbackTransport;
    use crate::session::ChatState;

    struct Rot13;

    impl EncryptionEngine for Rot13 {
        fn name(&self) -> &'static str {
            "OTR"
        }
        fn is_secure(&self, _barejid: &str) -> bool {
            true
        }
        fn is_trusted(&self, _barejid: &str) -> bool {
            false
        }
        fn start(&mut self, _barejid: &str) -> Result<StartOutcome, EncryptionError> {
            Ok(StartOutcome::Established { trusted: false })
        }
        fn end(&mut self, _barejid: &str) -> Result<(), EncryptionError> {
            Ok(())
        }
        fn encode(&mut self, _barejid: &str, plaintext: &str) -> Result<String, EncryptionError> {
            Ok(format!("?OTR:{}", plaintext.chars().rev().collect::<String>()))
        }
        fn decode(&mut self, _barejid: &str, payload: &str) -> Result<Decoded, EncryptionError> {
            Ok(Decoded::Plain(payload.to_string()))
        }
    }

    fn setup() -> (AppContext, LoopbackTransport) {
        let transport = LoopbackTransport::connected(Jid::parse("me@x.org/pc").unwrap());
        let ctx = AppContext::new(Box::new(transport.clone())).with_otr(Rot13);
        (ctx, transport)
    }

    fn sent_bodies(transport: &LoopbackTransport) -> Vec<String> {
        transport
            .sent()
            .into_iter()
            .filter_map(|action| match action {
                OutboundAction::Message { body, .. } => Some(body),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn plain_chat_is_echoed_and_sent() {
        let (mut ctx, transport) = setup();
        assert!(send_chat(&mut ctx, "bob@x.org", "hello"));
        assert_eq!(sent_bodies(&transport), vec!["hello"]);
        let window = ctx.windows.window(&WindowKey::Chat("bob@x.org".into())).unwrap();
        let last = window.buffer.last().unwrap();
        assert_eq!(last.text, "hello");
        assert_eq!(last.show_char, '-');
    }

    #[test]
    fn otr_session_encodes() {
        let (mut ctx, transport) = setup();
        let slot = ctx.ensure_chat("bob@x.org").unwrap();
        ctx.windows
            .get_mut(slot)
            .and_then(|w| w.as_chat_mut())
            .unwrap()
            .encryption
            .start(EncryptionMode::Otr, false)
            .unwrap();
        send_chat(&mut ctx, "bob@x.org", "abc");
        assert_eq!(sent_bodies(&transport), vec!["?OTR:cba"]);
        let window = ctx.windows.get(slot).unwrap();
        assert_eq!(window.buffer.last().unwrap().show_char, '~');
    }

    #[test]
    fn otr_policy_always_blocks_plaintext() {
        let (mut ctx, transport) = setup();
        ctx.prefs.set_string(Pref::OtrPolicy, "always");
        assert!(!send_chat(&mut ctx, "bob@x.org", "secret"));
        assert!(sent_bodies(&transport).is_empty());
    }

    #[test]
    fn pgp_without_engine_reports_unsupported() {
        let (mut ctx, transport) = setup();
        let slot = ctx.ensure_chat("bob@x.org").unwrap();
        ctx.windows
            .get_mut(slot)
            .and_then(|w| w.as_chat_mut())
            .unwrap()
            .encryption
            .start(EncryptionMode::Pgp, false)
            .unwrap();
        assert!(!send_chat(&mut ctx, "bob@x.org", "hi"));
        assert!(sent_bodies(&transport).is_empty());
        let last = ctx.windows.get(slot).unwrap().buffer.last().unwrap().clone();
        assert_eq!(last.theme, Theme::Error);
    }

    #[test]
    fn receipt_request_marks_line() {
        let (mut ctx, _transport) = setup();
        ctx.prefs.set_bool(Pref::ReceiptsRequest, true);
        send_chat(&mut ctx, "bob@x.org", "ping");
        let window = ctx.windows.window(&WindowKey::Chat("bob@x.org".into())).unwrap();
        let receipt = window.buffer.last().unwrap().receipt.clone().unwrap();
        assert!(!receipt.received);
    }

    #[test]
    fn private_to_departed_occupant_is_refused() {
        let (mut ctx, transport) = setup();
        ctx.ensure_private("r@c.x.org/bob").unwrap();
        ctx.windows.private_mut("r@c.x.org/bob").unwrap().occupant_offline = true;
        assert!(!send_private(&mut ctx, "r@c.x.org/bob", "hi"));
        assert!(sent_bodies(&transport).is_empty());
        let window = ctx.windows.window(&WindowKey::Private("r@c.x.org/bob".into())).unwrap();
        assert!(window.buffer.contains_text("bob is no longer present in room"));
    }

    #[test]
    fn room_message_needs_membership() {
        let (mut ctx, transport) = setup();
        assert!(!send_room_message(&mut ctx, "r@c.x.org", "hi"));
        ctx.rooms.join("r@c.x.org", "me", None, false);
        assert!(send_room_message(&mut ctx, "r@c.x.org", "hi"));
        assert_eq!(sent_bodies(&transport), vec!["hi"]);
    }

    #[test]
    fn presence_updates_context() {
        let (mut ctx, _transport) = setup();
        send_presence(&mut ctx, Presence::Away, Some("lunch".into()));
        assert_eq!(ctx.presence, Presence::Away);
        assert!(ctx.windows.console().buffer.contains_text("Status set to away, \"lunch\""));
    }

    #[test]
    fn typing_sends_composing_once() {
        let (mut ctx, transport) = setup();
        ctx.prefs.set_bool(Pref::Outtype, true);
        ctx.prefs.set_bool(Pref::States, true);
        let slot = ctx.ensure_chat("bob@x.org").unwrap();
        ctx.focus(slot);
        let now = Instant::now();
        typing_activity(&mut ctx, now);
        typing_activity(&mut ctx, now);
        let composing = transport
            .sent()
            .into_iter()
            .filter(|a| matches!(a, OutboundAction::ChatState { state: ChatState::Composing, .. }))
            .count();
        assert_eq!(composing, 1);
    }
}
