use std::cell::RefCell;
use std::rc::Rc;

use term_chat::command::process_input;
use term_chat::context::AppContext;
use term_chat::encryption::{Decoded, EncryptionEngine, EncryptionMode, StartOutcome};
use term_chat::error::EncryptionError;
use term_chat::event::drain_transport;
use term_chat::event_loop::ControlFlow;
use term_chat::jid::Jid;
use term_chat::notify::{Notification, Notifier};
use term_chat::prefs::{MemoryPreferences, Pref, PrefValue};
use term_chat::protocol::{
    ChatMessage, EncryptionEvent, InboundEvent, LoopbackTransport, OutboundAction,
};
use term_chat::window::WindowKey;

#[derive(Clone, Default)]
struct RecordingNotifier {
    seen: Rc<RefCell<Vec<Notification>>>,
    beeps: Rc<RefCell<usize>>,
}

impl Notifier for RecordingNotifier {
    fn beep(&mut self) {
        *self.beeps.borrow_mut() += 1;
    }

    fn flash(&mut self) {}

    fn notify(&mut self, notification: Notification) {
        self.seen.borrow_mut().push(notification);
    }
}

/// OTR double that negotiates instantly and wraps bodies in brackets.
struct BracketOtr;

impl EncryptionEngine for BracketOtr {
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
        Ok(format!("[{plaintext}]"))
    }

    fn decode(&mut self, _barejid: &str, payload: &str) -> Result<Decoded, EncryptionError> {
        Ok(match payload.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
            Some(inner) => Decoded::Decrypted(inner.to_string()),
            None => Decoded::Plain(payload.to_string()),
        })
    }
}

fn me() -> Jid {
    Jid::parse("me@x.org/pc").unwrap()
}

fn online() -> (AppContext, LoopbackTransport) {
    let transport = LoopbackTransport::connected(me());
    let ctx = AppContext::new(Box::new(transport.clone()));
    (ctx, transport)
}

fn run(ctx: &mut AppContext, line: &str) -> ControlFlow {
    let flow = process_input(ctx, line);
    drain_transport(ctx);
    flow
}

fn console_has(ctx: &AppContext, text: &str) -> bool {
    ctx.windows.console().buffer.contains_text(text)
}

#[test]
fn connect_and_disconnect() {
    let transport = LoopbackTransport::new();
    let mut ctx = AppContext::new(Box::new(transport.clone())).with_account(me());
    run(&mut ctx, "/connect");
    assert!(ctx.connected());
    assert!(console_has(&ctx, "me@x.org logged in successfully, online"));

    let chat = ctx.ensure_chat("bob@x.org").unwrap();
    run(&mut ctx, "/disconnect");
    assert!(!ctx.connected());
    assert!(console_has(&ctx, "logged out successfully."));
    // windows survive a logout
    assert!(ctx.windows.get(chat).is_some());
}

#[test]
fn unread_counts_follow_focus() {
    let (mut ctx, transport) = online();
    let slot = ctx.ensure_chat("bob@x.org").unwrap();
    for body in ["one", "two", "three"] {
        transport.push(InboundEvent::Message(ChatMessage::new(
            Jid::parse("bob@x.org/phone").unwrap(),
            body,
        )));
    }
    drain_transport(&mut ctx);
    assert_eq!(ctx.windows.get(slot).unwrap().unread_count(), 3);
    assert_eq!(ctx.windows.total_unread(), 3);

    run(&mut ctx, "/win 2");
    assert_eq!(ctx.windows.current(), slot);
    assert_eq!(ctx.windows.get(slot).unwrap().unread_count(), 0);

    // focused window does not count new lines
    transport.push(InboundEvent::Message(ChatMessage::new(
        Jid::parse("bob@x.org/phone").unwrap(),
        "four",
    )));
    drain_transport(&mut ctx);
    assert_eq!(ctx.windows.get(slot).unwrap().unread_count(), 0);
}

#[test]
fn message_notifies_when_unfocused() {
    let notifier = RecordingNotifier::default();
    let transport = LoopbackTransport::connected(me());
    let prefs = MemoryPreferences::with_overrides([(Pref::Beep, PrefValue::Bool(true))]);
    let mut ctx = AppContext::new(Box::new(transport.clone()))
        .with_prefs(prefs)
        .with_notifier(notifier.clone());
    transport.push(InboundEvent::Message(ChatMessage::new(
        Jid::parse("carol@x.org/tab").unwrap(),
        "ping",
    )));
    drain_transport(&mut ctx);
    assert!(ctx.windows.chat("carol@x.org").is_some());
    assert_eq!(*notifier.beeps.borrow(), 1);
    assert!(
        notifier
            .seen
            .borrow()
            .iter()
            .any(|n| matches!(n, Notification::Message { from, .. } if from.contains("carol")))
    );
}

#[test]
fn locked_room_prompts_once_and_accept_keeps_window() {
    let (mut ctx, transport) = online();
    transport.lock_room("lounge@conference.x.org");
    run(&mut ctx, "/join lounge");
    let slot = ctx
        .windows
        .lookup(&WindowKey::Room("lounge@conference.x.org".into()))
        .unwrap();
    let prompts = ctx
        .windows
        .get(slot)
        .unwrap()
        .buffer
        .lines()
        .filter(|l| l.text.contains("Room locked, requires configuration."))
        .count();
    assert_eq!(prompts, 1);

    ctx.focus(slot);
    run(&mut ctx, "/room accept");
    let room = ctx.rooms.get("lounge@conference.x.org").unwrap();
    assert!(!room.requires_config());
    assert!(ctx.windows.get(slot).is_some());
}

#[test]
fn modified_form_refuses_close_until_cancelled() {
    let (mut ctx, transport) = online();
    run(&mut ctx, "/join lounge@conference.x.org");
    let room = ctx
        .windows
        .lookup(&WindowKey::Room("lounge@conference.x.org".into()))
        .unwrap();
    ctx.focus(room);
    run(&mut ctx, "/room config");
    let conf = ctx
        .windows
        .lookup(&WindowKey::RoomConfig("lounge@conference.x.org".into()))
        .unwrap();
    assert_eq!(ctx.windows.current(), conf);

    run(&mut ctx, "/field1 hideout");
    run(&mut ctx, &format!("/close {conf}"));
    assert!(ctx.windows.get(conf).is_some());
    assert!(
        ctx.windows
            .get(conf)
            .unwrap()
            .buffer
            .contains_text("You have unsaved changes, use /form submit or /form cancel")
    );

    run(&mut ctx, "/form cancel");
    assert!(ctx.windows.get(conf).is_none());
    assert_eq!(ctx.windows.current(), room);
    assert!(transport.sent().contains(&OutboundAction::CancelRoomConfig {
        room: "lounge@conference.x.org".into()
    }));
}

#[test]
fn otr_session_round_trip() {
    let (ctx, transport) = online();
    let mut ctx = ctx.with_otr(BracketOtr);
    run(&mut ctx, "/msg bob@x.org");
    run(&mut ctx, "/otr start");
    let chat = ctx.windows.chat("bob@x.org").unwrap();
    assert_eq!(chat.encryption.mode(), EncryptionMode::Otr);

    transport.take_sent();
    run(&mut ctx, "secret plans");
    assert!(transport.sent().iter().any(|a| matches!(
        a,
        OutboundAction::Message { body, .. } if body == "[secret plans]"
    )));

    // PGP cannot start over an OTR session
    run(&mut ctx, "/pgp start");
    assert_eq!(
        ctx.windows.chat("bob@x.org").unwrap().encryption.mode(),
        EncryptionMode::Otr
    );

    transport.push(InboundEvent::Message(ChatMessage::new(
        Jid::parse("bob@x.org/phone").unwrap(),
        "[reply]",
    )));
    drain_transport(&mut ctx);
    let slot = ctx.windows.lookup(&WindowKey::Chat("bob@x.org".into())).unwrap();
    assert!(ctx.windows.get(slot).unwrap().buffer.contains_text("reply"));

    transport.push(InboundEvent::Encryption(EncryptionEvent::Insecure {
        barejid: "bob@x.org".into(),
    }));
    drain_transport(&mut ctx);
    assert_eq!(
        ctx.windows.chat("bob@x.org").unwrap().encryption.mode(),
        EncryptionMode::None
    );
}

#[test]
fn swap_with_empty_slot_is_refused() {
    let (mut ctx, _transport) = online();
    ctx.ensure_chat("a@x.org").unwrap();
    ctx.ensure_chat("b@x.org").unwrap();
    let before: Vec<_> = ctx.windows.iter().map(|(s, w)| (s, w.key())).collect();
    run(&mut ctx, "/wins swap 3 7");
    let after: Vec<_> = ctx.windows.iter().map(|(s, w)| (s, w.key())).collect();
    assert_eq!(before, after);
}

#[test]
fn quit_is_the_only_exit() {
    let (mut ctx, _transport) = online();
    assert_eq!(run(&mut ctx, "/nosuchcommand"), ControlFlow::Continue);
    assert_eq!(run(&mut ctx, "/close 1"), ControlFlow::Continue);
    assert_eq!(run(&mut ctx, "/quit"), ControlFlow::Quit);
}
