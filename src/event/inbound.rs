//! Connection, one-to-one, presence and engine events.

use std::time::Instant;

use chrono::{DateTime, Local};

use crate::constants::CONSOLE_SLOT;
use crate::context::{AppContext, OutputPolicy};
use crate::encryption::{Decoded, EncryptionMode};
use crate::jid::Jid;
use crate::notify::Notification;
use crate::prefs::Pref;
use crate::protocol::{
    ChatMessage, EncryptionEvent, InboundEvent, OutboundAction, SubscriptionKind, TraceDirection,
};
use crate::roster::{Presence, Resource};
use crate::session::ChatState;
use crate::theme::Theme;
use crate::window::{BufferLine, Window, WindowKey, display_slot};

pub fn handle(ctx: &mut AppContext, event: InboundEvent) {
    match event {
        InboundEvent::LoginSuccess { jid } => login_success(ctx, &jid),
        InboundEvent::LoginFailed => {
            tracing::info!("login failed");
            ctx.cons_show_error("Login failed.");
        }
        InboundEvent::LostConnection => lost_connection(ctx),
        InboundEvent::Message(message) => incoming_message(ctx, message),
        InboundEvent::CarbonReceived(message) => incoming_carbon(ctx, message),
        InboundEvent::CarbonSent { to, body } => outgoing_carbon(ctx, &to, &body),
        InboundEvent::PrivateMessage { from, body, delay } => {
            incoming_private(ctx, &from, &body, delay)
        }
        InboundEvent::Receipt { from, id } => receipt(ctx, &from, &id),
        InboundEvent::ChatState { from, state } => chat_state(ctx, &from, state),
        InboundEvent::ContactOnline { barejid, resource } => contact_online(ctx, &barejid, resource),
        InboundEvent::ContactOffline {
            barejid,
            resource,
            status,
        } => contact_offline(ctx, &barejid, &resource, status.as_deref()),
        InboundEvent::RosterPush {
            barejid,
            name,
            groups,
            subscription,
            pending_out,
        } => {
            tracing::debug!(%barejid, %subscription, "roster push");
            ctx.roster
                .update(&barejid, name, groups, &subscription, pending_out);
            ctx.state.request_redraw();
        }
        InboundEvent::RosterRemove { barejid } => {
            if ctx.roster.remove(&barejid).is_some() {
                ctx.cons_show(format!("Roster item removed: {barejid}"));
            }
        }
        InboundEvent::Subscription { from, kind } => subscription(ctx, &from, kind),
        InboundEvent::Invite {
            from,
            room,
            reason,
            password,
        } => invite(ctx, &from, &room, reason.as_deref(), password),
        InboundEvent::SoftwareVersion {
            from,
            name,
            version,
            os,
        } => software_version(ctx, &from, &name, version.as_deref(), os.as_deref()),
        InboundEvent::DiscoInfo {
            from,
            identities,
            features,
        } => disco_info(ctx, &from, &identities, &features),
        InboundEvent::DiscoItems { from, items } => disco_items(ctx, &from, &items),
        InboundEvent::Error { from, message } => error(ctx, from.as_deref(), &message),
        InboundEvent::Trace { direction, stanza } => trace(ctx, direction, &stanza),
        InboundEvent::Encryption(event) => encryption(ctx, event),
        InboundEvent::Room(event) => super::room::handle(ctx, event),
    }
}

fn login_success(ctx: &mut AppContext, jid: &Jid) {
    tracing::info!(%jid, "logged in");
    let presence = ctx.presence;
    ctx.cons_show(format!("{} logged in successfully, {presence}", jid.barejid()));
    let status = ctx.status.clone();
    ctx.send(OutboundAction::Presence {
        presence,
        status,
        idle_secs: 0,
    });

    // rooms with passwords survive a lost connection; rejoin them
    let rejoin: Vec<(String, String, Option<String>)> = ctx
        .rooms
        .rooms()
        .filter(|room| room.password.is_some())
        .map(|room| (room.roomjid.clone(), room.nick.clone(), room.password.clone()))
        .collect();
    for (room, nick, password) in rejoin {
        ctx.send(OutboundAction::JoinRoom {
            room,
            nick,
            password,
        });
    }
}

fn lost_connection(ctx: &mut AppContext) {
    tracing::warn!("lost connection");
    ctx.cons_show_error("Lost connection.");
    let slots: Vec<usize> = ctx
        .windows
        .iter()
        .filter(|(_, window)| {
            matches!(
                window.key(),
                WindowKey::Chat(_) | WindowKey::Private(_) | WindowKey::Room(_)
            )
        })
        .map(|(slot, _)| slot)
        .collect();
    for slot in slots {
        ctx.win_show(slot, '-', Theme::Error, "Lost connection.");
    }
    ctx.clear_connection_state();
}

/// Renders a one-to-one message into its chat window, applying the
/// focused/unfocused policy and notifications.
fn show_incoming(
    ctx: &mut AppContext,
    slot: usize,
    barejid: &str,
    resource: Option<&str>,
    text: &str,
    delay: Option<DateTime<Local>>,
    mode: EncryptionMode,
) {
    let display = ctx.msg_display_name(barejid, resource);
    let show_char = if mode == EncryptionMode::None { '-' } else { '~' };
    let mut line = BufferLine::new(show_char, Theme::TextThem, text).from(display.clone());
    if let Some(time) = delay {
        line = line.at(time);
    }

    let is_current = ctx.windows.current() == slot;
    if is_current {
        if let Some(chat) = ctx.windows.get_mut(slot).and_then(Window::as_chat_mut) {
            chat.typing = false;
        }
        ctx.print(slot, line);
    } else {
        ctx.cons_show(format!("<< incoming from {display} ({})", display_slot(slot)));
        if ctx.prefs.get_bool(Pref::Flash) {
            ctx.notifier.flash();
        }
        if let Some(window) = ctx.windows.get_mut(slot) {
            window.mark_unread();
        }
        ctx.show_history(slot, barejid);
        ctx.print(slot, line);
    }

    if ctx.prefs.get_bool(Pref::Beep) {
        ctx.notifier.beep();
    }
    notify_message(ctx, slot, is_current, display, text);
}

fn notify_message(ctx: &mut AppContext, slot: usize, is_current: bool, from: String, text: &str) {
    if !ctx.prefs.get_bool(Pref::NotifyMessage) {
        return;
    }
    if is_current && !ctx.prefs.get_bool(Pref::NotifyMessageCurrent) {
        return;
    }
    let text = ctx
        .prefs
        .get_bool(Pref::NotifyMessageText)
        .then(|| text.to_string());
    ctx.notifier.notify(Notification::Message {
        from,
        slot: display_slot(slot),
        text,
    });
}

fn incoming_message(ctx: &mut AppContext, message: ChatMessage) {
    let barejid = message.from.barejid();
    let resource = message.from.resource().map(str::to_string);
    let Some(slot) = ctx.ensure_chat(&barejid) else {
        return;
    };

    if let Some(res) = resource.as_deref() {
        ctx.sessions.on_message(&barejid, res, true);
    }
    if message.receipt_requested
        && ctx.prefs.get_bool(Pref::ReceiptsSend)
        && let Some(id) = message.id.clone()
    {
        ctx.send(OutboundAction::Receipt {
            to: message.from.to_string(),
            id,
        });
    }

    let now = message.delay.unwrap_or_else(Local::now);
    let mode = ctx
        .windows
        .chat(&barejid)
        .map(|chat| chat.encryption.mode())
        .unwrap_or_default();

    match (&message.encrypted, mode) {
        (Some(_), EncryptionMode::Otr) => {
            ctx.win_show(
                slot,
                '-',
                Theme::Text,
                "PGP encrypted message received whilst in OTR session.",
            );
        }
        (Some(payload), _) => match ctx.pgp.decode(&barejid, payload) {
            Ok(Decoded::Decrypted(text)) => {
                if mode == EncryptionMode::None {
                    if let Some(chat) = ctx.windows.chat_mut(&barejid)
                        && let Err(conflict) = chat.encryption.start(EncryptionMode::Pgp, false)
                    {
                        tracing::warn!(%conflict, %barejid, "could not enter PGP mode");
                    }
                    ctx.win_show(slot, '-', Theme::Text, "PGP encryption enabled.");
                }
                show_incoming(ctx, slot, &barejid, resource.as_deref(), &text, message.delay, EncryptionMode::Pgp);
                ctx.log_chat(&barejid, &barejid, &text, EncryptionMode::Pgp, now);
            }
            Ok(Decoded::Plain(_) | Decoded::Internal) | Err(_) => {
                end_pgp(ctx, &barejid);
                show_incoming(ctx, slot, &barejid, resource.as_deref(), &message.body, message.delay, EncryptionMode::None);
                ctx.log_chat(&barejid, &barejid, &message.body, EncryptionMode::None, now);
            }
        },
        (None, EncryptionMode::Pgp) => {
            ctx.win_show(slot, '-', Theme::Text, "PGP encryption disabled.");
            end_pgp(ctx, &barejid);
            show_incoming(ctx, slot, &barejid, resource.as_deref(), &message.body, message.delay, EncryptionMode::None);
            ctx.log_chat(&barejid, &barejid, &message.body, EncryptionMode::None, now);
        }
        (None, _) => match ctx.otr.decode(&barejid, &message.body) {
            Ok(Decoded::Plain(text)) => {
                show_incoming(ctx, slot, &barejid, resource.as_deref(), &text, message.delay, EncryptionMode::None);
                ctx.log_chat(&barejid, &barejid, &text, EncryptionMode::None, now);
            }
            Ok(Decoded::Decrypted(text)) => {
                show_incoming(ctx, slot, &barejid, resource.as_deref(), &text, message.delay, EncryptionMode::Otr);
                ctx.log_chat(&barejid, &barejid, &text, EncryptionMode::Otr, now);
            }
            Ok(Decoded::Internal) => {
                tracing::debug!(%barejid, "engine-internal message");
            }
            Err(err) => {
                tracing::warn!(%err, %barejid, "could not decode message");
                ctx.win_show(slot, '!', Theme::Error, format!("Could not decode message: {err}"));
            }
        },
    }
}

fn end_pgp(ctx: &mut AppContext, barejid: &str) {
    if let Some(chat) = ctx.windows.chat_mut(barejid)
        && chat.encryption.mode() == EncryptionMode::Pgp
    {
        // mode was just checked, so this cannot conflict
        let _ = chat.encryption.end(EncryptionMode::Pgp);
    }
}

fn incoming_carbon(ctx: &mut AppContext, message: ChatMessage) {
    let barejid = message.from.barejid();
    let Some(slot) = ctx.ensure_chat(&barejid) else {
        return;
    };
    show_incoming(
        ctx,
        slot,
        &barejid,
        message.from.resource(),
        &message.body,
        message.delay,
        EncryptionMode::None,
    );
    let now = message.delay.unwrap_or_else(Local::now);
    ctx.log_chat(&barejid, &barejid, &message.body, EncryptionMode::None, now);
}

fn outgoing_carbon(ctx: &mut AppContext, to: &str, body: &str) {
    let barejid = match Jid::parse(to) {
        Ok(jid) => jid.barejid(),
        Err(err) => {
            tracing::warn!(%err, to, "carbon for invalid address");
            return;
        }
    };
    let Some(slot) = ctx.ensure_chat(&barejid) else {
        return;
    };
    if let Some(chat) = ctx.windows.chat_mut(&barejid) {
        chat.state.active(Instant::now());
    }
    ctx.print(slot, BufferLine::new('-', Theme::TextMe, body).from("me"));
    ctx.log_chat(&barejid, "me", body, EncryptionMode::None, Local::now());
}

fn incoming_private(
    ctx: &mut AppContext,
    from: &Jid,
    body: &str,
    delay: Option<DateTime<Local>>,
) {
    let (Some(fulljid), Some(nick)) = (from.fulljid(), from.resource()) else {
        tracing::warn!(%from, "private message without occupant nick");
        return;
    };
    let Some(slot) = ctx.ensure_private(&fulljid) else {
        return;
    };
    let mut line = BufferLine::new('-', Theme::TextThem, body).from(nick);
    if let Some(time) = delay {
        line = line.at(time);
    }

    let is_current = ctx.windows.current() == slot;
    if is_current {
        ctx.print(slot, line);
    } else {
        if let Some(window) = ctx.windows.get_mut(slot) {
            window.mark_unread();
        }
        ctx.cons_show(format!("<< incoming from {nick} ({})", display_slot(slot)));
        ctx.print(slot, line);
        if ctx.prefs.get_bool(Pref::Flash) {
            ctx.notifier.flash();
        }
    }
    if ctx.prefs.get_bool(Pref::Beep) {
        ctx.notifier.beep();
    }
    notify_message(ctx, slot, is_current, nick.to_string(), body);
}

fn receipt(ctx: &mut AppContext, from: &str, id: &str) {
    let barejid = Jid::parse(from).map(|jid| jid.barejid()).unwrap_or_else(|_| from.to_string());
    let Some(window) = ctx.windows.window_mut(&WindowKey::Chat(barejid.clone())) else {
        tracing::debug!(%barejid, id, "receipt for closed chat");
        return;
    };
    if window.buffer.mark_received(id) {
        ctx.state.request_redraw();
    } else {
        tracing::debug!(%barejid, id, "receipt for unknown message");
    }
}

fn chat_state(ctx: &mut AppContext, from: &Jid, state: ChatState) {
    let barejid = from.barejid();
    let resource = from.resource();
    let window_open = ctx.windows.chat(&barejid).is_some();

    match state {
        ChatState::Composing => contact_typing(ctx, &barejid, resource),
        ChatState::Gone => {
            if window_open && !ctx.sessions.is_other_resource(&barejid, resource) && resource.is_some() {
                let name = ctx.roster.display_name(&barejid);
                if let Some(slot) = ctx.windows.lookup(&WindowKey::Chat(barejid.clone())) {
                    ctx.win_show(slot, '!', Theme::Gone, format!("<- {name} has left the conversation."));
                }
            }
        }
        ChatState::Active | ChatState::Paused | ChatState::Inactive => {}
    }

    if state != ChatState::Composing
        && let Some(chat) = ctx.windows.chat_mut(&barejid)
        && chat.typing
    {
        chat.typing = false;
        ctx.state.request_redraw();
    }

    if window_open {
        ctx.sessions.set_recipient_state(&barejid, resource, state);
    }
}

fn contact_typing(ctx: &mut AppContext, barejid: &str, resource: Option<&str>) {
    let slot = ctx.windows.lookup(&WindowKey::Chat(barejid.to_string()));
    let is_current = slot.is_some_and(|slot| slot == ctx.windows.current());
    let name = ctx.roster.display_name(barejid);

    if ctx.prefs.get_bool(Pref::Intype) {
        if !is_current {
            ctx.win_show(CONSOLE_SLOT, '!', Theme::Typing, format!("!! {name} is typing a message..."));
        } else if ctx
            .sessions
            .get(barejid)
            .is_none_or(|session| resource.is_none_or(|res| session.resource == res))
            && let Some(chat) = ctx.windows.chat_mut(barejid)
        {
            chat.typing = true;
            ctx.state.request_redraw();
        }
    }

    if ctx.prefs.get_bool(Pref::NotifyTyping)
        && (!is_current || ctx.prefs.get_bool(Pref::NotifyTypingCurrent))
    {
        ctx.notifier.notify(Notification::Typing { from: name });
    }
}

fn presence_theme(presence: Presence) -> Theme {
    match presence {
        Presence::Online | Presence::Chat => Theme::Online,
        Presence::Away | Presence::Xa | Presence::Dnd => Theme::Away,
    }
}

/// `"name (resource)"` when the contact has a roster name.
fn contact_display(ctx: &AppContext, barejid: &str, resource: &str) -> String {
    match ctx.roster.get(barejid).and_then(|c| c.name.as_deref()) {
        Some(name) => format!("{name} ({resource})"),
        None => format!("{barejid} ({resource})"),
    }
}

fn status_suffix(status: Option<&str>) -> String {
    status.map(|s| format!(", \"{s}\"")).unwrap_or_default()
}

fn subscribed(ctx: &AppContext, barejid: &str) -> bool {
    ctx.roster
        .get(barejid)
        .is_some_and(|contact| contact.subscription != "none")
}

fn contact_online(ctx: &mut AppContext, barejid: &str, resource: Resource) {
    let updated = ctx.roster.resource_online(barejid, resource.clone());
    if updated && subscribed(ctx, barejid) {
        let text = format!(
            "++ {} is {}{}",
            contact_display(ctx, barejid, &resource.name),
            resource.presence,
            status_suffix(resource.status.as_deref())
        );
        let theme = presence_theme(resource.presence);
        let online = resource.presence == Presence::Online;

        let console = ctx.prefs.get_string(Pref::StatusesConsole);
        if console == "all" || (console == "online" && online) {
            ctx.win_show(CONSOLE_SLOT, '-', theme, text.clone());
        }
        let chat = ctx.prefs.get_string(Pref::StatusesChat);
        if (chat == "all" || (chat == "online" && online))
            && let Some(slot) = ctx.windows.lookup(&WindowKey::Chat(barejid.to_string()))
        {
            ctx.win_show(slot, '-', theme, text);
        }
    }
    ctx.sessions.remove(barejid);
    ctx.state.request_redraw();
}

fn contact_offline(ctx: &mut AppContext, barejid: &str, resource: &str, status: Option<&str>) {
    let updated = ctx.roster.resource_offline(barejid, resource);
    if updated && subscribed(ctx, barejid) {
        let text = format!(
            "-- {} is offline{}",
            contact_display(ctx, barejid, resource),
            status_suffix(status)
        );
        let console = ctx.prefs.get_string(Pref::StatusesConsole);
        if console == "all" || console == "online" {
            ctx.win_show(CONSOLE_SLOT, '-', Theme::Offline, text.clone());
        }
        let chat = ctx.prefs.get_string(Pref::StatusesChat);
        if (chat == "all" || chat == "online")
            && let Some(slot) = ctx.windows.lookup(&WindowKey::Chat(barejid.to_string()))
        {
            ctx.win_show(slot, '-', Theme::Offline, text);
        }
    }

    if let Some(chat) = ctx.windows.chat_mut(barejid)
        && chat.resource_override.as_deref() == Some(resource)
    {
        chat.resource_override = None;
    }
    ctx.sessions.remove(barejid);
    ctx.state.request_redraw();
}

/// Prints `*<barejid> <message>` in the contact's chat window, opening one if
/// needed and falling back to the console when no window can be opened.
fn system_msg_from_recipient(ctx: &mut AppContext, barejid: &str, message: &str) {
    let slot = ctx.ensure_chat(barejid).unwrap_or(CONSOLE_SLOT);
    ctx.win_show(slot, '-', Theme::Text, format!("*{barejid} {message}"));
}

fn subscription(ctx: &mut AppContext, from: &str, kind: SubscriptionKind) {
    match kind {
        SubscriptionKind::Subscribe => {
            tracing::info!(from, "authorization request");
            ctx.cons_show(format!("Received authorization request from {from}"));
            system_msg_from_recipient(
                ctx,
                from,
                "Authorization request, type '/sub allow' to accept or '/sub deny' to reject",
            );
            if ctx.prefs.get_bool(Pref::NotifySub) {
                ctx.notifier.notify(Notification::Subscription {
                    from: from.to_string(),
                });
            }
        }
        SubscriptionKind::Subscribed => {
            tracing::info!(from, "subscription received");
            ctx.win_show(CONSOLE_SLOT, '-', Theme::Subscribed, format!("Subscription received from {from}"));
            system_msg_from_recipient(ctx, from, "Subscribed");
        }
        SubscriptionKind::Unsubscribed => {
            tracing::info!(from, "subscription deleted");
            ctx.win_show(CONSOLE_SLOT, '-', Theme::Unsubscribed, format!("{from} deleted subscription"));
            system_msg_from_recipient(ctx, from, "Unsubscribed");
        }
    }
}

fn invite(
    ctx: &mut AppContext,
    from: &str,
    room: &str,
    reason: Option<&str>,
    password: Option<String>,
) {
    if ctx.rooms.is_active(room) || ctx.rooms.invites().any(|r| r == room) {
        tracing::debug!(room, "duplicate invite ignored");
        return;
    }
    let inviter = Jid::parse(from)
        .map(|jid| ctx.roster.display_name(&jid.barejid()))
        .unwrap_or_else(|_| from.to_string());
    ctx.cons_show("");
    ctx.cons_show(format!("{inviter} has invited you to join {room}"));
    if let Some(reason) = reason {
        ctx.cons_show(format!("Reason: {reason}"));
    }
    ctx.cons_show(format!("Use '/join {room}' to accept the invitation"));
    if ctx.prefs.get_bool(Pref::NotifyInvite) {
        ctx.notifier.notify(Notification::Invite {
            from: inviter,
            room: room.to_string(),
        });
    }
    ctx.rooms.add_invite(room, password);
}

fn software_version(
    ctx: &mut AppContext,
    from: &Jid,
    name: &str,
    version: Option<&str>,
    os: Option<&str>,
) {
    let slot = ctx.output_window(from, OutputPolicy::Focused);
    ctx.win_show(slot, '-', Theme::Text, "");
    ctx.win_show(slot, '-', Theme::Online, format!("{from}:"));
    ctx.win_show(slot, '-', Theme::Text, format!("Name    : {name}"));
    if let Some(version) = version {
        ctx.win_show(slot, '-', Theme::Text, format!("Version : {version}"));
    }
    if let Some(os) = os {
        ctx.win_show(slot, '-', Theme::Text, format!("OS      : {os}"));
    }
}

fn disco_info(ctx: &mut AppContext, from: &str, identities: &[String], features: &[String]) {
    if identities.is_empty() && features.is_empty() {
        ctx.cons_show(format!("No service discovery information for {from}"));
        return;
    }
    ctx.cons_show("");
    ctx.cons_show(format!("Service discovery info for {from}"));
    if !identities.is_empty() {
        ctx.cons_show("  Identities");
        for identity in identities {
            ctx.cons_show(format!("    {identity}"));
        }
    }
    if !features.is_empty() {
        ctx.cons_show("  Features:");
        for feature in features {
            ctx.cons_show(format!("    {feature}"));
        }
    }
}

fn disco_items(ctx: &mut AppContext, from: &str, items: &[(String, Option<String>)]) {
    if items.is_empty() {
        ctx.cons_show(format!("No service discovery items for {from}"));
        return;
    }
    ctx.cons_show("");
    ctx.cons_show(format!("Service discovery items for {from}:"));
    for (jid, name) in items {
        match name {
            Some(name) => ctx.cons_show(format!("  {jid}, {name}")),
            None => ctx.cons_show(format!("  {jid}")),
        }
    }
}

fn error(ctx: &mut AppContext, from: Option<&str>, message: &str) {
    let Some(from) = from else {
        tracing::warn!(message, "error stanza");
        ctx.cons_show_error(format!("Error {message}"));
        return;
    };
    tracing::warn!(from, message, "error from recipient");
    let text = format!("Error from {from}: {message}");
    ctx.cons_show_error(text.clone());
    if let Ok(jid) = Jid::parse(from) {
        let slot = ctx.output_window(&jid, OutputPolicy::AnyOpen);
        if slot != CONSOLE_SLOT {
            ctx.win_show(slot, '!', Theme::Error, text);
        }
    }
}

fn trace(ctx: &mut AppContext, direction: TraceDirection, stanza: &str) {
    let Some(slot) = ctx.windows.lookup(&WindowKey::ProtocolTrace) else {
        return;
    };
    let theme = match direction {
        TraceDirection::Sent => Theme::Online,
        TraceDirection::Received => Theme::Away,
    };
    ctx.win_show(slot, '-', Theme::Text, direction.to_string());
    ctx.win_show(slot, '-', theme, stanza);
    ctx.win_show(slot, '-', theme, "");
}

fn encryption(ctx: &mut AppContext, event: EncryptionEvent) {
    match event {
        EncryptionEvent::Secured { barejid, trusted } => {
            let Some(slot) = ctx.ensure_chat(&barejid) else {
                return;
            };
            let started = match ctx.windows.chat_mut(&barejid) {
                Some(chat) => chat.encryption.start(EncryptionMode::Otr, trusted),
                None => return,
            };
            if let Err(conflict) = started {
                tracing::warn!(%conflict, %barejid, "OTR session refused");
                ctx.win_show(slot, '!', Theme::Error, conflict.to_string());
                return;
            }
            if trusted {
                ctx.win_show(slot, '!', Theme::OtrTrusted, "OTR session started (trusted).");
            } else {
                ctx.win_show(slot, '!', Theme::OtrUntrusted, "OTR session started (untrusted).");
            }
            if ctx.windows.current() != slot {
                ctx.cons_show(format!("{barejid} started an OTR session ({}).", display_slot(slot)));
            }
        }
        EncryptionEvent::Insecure { barejid } => {
            let Some(slot) = chat_slot(ctx, &barejid) else {
                return;
            };
            if let Some(chat) = ctx.windows.chat_mut(&barejid)
                && let Err(conflict) = chat.encryption.end(EncryptionMode::Otr)
            {
                tracing::debug!(%conflict, %barejid, "OTR end without session");
            }
            ctx.win_show(slot, '!', Theme::OtrEnded, "OTR session ended.");
        }
        EncryptionEvent::Trusted { barejid } => set_trust(ctx, &barejid, true),
        EncryptionEvent::Untrusted { barejid } => set_trust(ctx, &barejid, false),
        EncryptionEvent::SmpRequested { barejid, question } => {
            let Some(slot) = chat_slot(ctx, &barejid) else {
                return;
            };
            match question {
                None => ctx.win_show(
                    slot,
                    '!',
                    Theme::Text,
                    format!("{barejid} wants to authenticate your identity, use '/otr secret <secret>'."),
                ),
                Some(question) => {
                    ctx.win_show(
                        slot,
                        '!',
                        Theme::Text,
                        format!("{barejid} wants to authenticate your identity with the following question:"),
                    );
                    ctx.win_show(slot, '!', Theme::Text, format!("  {question}"));
                    ctx.win_show(slot, '!', Theme::Text, "use '/otr answer <answer>'.");
                }
            }
        }
        EncryptionEvent::SmpSucceeded { barejid } => {
            if let Some(slot) = chat_slot(ctx, &barejid) {
                ctx.win_show(slot, '!', Theme::Text, "Authentication successful.");
            }
        }
        EncryptionEvent::SmpFailed { barejid } => {
            if let Some(slot) = chat_slot(ctx, &barejid) {
                ctx.win_show(
                    slot,
                    '!',
                    Theme::Text,
                    format!(
                        "Authentication failed, the secret you entered does not match the secret entered by {barejid}."
                    ),
                );
            }
        }
        EncryptionEvent::SmpAborted { barejid } => {
            if let Some(slot) = chat_slot(ctx, &barejid) {
                ctx.win_show(slot, '!', Theme::Text, "SMP session aborted.");
            }
        }
    }
}

fn chat_slot(ctx: &AppContext, barejid: &str) -> Option<usize> {
    let slot = ctx.windows.lookup(&WindowKey::Chat(barejid.to_string()));
    if slot.is_none() {
        tracing::warn!(barejid, "encryption event for closed chat");
    }
    slot
}

fn set_trust(ctx: &mut AppContext, barejid: &str, trusted: bool) {
    let Some(slot) = chat_slot(ctx, barejid) else {
        return;
    };
    let updated = ctx
        .windows
        .chat_mut(barejid)
        .is_some_and(|chat| chat.encryption.mode() == EncryptionMode::Otr && chat.encryption.set_trusted(trusted));
    if !updated {
        tracing::warn!(barejid, trusted, "trust change without OTR session");
        return;
    }
    if trusted {
        ctx.win_show(slot, '!', Theme::OtrTrusted, "OTR session trusted.");
    } else {
        ctx.win_show(slot, '!', Theme::OtrUntrusted, "OTR session untrusted.");
    }
}
