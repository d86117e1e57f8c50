//! Room events: our own and other occupants' presence, room messages, and
//! configuration round trips.

use chrono::{DateTime, Local};
use indoc::indoc;

use crate::command::form::show_form;
use crate::constants::CONSOLE_SLOT;
use crate::context::AppContext;
use crate::jid::Jid;
use crate::muc::{Affiliation, OccupantUpdate, PrivilegeChange, Role, RosterChange};
use crate::notify::Notification;
use crate::prefs::Pref;
use crate::protocol::{OutboundAction, RoomEvent};
use crate::theme::Theme;
use crate::window::{
    BufferLine, DataForm, RoomConfigWindow, WindowKey, WindowPayload, display_slot,
};

const REQUIRES_CONFIG: &str = indoc! {"
    Room locked, requires configuration.
    Use '/room accept' to accept the defaults
    Use '/room destroy' to cancel and destroy the room
    Use '/room config' to edit the room configuration
"};

pub fn handle(ctx: &mut AppContext, event: RoomEvent) {
    match event {
        RoomEvent::SelfPresence {
            room,
            nick,
            role,
            affiliation,
            config_required,
            actor,
            reason,
        } => self_presence(
            ctx,
            &room,
            &nick,
            role,
            affiliation,
            config_required,
            actor.as_deref(),
            reason.as_deref(),
        ),
        RoomEvent::OccupantPresence {
            room,
            nick,
            update,
            actor,
            reason,
        } => occupant_presence(ctx, &room, &nick, update, actor.as_deref(), reason.as_deref()),
        RoomEvent::OccupantNickChange {
            room,
            old_nick,
            new_nick,
        } => match ctx.rooms.get_mut(&room) {
            Some(state) => state.occupant_nick_change_start(&old_nick, &new_nick),
            None => tracing::warn!(%room, %old_nick, "nick change for unknown room"),
        },
        RoomEvent::OccupantOffline { room, nick } => occupant_offline(ctx, &room, &nick),
        RoomEvent::OccupantKicked {
            room,
            nick,
            actor,
            reason,
        } => occupant_removed(ctx, &room, &nick, "kicked", actor.as_deref(), reason.as_deref()),
        RoomEvent::OccupantBanned {
            room,
            nick,
            actor,
            reason,
        } => occupant_removed(ctx, &room, &nick, "banned", actor.as_deref(), reason.as_deref()),
        RoomEvent::SelfKicked { room, actor, reason } => {
            self_removed(ctx, &room, "Kicked", actor.as_deref(), reason.as_deref())
        }
        RoomEvent::SelfBanned { room, actor, reason } => {
            self_removed(ctx, &room, "Banned", actor.as_deref(), reason.as_deref())
        }
        RoomEvent::Destroyed {
            room,
            reason,
            new_room,
            password,
        } => destroyed(ctx, &room, reason.as_deref(), new_room.as_deref(), password.as_deref()),
        RoomEvent::Subject {
            room,
            nick,
            subject,
        } => subject_changed(ctx, &room, nick, subject),
        RoomEvent::Broadcast { room, message } => broadcast(ctx, &room, message),
        RoomEvent::History {
            room,
            nick,
            time,
            message,
        } => history(ctx, &room, &nick, time, &message),
        RoomEvent::Message {
            room,
            nick,
            message,
        } => room_message(ctx, &room, &nick, &message),
        RoomEvent::JoinError { room, error } => {
            tracing::warn!(%room, %error, "room join failed");
            ctx.rooms.leave(&room);
            ctx.cons_show_error(format!("Error joining room {room}, reason: {error}"));
        }
        RoomEvent::Info {
            room,
            identities,
            features,
        } => room_info(ctx, &room, &identities, &features),
        RoomEvent::ConfigForm { room, form } => config_form(ctx, &room, form),
        RoomEvent::ConfigFormError { room, message } => {
            let slot = ctx
                .windows
                .lookup(&WindowKey::Room(room.clone()))
                .unwrap_or(CONSOLE_SLOT);
            ctx.win_show(
                slot,
                '-',
                Theme::Error,
                format!("Could not get room configuration for {room}: {message}"),
            );
        }
        RoomEvent::ConfigSubmitted { room } => config_submitted(ctx, &room),
        RoomEvent::ConfigSubmitError { room, message } => {
            let slot = ctx
                .windows
                .lookup(&WindowKey::RoomConfig(room.clone()))
                .or_else(|| ctx.windows.lookup(&WindowKey::Room(room.clone())));
            match slot {
                Some(slot) => ctx.win_show(slot, '!', Theme::Error, format!("Configuration error: {message}")),
                None => ctx.win_show(
                    CONSOLE_SLOT,
                    '!',
                    Theme::Error,
                    format!("Configuration error for {room}: {message}"),
                ),
            }
        }
        RoomEvent::AffiliationList {
            room,
            affiliation,
            jids,
        } => affiliation_list(ctx, &room, affiliation, &jids),
        RoomEvent::RoleList { room, role, nicks } => role_list(ctx, &room, role, &nicks),
        RoomEvent::AffiliationSetError {
            room,
            jid,
            affiliation,
            error,
        } => {
            if let Some(slot) = room_slot(ctx, &room, "affiliation error") {
                ctx.win_show(
                    slot,
                    '!',
                    Theme::Error,
                    format!("Error setting {affiliation} affiliation for {jid}: {error}"),
                );
            }
        }
        RoomEvent::RoleSetError {
            room,
            nick,
            role,
            error,
        } => {
            if let Some(slot) = room_slot(ctx, &room, "role error") {
                ctx.win_show(slot, '!', Theme::Error, format!("Error setting {role} role for {nick}: {error}"));
            }
        }
        RoomEvent::KickError { room, nick, error } => {
            if let Some(slot) = room_slot(ctx, &room, "kick error") {
                ctx.win_show(slot, '!', Theme::Error, format!("Error kicking {nick}: {error}"));
            }
        }
    }
}

/// The room's window, logging a warning when it is not open.
fn room_slot(ctx: &AppContext, room: &str, event: &str) -> Option<usize> {
    let slot = ctx.windows.lookup(&WindowKey::Room(room.to_string()));
    if slot.is_none() {
        tracing::warn!(room, event, "no window open for room");
    }
    slot
}

fn by_and_reason(actor: Option<&str>, reason: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(actor) = actor {
        out.push_str(&format!(", by: {actor}"));
    }
    if let Some(reason) = reason {
        out.push_str(&format!(", reason: {reason}"));
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn self_presence(
    ctx: &mut AppContext,
    room: &str,
    nick: &str,
    role: Role,
    affiliation: Affiliation,
    config_required: bool,
    actor: Option<&str>,
    reason: Option<&str>,
) {
    let Some(state) = ctx.rooms.get_mut(room) else {
        tracing::warn!(room, nick, "self presence for room we are not joining");
        return;
    };
    state.update_occupant(
        nick,
        OccupantUpdate {
            role,
            affiliation,
            ..OccupantUpdate::default()
        },
    );
    let (old_role, old_affiliation) = (state.role, state.affiliation);
    state.role = role;
    state.affiliation = affiliation;

    if state.is_nick_change_pending() {
        state.complete_nick_change();
        if let Some(slot) = room_slot(ctx, room, "self nick change") {
            ctx.win_show(slot, '!', Theme::TextMe, format!("** You are now known as {nick}"));
        }
    } else if !state.roster_complete() {
        join_completed(ctx, room, config_required);
    } else if ctx.prefs.get_bool(Pref::Privileges)
        && let Some(change) = PrivilegeChange::diff(old_role, old_affiliation, role, affiliation)
        && let Some(slot) = room_slot(ctx, room, "privilege change")
    {
        let head = match change {
            PrivilegeChange::Role(role) => format!("Your role has been changed to: {role}"),
            PrivilegeChange::Affiliation(affiliation) => {
                format!("Your affiliation has been changed to: {affiliation}")
            }
            PrivilegeChange::Both(role, affiliation) => format!(
                "Your role and affiliation have been changed, role: {role}, affiliation: {affiliation}"
            ),
        };
        ctx.win_show(slot, '!', Theme::RoomInfo, format!("{head}{}", by_and_reason(actor, reason)));
    }
    ctx.state.request_redraw();
}

/// First roster-complete signal: announce the join, then flush the subject,
/// queued broadcasts and the configuration prompt, in that order.
fn join_completed(ctx: &mut AppContext, room: &str, config_required: bool) {
    let Some(slot) = ctx.ensure_room(room) else {
        return;
    };
    let Some(state) = ctx.rooms.get_mut(room) else {
        return;
    };
    state.set_roster_complete();
    let nick = state.nick.clone();
    let autojoin = state.autojoin;
    let (role, affiliation) = (state.role, state.affiliation);
    let pending_subject = state.take_pending_subject();
    let broadcasts = state.take_pending_broadcasts();
    let occupants: Vec<String> = state.occupants().map(|o| o.nick.clone()).collect();
    if config_required {
        state.set_requires_config(true);
    }
    ctx.rooms.remove_invite(room);
    tracing::info!(room, %nick, "joined room");

    let mut joined = format!("-> You have joined the room as {nick}");
    if ctx.prefs.get_bool(Pref::Privileges) {
        joined.push_str(&format!(", role: {role}, affiliation: {affiliation}"));
    }
    ctx.win_show(slot, '!', Theme::RoomInfo, joined);

    if autojoin {
        ctx.win_show(
            CONSOLE_SLOT,
            '!',
            Theme::Typing,
            format!("-> Autojoined {room} as {nick} ({}).", display_slot(slot)),
        );
    } else {
        ctx.focus(slot);
    }

    ctx.send(OutboundAction::RequestRoomInfo {
        room: room.to_string(),
    });

    // no occupants panel, so list them inline
    if !ctx.prefs.get_bool(Pref::Occupants) {
        if occupants.is_empty() {
            ctx.win_show(slot, '!', Theme::RoomInfo, "Room is empty.");
        } else {
            ctx.win_show(
                slot,
                '!',
                Theme::RoomInfo,
                format!("{} occupants: {}", occupants.len(), occupants.join(", ")),
            );
        }
    }

    if let Some((by, subject)) = pending_subject {
        show_subject(ctx, slot, by.as_deref(), Some(&subject));
    }
    for message in broadcasts {
        show_broadcast(ctx, slot, &message);
    }
    if config_required {
        show_requires_config(ctx, slot);
    }
}

fn show_requires_config(ctx: &mut AppContext, slot: usize) {
    ctx.win_show(slot, '-', Theme::Text, "");
    for line in REQUIRES_CONFIG.lines() {
        ctx.win_show(slot, '!', Theme::RoomInfo, line);
    }
    ctx.win_show(slot, '-', Theme::Text, "");
}

fn occupant_presence(
    ctx: &mut AppContext,
    room: &str,
    nick: &str,
    update: OccupantUpdate,
    actor: Option<&str>,
    reason: Option<&str>,
) {
    let Some(state) = ctx.rooms.get_mut(room) else {
        tracing::warn!(room, nick, "occupant presence for unknown room");
        return;
    };
    let (role, affiliation) = (update.role, update.affiliation);
    let show = update.show.clone();
    let status = update.status.clone();
    let change = state.update_occupant(nick, update);
    if !state.roster_complete() {
        return;
    }
    let Some(slot) = room_slot(ctx, room, "occupant presence") else {
        return;
    };
    let statuses = ctx.prefs.get_string(Pref::StatusesMuc);

    match change {
        RosterChange::NickChanged { old_nick } => {
            ctx.win_show(slot, '!', Theme::TextThem, format!("** {old_nick} is now known as {nick}"));
        }
        RosterChange::Joined => {
            if statuses != "none" {
                let mut text = format!("-> {nick} has joined the room");
                if ctx.prefs.get_bool(Pref::Privileges) {
                    text.push_str(&format!(", role: {role}, affiliation: {affiliation}"));
                }
                ctx.win_show(slot, '!', Theme::Online, text);
            }
            let fulljid = format!("{room}/{nick}");
            if let Some(private) = ctx.windows.private_mut(&fulljid)
                && private.occupant_offline
            {
                private.occupant_offline = false;
                if let Some(private_slot) = ctx.windows.lookup(&WindowKey::Private(fulljid)) {
                    ctx.win_show(private_slot, '!', Theme::Online, format!("-> {nick} has joined the room."));
                }
            }
        }
        RosterChange::PresenceChanged => {
            if statuses == "all" {
                let show = show.unwrap_or_else(|| "online".to_string());
                let status = status.map(|s| format!(", \"{s}\"")).unwrap_or_default();
                ctx.win_show(slot, '!', Theme::Away, format!("++ {nick} is {show}{status}"));
            }
        }
        RosterChange::Privileges(change) => {
            if ctx.prefs.get_bool(Pref::Privileges) {
                let head = match change {
                    PrivilegeChange::Role(role) => format!("{nick}'s role has been changed to: {role}"),
                    PrivilegeChange::Affiliation(affiliation) => {
                        format!("{nick}'s affiliation has been changed to: {affiliation}")
                    }
                    PrivilegeChange::Both(role, affiliation) => format!(
                        "{nick}'s role and affiliation have been changed, role: {role}, affiliation: {affiliation}"
                    ),
                };
                ctx.win_show(slot, '!', Theme::RoomInfo, format!("{head}{}", by_and_reason(actor, reason)));
            }
        }
        RosterChange::Unchanged => {}
    }
    ctx.state.request_redraw();
}

fn mark_private_offline(ctx: &mut AppContext, room: &str, nick: &str) {
    let fulljid = format!("{room}/{nick}");
    if let Some(private) = ctx.windows.private_mut(&fulljid) {
        private.occupant_offline = true;
        if let Some(slot) = ctx.windows.lookup(&WindowKey::Private(fulljid)) {
            ctx.win_show(slot, '!', Theme::Offline, format!("<- {nick} has left the room."));
        }
    }
}

fn occupant_offline(ctx: &mut AppContext, room: &str, nick: &str) {
    match ctx.rooms.get_mut(room) {
        Some(state) => {
            state.remove_occupant(nick);
        }
        None => {
            tracing::warn!(room, nick, "occupant offline for unknown room");
            return;
        }
    }
    if ctx.prefs.get_string(Pref::StatusesMuc) != "none"
        && let Some(slot) = room_slot(ctx, room, "occupant offline")
    {
        ctx.win_show(slot, '!', Theme::Offline, format!("<- {nick} has left the room."));
    }
    mark_private_offline(ctx, room, nick);
    ctx.state.request_redraw();
}

fn occupant_removed(
    ctx: &mut AppContext,
    room: &str,
    nick: &str,
    how: &str,
    actor: Option<&str>,
    reason: Option<&str>,
) {
    if let Some(state) = ctx.rooms.get_mut(room) {
        state.remove_occupant(nick);
    }
    if let Some(slot) = room_slot(ctx, room, how) {
        let mut text = format!("<- {nick} has been {how} from the room");
        if let Some(actor) = actor {
            text.push_str(&format!(" by {actor}"));
        }
        if let Some(reason) = reason {
            text.push_str(&format!(", reason: {reason}"));
        }
        ctx.win_show(slot, '!', Theme::Offline, text);
    }
    mark_private_offline(ctx, room, nick);
    ctx.state.request_redraw();
}

/// Closes the room window without the leave round trip; the server already
/// removed us.
fn close_room_window(ctx: &mut AppContext, room: &str, event: &str) -> bool {
    ctx.rooms.leave(room);
    let Some(slot) = room_slot(ctx, room, event) else {
        return false;
    };
    if let Err(err) = ctx.windows.force_close(slot) {
        tracing::warn!(%err, room, "could not close room window");
    }
    // a configuration form cannot outlive its room
    if let Some(conf) = ctx.windows.lookup(&WindowKey::RoomConfig(room.to_string()))
        && let Err(err) = ctx.windows.force_close(conf)
    {
        tracing::warn!(%err, room, "could not close room configuration window");
    }
    for (_, window) in ctx.windows.iter_mut() {
        if let Some(private) = window.as_private_mut()
            && private.fulljid.starts_with(&format!("{room}/"))
        {
            private.room_left = true;
        }
    }
    ctx.state.request_redraw();
    true
}

fn self_removed(ctx: &mut AppContext, room: &str, how: &str, actor: Option<&str>, reason: Option<&str>) {
    if !close_room_window(ctx, room, how) {
        return;
    }
    let mut text = format!("<- {how} from {room}");
    if let Some(actor) = actor {
        text.push_str(&format!(" by {actor}"));
    }
    if let Some(reason) = reason {
        text.push_str(&format!(", reason: {reason}"));
    }
    ctx.win_show(CONSOLE_SLOT, '!', Theme::Typing, text);
}

fn destroyed(
    ctx: &mut AppContext,
    room: &str,
    reason: Option<&str>,
    new_room: Option<&str>,
    password: Option<&str>,
) {
    if !close_room_window(ctx, room, "destroyed") {
        return;
    }
    let text = match reason {
        Some(reason) => format!("<- Room destroyed: {room}, reason: {reason}"),
        None => format!("<- Room destroyed: {room}"),
    };
    ctx.win_show(CONSOLE_SLOT, '!', Theme::Typing, text);
    if let Some(new_room) = new_room {
        let text = match password {
            Some(password) => format!("Replacement room: {new_room}, password: {password}"),
            None => format!("Replacement room: {new_room}"),
        };
        ctx.win_show(CONSOLE_SLOT, '!', Theme::Typing, text);
    }
}

fn show_subject(ctx: &mut AppContext, slot: usize, nick: Option<&str>, subject: Option<&str>) {
    let text = match (nick, subject) {
        (Some(nick), Some(subject)) => format!("*{nick} has set the room subject: {subject}"),
        (None, Some(subject)) => format!("Room subject: {subject}"),
        (Some(nick), None) => format!("*{nick} has cleared the room subject."),
        (None, None) => "Room subject cleared".to_string(),
    };
    ctx.win_show(slot, '!', Theme::RoomInfo, text);
}

fn subject_changed(ctx: &mut AppContext, room: &str, nick: Option<String>, subject: Option<String>) {
    let Some(state) = ctx.rooms.get_mut(room) else {
        tracing::warn!(room, "subject for unknown room");
        return;
    };
    state.subject = subject.clone();
    if !state.roster_complete() {
        if let Some(subject) = subject {
            state.set_pending_subject(nick, subject);
        }
        return;
    }
    if let Some(slot) = room_slot(ctx, room, "subject") {
        show_subject(ctx, slot, nick.as_deref(), subject.as_deref());
    }
}

fn show_broadcast(ctx: &mut AppContext, slot: usize, message: &str) {
    ctx.win_show(slot, '!', Theme::RoomInfo, format!("Room message: {message}"));
}

fn broadcast(ctx: &mut AppContext, room: &str, message: String) {
    let Some(state) = ctx.rooms.get_mut(room) else {
        tracing::warn!(room, "broadcast for unknown room");
        return;
    };
    if !state.roster_complete() {
        state.queue_broadcast(message);
        return;
    }
    if let Some(slot) = room_slot(ctx, room, "broadcast") {
        show_broadcast(ctx, slot, &message);
    }
}

fn history(ctx: &mut AppContext, room: &str, nick: &str, time: DateTime<Local>, message: &str) {
    let Some(slot) = room_slot(ctx, room, "history") else {
        return;
    };
    let text = match message.strip_prefix("/me ") {
        Some(action) => format!("*{nick} {action}"),
        None => format!("{nick}: {message}"),
    };
    ctx.print(slot, BufferLine::new('-', Theme::Text, text).at(time));
}

fn room_message(ctx: &mut AppContext, room: &str, nick: &str, message: &str) {
    let Some(slot) = room_slot(ctx, room, "message") else {
        return;
    };
    let my_nick = ctx.rooms.nick(room).unwrap_or_default().to_string();
    let from_me = nick == my_nick;
    let mentioned = !from_me && ctx.rooms.get(room).is_some_and(|state| state.mentions_me(message));

    let theme = if from_me {
        Theme::TextMe
    } else if mentioned {
        Theme::RoomMention
    } else {
        Theme::TextThem
    };
    ctx.print(slot, BufferLine::new('-', theme, message).from(nick));

    let is_current = ctx.windows.current() == slot;
    if !is_current {
        ctx.cons_show(format!("<< incoming from {nick} ({})", display_slot(slot)));
        if ctx.prefs.get_bool(Pref::Flash) && !from_me {
            ctx.notifier.flash();
        }
        if let Some(window) = ctx.windows.get_mut(slot) {
            window.mark_unread();
        }
    }

    ctx.log_room(room, nick, message, Local::now());

    if from_me {
        return;
    }
    if ctx.prefs.get_bool(Pref::Beep) {
        ctx.notifier.beep();
    }

    let notify = match ctx.prefs.get_string(Pref::NotifyRoom).as_str() {
        "on" => true,
        "mention" => mentioned,
        _ => false,
    };
    if notify && (!is_current || ctx.prefs.get_bool(Pref::NotifyRoomCurrent)) {
        let room_name = Jid::parse(room)
            .ok()
            .and_then(|jid| jid.local().map(str::to_string))
            .unwrap_or_else(|| room.to_string());
        let text = ctx
            .prefs
            .get_bool(Pref::NotifyRoomText)
            .then(|| message.to_string());
        ctx.notifier.notify(Notification::RoomMessage {
            room: room_name,
            nick: nick.to_string(),
            slot: display_slot(slot),
            text,
        });
    }
}

fn room_info(ctx: &mut AppContext, room: &str, identities: &[String], features: &[String]) {
    if identities.is_empty() && features.is_empty() {
        return;
    }
    let Some(slot) = room_slot(ctx, room, "info") else {
        return;
    };
    if !identities.is_empty() {
        ctx.win_show(slot, '!', Theme::Text, "Identities:");
        for identity in identities {
            ctx.win_show(slot, '!', Theme::Text, format!("  {identity}"));
        }
    }
    if !features.is_empty() {
        ctx.win_show(slot, '!', Theme::Text, "Features:");
        for feature in features {
            ctx.win_show(slot, '!', Theme::Text, format!("  {feature}"));
        }
    }
    ctx.win_show(slot, '-', Theme::Text, "");
}

fn config_form(ctx: &mut AppContext, room: &str, form: DataForm) {
    if let Some(slot) = ctx.windows.lookup(&WindowKey::RoomConfig(room.to_string())) {
        tracing::debug!(room, "configuration form already open");
        ctx.focus(slot);
        return;
    }
    let slot = match ctx
        .windows
        .create(WindowPayload::RoomConfig(RoomConfigWindow::new(room, form)))
    {
        Ok(slot) => slot,
        Err(err) => {
            tracing::warn!(%err, room, "no slot for configuration form");
            ctx.cons_show_error("Window limit reached, close a window with /close to open another.");
            return;
        }
    };
    ctx.focus(slot);
    show_form(ctx, slot);
    for line in [
        "",
        "Use '/form submit' to save changes.",
        "Use '/form cancel' to cancel changes.",
        "See '/form help' for more information.",
        "",
    ] {
        ctx.win_show(slot, '-', Theme::Text, line);
    }
}

fn config_submitted(ctx: &mut AppContext, room: &str) {
    if let Some(state) = ctx.rooms.get_mut(room) {
        state.set_requires_config(false);
    }
    if let Some(slot) = ctx.windows.lookup(&WindowKey::RoomConfig(room.to_string()))
        && let Err(err) = ctx.windows.force_close(slot)
    {
        tracing::warn!(%err, room, "could not close configuration form");
    }
    match ctx.windows.lookup(&WindowKey::Room(room.to_string())) {
        Some(slot) => {
            ctx.focus(slot);
            ctx.win_show(slot, '!', Theme::RoomInfo, "Room configuration successful");
        }
        None => {
            ctx.focus(CONSOLE_SLOT);
            ctx.cons_show(format!("Room configuration successful: {room}"));
        }
    }
}

fn affiliation_list(ctx: &mut AppContext, room: &str, affiliation: Affiliation, jids: &[String]) {
    let Some(slot) = room_slot(ctx, room, "affiliation list") else {
        return;
    };
    if jids.is_empty() {
        ctx.win_show(slot, '!', Theme::Text, format!("No users found with affiliation: {affiliation}"));
    } else {
        ctx.win_show(slot, '!', Theme::Text, format!("Affiliation: {affiliation}"));
        for jid in jids {
            ctx.win_show(slot, '!', Theme::Text, format!("  {jid}"));
        }
    }
    ctx.win_show(slot, '!', Theme::Text, "");
}

fn role_list(ctx: &mut AppContext, room: &str, role: Role, nicks: &[String]) {
    let Some(slot) = room_slot(ctx, room, "role list") else {
        return;
    };
    if nicks.is_empty() {
        ctx.win_show(slot, '!', Theme::Text, format!("No occupants found with role: {role}"));
    } else {
        ctx.win_show(slot, '!', Theme::Text, format!("Role: {role}"));
        for nick in nicks {
            let jid = ctx
                .rooms
                .get(room)
                .and_then(|state| state.occupant(nick))
                .and_then(|occupant| occupant.jid.clone());
            let text = match jid {
                Some(jid) => format!("  {nick} ({jid})"),
                None => format!("  {nick}"),
            };
            ctx.win_show(slot, '!', Theme::Text, text);
        }
    }
    ctx.win_show(slot, '!', Theme::Text, "");
}
