//! Command handlers.
//!
//! Every handler checks its preconditions (connection, window kind,
//! encryption mode) before touching anything. A failed precondition prints
//! a line and leaves all state as it was, so the command can simply be
//! retried.

use std::time::Instant;

use crate::command::form;
use crate::command::{ArgStyle, Command, CommandSpec};
use crate::constants::{CONSOLE_SLOT, DEFAULT_RESOURCE, MAX_WINDOWS};
use crate::context::AppContext;
use crate::encryption::{EncryptionMode, ModeConflict, StartOutcome};
use crate::error::RegistryError;
use crate::event::outbound;
use crate::event_loop::ControlFlow;
use crate::jid::Jid;
use crate::keybindings::KeyBindings;
use crate::muc::{Affiliation, Role};
use crate::prefs::Pref;
use crate::protocol::{
    ConnectionState, DiscoKind, EncryptionEvent, InboundEvent, MessageKind, OutboundAction,
    SubscriptionAction,
};
use crate::roster::Presence;
use crate::theme::Theme;
use crate::window::{Window, WindowKey, WindowKind, WindowPayload, display_slot, parse_slot};

use ControlFlow::Continue;

macro_rules! cmd {
    ($name:literal, $args:expr, [$($usage:literal),+ $(,)?], $help:literal, $handler:expr) => {
        CommandSpec {
            name: $name,
            args: $args,
            usage: &[$($usage),+],
            help: $help,
            handler: $handler,
        }
    };
}

const WORDS: ArgStyle = ArgStyle::Words;

pub static COMMANDS: &[CommandSpec] = &[
    cmd!("/help", WORDS, ["/help [command|keys]"], "Show help for all commands, one command, or the key bindings.", help),
    cmd!("/connect", WORDS, ["/connect [account]"], "Log in, with the default account if none is given.", connect),
    cmd!("/disconnect", WORDS, ["/disconnect"], "Log out. Windows stay open.", disconnect),
    cmd!("/quit", WORDS, ["/quit"], "Log out and leave the client.", quit),
    cmd!("/msg", ArgStyle::Freetext(1), ["/msg <contact> [message]", "/msg <nick> [message]"], "Open a chat with a contact, or a private chat with a room occupant, optionally sending a message.", msg),
    cmd!("/close", WORDS, ["/close", "/close <num>", "/close all|read"], "Close the current window, a numbered window, every window or every window without unread messages.", close),
    cmd!("/clear", WORDS, ["/clear"], "Clear the current window.", clear),
    cmd!("/win", WORDS, ["/win <num>"], "Focus window <num>. Window 10 is window 0.", win),
    cmd!("/wins", WORDS, ["/wins", "/wins tidy", "/wins prune", "/wins swap <source> <target>"], "List, renumber, prune or swap windows.", wins),
    cmd!("/xmlconsole", WORDS, ["/xmlconsole"], "Open the protocol trace window.", xmlconsole),
    cmd!("/resource", WORDS, ["/resource set <resource>", "/resource off", "/resource title on|off", "/resource message on|off"], "Pin the resource used in the current chat, or show resources in titles and messages.", resource),
    cmd!("/software", WORDS, ["/software [jid|nick]"], "Ask a contact or occupant which client it runs.", software),
    cmd!("/disco", WORDS, ["/disco info [jid]", "/disco items [jid]"], "Service discovery on a jid, the server by default.", disco),
    cmd!("/sub", WORDS, ["/sub request|allow|deny|show [jid]"], "Manage presence subscriptions.", sub),
    cmd!("/online", ArgStyle::Freetext(0), ["/online [message]"], "Set presence to online.", online),
    cmd!("/away", ArgStyle::Freetext(0), ["/away [message]"], "Set presence to away.", away),
    cmd!("/dnd", ArgStyle::Freetext(0), ["/dnd [message]"], "Set presence to do not disturb.", dnd),
    cmd!("/chat", ArgStyle::Freetext(0), ["/chat [message]"], "Set presence to free for chat.", chat),
    cmd!("/xa", ArgStyle::Freetext(0), ["/xa [message]"], "Set presence to extended away.", xa),
    cmd!("/join", WORDS, ["/join <room> [nick <nick>] [password <password>]"], "Join a chat room.", join),
    cmd!("/leave", WORDS, ["/leave"], "Leave the current chat room.", leave),
    cmd!("/nick", WORDS, ["/nick <nickname>"], "Change your nickname in the current chat room.", nick),
    cmd!("/invite", ArgStyle::Freetext(1), ["/invite <contact> [message]"], "Invite a contact to the current chat room.", invite),
    cmd!("/invites", WORDS, ["/invites"], "List outstanding chat room invites.", invites),
    cmd!("/decline", WORDS, ["/decline <room>"], "Decline a chat room invite.", decline),
    cmd!("/kick", ArgStyle::Freetext(1), ["/kick <nick> [reason]"], "Kick an occupant from the current room.", kick),
    cmd!("/ban", ArgStyle::Freetext(1), ["/ban <jid> [reason]"], "Ban a user from the current room.", ban),
    cmd!("/subject", ArgStyle::Freetext(1), ["/subject", "/subject set <subject>", "/subject clear"], "Show, set or clear the room subject.", subject),
    cmd!("/affiliation", ArgStyle::Freetext(3), ["/affiliation set <affiliation> <jid> [reason]", "/affiliation list [affiliation]"], "Manage room affiliations: owner, admin, member, outcast, none.", affiliation),
    cmd!("/role", ArgStyle::Freetext(3), ["/role set <role> <nick> [reason]", "/role list [role]"], "Manage room roles: moderator, participant, visitor, none.", role),
    cmd!("/room", WORDS, ["/room accept|destroy|config"], "Accept the default configuration of a new room, destroy it, or edit its configuration.", room),
    cmd!("/occupants", WORDS, ["/occupants show|hide [jid]", "/occupants default show|hide [jid]"], "Show or hide the occupant list of chat rooms.", occupants),
    cmd!("/form", WORDS, ["/form show", "/form submit", "/form cancel", "/form help [tag]"], "Work with a room configuration form.", form::form_command),
    cmd!("/otr", WORDS, ["/otr start [contact]", "/otr end", "/otr trust|untrust", "/otr secret <secret>", "/otr question <question> <answer>", "/otr answer <answer>", "/otr myfp|theirfp", "/otr policy [manual|opportunistic|always]", "/otr log on|off|redact"], "Off The Record encryption.", otr),
    cmd!("/pgp", WORDS, ["/pgp start [contact]", "/pgp end", "/pgp log on|off|redact"], "PGP encryption.", pgp),
    cmd!("/beep", WORDS, ["/beep on|off"], "Sound on new messages.", beep),
    cmd!("/flash", WORDS, ["/flash on|off"], "Flash the terminal on new messages.", flash),
    cmd!("/intype", WORDS, ["/intype on|off"], "Show when contacts are typing.", intype),
    cmd!("/history", WORDS, ["/history on|off"], "Show logged history when a chat window opens.", history),
    cmd!("/chlog", WORDS, ["/chlog on|off"], "Log chat messages.", chlog),
    cmd!("/grlog", WORDS, ["/grlog on|off"], "Log chat room messages.", grlog),
    cmd!("/privileges", WORDS, ["/privileges on|off"], "Show roles and affiliations in chat rooms.", privileges),
    cmd!("/presence", WORDS, ["/presence on|off"], "Show contact presence in the title bar.", presence),
    cmd!("/winstidy", WORDS, ["/winstidy on|off"], "Renumber windows automatically when one closes.", winstidy),
    cmd!("/states", WORDS, ["/states on|off"], "Send chat state notifications.", states),
    cmd!("/outtype", WORDS, ["/outtype on|off"], "Send typing notifications.", outtype),
    cmd!("/carbons", WORDS, ["/carbons on|off"], "Receive copies of messages sent from other clients.", carbons),
    cmd!("/receipts", WORDS, ["/receipts send|request on|off"], "Send or request delivery receipts.", receipts),
    cmd!("/gone", WORDS, ["/gone <minutes>"], "Leave conversations after a period of inactivity, 0 disables.", gone),
    cmd!("/notify", WORDS, ["/notify message on|off", "/notify message current|text on|off", "/notify room on|off|mention", "/notify room current|text on|off", "/notify typing on|off", "/notify typing current on|off", "/notify invite on|off", "/notify sub on|off"], "Notification settings.", notify),
    cmd!("/statuses", WORDS, ["/statuses console|chat|muc all|online|none"], "Which presence updates are shown where.", statuses),
    cmd!("/autoaway", ArgStyle::Freetext(1), ["/autoaway mode idle|away|off", "/autoaway time <minutes>", "/autoaway message <message>|off", "/autoaway check on|off"], "Automatic away after a period without keystrokes.", autoaway),
];

/// Runs one parsed command.
pub fn execute(ctx: &mut AppContext, command: &Command) -> ControlFlow {
    let name = command.name.trim_start_matches('/');
    if form::is_field_tag(ctx, name) {
        return match command.args() {
            Ok(args) => form::field_command(ctx, name, &args),
            Err(err) => {
                ctx.current_error(err.to_string());
                Continue
            }
        };
    }
    let Some(entry) = super::find(&command.name) else {
        ctx.current_print(format!("Unknown command: {}", command.name));
        return Continue;
    };
    match command.split(entry.args) {
        Ok(args) => {
            tracing::debug!(command = entry.name, args = args.len(), "running command");
            (entry.handler)(ctx, &args)
        }
        Err(err) => {
            tracing::debug!(%err, "could not parse command");
            ctx.current_error(err.to_string());
            Continue
        }
    }
}

// ---- helpers ----------------------------------------------------------------

fn arg(args: &[String], idx: usize) -> Option<&str> {
    args.get(idx).map(String::as_str)
}

fn bad_usage(ctx: &mut AppContext, command: &str) -> ControlFlow {
    ctx.cons_bad_cmd_usage(command);
    Continue
}

pub(crate) fn require_connected(ctx: &mut AppContext) -> bool {
    if ctx.connected() {
        return true;
    }
    ctx.current_print("You are not currently connected.");
    false
}

fn current_room(ctx: &AppContext) -> Option<String> {
    ctx.windows
        .current_window()
        .as_room()
        .map(|room| room.roomjid.clone())
}

fn current_chat(ctx: &AppContext) -> Option<String> {
    ctx.windows
        .current_window()
        .as_chat()
        .map(|chat| chat.barejid.clone())
}

fn autotidy(ctx: &mut AppContext) {
    if ctx.prefs.get_bool(Pref::WinsAutoTidy) && ctx.windows.tidy() {
        ctx.state.request_redraw();
    }
}

fn room_slot(ctx: &AppContext, room: &str) -> Option<usize> {
    ctx.windows.lookup(&WindowKey::Room(room.to_string()))
}

fn room_print(ctx: &mut AppContext, room: &str, show_char: char, theme: Theme, text: impl Into<String>) {
    let slot = room_slot(ctx, room).unwrap_or(CONSOLE_SLOT);
    ctx.win_show(slot, show_char, theme, text);
}

fn on_off(value: bool) -> &'static str {
    if value { "enabled" } else { "disabled" }
}

/// Applies `on|off` to a boolean preference. Returns the new value, or
/// `None` after reporting bad usage.
fn set_boolean_pref(
    ctx: &mut AppContext,
    command: &str,
    display: &str,
    pref: Pref,
    value: Option<&str>,
) -> Option<bool> {
    let enabled = match value {
        Some("on") => true,
        Some("off") => false,
        _ => {
            ctx.cons_bad_cmd_usage(command);
            return None;
        }
    };
    ctx.prefs.set_bool(pref, enabled);
    ctx.cons_show(format!("{display} {}.", on_off(enabled)));
    Some(enabled)
}

// ---- general ----------------------------------------------------------------

fn help(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    match arg(args, 0) {
        None => {
            ctx.cons_show("");
            ctx.cons_show("All commands");
            ctx.cons_show("");
            for row in COMMANDS.chunks(5) {
                let line = row
                    .iter()
                    .map(|entry| format!("{:<16}", entry.name))
                    .collect::<String>();
                ctx.cons_show(line.trim_end().to_string());
            }
            ctx.cons_show("");
            ctx.cons_show("Use /help [command] without the leading slash, for help on a specific command");
            ctx.cons_show("");
        }
        Some("keys") => {
            ctx.cons_show("");
            ctx.cons_show("Key bindings");
            ctx.cons_show("");
            for (action, keys) in KeyBindings::default().describe() {
                ctx.cons_show(format!("{keys:<20} {action}"));
            }
            ctx.cons_show("");
        }
        Some(name) => match super::find(name) {
            Some(entry) => {
                ctx.cons_show("");
                ctx.cons_show(format!("Synopsis for {}", entry.name));
                for usage in entry.usage {
                    ctx.cons_show(*usage);
                }
                ctx.cons_show("");
                ctx.cons_show(entry.help);
                ctx.cons_show("");
            }
            None => ctx.cons_show("No such command."),
        },
    }
    Continue
}

fn connect(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if ctx.connection_state() != ConnectionState::Disconnected {
        ctx.cons_show("You are either connected already, or a login is in process.");
        return Continue;
    }
    let jid = match arg(args, 0) {
        Some(raw) => match Jid::parse(raw) {
            Ok(jid) => jid,
            Err(err) => {
                ctx.cons_show_error(format!("Invalid account {raw}: {err}"));
                return Continue;
            }
        },
        None => match ctx.default_account.clone() {
            Some(jid) => jid,
            None => {
                ctx.cons_show("No default account.");
                return Continue;
            }
        },
    };
    let jid = if jid.is_full() {
        jid
    } else {
        match Jid::with_resource(&jid.barejid(), DEFAULT_RESOURCE) {
            Ok(full) => full,
            Err(err) => {
                ctx.cons_show_error(format!("Invalid account {jid}: {err}"));
                return Continue;
            }
        }
    };
    ctx.cons_show(format!("Connecting as {jid}"));
    if let Err(err) = ctx.transport.connect(jid.clone(), None) {
        tracing::warn!(%err, %jid, "connect failed");
        ctx.cons_show_error(format!("Connection attempt for {jid} failed."));
    }
    ctx.state.request_redraw();
    Continue
}

fn disconnect(ctx: &mut AppContext, _args: &[String]) -> ControlFlow {
    if !ctx.connected() {
        ctx.cons_show("You are not currently connected.");
        return Continue;
    }
    let account = ctx
        .transport
        .account()
        .map(|jid| jid.to_string())
        .unwrap_or_default();
    log_out(ctx);
    ctx.cons_show(format!("{account} logged out successfully."));
    Continue
}

/// Leaves rooms, ends chat sessions and drops the connection.
fn log_out(ctx: &mut AppContext) {
    let rooms: Vec<String> = ctx.rooms.rooms().map(|room| room.roomjid.clone()).collect();
    for room in rooms {
        ctx.leave_room(&room);
    }
    let now = Instant::now();
    let gone: Vec<(String, crate::session::ChatState)> = ctx
        .windows
        .iter_mut()
        .filter_map(|(_, window)| window.as_chat_mut())
        .filter_map(|chat| chat.state.gone(now).map(|state| (chat.barejid.clone(), state)))
        .collect();
    for (barejid, state) in gone {
        ctx.send_chat_state(&barejid, state);
    }
    ctx.transport.disconnect();
    ctx.clear_connection_state();
}

fn quit(ctx: &mut AppContext, _args: &[String]) -> ControlFlow {
    if ctx.connected() {
        log_out(ctx);
    }
    tracing::info!("quit requested");
    ControlFlow::Quit
}

fn msg(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let Some(contact) = arg(args, 0) else {
        return bad_usage(ctx, "msg");
    };
    if !require_connected(ctx) {
        return Continue;
    }
    let message = arg(args, 1);
    if let Some(room) = current_room(ctx) {
        let known = ctx.rooms.get(&room).is_some_and(|r| r.contains_nick(contact));
        if !known {
            room_print(ctx, &room, '-', Theme::Text, format!("No such participant \"{contact}\" in room."));
            return Continue;
        }
        let fulljid = format!("{room}/{contact}");
        let slot = match ctx.windows.lookup(&WindowKey::Private(fulljid.clone())) {
            Some(slot) => slot,
            None => match ctx.ensure_private(&fulljid) {
                Some(slot) => slot,
                None => return Continue,
            },
        };
        ctx.focus(slot);
        if let Some(message) = message {
            outbound::send_private(ctx, &fulljid, message);
        }
        return Continue;
    }

    let barejid = ctx.roster.barejid_from_name(contact);
    let Some(slot) = ctx.ensure_chat(&barejid) else {
        return Continue;
    };
    ctx.focus(slot);
    if let Some(message) = message {
        outbound::send_chat(ctx, &barejid, message);
    }
    Continue
}

// ---- windows ----------------------------------------------------------------

fn close(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    match arg(args, 0) {
        Some("all") => close_many(ctx, false),
        Some("read") => close_many(ctx, true),
        Some(raw) => match parse_slot(raw) {
            Some(slot) => close_one(ctx, slot),
            None => return bad_usage(ctx, "close"),
        },
        None => {
            let slot = ctx.windows.current();
            close_one(ctx, slot);
        }
    }
    Continue
}

fn close_one(ctx: &mut AppContext, slot: usize) {
    if slot == CONSOLE_SLOT {
        ctx.current_print("Cannot close console window.");
        return;
    }
    if slot > MAX_WINDOWS {
        ctx.current_print("No such window exists.");
        return;
    }
    match ctx.close_window(slot) {
        Ok(_) => {
            ctx.cons_show(format!("Closed window {}", display_slot(slot)));
            autotidy(ctx);
        }
        Err(RegistryError::NotFound) => ctx.current_print("Window is not open."),
        Err(err) => ctx.current_print(err.to_string()),
    }
}

/// `/close all` and `/close read`. Forms with unsaved edits are kept.
fn close_many(ctx: &mut AppContext, read_only: bool) {
    let slots: Vec<usize> = ctx
        .windows
        .iter()
        .filter(|(slot, window)| {
            *slot != CONSOLE_SLOT
                && !window.as_room_config().is_some_and(|conf| conf.is_modified())
                && (!read_only || window.unread_count() == 0)
        })
        .map(|(slot, _)| slot)
        .collect();
    let mut count = 0;
    for slot in slots {
        match ctx.close_window(slot) {
            Ok(_) => count += 1,
            Err(err) => tracing::warn!(%err, slot, "window not closed"),
        }
    }
    match count {
        0 => ctx.cons_show("No windows to close."),
        1 => ctx.cons_show("Closed 1 window."),
        n => ctx.cons_show(format!("Closed {n} windows.")),
    }
    autotidy(ctx);
}

fn clear(ctx: &mut AppContext, _args: &[String]) -> ControlFlow {
    ctx.windows.current_window_mut().buffer.clear();
    ctx.state.request_redraw();
    Continue
}

fn win(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let Some(raw) = arg(args, 0) else {
        return bad_usage(ctx, "win");
    };
    let focused = parse_slot(raw).is_some_and(|slot| ctx.focus(slot));
    if !focused {
        ctx.cons_show(format!("Window {raw} does not exist."));
    }
    Continue
}

fn wins(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    match (arg(args, 0), arg(args, 1), arg(args, 2)) {
        (None, _, _) => {
            let lines: Vec<String> = ctx
                .windows
                .iter()
                .map(|(slot, window)| describe_window(slot, window))
                .collect();
            ctx.cons_show("Active windows:");
            for line in lines {
                ctx.cons_show(line);
            }
        }
        (Some("tidy"), None, _) => {
            if ctx.windows.tidy() {
                ctx.cons_show("Windows tidied.");
                ctx.state.request_redraw();
            } else {
                ctx.cons_show("No tidy needed.");
            }
        }
        (Some("prune"), None, _) => {
            let retain = ctx.prefs.get_int(Pref::WinsRetain).max(0) as usize;
            let slots = ctx.windows.prune(retain);
            if slots.is_empty() {
                ctx.cons_show("No prune needed.");
            } else {
                for slot in slots {
                    if let Err(err) = ctx.close_window(slot) {
                        tracing::warn!(%err, slot, "prune could not close window");
                    }
                }
                autotidy(ctx);
                ctx.cons_show("Windows pruned.");
            }
        }
        (Some("swap"), Some(a), Some(b)) => swap(ctx, a, b),
        _ => return bad_usage(ctx, "wins"),
    }
    Continue
}

fn describe_window(slot: usize, window: &Window) -> String {
    let mut line = format!("{}: ", display_slot(slot));
    match window.kind() {
        WindowKind::Console => line.push_str("Console"),
        kind => {
            let kind = kind.to_string();
            let mut chars = kind.chars();
            if let Some(first) = chars.next() {
                line.extend(first.to_uppercase());
                line.push_str(chars.as_str());
            }
            line.push(' ');
            line.push_str(&window.title());
        }
    }
    match window.unread_count() {
        0 => {}
        n => line.push_str(&format!(", {n} unread")),
    }
    line
}

fn swap(ctx: &mut AppContext, a: &str, b: &str) {
    let (Some(source), Some(target)) = (parse_slot(a), parse_slot(b)) else {
        ctx.cons_bad_cmd_usage("wins");
        return;
    };
    if source == CONSOLE_SLOT || target == CONSOLE_SLOT {
        ctx.cons_show("Cannot move console window.");
        return;
    }
    if source == target {
        ctx.cons_show("Same source and target window supplied.");
        return;
    }
    for (slot, raw) in [(source, a), (target, b)] {
        if ctx.windows.get(slot).is_none() {
            ctx.cons_show(format!("Window {raw} does not exist"));
            return;
        }
    }
    match ctx.windows.swap(source, target) {
        Ok(()) => {
            ctx.cons_show(format!("Swapped windows {a} <-> {b}"));
            ctx.state.request_redraw();
        }
        Err(err) => tracing::warn!(%err, source, target, "swap failed"),
    }
}

fn xmlconsole(ctx: &mut AppContext, _args: &[String]) -> ControlFlow {
    let slot = match ctx.windows.lookup(&WindowKey::ProtocolTrace) {
        Some(slot) => Some(slot),
        None => ctx.ensure_trace(),
    };
    if let Some(slot) = slot {
        ctx.focus(slot);
    }
    Continue
}

// ---- contacts ---------------------------------------------------------------

fn resource(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    match arg(args, 0) {
        Some("message") => {
            set_boolean_pref(ctx, "resource", "Message resource", Pref::ResourceMessage, arg(args, 1));
            return Continue;
        }
        Some("title") => {
            set_boolean_pref(ctx, "resource", "Title resource", Pref::ResourceTitle, arg(args, 1));
            ctx.state.request_redraw();
            return Continue;
        }
        Some("set" | "off") => {}
        _ => return bad_usage(ctx, "resource"),
    }
    if !require_connected(ctx) {
        return Continue;
    }
    let Some(barejid) = current_chat(ctx) else {
        ctx.current_print("Resource can only be changed in chat windows.");
        return Continue;
    };
    let in_otr = ctx
        .windows
        .chat(&barejid)
        .is_some_and(|chat| chat.encryption.mode() == EncryptionMode::Otr);
    if in_otr {
        ctx.current_print("Cannot choose resource during an OTR session.");
        return Continue;
    }

    if arg(args, 0) == Some("off") {
        if let Some(chat) = ctx.windows.chat_mut(&barejid) {
            chat.resource_override = None;
            chat.state = crate::session::ChatStateMachine::new(Instant::now());
        }
        ctx.sessions.remove(&barejid);
        ctx.current_print("Resource reset.");
        ctx.state.request_redraw();
        return Continue;
    }

    let Some(res) = arg(args, 1) else {
        return bad_usage(ctx, "resource");
    };
    let known = match ctx.roster.get(&barejid) {
        None => {
            ctx.current_print("Cannot choose resource for contact not in roster.");
            return Continue;
        }
        Some(contact) => contact.resource(res).is_some(),
    };
    if !known {
        ctx.current_print(format!("No such resource {res}."));
        return Continue;
    }
    if let Some(chat) = ctx.windows.chat_mut(&barejid) {
        chat.resource_override = Some(res.to_string());
    }
    ctx.sessions.pin_resource(&barejid, res);
    ctx.current_print(format!("Resource set to {res}."));
    ctx.state.request_redraw();
    Continue
}

fn software(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if !require_connected(ctx) {
        return Continue;
    }
    let target = arg(args, 0);
    let jid = match &ctx.windows.current_window().payload {
        WindowPayload::Room(room) => {
            let roomjid = room.roomjid.clone();
            let Some(nick) = target else {
                ctx.current_print("No nickname supplied to /software in chat room.");
                return Continue;
            };
            if !ctx.rooms.get(&roomjid).is_some_and(|r| r.contains_nick(nick)) {
                ctx.current_print(format!("No such participant \"{nick}\" in room."));
                return Continue;
            }
            format!("{roomjid}/{nick}")
        }
        WindowPayload::Chat(chat) => {
            if target.is_some() {
                ctx.current_print("No parameter needed to /software when in chat.");
                return Continue;
            }
            let barejid = chat.barejid.clone();
            let resource = chat
                .resource_override
                .clone()
                .or_else(|| ctx.sessions.get(&barejid).map(|s| s.resource.clone()));
            match resource {
                Some(resource) => format!("{barejid}/{resource}"),
                None => {
                    ctx.current_print("Unknown resource for /software command.");
                    return Continue;
                }
            }
        }
        WindowPayload::Private(private) => {
            if target.is_some() {
                ctx.current_print("No parameter needed to /software when in private chat.");
                return Continue;
            }
            private.fulljid.clone()
        }
        WindowPayload::Console | WindowPayload::RoomConfig(_) | WindowPayload::ProtocolTrace => {
            let Some(raw) = target else {
                ctx.current_print("You must provide a jid to the /software command.");
                return Continue;
            };
            let full = Jid::parse(raw).ok().filter(Jid::is_full);
            let Some(full) = full else {
                ctx.current_print("You must provide a full jid to the /software command.");
                return Continue;
            };
            if ctx.transport.account().as_ref() == Some(&full) {
                ctx.current_print("Cannot request software version for yourself.");
                return Continue;
            }
            full.to_string()
        }
    };
    ctx.send(OutboundAction::SoftwareVersion { jid });
    Continue
}

fn disco(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let kind = match arg(args, 0) {
        Some("info") => DiscoKind::Info,
        Some("items") => DiscoKind::Items,
        _ => return bad_usage(ctx, "disco"),
    };
    if !require_connected(ctx) {
        return Continue;
    }
    let jid = match arg(args, 1) {
        Some(jid) => jid.to_string(),
        None => ctx
            .transport
            .account()
            .map(|jid| jid.domain().to_string())
            .unwrap_or_default(),
    };
    ctx.send(OutboundAction::Disco { jid, kind });
    Continue
}

fn sub(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let Some(subcmd) = arg(args, 0) else {
        return bad_usage(ctx, "sub");
    };
    if !require_connected(ctx) {
        return Continue;
    }
    let jid = match arg(args, 1) {
        Some(jid) => ctx.roster.barejid_from_name(jid),
        None => match current_chat(ctx) {
            Some(barejid) => barejid,
            None => {
                ctx.cons_show("You must specify a contact.");
                return Continue;
            }
        },
    };
    let action = match subcmd {
        "request" => SubscriptionAction::Request,
        "allow" => SubscriptionAction::Allow,
        "deny" => SubscriptionAction::Deny,
        "show" => {
            show_subscription(ctx, &jid);
            return Continue;
        }
        _ => return bad_usage(ctx, "sub"),
    };
    if !ctx.send(OutboundAction::Subscription {
        to: jid.clone(),
        action,
    }) {
        return Continue;
    }
    match action {
        SubscriptionAction::Request => ctx.cons_show(format!("Sent subscription request to {jid}.")),
        SubscriptionAction::Allow => ctx.cons_show(format!("Accepted subscription for {jid}")),
        SubscriptionAction::Deny => ctx.cons_show(format!("Deleted/denied subscription for {jid}")),
    }
    Continue
}

fn show_subscription(ctx: &mut AppContext, jid: &str) {
    let text = match ctx.roster.get(jid) {
        None => format!("No subscription information for {jid}."),
        Some(contact) if contact.pending_out => {
            format!("{jid} subscription status: {}, request pending.", contact.subscription)
        }
        Some(contact) => format!("{jid} subscription status: {}.", contact.subscription),
    };
    if current_chat(ctx).is_some() {
        ctx.current_print(text);
    } else {
        ctx.cons_show(text);
    }
}

fn set_presence(ctx: &mut AppContext, presence: Presence, args: &[String]) -> ControlFlow {
    if !require_connected(ctx) {
        return Continue;
    }
    outbound::send_presence(ctx, presence, arg(args, 0).map(str::to_string));
    Continue
}

fn online(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_presence(ctx, Presence::Online, args)
}

fn away(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_presence(ctx, Presence::Away, args)
}

fn dnd(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_presence(ctx, Presence::Dnd, args)
}

fn chat(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_presence(ctx, Presence::Chat, args)
}

fn xa(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_presence(ctx, Presence::Xa, args)
}

// ---- rooms ------------------------------------------------------------------

fn join(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let Some(raw_room) = arg(args, 0) else {
        return bad_usage(ctx, "join");
    };
    if !require_connected(ctx) {
        return Continue;
    }
    let account = ctx.transport.account();
    let room = if raw_room.contains('@') {
        raw_room.to_string()
    } else {
        let domain = account.as_ref().map(Jid::domain).unwrap_or_default();
        format!("{raw_room}@conference.{domain}")
    };

    let mut nick = None;
    let mut password = None;
    for pair in args[1..].chunks(2) {
        match pair {
            [key, value] if key == "nick" => nick = Some(value.clone()),
            [key, value] if key == "password" => password = Some(value.clone()),
            _ => return bad_usage(ctx, "join"),
        }
    }
    let nick = nick
        .or_else(|| account.as_ref().and_then(Jid::local).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_RESOURCE.to_string());
    let password = password.or_else(|| ctx.rooms.invite_password(&room).map(str::to_string));

    if !ctx.rooms.is_active(&room) {
        ctx.rooms.join(&room, &nick, password.clone(), false);
        ctx.send(OutboundAction::JoinRoom {
            room,
            nick,
            password,
        });
    } else if ctx.rooms.get(&room).is_some_and(|r| r.roster_complete())
        && let Some(slot) = room_slot(ctx, &room)
    {
        ctx.focus(slot);
    }
    Continue
}

fn leave(ctx: &mut AppContext, _args: &[String]) -> ControlFlow {
    if current_room(ctx).is_none() {
        ctx.current_print("You can only use the /leave command in a chat room.");
        return Continue;
    }
    let slot = ctx.windows.current();
    close_one(ctx, slot);
    Continue
}

fn nick(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if !require_connected(ctx) {
        return Continue;
    }
    let Some(room) = current_room(ctx) else {
        ctx.current_print("You can only change your nickname in a chat room window.");
        return Continue;
    };
    let Some(nick) = arg(args, 0) else {
        return bad_usage(ctx, "nick");
    };
    let Some(state) = ctx.rooms.get_mut(&room) else {
        room_print(ctx, &room, '-', Theme::Error, format!("You are not in room {room}."));
        return Continue;
    };
    state.set_pending_nick(nick);
    ctx.send(OutboundAction::ChangeNick {
        room,
        nick: nick.to_string(),
    });
    Continue
}

fn invite(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if !require_connected(ctx) {
        return Continue;
    }
    let Some(room) = current_room(ctx) else {
        ctx.current_print("You must be in a chat room to send an invite.");
        return Continue;
    };
    let Some(contact) = arg(args, 0) else {
        return bad_usage(ctx, "invite");
    };
    let contact = ctx.roster.barejid_from_name(contact);
    let reason = arg(args, 1).map(str::to_string);
    if !ctx.send(OutboundAction::Invite {
        room: room.clone(),
        contact: contact.clone(),
        reason: reason.clone(),
    }) {
        return Continue;
    }
    match reason {
        Some(reason) => ctx.cons_show(format!(
            "Room invite sent, contact: {contact}, room: {room}, reason: \"{reason}\"."
        )),
        None => ctx.cons_show(format!("Room invite sent, contact: {contact}, room: {room}.")),
    }
    Continue
}

fn invites(ctx: &mut AppContext, _args: &[String]) -> ControlFlow {
    let pending: Vec<String> = ctx.rooms.invites().map(str::to_string).collect();
    if pending.is_empty() {
        ctx.cons_show("No outstanding chat room invites.");
    } else {
        ctx.cons_show("Chat room invites:");
        for room in pending {
            ctx.cons_show(format!("  {room}"));
        }
    }
    Continue
}

fn decline(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let Some(room) = arg(args, 0) else {
        return bad_usage(ctx, "decline");
    };
    if ctx.rooms.remove_invite(room) {
        ctx.cons_show(format!("Declined invite to {room}."));
    } else {
        ctx.cons_show("No such invite exists.");
    }
    Continue
}

fn kick(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if !require_connected(ctx) {
        return Continue;
    }
    let Some(room) = current_room(ctx) else {
        ctx.current_print("Command '/kick' only applies in chat rooms.");
        return Continue;
    };
    let Some(nick) = arg(args, 0) else {
        return bad_usage(ctx, "kick");
    };
    if !ctx.rooms.get(&room).is_some_and(|r| r.contains_nick(nick)) {
        room_print(ctx, &room, '!', Theme::Text, format!("Occupant does not exist: {nick}"));
        return Continue;
    }
    ctx.send(OutboundAction::Kick {
        room,
        nick: nick.to_string(),
        reason: arg(args, 1).map(str::to_string),
    });
    Continue
}

fn ban(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if !require_connected(ctx) {
        return Continue;
    }
    let Some(room) = current_room(ctx) else {
        ctx.current_print("Command '/ban' only applies in chat rooms.");
        return Continue;
    };
    let Some(jid) = arg(args, 0) else {
        return bad_usage(ctx, "ban");
    };
    ctx.send(OutboundAction::SetAffiliation {
        room,
        jid: jid.to_string(),
        affiliation: Affiliation::Outcast,
        reason: arg(args, 1).map(str::to_string),
    });
    Continue
}

fn subject(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if !require_connected(ctx) {
        return Continue;
    }
    let Some(room) = current_room(ctx) else {
        ctx.current_print("Command '/subject' only applies in chat rooms.");
        return Continue;
    };
    match (arg(args, 0), arg(args, 1)) {
        (None, _) => {
            let text = match ctx.rooms.get(&room).and_then(|r| r.subject.clone()) {
                Some(subject) => format!("Room subject: {subject}"),
                None => "Room has no subject".to_string(),
            };
            room_print(ctx, &room, '!', Theme::RoomInfo, text);
        }
        (Some("set"), Some(text)) => {
            ctx.send(OutboundAction::SetSubject {
                room,
                subject: Some(text.to_string()),
            });
        }
        (Some("clear"), None) => {
            ctx.send(OutboundAction::SetSubject { room, subject: None });
        }
        _ => return bad_usage(ctx, "subject"),
    }
    Continue
}

fn affiliation(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if !require_connected(ctx) {
        return Continue;
    }
    let Some(room) = current_room(ctx) else {
        ctx.current_print("Command '/affiliation' does not apply to this window.");
        return Continue;
    };
    match arg(args, 0) {
        Some("set") => {
            let (Some(affiliation), Some(jid)) = (
                arg(args, 1).and_then(|a| a.parse::<Affiliation>().ok()),
                arg(args, 2),
            ) else {
                return bad_usage(ctx, "affiliation");
            };
            ctx.send(OutboundAction::SetAffiliation {
                room,
                jid: jid.to_string(),
                affiliation,
                reason: arg(args, 3).map(str::to_string),
            });
        }
        Some("list") => match arg(args, 1) {
            None => {
                for affiliation in [
                    Affiliation::Owner,
                    Affiliation::Admin,
                    Affiliation::Member,
                    Affiliation::Outcast,
                ] {
                    ctx.send(OutboundAction::ListAffiliation {
                        room: room.clone(),
                        affiliation,
                    });
                }
            }
            Some(raw) => match raw.parse::<Affiliation>() {
                Ok(Affiliation::None) => {
                    room_print(ctx, &room, '-', Theme::Text, "Cannot list users with no affiliation.");
                }
                Ok(affiliation) => {
                    ctx.send(OutboundAction::ListAffiliation { room, affiliation });
                }
                Err(()) => return bad_usage(ctx, "affiliation"),
            },
        },
        _ => return bad_usage(ctx, "affiliation"),
    }
    Continue
}

fn role(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if !require_connected(ctx) {
        return Continue;
    }
    let Some(room) = current_room(ctx) else {
        ctx.current_print("Command '/role' does not apply to this window.");
        return Continue;
    };
    match arg(args, 0) {
        Some("set") => {
            let (Some(role), Some(nick)) = (
                arg(args, 1).and_then(|r| r.parse::<Role>().ok()),
                arg(args, 2),
            ) else {
                return bad_usage(ctx, "role");
            };
            ctx.send(OutboundAction::SetRole {
                room,
                nick: nick.to_string(),
                role,
                reason: arg(args, 3).map(str::to_string),
            });
        }
        Some("list") => match arg(args, 1) {
            None => {
                for role in [Role::Moderator, Role::Participant, Role::Visitor] {
                    ctx.send(OutboundAction::ListRole {
                        room: room.clone(),
                        role,
                    });
                }
            }
            Some(raw) => match raw.parse::<Role>() {
                Ok(Role::None) => {
                    room_print(ctx, &room, '-', Theme::Text, "Cannot list users with no role.");
                }
                Ok(role) => {
                    ctx.send(OutboundAction::ListRole { room, role });
                }
                Err(()) => return bad_usage(ctx, "role"),
            },
        },
        _ => return bad_usage(ctx, "role"),
    }
    Continue
}

fn room(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let subcmd = match arg(args, 0) {
        Some(sub @ ("accept" | "destroy" | "config")) => sub,
        _ => return bad_usage(ctx, "room"),
    };
    if !require_connected(ctx) {
        return Continue;
    }
    let Some(roomjid) = current_room(ctx) else {
        ctx.current_print("Command '/room' does not apply to this window.");
        return Continue;
    };
    match subcmd {
        "accept" => {
            let required = ctx.rooms.get(&roomjid).is_some_and(|r| r.requires_config());
            if !required {
                room_print(ctx, &roomjid, '-', Theme::Text, "Current room does not require configuration.");
                return Continue;
            }
            if ctx.send(OutboundAction::AcceptRoomDefaults {
                room: roomjid.clone(),
            }) {
                if let Some(state) = ctx.rooms.get_mut(&roomjid) {
                    state.set_requires_config(false);
                }
                room_print(ctx, &roomjid, '-', Theme::RoomInfo, "Room unlocked.");
            }
        }
        "destroy" => {
            ctx.send(OutboundAction::DestroyRoom { room: roomjid });
        }
        _ => match ctx.windows.lookup(&WindowKey::RoomConfig(roomjid.clone())) {
            Some(slot) => {
                ctx.focus(slot);
            }
            None => {
                ctx.send(OutboundAction::RequestRoomConfig { room: roomjid });
            }
        },
    }
    Continue
}

fn occupants(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if arg(args, 0) == Some("default") {
        let show = match arg(args, 1) {
            Some("show") => true,
            Some("hide") => false,
            _ => return bad_usage(ctx, "occupants"),
        };
        match arg(args, 2) {
            Some("jid") => {
                ctx.prefs.set_bool(Pref::OccupantsJid, show);
                ctx.cons_show(format!("Occupant jids {}.", on_off(show)));
            }
            None => {
                ctx.prefs.set_bool(Pref::Occupants, show);
                ctx.cons_show(format!("Occupant list {}.", on_off(show)));
            }
            Some(_) => return bad_usage(ctx, "occupants"),
        }
        return Continue;
    }

    let show = match arg(args, 0) {
        Some("show") => true,
        Some("hide") => false,
        _ => return bad_usage(ctx, "occupants"),
    };
    let jid = match arg(args, 1) {
        Some("jid") => true,
        None => false,
        Some(_) => return bad_usage(ctx, "occupants"),
    };
    let Some(room) = current_room(ctx) else {
        ctx.current_print("Cannot apply setting when not in chat room.");
        return Continue;
    };
    if let Some(window) = ctx.windows.room_mut(&room) {
        if jid {
            window.show_occupant_jids = show;
        } else {
            window.show_occupants = show;
        }
    }
    ctx.state.request_redraw();
    Continue
}

// ---- encryption -------------------------------------------------------------

fn set_log_pref(ctx: &mut AppContext, command: &str, engine: &str, pref: Pref, value: Option<&str>) {
    let text = match value {
        Some("on") => format!("{engine} messages will be logged as plaintext."),
        Some("off") => format!("{engine} message logging disabled."),
        Some("redact") => format!("{engine} messages will be logged as '[redacted]'."),
        _ => {
            ctx.cons_bad_cmd_usage(command);
            return;
        }
    };
    if let Some(value) = value {
        ctx.prefs.set_string(pref, value);
    }
    ctx.cons_show(text);
    if value != Some("off") && !ctx.prefs.get_bool(Pref::Chlog) {
        ctx.cons_show("Chat logging is currently disabled, use '/chlog on' to enable.");
    }
}

/// Resolves the chat a `start` subcommand applies to, opening and focusing
/// it when a contact was named.
fn encryption_target(ctx: &mut AppContext, contact: Option<&str>) -> Option<String> {
    match contact {
        Some(contact) => {
            let barejid = ctx.roster.barejid_from_name(contact);
            let slot = ctx.ensure_chat(&barejid)?;
            ctx.focus(slot);
            Some(barejid)
        }
        None => current_chat(ctx),
    }
}

fn check_mode(ctx: &mut AppContext, barejid: &str, mode: EncryptionMode) -> bool {
    let conflict = ctx
        .windows
        .chat(barejid)
        .and_then(|chat| chat.encryption.check_start(mode).err());
    match conflict {
        Some(conflict) => {
            report_conflict(ctx, conflict);
            false
        }
        None => true,
    }
}

fn report_conflict(ctx: &mut AppContext, conflict: ModeConflict) {
    tracing::debug!(%conflict, "encryption mode conflict");
    ctx.current_print(conflict.to_string());
}

fn otr(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let Some(subcmd) = arg(args, 0) else {
        return bad_usage(ctx, "otr");
    };
    match subcmd {
        "log" => {
            set_log_pref(ctx, "otr", "OTR", Pref::OtrLog, arg(args, 1));
            return Continue;
        }
        "policy" => {
            match arg(args, 1) {
                None => {
                    let policy = ctx.prefs.get_string(Pref::OtrPolicy);
                    ctx.cons_show(format!("OTR policy is now set to: {policy}"));
                }
                Some(policy @ ("manual" | "opportunistic" | "always")) => {
                    ctx.prefs.set_string(Pref::OtrPolicy, policy);
                    ctx.cons_show(format!("OTR policy is now set to: {policy}"));
                }
                Some(_) => ctx.cons_show("OTR policy can be set to: manual, opportunistic or always."),
            }
            return Continue;
        }
        _ => {}
    }

    if !ctx.otr.available() {
        let err = crate::error::EncryptionError::Unsupported(ctx.otr.name());
        ctx.current_print(err.to_string());
        return Continue;
    }
    if !ctx.connected() {
        ctx.current_print("You must be connected with an account to load OTR information.");
        return Continue;
    }

    match subcmd {
        "myfp" => match ctx.otr.own_fingerprint() {
            Some(fp) => ctx.current_print(format!("Your OTR fingerprint: {fp}")),
            None => ctx.current_print("You have not generated or loaded a private key, use '/otr gen'"),
        },
        "theirfp" => {
            let Some(barejid) = current_chat(ctx) else {
                ctx.current_print("You must be in a regular chat window to view a recipient's fingerprint.");
                return Continue;
            };
            if ctx.windows.chat(&barejid).map(|c| c.encryption.mode()) != Some(EncryptionMode::Otr) {
                ctx.current_print("You are not currently in an OTR session.");
                return Continue;
            }
            match ctx.otr.fingerprint(&barejid) {
                Some(fp) => ctx.current_print(format!("{barejid}'s OTR fingerprint: {fp}")),
                None => ctx.current_print(format!("No OTR fingerprint known for {barejid}.")),
            }
        }
        "start" => otr_start(ctx, arg(args, 1)),
        "end" => {
            let Some(barejid) = current_chat(ctx) else {
                ctx.current_print("You must be in a regular chat window to use OTR.");
                return Continue;
            };
            let active = ctx.windows.chat(&barejid).map(|c| c.encryption.mode());
            if active != Some(EncryptionMode::Otr) {
                report_conflict(ctx, ModeConflict::NotActive(EncryptionMode::Otr));
                return Continue;
            }
            if let Err(err) = ctx.otr.end(&barejid) {
                tracing::warn!(%err, %barejid, "OTR end failed");
                ctx.current_error(err.to_string());
            }
            crate::event::dispatch(ctx, InboundEvent::Encryption(EncryptionEvent::Insecure { barejid }));
        }
        "trust" | "untrust" => {
            let trusted = subcmd == "trust";
            let in_session = current_chat(ctx).filter(|barejid| {
                ctx.windows.chat(barejid).map(|c| c.encryption.mode()) == Some(EncryptionMode::Otr)
            });
            let Some(barejid) = in_session else {
                let verb = if trusted { "trust" } else { "untrust" };
                ctx.current_print(format!("You must be in an OTR session to {verb} a recipient."));
                return Continue;
            };
            let result = if trusted {
                ctx.otr.trust(&barejid)
            } else {
                ctx.otr.untrust(&barejid)
            };
            match result {
                Ok(()) => {
                    let event = if trusted {
                        EncryptionEvent::Trusted { barejid }
                    } else {
                        EncryptionEvent::Untrusted { barejid }
                    };
                    crate::event::dispatch(ctx, InboundEvent::Encryption(event));
                }
                Err(err) => ctx.current_error(err.to_string()),
            }
        }
        "secret" | "question" | "answer" => otr_smp(ctx, subcmd, &args[1..]),
        _ => return bad_usage(ctx, "otr"),
    }
    Continue
}

fn otr_start(ctx: &mut AppContext, contact: Option<&str>) {
    let Some(barejid) = encryption_target(ctx, contact) else {
        ctx.current_print("You must be in a regular chat window to start an OTR session.");
        return;
    };
    if !check_mode(ctx, &barejid, EncryptionMode::Otr) {
        return;
    }
    match ctx.otr.start(&barejid) {
        Ok(StartOutcome::Established { trusted }) => {
            crate::event::dispatch(
                ctx,
                InboundEvent::Encryption(EncryptionEvent::Secured { barejid, trusted }),
            );
        }
        Ok(StartOutcome::Negotiate { query }) => {
            let id = ctx.next_id();
            let to = ctx.chat_address(&barejid);
            ctx.send(OutboundAction::Message {
                to,
                body: query,
                id,
                kind: MessageKind::Chat,
                request_receipt: false,
            });
        }
        Err(err) => {
            tracing::warn!(%err, %barejid, "OTR start failed");
            ctx.current_error(err.to_string());
        }
    }
}

fn otr_smp(ctx: &mut AppContext, subcmd: &str, args: &[String]) {
    let in_session = current_chat(ctx).filter(|barejid| {
        ctx.windows.chat(barejid).map(|c| c.encryption.mode()) == Some(EncryptionMode::Otr)
    });
    let Some(barejid) = in_session else {
        ctx.current_print("You are not currently in an OTR session.");
        return;
    };
    let result = match (subcmd, args) {
        ("secret", [secret]) => ctx.otr.smp_init(&barejid, secret, None),
        ("question", [question, answer]) => ctx.otr.smp_init(&barejid, answer, Some(question.as_str())),
        ("answer", [answer]) => ctx.otr.smp_answer(&barejid, answer),
        _ => {
            ctx.cons_bad_cmd_usage("otr");
            return;
        }
    };
    match result {
        Ok(()) => ctx.current_print("Awaiting authentication from recipient..."),
        Err(err) => ctx.current_error(err.to_string()),
    }
}

fn pgp(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    match arg(args, 0) {
        Some("log") => set_log_pref(ctx, "pgp", "PGP", Pref::PgpLog, arg(args, 1)),
        Some("start") => pgp_start(ctx, arg(args, 1)),
        Some("end") => {
            let Some(barejid) = current_chat(ctx) else {
                ctx.current_print("You must be in a regular chat window to end PGP encryption.");
                return Continue;
            };
            let ended = ctx
                .windows
                .chat_mut(&barejid)
                .map(|chat| chat.encryption.end(EncryptionMode::Pgp));
            match ended {
                Some(Ok(())) => {
                    if let Err(err) = ctx.pgp.end(&barejid) {
                        tracing::debug!(%err, %barejid, "PGP engine end");
                    }
                    ctx.current_print("PGP encryption disabled.");
                }
                Some(Err(conflict)) => report_conflict(ctx, conflict),
                None => {}
            }
        }
        _ => return bad_usage(ctx, "pgp"),
    }
    Continue
}

fn pgp_start(ctx: &mut AppContext, contact: Option<&str>) {
    if !ctx.connected() {
        ctx.current_print("You must be connected to start PGP encryption.");
        return;
    }
    if !ctx.pgp.available() {
        let err = crate::error::EncryptionError::Unsupported(ctx.pgp.name());
        ctx.current_print(err.to_string());
        return;
    }
    let Some(barejid) = encryption_target(ctx, contact) else {
        ctx.current_print("You must be in a regular chat window to start PGP encryption.");
        return;
    };
    if !check_mode(ctx, &barejid, EncryptionMode::Pgp) {
        return;
    }
    let trusted = match ctx.pgp.start(&barejid) {
        Ok(StartOutcome::Established { trusted }) => trusted,
        Ok(StartOutcome::Negotiate { .. }) => false,
        Err(crate::error::EncryptionError::NoKey(_)) => {
            ctx.current_print(format!("No PGP key found for {barejid}."));
            return;
        }
        Err(err) => {
            tracing::warn!(%err, %barejid, "PGP start failed");
            ctx.current_error(err.to_string());
            return;
        }
    };
    let started = ctx
        .windows
        .chat_mut(&barejid)
        .map(|chat| chat.encryption.start(EncryptionMode::Pgp, trusted));
    match started {
        Some(Ok(())) => ctx.current_print("PGP encryption enabled."),
        Some(Err(conflict)) => report_conflict(ctx, conflict),
        None => {}
    }
    ctx.state.request_redraw();
}

// ---- preferences ------------------------------------------------------------

fn beep(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_boolean_pref(ctx, "beep", "Sound", Pref::Beep, arg(args, 0));
    Continue
}

fn flash(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_boolean_pref(ctx, "flash", "Screen flash", Pref::Flash, arg(args, 0));
    Continue
}

fn intype(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_boolean_pref(ctx, "intype", "Show contact typing", Pref::Intype, arg(args, 0));
    Continue
}

fn history(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if set_boolean_pref(ctx, "history", "Chat history", Pref::History, arg(args, 0)) == Some(true) {
        ctx.prefs.set_bool(Pref::Chlog, true);
    }
    Continue
}

fn chlog(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if set_boolean_pref(ctx, "chlog", "Chat logging", Pref::Chlog, arg(args, 0)) == Some(false) {
        ctx.prefs.set_bool(Pref::History, false);
    }
    Continue
}

fn grlog(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_boolean_pref(ctx, "grlog", "Groupchat logging", Pref::Grlog, arg(args, 0));
    Continue
}

fn privileges(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_boolean_pref(ctx, "privileges", "MUC privileges", Pref::Privileges, arg(args, 0));
    ctx.state.request_redraw();
    Continue
}

fn presence(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_boolean_pref(ctx, "presence", "Contact presence", Pref::Presence, arg(args, 0));
    ctx.state.request_redraw();
    Continue
}

fn winstidy(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if set_boolean_pref(ctx, "winstidy", "Wins Auto Tidy", Pref::WinsAutoTidy, arg(args, 0)) == Some(true) {
        autotidy(ctx);
    }
    Continue
}

fn states(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if set_boolean_pref(ctx, "states", "Sending chat states", Pref::States, arg(args, 0)) == Some(false) {
        ctx.prefs.set_bool(Pref::Outtype, false);
        ctx.prefs.set_int(Pref::Gone, 0);
    }
    Continue
}

fn outtype(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if set_boolean_pref(ctx, "outtype", "Sending typing notifications", Pref::Outtype, arg(args, 0))
        == Some(true)
    {
        ctx.prefs.set_bool(Pref::States, true);
    }
    Continue
}

fn carbons(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    set_boolean_pref(ctx, "carbons", "Message carbons preference", Pref::Carbons, arg(args, 0));
    Continue
}

fn receipts(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    match arg(args, 0) {
        Some("send") => {
            set_boolean_pref(ctx, "receipts", "Send delivery receipts", Pref::ReceiptsSend, arg(args, 1));
        }
        Some("request") => {
            set_boolean_pref(
                ctx,
                "receipts",
                "Request delivery receipts",
                Pref::ReceiptsRequest,
                arg(args, 1),
            );
        }
        _ => return bad_usage(ctx, "receipts"),
    }
    Continue
}

fn gone(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let Some(minutes) = arg(args, 0).and_then(|raw| raw.parse::<i64>().ok()).filter(|m| *m >= 0) else {
        return bad_usage(ctx, "gone");
    };
    ctx.prefs.set_int(Pref::Gone, minutes);
    match minutes {
        0 => ctx.cons_show("Automatic leaving conversations after period disabled."),
        1 => ctx.cons_show("Leaving conversations after 1 minute of inactivity."),
        n => ctx.cons_show(format!("Leaving conversations after {n} minutes of inactivity.")),
    }
    if minutes > 0 {
        ctx.prefs.set_bool(Pref::States, true);
    }
    Continue
}

fn notify(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let kind = arg(args, 0);
    let setting = arg(args, 1);
    let value = arg(args, 2);
    match (kind, setting, value) {
        (Some("message"), Some("current"), v) => {
            set_boolean_pref(ctx, "notify", "Current window message notifications", Pref::NotifyMessageCurrent, v);
        }
        (Some("message"), Some("text"), v) => {
            set_boolean_pref(ctx, "notify", "Showing text in message notifications", Pref::NotifyMessageText, v);
        }
        (Some("message"), v, None) => {
            if set_quiet_bool(ctx, Pref::NotifyMessage, v) {
                let enabled = ctx.prefs.get_bool(Pref::NotifyMessage);
                ctx.cons_show(format!("Message notifications {}.", on_off(enabled)));
            } else {
                ctx.cons_show("Usage: /notify message on|off");
            }
        }
        (Some("room"), Some("current"), v) => {
            set_boolean_pref(
                ctx,
                "notify",
                "Current window chat room message notifications",
                Pref::NotifyRoomCurrent,
                v,
            );
        }
        (Some("room"), Some("text"), v) => {
            set_boolean_pref(
                ctx,
                "notify",
                "Showing text in chat room message notifications",
                Pref::NotifyRoomText,
                v,
            );
        }
        (Some("room"), Some(mode @ ("on" | "off" | "mention")), None) => {
            ctx.prefs.set_string(Pref::NotifyRoom, mode);
            match mode {
                "on" => ctx.cons_show("Chat room notifications enabled."),
                "off" => ctx.cons_show("Chat room notifications disabled."),
                _ => ctx.cons_show("Chat room notifications enabled on mention."),
            }
        }
        (Some("room"), _, _) => ctx.cons_show("Usage: /notify room on|off|mention"),
        (Some("typing"), Some("current"), v) => {
            set_boolean_pref(ctx, "notify", "Current window typing notifications", Pref::NotifyTypingCurrent, v);
        }
        (Some("typing"), v, None) => {
            set_boolean_pref(ctx, "notify", "Typing notifications", Pref::NotifyTyping, v);
        }
        (Some("invite"), v, None) => {
            set_boolean_pref(ctx, "notify", "Chat room invite notifications", Pref::NotifyInvite, v);
        }
        (Some("sub"), v, None) => {
            set_boolean_pref(ctx, "notify", "Subscription notifications", Pref::NotifySub, v);
        }
        _ => return bad_usage(ctx, "notify"),
    }
    Continue
}

/// Sets a boolean from `on|off` without printing. Returns whether the value
/// was valid.
fn set_quiet_bool(ctx: &mut AppContext, pref: Pref, value: Option<&str>) -> bool {
    match value {
        Some("on") => ctx.prefs.set_bool(pref, true),
        Some("off") => ctx.prefs.set_bool(pref, false),
        _ => return false,
    }
    true
}

fn statuses(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let (pref, place) = match arg(args, 0) {
        Some("console") => (Pref::StatusesConsole, "in the console"),
        Some("chat") => (Pref::StatusesChat, "in chat windows"),
        Some("muc") => (Pref::StatusesMuc, "in chat room windows"),
        _ => return bad_usage(ctx, "statuses"),
    };
    let level = match arg(args, 1) {
        Some(level @ ("all" | "online" | "none")) => level,
        _ => return bad_usage(ctx, "statuses"),
    };
    ctx.prefs.set_string(pref, level);
    let text = match (pref, level) {
        (_, "all") => format!("All presence updates will appear {place}."),
        (Pref::StatusesMuc, "online") => format!("Only join/leave presence updates will appear {place}."),
        (_, "online") => format!("Only online/offline presence updates will appear {place}."),
        _ => format!("Presence updates will not appear {place}."),
    };
    ctx.cons_show(text);
    Continue
}

fn autoaway(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    let Some(setting) = arg(args, 0) else {
        return bad_usage(ctx, "autoaway");
    };
    let value = arg(args, 1);
    match setting {
        "mode" => match value {
            Some(mode @ ("idle" | "away" | "off")) => {
                ctx.prefs.set_string(Pref::AutoawayMode, mode);
                ctx.cons_show(format!("Auto away mode set to: {mode}."));
            }
            _ => ctx.cons_show("Mode must be one of 'idle', 'away' or 'off'"),
        },
        "time" => match value.and_then(|raw| raw.parse::<i64>().ok()).filter(|m| *m > 0) {
            Some(minutes) => {
                ctx.prefs.set_int(Pref::AutoawayTime, minutes);
                ctx.cons_show(format!("Auto away time set to: {minutes} minutes."));
            }
            None => return bad_usage(ctx, "autoaway"),
        },
        "message" => match value {
            None | Some("off") => {
                ctx.prefs.set_string(Pref::AutoawayMessage, "");
                ctx.cons_show("Auto away message cleared.");
            }
            Some(message) => {
                ctx.prefs.set_string(Pref::AutoawayMessage, message);
                ctx.cons_show(format!("Auto away message set to: \"{message}\"."));
            }
        },
        "check" => {
            set_boolean_pref(ctx, "autoaway", "Online check", Pref::AutoawayCheck, value);
        }
        _ => ctx.cons_show("Setting must be one of 'mode', 'time', 'message' or 'check'"),
    }
    Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::process_input;
    use crate::protocol::{LoopbackTransport, RoomEvent, Transport};
    use crate::window::form::{DataForm, FieldType, FormField};
    use crate::window::RoomConfigWindow;

    fn setup() -> (AppContext, LoopbackTransport) {
        let transport = LoopbackTransport::connected(Jid::parse("me@x.org/pc").unwrap());
        let ctx = AppContext::new(Box::new(transport.clone()));
        (ctx, transport)
    }

    fn run(ctx: &mut AppContext, line: &str) -> ControlFlow {
        process_input(ctx, line)
    }

    fn console_has(ctx: &AppContext, text: &str) -> bool {
        ctx.windows.console().buffer.contains_text(text)
    }

    /// Joins `room` through the loopback and processes the answers.
    fn joined(ctx: &mut AppContext, room: &str) -> usize {
        run(ctx, &format!("/join {room}"));
        crate::event::drain_transport(ctx);
        room_slot(ctx, room).unwrap()
    }

    #[test]
    fn unknown_command_is_reported() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/frobnicate now");
        assert!(console_has(&ctx, "Unknown command: /frobnicate"));
    }

    #[test]
    fn quit_stops_the_loop() {
        let (mut ctx, transport) = setup();
        assert_eq!(run(&mut ctx, "/quit"), ControlFlow::Quit);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn help_lists_commands() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/help");
        assert!(console_has(&ctx, "All commands"));
        run(&mut ctx, "/help join");
        assert!(console_has(&ctx, "/join <room> [nick <nick>] [password <password>]"));
        run(&mut ctx, "/help nothing");
        assert!(console_has(&ctx, "No such command."));
        run(&mut ctx, "/help keys");
        assert!(console_has(&ctx, "Ctrl+Q"));
        assert!(console_has(&ctx, "Focus window 0"));
    }

    #[test]
    fn connect_while_connected_is_refused() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/connect other@x.org");
        assert!(console_has(&ctx, "You are either connected already, or a login is in process."));
    }

    #[test]
    fn connect_uses_default_account() {
        let transport = LoopbackTransport::new();
        let mut ctx = AppContext::new(Box::new(transport.clone()));
        run(&mut ctx, "/connect");
        assert!(console_has(&ctx, "No default account."));
        ctx.default_account = Some(Jid::parse("me@x.org").unwrap());
        run(&mut ctx, "/connect");
        crate::event::drain_transport(&mut ctx);
        assert!(ctx.connected());
        assert!(console_has(&ctx, "me@x.org logged in successfully"));
    }

    #[test]
    fn disconnect_keeps_windows() {
        let (mut ctx, transport) = setup();
        let slot = ctx.ensure_chat("bob@x.org").unwrap();
        run(&mut ctx, "/disconnect");
        assert!(console_has(&ctx, "me@x.org/pc logged out successfully."));
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(ctx.windows.get(slot).is_some());
    }

    #[test]
    fn msg_opens_and_focuses_chat() {
        let (mut ctx, transport) = setup();
        run(&mut ctx, "/msg bob@x.org hello  there");
        let slot = ctx.windows.lookup(&WindowKey::Chat("bob@x.org".into())).unwrap();
        assert_eq!(ctx.windows.current(), slot);
        assert!(transport.sent().iter().any(|a| matches!(
            a,
            OutboundAction::Message { body, .. } if body == "hello  there"
        )));
    }

    #[test]
    fn msg_in_room_needs_known_occupant() {
        let (mut ctx, _transport) = setup();
        let slot = joined(&mut ctx, "r@c.x.org");
        run(&mut ctx, "/msg ghost hi");
        assert!(ctx.windows.get(slot).unwrap().buffer.contains_text("No such participant \"ghost\" in room."));
        ctx.rooms
            .get_mut("r@c.x.org")
            .unwrap()
            .update_occupant("bob", Default::default());
        run(&mut ctx, "/msg bob");
        let private = ctx.windows.lookup(&WindowKey::Private("r@c.x.org/bob".into())).unwrap();
        assert_eq!(ctx.windows.current(), private);
    }

    #[test]
    fn close_console_is_refused() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/close 1");
        assert!(console_has(&ctx, "Cannot close console window."));
        run(&mut ctx, "/close 7");
        assert!(console_has(&ctx, "Window is not open."));
    }

    #[test]
    fn close_modified_form_needs_form_command() {
        let (mut ctx, transport) = setup();
        let room = joined(&mut ctx, "r@c.x.org");
        let form = DataForm::new(
            None,
            None,
            vec![FormField::new("muc#roomconfig_roomname", FieldType::TextSingle)],
        );
        let conf = ctx
            .windows
            .create(WindowPayload::RoomConfig(RoomConfigWindow::new("r@c.x.org", form)))
            .unwrap();
        ctx.focus(conf);
        run(&mut ctx, "/field1 lobby");
        run(&mut ctx, &format!("/close {conf}"));
        assert!(ctx.windows.get(conf).is_some());
        assert!(ctx
            .windows
            .get(conf)
            .unwrap()
            .buffer
            .contains_text("You have unsaved changes, use /form submit or /form cancel"));
        run(&mut ctx, "/form cancel");
        assert!(ctx.windows.get(conf).is_none());
        assert_eq!(ctx.windows.current(), room);
        assert!(transport
            .sent()
            .contains(&OutboundAction::CancelRoomConfig { room: "r@c.x.org".into() }));
    }

    #[test]
    fn close_all_counts_windows() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/close all");
        assert!(console_has(&ctx, "No windows to close."));
        ctx.ensure_chat("a@x.org").unwrap();
        ctx.ensure_chat("b@x.org").unwrap();
        run(&mut ctx, "/close all");
        assert!(console_has(&ctx, "Closed 2 windows."));
        assert_eq!(ctx.windows.len(), 1);
    }

    #[test]
    fn close_read_keeps_unread() {
        let (mut ctx, _transport) = setup();
        ctx.ensure_chat("a@x.org").unwrap();
        let unread = ctx.ensure_chat("b@x.org").unwrap();
        ctx.windows.get_mut(unread).unwrap().mark_unread();
        run(&mut ctx, "/close read");
        assert!(console_has(&ctx, "Closed 1 window."));
        assert!(ctx.windows.window(&WindowKey::Chat("b@x.org".into())).is_some());
    }

    #[test]
    fn swap_reports_missing_window() {
        let (mut ctx, _transport) = setup();
        ctx.ensure_chat("a@x.org").unwrap();
        ctx.ensure_chat("b@x.org").unwrap();
        ctx.ensure_chat("c@x.org").unwrap();
        run(&mut ctx, "/wins swap 3 7");
        assert!(console_has(&ctx, "Window 7 does not exist"));
        assert_eq!(ctx.windows.lookup(&WindowKey::Chat("b@x.org".into())), Some(3));
        run(&mut ctx, "/wins swap 1 3");
        assert!(console_has(&ctx, "Cannot move console window."));
        run(&mut ctx, "/wins swap 2 4");
        assert!(console_has(&ctx, "Swapped windows 2 <-> 4"));
        assert_eq!(ctx.windows.lookup(&WindowKey::Chat("a@x.org".into())), Some(4));
    }

    #[test]
    fn wins_tidy_and_list() {
        let (mut ctx, _transport) = setup();
        ctx.prefs.set_bool(Pref::WinsAutoTidy, false);
        ctx.ensure_chat("a@x.org").unwrap();
        ctx.ensure_chat("b@x.org").unwrap();
        run(&mut ctx, "/close 2");
        run(&mut ctx, "/wins tidy");
        assert!(console_has(&ctx, "Windows tidied."));
        run(&mut ctx, "/wins tidy");
        assert!(console_has(&ctx, "No tidy needed."));
        run(&mut ctx, "/wins");
        assert!(console_has(&ctx, "2: Chat b@x.org"));
    }

    #[test]
    fn win_focuses_existing_only() {
        let (mut ctx, _transport) = setup();
        let slot = ctx.ensure_chat("a@x.org").unwrap();
        run(&mut ctx, &format!("/win {slot}"));
        assert_eq!(ctx.windows.current(), slot);
        run(&mut ctx, "/win 9");
        assert!(console_has(&ctx, "Window 9 does not exist."));
    }

    #[test]
    fn join_defaults_service_and_nick() {
        let (mut ctx, transport) = setup();
        run(&mut ctx, "/join lounge");
        assert!(transport.sent().contains(&OutboundAction::JoinRoom {
            room: "lounge@conference.x.org".into(),
            nick: "me".into(),
            password: None,
        }));
    }

    #[test]
    fn join_uses_invite_password() {
        let (mut ctx, transport) = setup();
        ctx.rooms.add_invite("r@c.x.org", Some("hunter2".into()));
        run(&mut ctx, "/join r@c.x.org nick bobby");
        assert!(transport.sent().contains(&OutboundAction::JoinRoom {
            room: "r@c.x.org".into(),
            nick: "bobby".into(),
            password: Some("hunter2".into()),
        }));
        run(&mut ctx, "/join r@c.x.org colour blue");
        assert!(console_has(&ctx, "Invalid usage, see '/help join' for details."));
    }

    #[test]
    fn kick_requires_room_and_occupant() {
        let (mut ctx, transport) = setup();
        run(&mut ctx, "/kick bob");
        assert!(console_has(&ctx, "Command '/kick' only applies in chat rooms."));
        let slot = joined(&mut ctx, "r@c.x.org");
        run(&mut ctx, "/kick bob");
        assert!(ctx.windows.get(slot).unwrap().buffer.contains_text("Occupant does not exist: bob"));
        ctx.rooms
            .get_mut("r@c.x.org")
            .unwrap()
            .update_occupant("bob", Default::default());
        run(&mut ctx, "/kick bob spamming the room");
        assert!(transport.sent().contains(&OutboundAction::Kick {
            room: "r@c.x.org".into(),
            nick: "bob".into(),
            reason: Some("spamming the room".into()),
        }));
    }

    #[test]
    fn room_accept_unlocks_without_closing() {
        let (mut ctx, transport) = setup();
        transport.lock_room("r@c.x.org");
        let slot = joined(&mut ctx, "r@c.x.org");
        assert!(ctx.rooms.get("r@c.x.org").unwrap().requires_config());
        run(&mut ctx, "/room accept");
        assert!(!ctx.rooms.get("r@c.x.org").unwrap().requires_config());
        assert!(ctx.windows.get(slot).is_some());
        assert!(ctx.windows.get(slot).unwrap().buffer.contains_text("Room unlocked."));
        run(&mut ctx, "/room accept");
        assert!(ctx
            .windows
            .get(slot)
            .unwrap()
            .buffer
            .contains_text("Current room does not require configuration."));
    }

    #[test]
    fn room_config_opens_form() {
        let (mut ctx, _transport) = setup();
        joined(&mut ctx, "r@c.x.org");
        run(&mut ctx, "/room config");
        crate::event::drain_transport(&mut ctx);
        let conf = ctx.windows.lookup(&WindowKey::RoomConfig("r@c.x.org".into())).unwrap();
        assert_eq!(ctx.windows.current(), conf);
    }

    #[test]
    fn affiliation_list_none_is_refused() {
        let (mut ctx, transport) = setup();
        let slot = joined(&mut ctx, "r@c.x.org");
        transport.take_sent();
        run(&mut ctx, "/affiliation list none");
        assert!(ctx.windows.get(slot).unwrap().buffer.contains_text("Cannot list users with no affiliation."));
        run(&mut ctx, "/affiliation list");
        let lists = transport
            .sent()
            .into_iter()
            .filter(|a| matches!(a, OutboundAction::ListAffiliation { .. }))
            .count();
        assert_eq!(lists, 4);
    }

    #[test]
    fn role_set_sends_reason() {
        let (mut ctx, transport) = setup();
        joined(&mut ctx, "r@c.x.org");
        run(&mut ctx, "/role set visitor bob be quiet please");
        assert!(transport.sent().contains(&OutboundAction::SetRole {
            room: "r@c.x.org".into(),
            nick: "bob".into(),
            role: Role::Visitor,
            reason: Some("be quiet please".into()),
        }));
    }

    #[test]
    fn nick_change_round_trip() {
        let (mut ctx, _transport) = setup();
        let slot = joined(&mut ctx, "r@c.x.org");
        run(&mut ctx, "/nick mallory");
        crate::event::drain_transport(&mut ctx);
        assert_eq!(ctx.rooms.nick("r@c.x.org"), Some("mallory"));
        assert!(ctx.windows.get(slot).unwrap().buffer.contains_text("You are now known as mallory"));
    }

    #[test]
    fn leave_outside_room() {
        let (mut ctx, transport) = setup();
        run(&mut ctx, "/leave");
        assert!(console_has(&ctx, "You can only use the /leave command in a chat room."));
        joined(&mut ctx, "r@c.x.org");
        run(&mut ctx, "/leave");
        assert!(!ctx.rooms.is_active("r@c.x.org"));
        assert!(transport
            .sent()
            .iter()
            .any(|a| matches!(a, OutboundAction::LeaveRoom { room, .. } if room == "r@c.x.org")));
    }

    #[test]
    fn occupants_toggle_in_room() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/occupants hide");
        assert!(console_has(&ctx, "Cannot apply setting when not in chat room."));
        joined(&mut ctx, "r@c.x.org");
        run(&mut ctx, "/occupants hide");
        assert!(!ctx.windows.room("r@c.x.org").unwrap().show_occupants);
        run(&mut ctx, "/occupants default show jid");
        assert!(ctx.prefs.get_bool(Pref::OccupantsJid));
        assert!(console_has(&ctx, "Occupant jids enabled."));
    }

    #[test]
    fn invite_and_decline() {
        let (mut ctx, transport) = setup();
        run(&mut ctx, "/invite bob@x.org");
        assert!(console_has(&ctx, "You must be in a chat room to send an invite."));
        joined(&mut ctx, "r@c.x.org");
        run(&mut ctx, "/invite bob@x.org come along");
        assert!(console_has(&ctx, "Room invite sent, contact: bob@x.org, room: r@c.x.org, reason: \"come along\"."));
        assert!(transport.sent().iter().any(|a| matches!(a, OutboundAction::Invite { .. })));
        run(&mut ctx, "/decline other@c.x.org");
        assert!(console_has(&ctx, "No such invite exists."));
        ctx.rooms.add_invite("other@c.x.org", None);
        run(&mut ctx, "/decline other@c.x.org");
        assert!(console_has(&ctx, "Declined invite to other@c.x.org."));
    }

    #[test]
    fn software_in_console_needs_full_jid() {
        let (mut ctx, transport) = setup();
        run(&mut ctx, "/software");
        assert!(console_has(&ctx, "You must provide a jid to the /software command."));
        run(&mut ctx, "/software bob@x.org");
        assert!(console_has(&ctx, "You must provide a full jid to the /software command."));
        run(&mut ctx, "/software me@x.org/pc");
        assert!(console_has(&ctx, "Cannot request software version for yourself."));
        run(&mut ctx, "/software bob@x.org/phone");
        assert!(transport.sent().contains(&OutboundAction::SoftwareVersion {
            jid: "bob@x.org/phone".into()
        }));
    }

    #[test]
    fn resource_requires_roster_contact() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/resource set phone");
        assert!(console_has(&ctx, "Resource can only be changed in chat windows."));
        let slot = ctx.ensure_chat("bob@x.org").unwrap();
        ctx.focus(slot);
        run(&mut ctx, "/resource set phone");
        let window = ctx.windows.get(slot).unwrap();
        assert!(window.buffer.contains_text("Cannot choose resource for contact not in roster."));
    }

    #[test]
    fn resource_refused_during_otr() {
        let (mut ctx, _transport) = setup();
        let slot = ctx.ensure_chat("bob@x.org").unwrap();
        ctx.focus(slot);
        ctx.windows
            .chat_mut("bob@x.org")
            .unwrap()
            .encryption
            .start(EncryptionMode::Otr, false)
            .unwrap();
        run(&mut ctx, "/resource set phone");
        let window = ctx.windows.get(slot).unwrap();
        assert!(window.buffer.contains_text("Cannot choose resource during an OTR session."));
    }

    #[test]
    fn pgp_refused_during_otr() {
        let (mut ctx, _transport) = setup();
        ctx = ctx.with_pgp(AlwaysPgp);
        let slot = ctx.ensure_chat("bob@x.org").unwrap();
        ctx.focus(slot);
        ctx.windows
            .chat_mut("bob@x.org")
            .unwrap()
            .encryption
            .start(EncryptionMode::Otr, false)
            .unwrap();
        run(&mut ctx, "/pgp start");
        let chat = ctx.windows.chat("bob@x.org").unwrap();
        assert_eq!(chat.encryption.mode(), EncryptionMode::Otr);
        let window = ctx.windows.get(slot).unwrap();
        assert!(window.buffer.contains_text("You must end the OTR session to start PGP encryption."));
    }

    #[test]
    fn pgp_start_and_end() {
        let (mut ctx, _transport) = setup();
        ctx = ctx.with_pgp(AlwaysPgp);
        run(&mut ctx, "/pgp start bob@x.org");
        let slot = ctx.windows.lookup(&WindowKey::Chat("bob@x.org".into())).unwrap();
        assert_eq!(ctx.windows.current(), slot);
        assert_eq!(ctx.windows.chat("bob@x.org").unwrap().encryption.mode(), EncryptionMode::Pgp);
        run(&mut ctx, "/pgp end");
        assert_eq!(ctx.windows.chat("bob@x.org").unwrap().encryption.mode(), EncryptionMode::None);
        assert!(ctx.windows.get(slot).unwrap().buffer.contains_text("PGP encryption disabled."));
    }

    #[test]
    fn otr_without_engine_is_unsupported() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/otr start bob@x.org");
        assert!(console_has(
            &ctx,
            "This version of term-chat has not been built with OTR support enabled"
        ));
    }

    #[test]
    fn otr_policy_and_log() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/otr policy always");
        assert_eq!(ctx.prefs.get_string(Pref::OtrPolicy), "always");
        run(&mut ctx, "/otr policy sometimes");
        assert!(console_has(&ctx, "OTR policy can be set to: manual, opportunistic or always."));
        run(&mut ctx, "/otr log on");
        assert!(console_has(&ctx, "OTR messages will be logged as plaintext."));
        assert!(console_has(&ctx, "Chat logging is currently disabled, use '/chlog on' to enable."));
    }

    #[test]
    fn boolean_preferences() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/beep on");
        assert!(ctx.prefs.get_bool(Pref::Beep));
        assert!(console_has(&ctx, "Sound enabled."));
        run(&mut ctx, "/outtype on");
        assert!(ctx.prefs.get_bool(Pref::States));
        run(&mut ctx, "/states off");
        assert!(!ctx.prefs.get_bool(Pref::Outtype));
        assert_eq!(ctx.prefs.get_int(Pref::Gone), 0);
        run(&mut ctx, "/history on");
        assert!(ctx.prefs.get_bool(Pref::Chlog));
        run(&mut ctx, "/chlog off");
        assert!(!ctx.prefs.get_bool(Pref::History));
        run(&mut ctx, "/flash maybe");
        assert!(console_has(&ctx, "Invalid usage, see '/help flash' for details."));
    }

    #[test]
    fn gone_enables_states() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/gone 1");
        assert!(console_has(&ctx, "Leaving conversations after 1 minute of inactivity."));
        assert!(ctx.prefs.get_bool(Pref::States));
        run(&mut ctx, "/gone 0");
        assert!(console_has(&ctx, "Automatic leaving conversations after period disabled."));
    }

    #[test]
    fn notify_room_modes() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/notify room mention");
        assert_eq!(ctx.prefs.get_string(Pref::NotifyRoom), "mention");
        assert!(console_has(&ctx, "Chat room notifications enabled on mention."));
        run(&mut ctx, "/notify room sometimes");
        assert!(console_has(&ctx, "Usage: /notify room on|off|mention"));
        run(&mut ctx, "/notify message off");
        assert!(console_has(&ctx, "Message notifications disabled."));
        run(&mut ctx, "/notify typing current off");
        assert!(!ctx.prefs.get_bool(Pref::NotifyTypingCurrent));
    }

    #[test]
    fn statuses_messages() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/statuses muc online");
        assert!(console_has(&ctx, "Only join/leave presence updates will appear in chat room windows."));
        run(&mut ctx, "/statuses console none");
        assert_eq!(ctx.prefs.get_string(Pref::StatusesConsole), "none");
    }

    #[test]
    fn autoaway_settings() {
        let (mut ctx, _transport) = setup();
        run(&mut ctx, "/autoaway mode away");
        assert_eq!(ctx.prefs.get_string(Pref::AutoawayMode), "away");
        run(&mut ctx, "/autoaway message gone fishing");
        assert!(console_has(&ctx, "Auto away message set to: \"gone fishing\"."));
        run(&mut ctx, "/autoaway mode sleepy");
        assert!(console_has(&ctx, "Mode must be one of 'idle', 'away' or 'off'"));
        run(&mut ctx, "/autoaway colour");
        assert!(console_has(&ctx, "Setting must be one of 'mode', 'time', 'message' or 'check'"));
    }

    #[test]
    fn sub_needs_contact_outside_chat() {
        let (mut ctx, transport) = setup();
        run(&mut ctx, "/sub request");
        assert!(console_has(&ctx, "You must specify a contact."));
        run(&mut ctx, "/sub allow bob@x.org");
        assert!(console_has(&ctx, "Accepted subscription for bob@x.org"));
        assert!(transport.sent().contains(&OutboundAction::Subscription {
            to: "bob@x.org".into(),
            action: SubscriptionAction::Allow,
        }));
    }

    #[test]
    fn away_with_status() {
        let (mut ctx, transport) = setup();
        run(&mut ctx, "/away back  soon");
        assert_eq!(ctx.presence, Presence::Away);
        assert!(transport.sent().contains(&OutboundAction::Presence {
            presence: Presence::Away,
            status: Some("back  soon".into()),
            idle_secs: 0,
        }));
    }

    #[test]
    fn commands_need_connection() {
        let mut ctx = AppContext::new(Box::new(LoopbackTransport::new()));
        run(&mut ctx, "/join r@c.x.org");
        assert!(console_has(&ctx, "You are not currently connected."));
        run(&mut ctx, "/disconnect");
        assert!(console_has(&ctx, "You are not currently connected."));
    }

    #[test]
    fn kicked_event_then_rejoin() {
        let (mut ctx, transport) = setup();
        let slot = joined(&mut ctx, "r@c.x.org");
        transport.push(InboundEvent::Room(RoomEvent::SelfKicked {
            room: "r@c.x.org".into(),
            actor: None,
            reason: None,
        }));
        crate::event::drain_transport(&mut ctx);
        assert!(ctx.windows.get(slot).is_none());
        let again = joined(&mut ctx, "r@c.x.org");
        assert_eq!(ctx.windows.current(), again);
    }

    struct AlwaysPgp;

    impl crate::encryption::EncryptionEngine for AlwaysPgp {
        fn name(&self) -> &'static str {
            "PGP"
        }
        fn is_secure(&self, _barejid: &str) -> bool {
            true
        }
        fn is_trusted(&self, _barejid: &str) -> bool {
            true
        }
        fn start(&mut self, _barejid: &str) -> Result<StartOutcome, crate::error::EncryptionError> {
            Ok(StartOutcome::Established { trusted: true })
        }
        fn end(&mut self, _barejid: &str) -> Result<(), crate::error::EncryptionError> {
            Ok(())
        }
        fn encode(&mut self, _barejid: &str, plaintext: &str) -> Result<String, crate::error::EncryptionError> {
            Ok(plaintext.to_string())
        }
        fn decode(
            &mut self,
            _barejid: &str,
            payload: &str,
        ) -> Result<crate::encryption::Decoded, crate::error::EncryptionError> {
            Ok(crate::encryption::Decoded::Plain(payload.to_string()))
        }
    }
}
