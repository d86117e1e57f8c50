//! `/form` and the per-field tag commands of room configuration windows.

use crate::command::dispatch::require_connected;
use crate::constants::CONSOLE_SLOT;
use crate::context::AppContext;
use crate::event_loop::ControlFlow;
use crate::protocol::OutboundAction;
use crate::theme::Theme;
use crate::window::form::{FieldEdit, FieldType};
use crate::window::{Window, WindowKey};

/// Prints a whole form into the window at `slot`.
pub fn show_form(ctx: &mut AppContext, slot: usize) {
    let Some(conf) = ctx.windows.get(slot).and_then(Window::as_room_config) else {
        tracing::warn!(slot, "show_form on a window without a form");
        return;
    };
    let form = conf.form.clone();
    let heading = match &form.title {
        Some(title) => format!("Form title: {title}"),
        None => format!("Configuration for room {}.", conf.roomjid),
    };
    ctx.win_show(slot, '-', Theme::Text, heading);
    ctx.win_show(slot, '-', Theme::Text, "");
    if let Some(instructions) = &form.instructions {
        ctx.win_show(slot, '-', Theme::Text, "Supplied instructions:");
        ctx.win_show(slot, '-', Theme::Text, instructions.clone());
        ctx.win_show(slot, '-', Theme::Text, "");
    }
    for field in form.fields() {
        match (field.field_type, field.tag()) {
            (FieldType::Hidden, _) => {}
            (FieldType::Fixed, _) => {
                for value in &field.values {
                    ctx.win_show(slot, '-', Theme::Text, value.clone());
                }
            }
            (_, Some(tag)) => {
                for line in form.describe_field(tag) {
                    ctx.win_show(slot, '-', Theme::Text, line);
                }
            }
            (_, None) => {}
        }
    }
}

fn show_lines(ctx: &mut AppContext, slot: usize, lines: Vec<String>) {
    for line in lines {
        ctx.win_show(slot, '-', Theme::Text, line);
    }
}

/// `/form submit|cancel|show|help [tag]`.
pub fn form_command(ctx: &mut AppContext, args: &[String]) -> ControlFlow {
    if !require_connected(ctx) {
        return ControlFlow::Continue;
    }
    let slot = ctx.windows.current();
    let Some(conf) = ctx.windows.get(slot).and_then(Window::as_room_config) else {
        ctx.current_print("Command '/form' does not apply to this window.");
        return ControlFlow::Continue;
    };
    let roomjid = conf.roomjid.clone();
    match args.first().map(String::as_str) {
        Some("submit") => {
            let form = conf.form.clone();
            ctx.send(OutboundAction::SubmitRoomConfig {
                room: roomjid.clone(),
                form,
            });
            close_form(ctx, slot, &roomjid);
        }
        Some("cancel") => {
            ctx.send(OutboundAction::CancelRoomConfig {
                room: roomjid.clone(),
            });
            close_form(ctx, slot, &roomjid);
        }
        Some("show") => show_form(ctx, slot),
        Some("help") => match args.get(1) {
            Some(tag) => {
                let lines = conf.form.field_help(tag);
                show_lines(ctx, slot, lines);
                ctx.win_show(slot, '-', Theme::Text, "");
            }
            None => {
                let instructions = conf.form.instructions.clone();
                if let Some(instructions) = instructions {
                    ctx.win_show(slot, '-', Theme::Text, "Supplied instructions:");
                    ctx.win_show(slot, '-', Theme::Text, instructions);
                }
                ctx.win_show(slot, '-', Theme::Text, "");
                let usage = crate::command::find("form")
                    .map(|entry| entry.usage)
                    .unwrap_or_default();
                for line in usage {
                    ctx.win_show(slot, '-', Theme::Text, *line);
                }
                ctx.win_show(slot, '-', Theme::Text, "");
            }
        },
        _ => ctx.cons_bad_cmd_usage("form"),
    }
    ControlFlow::Continue
}

/// Closes a submitted or cancelled form and returns focus to its room, or
/// the console if the room window has gone.
fn close_form(ctx: &mut AppContext, slot: usize, roomjid: &str) {
    if let Err(err) = ctx.windows.force_close(slot) {
        tracing::warn!(%err, slot, room = roomjid, "could not close configuration window");
    }
    let target = match ctx.windows.lookup(&WindowKey::Room(roomjid.to_string())) {
        Some(room_slot) => room_slot,
        None => {
            tracing::warn!(room = roomjid, "room window missing after form closed");
            CONSOLE_SLOT
        }
    };
    ctx.focus(target);
    ctx.state.request_redraw();
}

/// Whether `name` (without the slash) is a field tag of the focused form.
pub fn is_field_tag(ctx: &AppContext, name: &str) -> bool {
    ctx.windows
        .current_window()
        .as_room_config()
        .is_some_and(|conf| conf.form.tag_exists(name))
}

/// `/fieldN ...` in a room configuration window.
pub fn field_command(ctx: &mut AppContext, tag: &str, args: &[String]) -> ControlFlow {
    let slot = ctx.windows.current();
    let Some(conf) = ctx
        .windows
        .get_mut(slot)
        .and_then(Window::as_room_config_mut)
    else {
        return ControlFlow::Continue;
    };
    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    let field_type = conf.form.field_type(tag);
    let outcome = conf.form.edit(tag, &words);
    let value = words.get(1).copied().unwrap_or_default().to_string();
    let form = conf.form.clone();
    match outcome {
        FieldEdit::Updated => {
            ctx.win_show(slot, '-', Theme::Text, "Field updated...");
            show_lines(ctx, slot, form.describe_field(tag));
            ctx.win_show(slot, '-', Theme::Text, "");
        }
        FieldEdit::NoSuchField => {
            ctx.win_show(
                slot,
                '-',
                Theme::Text,
                format!("Form does not contain a field with tag {tag}"),
            );
        }
        FieldEdit::InvalidUsage => {
            ctx.win_show(slot, '-', Theme::Text, "Invalid command, usage:");
            show_lines(ctx, slot, form.field_help(tag));
            ctx.win_show(slot, '-', Theme::Text, "");
        }
        FieldEdit::AlreadyPresent => {
            let text = match field_type {
                Some(FieldType::JidMulti) => format!("JID {value} already exists in {tag}"),
                _ => format!("Value {value} already selected for {tag}"),
            };
            ctx.win_show(slot, '-', Theme::Text, text);
        }
        FieldEdit::NotPresent => {
            let text = match field_type {
                Some(FieldType::JidMulti) => format!("Field {tag} does not contain {value}"),
                _ => format!("Value {value} is not currently set for {tag}"),
            };
            ctx.win_show(slot, '-', Theme::Text, text);
        }
    }
    ctx.state.request_redraw();
    ControlFlow::Continue
}
