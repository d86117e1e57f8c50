//! Rendering of the client screen.
//!
//! The screen is four stacked rows: a title bar for the focused window, the
//! window buffer (with an occupant panel beside room windows), a status bar
//! listing open slots, and the input line. Rendering only reads
//! [`AppContext`]; nothing here mutates client state.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::context::AppContext;
use crate::encryption::EncryptionMode;
use crate::input::InputLine;
use crate::muc::Role;
use crate::theme::{self, Theme};
use crate::window::{BufferLine, Window, display_slot};

/// Width of the occupant panel beside room windows.
const OCCUPANT_PANEL_WIDTH: u16 = 24;

const TIME_FORMAT: &str = "%H:%M:%S";

/// Draws the whole screen. `scroll` is how many lines the buffer view is
/// scrolled back from the newest line.
pub fn render(frame: &mut Frame<'_>, ctx: &AppContext, input: &InputLine, scroll: usize) {
    let [title, body, status, prompt] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let window = ctx.windows.current_window();
    render_title(frame, ctx, window, title);

    let occupants = window
        .as_room()
        .filter(|room| room.show_occupants)
        .map(|room| room.roomjid.as_str());
    match occupants {
        Some(roomjid) if body.width > OCCUPANT_PANEL_WIDTH * 2 => {
            let [lines, panel] =
                Layout::horizontal([Constraint::Min(1), Constraint::Length(OCCUPANT_PANEL_WIDTH)])
                    .areas(body);
            render_buffer(frame, window, lines, scroll);
            render_occupants(frame, ctx, roomjid, panel);
        }
        _ => render_buffer(frame, window, body, scroll),
    }

    render_status(frame, ctx, status, scroll);
    render_input(frame, input, prompt);
}

fn bar_style() -> Style {
    Style::default().bg(theme::bar_bg()).fg(theme::bar_fg())
}

fn render_title(frame: &mut Frame<'_>, ctx: &AppContext, window: &Window, area: Rect) {
    let mut spans = vec![Span::raw(" "), Span::raw(window.title())];

    if let Some(chat) = window.as_chat() {
        let encryption = chat.encryption;
        if encryption.mode() != EncryptionMode::None {
            let (label, style) = if encryption.is_trusted() {
                ("trusted", Theme::OtrTrusted.style())
            } else {
                ("untrusted", Theme::OtrUntrusted.style())
            };
            spans.push(Span::raw(" ["));
            spans.push(Span::raw(encryption.mode().to_string()));
            if encryption.mode() == EncryptionMode::Otr {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(label, style.bg(theme::bar_bg())));
            }
            spans.push(Span::raw("]"));
        }
        if chat.typing {
            spans.push(Span::raw(" (typing...)"));
        }
    }

    let account = if ctx.connected() {
        format!("{} ({}) ", ctx.account_bare(), ctx.presence)
    } else {
        "(disconnected) ".to_string()
    };
    let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let pad = usize::from(area.width).saturating_sub(used + account.chars().count());
    spans.push(Span::raw(" ".repeat(pad)));
    spans.push(Span::raw(account));

    frame.render_widget(Paragraph::new(Line::from(spans)).style(bar_style()), area);
}

/// One buffered line as styled spans: time, gutter char, sender, text.
fn buffer_line(line: &BufferLine) -> Line<'static> {
    let mut spans = Vec::with_capacity(5);
    if let Some(time) = line.time {
        spans.push(Span::styled(
            format!("{} ", time.format(TIME_FORMAT)),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }
    let pending = line.receipt.as_ref().is_some_and(|r| !r.received);
    if pending {
        spans.push(Span::styled("! ", Theme::Receipt.style()));
    } else {
        spans.push(Span::styled(format!("{} ", line.show_char), line.theme.style()));
    }
    if let Some(from) = &line.from {
        spans.push(Span::styled(format!("{from}: "), line.theme.style()));
    }
    spans.push(Span::styled(line.text.clone(), line.theme.style()));
    Line::from(spans)
}

fn render_buffer(frame: &mut Frame<'_>, window: &Window, area: Rect, scroll: usize) {
    let height = usize::from(area.height);
    let visible: Vec<Line<'static>> = window
        .buffer
        .lines()
        .rev()
        .skip(scroll)
        .take(height)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(buffer_line)
        .collect();
    frame.render_widget(Paragraph::new(visible), area);
}

fn render_occupants(frame: &mut Frame<'_>, ctx: &AppContext, roomjid: &str, area: Rect) {
    let block = Block::default().borders(Borders::LEFT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(room) = ctx.rooms.get(roomjid) else {
        return;
    };
    let show_jids = ctx
        .windows
        .room(roomjid)
        .is_some_and(|win| win.show_occupant_jids);

    let mut lines = Vec::new();
    for (role, heading) in [
        (Role::Moderator, "Moderators"),
        (Role::Participant, "Participants"),
        (Role::Visitor, "Visitors"),
    ] {
        let mut members = room.occupants_by_role(role).peekable();
        if members.peek().is_none() {
            continue;
        }
        lines.push(Line::styled(
            format!("-{heading}"),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        for occupant in members {
            let theme = match occupant.show.as_deref() {
                Some("away" | "xa") => Theme::Away,
                Some("dnd") => Theme::Offline,
                _ => Theme::Online,
            };
            lines.push(Line::styled(format!("  {}", occupant.nick), theme.style()));
            if show_jids && let Some(jid) = &occupant.jid {
                lines.push(Line::styled(format!("    {jid}"), theme.style()));
            }
        }
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_status(frame: &mut Frame<'_>, ctx: &AppContext, area: Rect, scroll: usize) {
    let current = ctx.windows.current();
    let mut spans = vec![Span::raw(format!(
        " [{}] ",
        chrono::Local::now().format("%H:%M")
    ))];
    for (slot, window) in ctx.windows.iter() {
        let fg = if slot == current {
            theme::bar_active_fg()
        } else if window.unread_count() > 0 {
            theme::bar_new_fg()
        } else {
            theme::bar_fg()
        };
        spans.push(Span::styled(
            format!("[{}]", display_slot(slot)),
            Style::default().fg(fg).bg(theme::bar_bg()),
        ));
    }
    if scroll > 0 {
        spans.push(Span::raw(format!(" -- scrolled back {scroll} --")));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).style(bar_style()), area);
}

/// Draws the input line, scrolled horizontally so the cursor stays visible,
/// and places the terminal cursor.
fn render_input(frame: &mut Frame<'_>, input: &InputLine, area: Rect) {
    if area.width == 0 {
        return;
    }
    let width = usize::from(area.width) - 1;
    let cursor = input.cursor();
    let offset = cursor.saturating_sub(width);
    let shown: String = input.text().chars().skip(offset).take(width + 1).collect();
    frame.render_widget(Paragraph::new(shown), area);

    let x = area.x + u16::try_from(cursor - offset).unwrap_or(area.width - 1);
    frame.set_cursor_position(Position::new(x, area.y));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jid::Jid;
    use crate::muc::OccupantUpdate;
    use crate::protocol::LoopbackTransport;
    use crate::theme::Theme;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn ctx() -> AppContext {
        AppContext::new(Box::new(LoopbackTransport::connected(
            Jid::parse("me@x.org/pc").unwrap(),
        )))
    }

    fn screen(ctx: &AppContext, input: &InputLine, scroll: usize) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(60, 8)).unwrap();
        terminal
            .draw(|frame| render(frame, ctx, input, scroll))
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn title_and_lines_are_drawn() {
        let mut ctx = ctx();
        ctx.cons_show("hello there");
        let rows = screen(&ctx, &InputLine::new(), 0);
        assert!(rows[0].contains("Console"));
        assert!(rows[0].contains("me@x.org (online)"));
        assert!(rows.iter().any(|r| r.contains("- hello there")));
    }

    #[test]
    fn status_bar_lists_slots() {
        let mut ctx = ctx();
        ctx.ensure_chat("bob@x.org").unwrap();
        let rows = screen(&ctx, &InputLine::new(), 0);
        assert!(rows[6].contains("[1][2]"));
    }

    #[test]
    fn scrolling_hides_newest_lines() {
        let mut ctx = ctx();
        for i in 0..20 {
            ctx.win_show(1, '-', Theme::Text, format!("line {i:02}"));
        }
        let rows = screen(&ctx, &InputLine::new(), 5);
        assert!(rows.iter().any(|r| r.contains("line 14")));
        assert!(!rows.iter().any(|r| r.contains("line 19")));
        assert!(rows[6].contains("scrolled back 5"));
    }

    #[test]
    fn room_shows_occupant_panel() {
        let mut ctx = ctx();
        ctx.rooms.join("r@c.x.org", "me", None, false);
        ctx.rooms
            .get_mut("r@c.x.org")
            .unwrap()
            .update_occupant(
                "alice",
                OccupantUpdate {
                    role: Role::Moderator,
                    ..OccupantUpdate::default()
                },
            );
        let slot = ctx.ensure_room("r@c.x.org").unwrap();
        ctx.focus(slot);
        let rows = screen(&ctx, &InputLine::new(), 0);
        assert!(rows.iter().any(|r| r.contains("-Moderators")));
        assert!(rows.iter().any(|r| r.contains("alice")));
    }

    #[test]
    fn input_text_is_shown() {
        let ctx = ctx();
        let mut input = InputLine::new();
        input.set_text("/wins");
        let rows = screen(&ctx, &input, 0);
        assert!(rows[7].starts_with("/wins"));
    }
}
