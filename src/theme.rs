use ratatui::style::{Color, Modifier, Style};

/// Semantic colour class attached to every buffered line.
///
/// The core only tags lines; [`Theme::style`] is the single place mapping a
/// tag to terminal colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Text,
    TextMe,
    TextThem,
    Error,
    Info,
    RoomInfo,
    RoomMention,
    RoomMentionTerm,
    Online,
    Offline,
    Away,
    Typing,
    Gone,
    Subscribed,
    Unsubscribed,
    OtrStarted,
    OtrEnded,
    OtrTrusted,
    OtrUntrusted,
    Receipt,
}

impl Theme {
    pub fn style(self) -> Style {
        let fg = match self {
            Theme::Text => Color::Reset,
            Theme::TextMe => Color::Yellow,
            Theme::TextThem => Color::LightGreen,
            Theme::Error => Color::Red,
            Theme::Info => Color::Cyan,
            Theme::RoomInfo => Color::LightYellow,
            Theme::RoomMention | Theme::RoomMentionTerm => Color::LightRed,
            Theme::Online | Theme::Subscribed | Theme::OtrStarted | Theme::OtrTrusted => {
                Color::Green
            }
            Theme::Offline | Theme::Unsubscribed | Theme::OtrEnded | Theme::OtrUntrusted => {
                Color::Red
            }
            Theme::Away => Color::Cyan,
            Theme::Typing => Color::Yellow,
            Theme::Gone => Color::Red,
            Theme::Receipt => Color::DarkGray,
        };
        let style = Style::default().fg(fg);
        if matches!(self, Theme::RoomMentionTerm) {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        }
    }
}

// Chrome colours shared by the title and status bars.
pub fn bar_bg() -> Color {
    Color::Blue
}

pub fn bar_fg() -> Color {
    Color::White
}

pub fn bar_active_fg() -> Color {
    Color::LightCyan
}

pub fn bar_new_fg() -> Color {
    Color::LightMagenta
}
