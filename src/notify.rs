use std::io::{self, Write};

/// A user-facing alert about activity outside the focused window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Message {
        from: String,
        slot: String,
        text: Option<String>,
    },
    RoomMessage {
        room: String,
        nick: String,
        slot: String,
        text: Option<String>,
    },
    Typing {
        from: String,
    },
    Subscription {
        from: String,
    },
    Invite {
        from: String,
        room: String,
    },
}

/// Audible, visual and desktop alerts.
pub trait Notifier {
    fn beep(&mut self);
    fn flash(&mut self);
    fn notify(&mut self, notification: Notification);
}

/// Rings the terminal bell for beeps and records desktop notifications in
/// the log, since the terminal has no notification area of its own.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn beep(&mut self) {
        let mut out = io::stdout();
        if let Err(err) = out.write_all(b"\x07").and_then(|_| out.flush()) {
            tracing::warn!(%err, "terminal bell failed");
        }
    }

    fn flash(&mut self) {
        // raw mode has no portable visual bell; fall back to the audible one
        self.beep();
    }

    fn notify(&mut self, notification: Notification) {
        tracing::info!(?notification, "notification");
    }
}

/// Swallows every alert.
#[derive(Debug, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn beep(&mut self) {}

    fn flash(&mut self) {}

    fn notify(&mut self, _notification: Notification) {}
}
