use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::constants::WINDOW_BUFFER_LINES;
use crate::theme::Theme;

/// Delivery-receipt tracking for an outgoing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub id: String,
    pub received: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferLine {
    pub time: Option<DateTime<Local>>,
    /// Single character shown in the gutter (`-`, `!`, `*`, `~` ...).
    pub show_char: char,
    pub theme: Theme,
    pub from: Option<String>,
    pub text: String,
    pub receipt: Option<Receipt>,
}

impl BufferLine {
    pub fn new(show_char: char, theme: Theme, text: impl Into<String>) -> Self {
        Self {
            time: Some(Local::now()),
            show_char,
            theme,
            from: None,
            text: text.into(),
            receipt: None,
        }
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn at(mut self, time: DateTime<Local>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn untimed(mut self) -> Self {
        self.time = None;
        self
    }

    pub fn awaiting_receipt(mut self, id: impl Into<String>) -> Self {
        self.receipt = Some(Receipt {
            id: id.into(),
            received: false,
        });
        self
    }
}

/// Bounded scrollback for one window.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    lines: VecDeque<BufferLine>,
    capacity: usize,
}

impl Default for WindowBuffer {
    fn default() -> Self {
        Self::with_capacity(WINDOW_BUFFER_LINES)
    }
}

impl WindowBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: BufferLine) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> impl DoubleEndedIterator<Item = &BufferLine> + ExactSizeIterator {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn last(&self) -> Option<&BufferLine> {
        self.lines.back()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Flags the line sent with `id` as delivered. Returns whether a line
    /// matched.
    pub fn mark_received(&mut self, id: &str) -> bool {
        let Some(receipt) = self
            .lines
            .iter_mut()
            .rev()
            .filter_map(|line| line.receipt.as_mut())
            .find(|receipt| receipt.id == id)
        else {
            return false;
        };
        receipt.received = true;
        true
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.text.contains(needle))
    }
}
