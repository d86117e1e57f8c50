//! Shared crate-wide constants.

use std::time::Duration;

/// Slot permanently held by the console window.
pub const CONSOLE_SLOT: usize = 1;

/// Highest slot number a window may occupy.
///
/// Slots are tracked in a `u32` bitset, so this must stay below 32. Slot 10
/// is displayed (and typed) as `0`, matching the Alt-0 key binding.
pub const MAX_WINDOWS: usize = 20;

/// Number of lines retained in each window buffer before the oldest are
/// dropped.
pub const WINDOW_BUFFER_LINES: usize = 1000;

/// Time spent composing without a keystroke before the local chat state
/// moves to paused.
pub const PAUSED_TIMEOUT: Duration = Duration::from_secs(10);

/// Time spent paused before the local chat state moves to inactive.
pub const INACTIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Lower bound for the adaptive input poll timeout.
pub const INPUT_TIMEOUT_MIN: Duration = Duration::from_millis(0);

/// Step added to the adaptive input poll timeout on every idle iteration.
pub const INPUT_TIMEOUT_STEP: Duration = Duration::from_millis(10);

/// Resource used when the account address carries none.
pub const DEFAULT_RESOURCE: &str = "term-chat";
