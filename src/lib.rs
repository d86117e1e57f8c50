//! Window and session core of a terminal client for federated chat.
//!
//! [`context::AppContext`] owns all client state. Protocol events enter
//! through [`event::dispatch`], user input through
//! [`command::process_input`], and both resolve to mutations of the
//! [`window::WindowRegistry`] and the per-conversation session, room and
//! encryption state.

pub mod autocomplete;
pub mod command;
pub mod config;
pub mod constants;
pub mod context;
pub mod drivers;
pub mod encryption;
pub mod error;
pub mod event;
pub mod event_loop;
pub mod history;
pub mod input;
pub mod jid;
pub mod keybindings;
pub mod muc;
pub mod notify;
pub mod prefs;
pub mod protocol;
pub mod roster;
pub mod runner;
pub mod session;
pub mod state;
pub mod theme;
pub mod tracing_sub;
pub mod ui;
pub mod window;
