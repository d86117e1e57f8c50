use std::io;

use thiserror::Error;

/// Failures raised by the window registry.
///
/// Lookups never fail; an absent window is reported as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("all window slots are in use")]
    CapacityExceeded,
    #[error("no such window")]
    NotFound,
    #[error("the console window cannot be closed or moved")]
    ConsoleProtected,
    #[error("You have unsaved changes, use /form submit or /form cancel")]
    UnsavedChanges,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JidError {
    #[error("address is empty")]
    Empty,
    #[error("address has no domain: {0}")]
    MissingDomain(String),
    #[error("address has an empty local part: {0}")]
    EmptyLocal(String),
    #[error("address has an empty resource: {0}")]
    EmptyResource(String),
}

/// Failures reported by an encryption engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptionError {
    #[error("This version of term-chat has not been built with {0} support enabled")]
    Unsupported(&'static str),
    #[error("No public key found for {0}")]
    NoKey(String),
    #[error("{engine} error: {message}")]
    Engine {
        engine: &'static str,
        message: String,
    },
}

/// Failures raised by the transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("not connected")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("chat log io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrefError {
    #[error("unknown preference: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("expected key=value, got: {0}")]
    Malformed(String),
}

/// Failures while turning an input line into a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unmatched quotes in command: {0}")]
    UnbalancedQuotes(String),
}

/// Failures while resolving the command line into a [`crate::config::Config`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid account address: {0}")]
    Account(#[from] JidError),
    #[error(transparent)]
    Pref(#[from] PrefError),
}
