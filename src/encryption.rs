//! End-to-end encryption state for chat windows and the engine seam.
//!
//! Two engines can be plugged in: an OTR-style engine that negotiates a
//! session with the counterpart, and a PGP-style engine that only needs the
//! counterpart's key. A build without a real engine installs
//! [`UnavailableEngine`] so the commands report "not supported" instead of
//! failing.

use std::fmt;

use crate::error::EncryptionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMode {
    #[default]
    None,
    Otr,
    Pgp,
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EncryptionMode::None => "none",
            EncryptionMode::Otr => "OTR",
            EncryptionMode::Pgp => "PGP",
        })
    }
}

/// A refused mode transition. The `Display` text is what the user sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeConflict {
    /// The other mode is active and must be ended first.
    OtherActive {
        active: EncryptionMode,
        requested: EncryptionMode,
    },
    AlreadyActive(EncryptionMode),
    NotActive(EncryptionMode),
}

impl fmt::Display for ModeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeConflict::OtherActive {
                active: EncryptionMode::Pgp,
                ..
            } => f.write_str("You must disable PGP encryption before starting an OTR session."),
            ModeConflict::OtherActive {
                active: EncryptionMode::Otr,
                ..
            } => f.write_str("You must end the OTR session to start PGP encryption."),
            ModeConflict::OtherActive { requested, .. } => {
                write!(f, "Cannot start {requested} encryption.")
            }
            ModeConflict::AlreadyActive(EncryptionMode::Otr) => {
                f.write_str("You are already in an OTR session.")
            }
            ModeConflict::AlreadyActive(mode) => write!(f, "{mode} encryption already enabled."),
            ModeConflict::NotActive(EncryptionMode::Otr) => {
                f.write_str("You are not currently in an OTR session.")
            }
            ModeConflict::NotActive(mode) => write!(f, "{mode} encryption is not currently enabled."),
        }
    }
}

/// Encryption mode and trust of one chat window.
///
/// Fields are private: every change goes through [`EncryptionState::start`]
/// or [`EncryptionState::end`], which refuse to switch directly between
/// modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncryptionState {
    mode: EncryptionMode,
    trusted: bool,
}

impl EncryptionState {
    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn is_encrypted(&self) -> bool {
        self.mode != EncryptionMode::None
    }

    pub fn check_start(&self, requested: EncryptionMode) -> Result<(), ModeConflict> {
        debug_assert_ne!(requested, EncryptionMode::None);
        match self.mode {
            EncryptionMode::None => Ok(()),
            active if active == requested => Err(ModeConflict::AlreadyActive(active)),
            active => Err(ModeConflict::OtherActive { active, requested }),
        }
    }

    pub fn start(&mut self, requested: EncryptionMode, trusted: bool) -> Result<(), ModeConflict> {
        self.check_start(requested)?;
        tracing::debug!(mode = %requested, trusted, "encryption started");
        self.mode = requested;
        self.trusted = trusted;
        Ok(())
    }

    pub fn end(&mut self, mode: EncryptionMode) -> Result<(), ModeConflict> {
        if self.mode != mode {
            return Err(ModeConflict::NotActive(mode));
        }
        tracing::debug!(%mode, "encryption ended");
        *self = Self::default();
        Ok(())
    }

    /// Updates trust for the active mode. Returns `false` when nothing is
    /// active.
    pub fn set_trusted(&mut self, trusted: bool) -> bool {
        if self.mode == EncryptionMode::None {
            return false;
        }
        self.trusted = trusted;
        true
    }
}

/// What starting a session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The session is immediately usable.
    Established { trusted: bool },
    /// A negotiation message must be sent; the engine reports success later
    /// through an inbound encryption event.
    Negotiate { query: String },
}

/// Result of decoding an inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Plain(String),
    Decrypted(String),
    /// A protocol-internal message that must not be shown.
    Internal,
}

pub trait EncryptionEngine {
    fn name(&self) -> &'static str;

    fn available(&self) -> bool {
        true
    }

    fn is_secure(&self, barejid: &str) -> bool;
    fn is_trusted(&self, barejid: &str) -> bool;
    fn start(&mut self, barejid: &str) -> Result<StartOutcome, EncryptionError>;
    fn end(&mut self, barejid: &str) -> Result<(), EncryptionError>;
    fn encode(&mut self, barejid: &str, plaintext: &str) -> Result<String, EncryptionError>;
    fn decode(&mut self, barejid: &str, payload: &str) -> Result<Decoded, EncryptionError>;

    fn trust(&mut self, barejid: &str) -> Result<(), EncryptionError> {
        let _ = barejid;
        Err(EncryptionError::Unsupported(self.name()))
    }

    fn untrust(&mut self, barejid: &str) -> Result<(), EncryptionError> {
        let _ = barejid;
        Err(EncryptionError::Unsupported(self.name()))
    }

    /// Starts shared-secret verification, optionally with a question.
    fn smp_init(
        &mut self,
        barejid: &str,
        secret: &str,
        question: Option<&str>,
    ) -> Result<(), EncryptionError> {
        let _ = (barejid, secret, question);
        Err(EncryptionError::Unsupported(self.name()))
    }

    fn smp_answer(&mut self, barejid: &str, answer: &str) -> Result<(), EncryptionError> {
        let _ = (barejid, answer);
        Err(EncryptionError::Unsupported(self.name()))
    }

    fn own_fingerprint(&self) -> Option<String> {
        None
    }

    fn fingerprint(&self, barejid: &str) -> Option<String> {
        let _ = barejid;
        None
    }
}

/// Stand-in for an engine that was not built in.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableEngine {
    name: &'static str,
}

impl UnavailableEngine {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub const fn otr() -> Self {
        Self::new("OTR")
    }

    pub const fn pgp() -> Self {
        Self::new("PGP")
    }
}

impl EncryptionEngine for UnavailableEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn available(&self) -> bool {
        false
    }

    fn is_secure(&self, _barejid: &str) -> bool {
        false
    }

    fn is_trusted(&self, _barejid: &str) -> bool {
        false
    }

    fn start(&mut self, _barejid: &str) -> Result<StartOutcome, EncryptionError> {
        Err(EncryptionError::Unsupported(self.name))
    }

    fn end(&mut self, _barejid: &str) -> Result<(), EncryptionError> {
        Err(EncryptionError::Unsupported(self.name))
    }

    fn encode(&mut self, _barejid: &str, _plaintext: &str) -> Result<String, EncryptionError> {
        Err(EncryptionError::Unsupported(self.name))
    }

    fn decode(&mut self, _barejid: &str, payload: &str) -> Result<Decoded, EncryptionError> {
        Ok(Decoded::Plain(payload.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otr_refused_while_pgp_active() {
        let mut state = EncryptionState::default();
        state.start(EncryptionMode::Pgp, false).unwrap();
        let err = state.start(EncryptionMode::Otr, true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "You must disable PGP encryption before starting an OTR session."
        );
        assert_eq!(state.mode(), EncryptionMode::Pgp);
    }

    #[test]
    fn pgp_refused_while_otr_active() {
        let mut state = EncryptionState::default();
        state.start(EncryptionMode::Otr, false).unwrap();
        let err = state.check_start(EncryptionMode::Pgp).unwrap_err();
        assert_eq!(err.to_string(), "You must end the OTR session to start PGP encryption.");
    }

    #[test]
    fn end_requires_matching_mode_and_clears_trust() {
        let mut state = EncryptionState::default();
        assert_eq!(
            state.end(EncryptionMode::Otr),
            Err(ModeConflict::NotActive(EncryptionMode::Otr))
        );
        assert!(!state.set_trusted(true));
        state.start(EncryptionMode::Otr, true).unwrap();
        assert!(state.is_trusted());
        state.end(EncryptionMode::Otr).unwrap();
        assert_eq!(state, EncryptionState::default());
    }

    #[test]
    fn unavailable_engine_reports_unsupported() {
        let mut engine = UnavailableEngine::otr();
        assert!(!engine.available());
        let err = engine.start("bob@x.org").unwrap_err();
        assert_eq!(
            err.to_string(),
            "This version of term-chat has not been built with OTR support enabled"
        );
        assert_eq!(engine.decode("bob@x.org", "hi").unwrap(), Decoded::Plain("hi".into()));
    }
}
