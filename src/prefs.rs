//! Typed preference keys with defaults, and the store the dispatchers read.
//!
//! The persisted format is owned by whoever constructs the store; this crate
//! only ever sees values through [`Preferences`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PrefError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefType {
    Bool,
    Str,
    Int,
}

macro_rules! prefs {
    ($($variant:ident => $name:literal, $ty:ident;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Pref {
            $($variant,)*
        }

        impl Pref {
            pub const ALL: &'static [Pref] = &[$(Pref::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Pref::$variant => $name,)*
                }
            }

            pub fn kind(self) -> PrefType {
                match self {
                    $(Pref::$variant => PrefType::$ty,)*
                }
            }
        }
    };
}

prefs! {
    Beep => "beep", Bool;
    Flash => "flash", Bool;
    Intype => "intype", Bool;
    History => "history", Bool;
    Chlog => "chlog", Bool;
    Grlog => "grlog", Bool;
    Occupants => "occupants", Bool;
    OccupantsJid => "occupants.jid", Bool;
    Privileges => "privileges", Bool;
    Presence => "presence", Bool;
    WinsAutoTidy => "wins.autotidy", Bool;
    WinsRetain => "wins.retain", Int;
    NotifyMessage => "notify.message", Bool;
    NotifyMessageCurrent => "notify.message.current", Bool;
    NotifyMessageText => "notify.message.text", Bool;
    NotifyRoom => "notify.room", Str;
    NotifyRoomCurrent => "notify.room.current", Bool;
    NotifyRoomText => "notify.room.text", Bool;
    NotifyTyping => "notify.typing", Bool;
    NotifyTypingCurrent => "notify.typing.current", Bool;
    NotifySub => "notify.sub", Bool;
    NotifyInvite => "notify.invite", Bool;
    States => "states", Bool;
    Outtype => "outtype", Bool;
    Gone => "gone", Int;
    StatusesConsole => "statuses.console", Str;
    StatusesChat => "statuses.chat", Str;
    StatusesMuc => "statuses.muc", Str;
    ReceiptsSend => "receipts.send", Bool;
    ReceiptsRequest => "receipts.request", Bool;
    Carbons => "carbons", Bool;
    ResourceTitle => "resource.title", Bool;
    ResourceMessage => "resource.message", Bool;
    OtrPolicy => "otr.policy", Str;
    OtrLog => "otr.log", Str;
    PgpLog => "pgp.log", Str;
    AutoawayMode => "autoaway.mode", Str;
    AutoawayTime => "autoaway.time", Int;
    AutoawayMessage => "autoaway.message", Str;
    AutoawayCheck => "autoaway.check", Bool;
    InpblockTimeout => "inpblock.timeout", Int;
    InpblockDynamic => "inpblock.dynamic", Bool;
}

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefValue {
    Bool(bool),
    Str(String),
    Int(i64),
}

impl fmt::Display for PrefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefValue::Bool(true) => write!(f, "on"),
            PrefValue::Bool(false) => write!(f, "off"),
            PrefValue::Str(s) => write!(f, "{s}"),
            PrefValue::Int(i) => write!(f, "{i}"),
        }
    }
}

impl Pref {
    pub fn default_value(self) -> PrefValue {
        use Pref::*;
        match self {
            NotifyRoom => PrefValue::Str("on".into()),
            StatusesConsole | StatusesChat | StatusesMuc => PrefValue::Str("all".into()),
            OtrPolicy => PrefValue::Str("manual".into()),
            OtrLog | PgpLog => PrefValue::Str("redact".into()),
            AutoawayMode => PrefValue::Str("off".into()),
            AutoawayMessage => PrefValue::Str(String::new()),
            AutoawayTime => PrefValue::Int(15),
            InpblockTimeout => PrefValue::Int(1000),
            Gone | WinsRetain => PrefValue::Int(0),
            Occupants | Privileges | Presence | WinsAutoTidy | NotifyMessage
            | NotifyMessageCurrent | NotifyRoomCurrent | NotifyTyping | NotifyTypingCurrent
            | NotifySub | NotifyInvite | ResourceTitle | ResourceMessage | AutoawayCheck
            | InpblockDynamic => PrefValue::Bool(true),
            _ => PrefValue::Bool(false),
        }
    }

    /// Parses a textual value according to this key's type.
    pub fn parse_value(self, raw: &str) -> Result<PrefValue, PrefError> {
        let invalid = || PrefError::InvalidValue {
            key: self.name().to_string(),
            value: raw.to_string(),
        };
        match self.kind() {
            PrefType::Bool => match raw {
                "on" | "true" | "1" => Ok(PrefValue::Bool(true)),
                "off" | "false" | "0" => Ok(PrefValue::Bool(false)),
                _ => Err(invalid()),
            },
            PrefType::Int => raw.parse().map(PrefValue::Int).map_err(|_| invalid()),
            PrefType::Str => Ok(PrefValue::Str(raw.to_string())),
        }
    }
}

impl FromStr for Pref {
    type Err = PrefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pref::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| PrefError::UnknownKey(s.to_string()))
    }
}

/// Splits `key=value` and validates it against the key's type.
pub fn parse_override(raw: &str) -> Result<(Pref, PrefValue), PrefError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| PrefError::Malformed(raw.to_string()))?;
    let pref: Pref = key.trim().parse()?;
    let value = pref.parse_value(value.trim())?;
    Ok((pref, value))
}

/// Read-mostly preference lookups. Missing values fall back to
/// [`Pref::default_value`].
pub trait Preferences {
    fn value(&self, pref: Pref) -> PrefValue;
    fn set(&mut self, pref: Pref, value: PrefValue);

    fn get_bool(&self, pref: Pref) -> bool {
        matches!(self.value(pref), PrefValue::Bool(true))
    }

    fn get_string(&self, pref: Pref) -> String {
        match self.value(pref) {
            PrefValue::Str(s) => s,
            other => other.to_string(),
        }
    }

    fn get_int(&self, pref: Pref) -> i64 {
        match self.value(pref) {
            PrefValue::Int(i) => i,
            _ => 0,
        }
    }

    fn set_bool(&mut self, pref: Pref, value: bool) {
        debug_assert_eq!(pref.kind(), PrefType::Bool);
        self.set(pref, PrefValue::Bool(value));
    }

    fn set_string(&mut self, pref: Pref, value: &str) {
        debug_assert_eq!(pref.kind(), PrefType::Str);
        self.set(pref, PrefValue::Str(value.to_string()));
    }

    fn set_int(&mut self, pref: Pref, value: i64) {
        debug_assert_eq!(pref.kind(), PrefType::Int);
        self.set(pref, PrefValue::Int(value));
    }
}

/// In-memory preference store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: HashMap<Pref, PrefValue>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (Pref, PrefValue)>,
    {
        Self {
            values: overrides.into_iter().collect(),
        }
    }
}

impl Preferences for MemoryPreferences {
    fn value(&self, pref: Pref) -> PrefValue {
        self.values
            .get(&pref)
            .cloned()
            .unwrap_or_else(|| pref.default_value())
    }

    fn set(&mut self, pref: Pref, value: PrefValue) {
        tracing::debug!(pref = pref.name(), %value, "preference set");
        self.values.insert(pref, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_key_type() {
        let prefs = MemoryPreferences::new();
        assert!(prefs.get_bool(Pref::Occupants));
        assert!(prefs.get_bool(Pref::WinsAutoTidy));
        assert!(!prefs.get_bool(Pref::Beep));
        assert!(!prefs.get_bool(Pref::Chlog));
        assert_eq!(prefs.get_string(Pref::NotifyRoom), "on");
        assert_eq!(prefs.get_string(Pref::StatusesMuc), "all");
        assert_eq!(prefs.get_int(Pref::Gone), 0);
        for pref in Pref::ALL {
            // every default must match its declared type
            let ok = matches!(
                (pref.kind(), pref.default_value()),
                (PrefType::Bool, PrefValue::Bool(_))
                    | (PrefType::Str, PrefValue::Str(_))
                    | (PrefType::Int, PrefValue::Int(_))
            );
            assert!(ok, "{} default has wrong type", pref.name());
        }
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for pref in Pref::ALL {
            assert_eq!(pref.name().parse::<Pref>().unwrap(), *pref);
        }
        assert!(matches!(
            "nope".parse::<Pref>(),
            Err(PrefError::UnknownKey(_))
        ));
    }

    #[test]
    fn overrides_are_typed() {
        assert_eq!(
            parse_override("beep=on").unwrap(),
            (Pref::Beep, PrefValue::Bool(true))
        );
        assert_eq!(
            parse_override("gone = 5").unwrap(),
            (Pref::Gone, PrefValue::Int(5))
        );
        assert!(matches!(
            parse_override("gone=soon"),
            Err(PrefError::InvalidValue { .. })
        ));
        assert!(matches!(parse_override("beep"), Err(PrefError::Malformed(_))));
    }

    #[test]
    fn set_replaces_default() {
        let mut prefs = MemoryPreferences::new();
        prefs.set_bool(Pref::Beep, true);
        prefs.set_string(Pref::NotifyRoom, "mention");
        assert!(prefs.get_bool(Pref::Beep));
        assert_eq!(prefs.get_string(Pref::NotifyRoom), "mention");
    }
}
