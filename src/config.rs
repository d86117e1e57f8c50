//! Command-line options and their resolution into a [`Config`].

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use crate::constants::DEFAULT_RESOURCE;
use crate::error::ConfigError;
use crate::jid::Jid;
use crate::prefs::{self, Pref, PrefValue};

#[derive(Parser, Debug)]
#[command(
    name = "term-chat",
    version = env!("CARGO_PKG_VERSION"),
    about = "A terminal client for federated chat"
)]
pub struct Cli {
    /// Account to log in with. A missing resource defaults to the host name.
    #[arg(short = 'a', long = "account", value_name = "JID")]
    pub account: Option<String>,

    /// Write logs to this file instead of stderr.
    #[arg(short = 'l', long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[arg(long = "log-level", value_name = "LEVEL", default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Directory for chat logs. Without it history is kept in memory only.
    #[arg(long = "history-dir", value_name = "DIR")]
    pub history_dir: Option<PathBuf>,

    /// Preference override, e.g. `--set beep=on`. May be repeated.
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Start without connecting.
    #[arg(long = "offline")]
    pub offline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub account: Option<Jid>,
    pub log_file: Option<PathBuf>,
    pub log_level: Level,
    pub history_dir: Option<PathBuf>,
    pub overrides: Vec<(Pref, PrefValue)>,
    pub offline: bool,
}

impl Cli {
    /// Validates the account and preference overrides.
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let account = self
            .account
            .as_deref()
            .map(|raw| account_jid(raw, &default_resource()))
            .transpose()?;
        let overrides = self
            .set
            .iter()
            .map(|raw| prefs::parse_override(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Config {
            account,
            log_file: self.log_file,
            log_level: self.log_level,
            history_dir: self.history_dir,
            overrides,
            offline: self.offline,
        })
    }
}

/// Parses `raw`, adding `resource` when it carries none.
fn account_jid(raw: &str, resource: &str) -> Result<Jid, ConfigError> {
    let jid = Jid::parse(raw)?;
    if jid.resource().is_some() {
        return Ok(jid);
    }
    Ok(Jid::with_resource(&jid.barejid(), resource)?)
}

fn default_resource() -> String {
    hostname::get()
        .ok()
        .and_then(|s| s.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_RESOURCE.to_string())
}
