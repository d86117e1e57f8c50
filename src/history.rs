//! Append-only conversation logs and their replay.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::HistoryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLine {
    pub time: DateTime<Local>,
    pub from: String,
    pub text: String,
}

pub type Replay = Box<dyn Iterator<Item = HistoryLine>>;

pub trait ChatLog {
    fn append(
        &mut self,
        account: &str,
        counterpart: &str,
        line: HistoryLine,
    ) -> Result<(), HistoryError>;

    /// Prior lines for a conversation, oldest first. Each call starts a new
    /// pass over the log.
    fn replay(&self, account: &str, counterpart: &str) -> Result<Replay, HistoryError>;
}

/// One file per account and counterpart under a root directory.
///
/// Lines are stored as `<rfc3339> <from>: <text>` with newlines in the text
/// escaped so each entry stays on one line.
#[derive(Debug, Clone)]
pub struct FileChatLog {
    root: PathBuf,
}

impl FileChatLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, account: &str, counterpart: &str) -> PathBuf {
        self.root
            .join(sanitize(account))
            .join(format!("{}.log", sanitize(counterpart)))
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_line(raw: &str) -> Option<HistoryLine> {
    let (stamp, rest) = raw.split_once(' ')?;
    let time = DateTime::parse_from_rfc3339(stamp).ok()?.with_timezone(&Local);
    let (from, text) = rest.split_once(": ")?;
    Some(HistoryLine {
        time,
        from: from.to_string(),
        text: unescape(text),
    })
}

impl ChatLog for FileChatLog {
    fn append(
        &mut self,
        account: &str,
        counterpart: &str,
        line: HistoryLine,
    ) -> Result<(), HistoryError> {
        let path = self.path(account, counterpart);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(
            file,
            "{} {}: {}",
            line.time.to_rfc3339(),
            line.from,
            escape(&line.text)
        )?;
        Ok(())
    }

    fn replay(&self, account: &str, counterpart: &str) -> Result<Replay, HistoryError> {
        let path = self.path(account, counterpart);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Box::new(std::iter::empty()));
            }
            Err(err) => return Err(err.into()),
        };
        let lines = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|raw| {
                let parsed = parse_line(&raw);
                if parsed.is_none() {
                    tracing::warn!(line = %raw, "skipping malformed chat log line");
                }
                parsed
            });
        Ok(Box::new(lines))
    }
}

/// Log kept in memory for the life of the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryChatLog {
    logs: HashMap<(String, String), Vec<HistoryLine>>,
}

impl MemoryChatLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatLog for MemoryChatLog {
    fn append(
        &mut self,
        account: &str,
        counterpart: &str,
        line: HistoryLine,
    ) -> Result<(), HistoryError> {
        self.logs
            .entry((account.to_string(), counterpart.to_string()))
            .or_default()
            .push(line);
        Ok(())
    }

    fn replay(&self, account: &str, counterpart: &str) -> Result<Replay, HistoryError> {
        let lines = self
            .logs
            .get(&(account.to_string(), counterpart.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(lines.into_iter()))
    }
}
