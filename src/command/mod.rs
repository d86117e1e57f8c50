//! Input line parsing and the command table.
//!
//! A line is either empty, plain text for the current window, or a
//! `/command` followed by arguments. Arguments are split with shell quoting
//! rules, except for commands that take a trailing free-text argument (a
//! message, a reason, a status), where everything after the leading words is
//! kept verbatim.

pub mod dispatch;
pub mod form;

use crate::autocomplete::Autocomplete;
use crate::context::AppContext;
use crate::error::CommandError;
use crate::event::outbound;
use crate::event_loop::ControlFlow;
use crate::window::WindowPayload;

/// How a command's argument string is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgStyle {
    /// Every argument is a shell-style word.
    Words,
    /// Up to `n` leading words, then the rest of the line as one argument.
    Freetext(usize),
}

pub type Handler = fn(&mut AppContext, &[String]) -> ControlFlow;

pub struct CommandSpec {
    pub name: &'static str,
    pub args: ArgStyle,
    pub usage: &'static [&'static str],
    pub help: &'static str,
    pub handler: Handler,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Text(String),
    Command(Command),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Name including the leading slash.
    pub name: String,
    /// Everything after the name, leading whitespace removed.
    pub raw: String,
}

impl Command {
    pub fn args(&self) -> Result<Vec<String>, CommandError> {
        shell_words::split(&self.raw).map_err(|_| CommandError::UnbalancedQuotes(self.line()))
    }

    /// The first `words` arguments, then the remainder of the line verbatim.
    pub fn args_with_freetext(&self, words: usize) -> Result<Vec<String>, CommandError> {
        let mut args = Vec::new();
        let mut rest = self.raw.trim_start();
        while args.len() < words && !rest.is_empty() {
            let (word, tail) = split_word(rest).ok_or_else(|| CommandError::UnbalancedQuotes(self.line()))?;
            args.push(word);
            rest = tail.trim_start();
        }
        let rest = rest.trim_end();
        if !rest.is_empty() {
            args.push(rest.to_string());
        }
        Ok(args)
    }

    pub fn split(&self, style: ArgStyle) -> Result<Vec<String>, CommandError> {
        match style {
            ArgStyle::Words => self.args(),
            ArgStyle::Freetext(words) => self.args_with_freetext(words),
        }
    }

    fn line(&self) -> String {
        if self.raw.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.raw)
        }
    }
}

/// One leading word, honouring double quotes.
fn split_word(input: &str) -> Option<(String, &str)> {
    if let Some(quoted) = input.strip_prefix('"') {
        let end = quoted.find('"')?;
        return Some((quoted[..end].to_string(), &quoted[end + 1..]));
    }
    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some((input[..end].to_string(), &input[end..]))
}

pub fn parse(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Input::Empty;
    }
    if let Some(escaped) = line.strip_prefix("//") {
        return Input::Text(format!("/{escaped}"));
    }
    if line.starts_with('/') {
        let trimmed = line.trim();
        let (name, raw) = match trimmed.find(char::is_whitespace) {
            Some(idx) => (&trimmed[..idx], trimmed[idx..].trim_start()),
            None => (trimmed, ""),
        };
        return Input::Command(Command {
            name: name.to_string(),
            raw: raw.to_string(),
        });
    }
    Input::Text(line.to_string())
}

pub fn find(name: &str) -> Option<&'static CommandSpec> {
    let name = if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    };
    dispatch::COMMANDS.iter().find(|entry| entry.name == name)
}

/// Command names offered by tab completion.
pub fn command_completer() -> Autocomplete {
    let mut ac = Autocomplete::new();
    for entry in dispatch::COMMANDS {
        ac.add(entry.name);
    }
    ac
}

/// Handles one submitted input line.
pub fn process_input(ctx: &mut AppContext, line: &str) -> ControlFlow {
    match parse(line) {
        Input::Empty => ControlFlow::Continue,
        Input::Text(text) => {
            send_text(ctx, &text);
            ControlFlow::Continue
        }
        Input::Command(command) => dispatch::execute(ctx, &command),
    }
}

/// Plain text goes to whoever the current window talks to.
fn send_text(ctx: &mut AppContext, text: &str) {
    let target = match &ctx.windows.current_window().payload {
        WindowPayload::Chat(chat) => Target::Chat(chat.barejid.clone()),
        WindowPayload::Private(private) => Target::Private(private.fulljid.clone()),
        WindowPayload::Room(room) => Target::Room(room.roomjid.clone()),
        WindowPayload::Console | WindowPayload::RoomConfig(_) | WindowPayload::ProtocolTrace => {
            ctx.current_print(format!("Unknown command: {text}"));
            return;
        }
    };
    if !ctx.connected() {
        ctx.current_print("You are not currently connected.");
        return;
    }
    match target {
        Target::Chat(barejid) => {
            outbound::send_chat(ctx, &barejid, text);
        }
        Target::Private(fulljid) => {
            outbound::send_private(ctx, &fulljid, text);
        }
        Target::Room(roomjid) => {
            outbound::send_room_message(ctx, &roomjid, text);
        }
    }
}

enum Target {
    Chat(String),
    Private(String),
    Room(String),
}
