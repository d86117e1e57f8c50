use std::io;

use clap::Parser;

use term_chat::command;
use term_chat::config::Cli;
use term_chat::context::AppContext;
use term_chat::drivers::console::{ConsoleInputDriver, ConsoleOutputDriver};
use term_chat::history::FileChatLog;
use term_chat::keybindings::KeyBindings;
use term_chat::notify::TerminalNotifier;
use term_chat::prefs::MemoryPreferences;
use term_chat::protocol::LoopbackTransport;
use term_chat::runner::run_client;
use term_chat::tracing_sub;

fn main() -> io::Result<()> {
    let config = Cli::parse().resolve().map_err(io::Error::other)?;
    tracing_sub::init(config.log_file.as_deref(), config.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        account = ?config.account,
        offline = config.offline,
        "starting"
    );

    let mut ctx = AppContext::new(Box::new(LoopbackTransport::new()))
        .with_prefs(MemoryPreferences::with_overrides(config.overrides))
        .with_notifier(TerminalNotifier);
    if let Some(dir) = config.history_dir {
        ctx = ctx.with_chat_log(FileChatLog::new(dir));
    }

    ctx.cons_show(format!("term-chat {}", env!("CARGO_PKG_VERSION")));
    ctx.cons_show("Type /help for a list of commands.");
    match config.account {
        Some(account) => {
            let connect = !config.offline;
            ctx = ctx.with_account(account);
            if connect {
                command::process_input(&mut ctx, "/connect");
            }
        }
        None => ctx.cons_show("Use /connect <account> to log in."),
    }

    let mut output = ConsoleOutputDriver::new()?;
    let result = run_client(
        &mut output,
        ConsoleInputDriver::new(),
        &mut ctx,
        &KeyBindings::default(),
    );
    if let Err(err) = &result {
        tracing::error!(%err, "client stopped");
    }
    result
}
