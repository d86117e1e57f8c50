//! Ties the event loop, the input line, the inbound dispatcher and the
//! renderer together.

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyEvent};

use crate::context::AppContext;
use crate::drivers::{InputDriver, OutputDriver};
use crate::event;
use crate::event_loop::{ControlFlow, EventLoop, InputTimeout};
use crate::input::InputLine;
use crate::keybindings::{Action, KeyBindings};
use crate::prefs::Pref;
use crate::ui;

/// Lines moved per PageUp/PageDown.
const SCROLL_PAGE: usize = 10;

/// Per-run view state owned by the runner rather than the context.
#[derive(Debug, Default)]
pub struct Client {
    pub input: InputLine,
    scroll: usize,
    /// Slot the scroll offset belongs to; focusing another window resets it.
    scroll_slot: usize,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    fn sync_scroll(&mut self, ctx: &AppContext) {
        let current = ctx.windows.current();
        if current != self.scroll_slot {
            self.scroll_slot = current;
            self.scroll = 0;
        }
    }

    /// Handles scrolling keys. Returns whether the key was consumed.
    fn scroll_key(&mut self, ctx: &mut AppContext, bindings: &KeyBindings, key: &KeyEvent) -> bool {
        let len = ctx.windows.current_window().buffer.len();
        match bindings.action_for_key(key) {
            Some(Action::ScrollPageUp) => {
                self.scroll = (self.scroll + SCROLL_PAGE).min(len.saturating_sub(1));
            }
            Some(Action::ScrollPageDown) => {
                self.scroll = self.scroll.saturating_sub(SCROLL_PAGE);
            }
            _ => return false,
        }
        ctx.state.request_redraw();
        true
    }

    /// Applies one terminal event.
    pub fn handle_event(
        &mut self,
        ctx: &mut AppContext,
        bindings: &KeyBindings,
        evt: Event,
        now: Instant,
    ) -> ControlFlow {
        self.sync_scroll(ctx);
        match evt {
            Event::Key(key) => {
                if self.scroll_key(ctx, bindings, &key) {
                    return ControlFlow::Continue;
                }
                let flow = self.input.handle_key(ctx, bindings, key, now);
                self.sync_scroll(ctx);
                flow
            }
            Event::Paste(text) => {
                for c in text.chars().filter(|c| !c.is_control()) {
                    self.input.insert(c);
                }
                ctx.state.request_redraw();
                ControlFlow::Continue
            }
            Event::Resize(..) | Event::FocusGained => {
                ctx.state.request_redraw();
                ControlFlow::Continue
            }
            _ => ControlFlow::Continue,
        }
    }

    /// Idle work between input polls: inbound events and timers.
    pub fn idle(&mut self, ctx: &mut AppContext, now: Instant) {
        let drained = event::drain_transport(ctx);
        if drained > 0 {
            tracing::trace!(drained, "inbound events handled");
        }
        ctx.tick(now);
        self.sync_scroll(ctx);
    }
}

fn input_timeout(ctx: &AppContext) -> (Duration, bool) {
    let millis = u64::try_from(ctx.prefs.get_int(Pref::InpblockTimeout)).unwrap_or(0);
    (
        Duration::from_millis(millis),
        ctx.prefs.get_bool(Pref::InpblockDynamic),
    )
}

/// Runs the client until `/quit`.
///
/// The output driver is entered before the first frame and left on return,
/// including when an I/O error ends the loop.
pub fn run_client<O, D>(
    output: &mut O,
    driver: D,
    ctx: &mut AppContext,
    bindings: &KeyBindings,
) -> io::Result<()>
where
    O: OutputDriver,
    D: InputDriver,
{
    output.enter()?;
    let (max, dynamic) = input_timeout(ctx);
    let mut event_loop = EventLoop::new(driver, InputTimeout::new(max, dynamic));
    let mut client = Client::new();
    ctx.state.request_redraw();

    let result = event_loop.run(|timeout, evt| {
        let now = Instant::now();
        let flow = match evt {
            Some(evt) => client.handle_event(ctx, bindings, evt, now),
            None => {
                client.idle(ctx, now);
                let (max, dynamic) = input_timeout(ctx);
                timeout.configure(max, dynamic);
                ControlFlow::Continue
            }
        };
        if flow == ControlFlow::Quit {
            tracing::info!("quit requested");
            return Ok(ControlFlow::Quit);
        }
        if ctx.state.take_redraw() {
            output.draw(|frame| ui::render(frame, ctx, &client.input, client.scroll()))?;
        }
        Ok(ControlFlow::Continue)
    });

    let exited = output.exit();
    result.and(exited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jid::Jid;
    use crate::protocol::{ChatMessage, InboundEvent, LoopbackTransport};
    use crate::theme::Theme;
    use crossterm::event::{KeyCode, KeyModifiers};
    use ratatui::Frame;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Recorder {
        entered: bool,
        exited: bool,
        frames: usize,
    }

    impl OutputDriver for Recorder {
        fn enter(&mut self) -> io::Result<()> {
            self.entered = true;
            Ok(())
        }

        fn exit(&mut self) -> io::Result<()> {
            self.exited = true;
            Ok(())
        }

        fn draw<F>(&mut self, _f: F) -> io::Result<()>
        where
            F: FnOnce(&mut Frame<'_>),
        {
            self.frames += 1;
            Ok(())
        }
    }

    struct Keys(VecDeque<Event>);

    impl InputDriver for Keys {
        fn poll(&mut self, _timeout: Duration) -> io::Result<bool> {
            Ok(!self.0.is_empty())
        }

        fn read(&mut self) -> io::Result<Event> {
            self.0.pop_front().ok_or_else(|| io::Error::other("empty"))
        }
    }

    fn typed(line: &str) -> Vec<Event> {
        line.chars()
            .map(|c| Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)))
            .chain([Event::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))])
            .collect()
    }

    fn ctx(transport: LoopbackTransport) -> AppContext {
        AppContext::new(Box::new(transport))
    }

    #[test]
    fn quit_command_ends_run() {
        let transport = LoopbackTransport::connected(Jid::parse("me@x.org/pc").unwrap());
        let mut ctx = ctx(transport);
        let mut output = Recorder::default();
        let keys = Keys(typed("/quit").into_iter().collect());
        run_client(&mut output, keys, &mut ctx, &KeyBindings::default()).unwrap();
        assert!(output.entered && output.exited);
        assert!(output.frames >= 1);
    }

    #[test]
    fn idle_drains_transport() {
        let transport = LoopbackTransport::connected(Jid::parse("me@x.org/pc").unwrap());
        transport.push(InboundEvent::Message(ChatMessage::new(
            Jid::parse("bob@x.org/phone").unwrap(),
            "hi",
        )));
        let mut ctx = ctx(transport);
        let mut client = Client::new();
        client.idle(&mut ctx, Instant::now());
        assert!(ctx.windows.chat("bob@x.org").is_some());
    }

    #[test]
    fn page_up_scrolls_and_focus_resets() {
        let transport = LoopbackTransport::connected(Jid::parse("me@x.org/pc").unwrap());
        let mut ctx = ctx(transport);
        for i in 0..30 {
            ctx.win_show(1, '-', Theme::Text, format!("line {i}"));
        }
        let bindings = KeyBindings::default();
        let mut client = Client::new();
        client.sync_scroll(&ctx);
        let page_up = Event::Key(KeyEvent::new(KeyCode::PageUp, KeyModifiers::NONE));
        client.handle_event(&mut ctx, &bindings, page_up, Instant::now());
        assert_eq!(client.scroll(), SCROLL_PAGE);

        let slot = ctx.ensure_chat("bob@x.org").unwrap();
        let alt = Event::Key(KeyEvent::new(KeyCode::Char('2'), KeyModifiers::ALT));
        client.handle_event(&mut ctx, &bindings, alt, Instant::now());
        assert_eq!(ctx.windows.current(), slot);
        assert_eq!(client.scroll(), 0);
    }

    #[test]
    fn paste_inserts_without_submitting() {
        let transport = LoopbackTransport::connected(Jid::parse("me@x.org/pc").unwrap());
        let mut ctx = ctx(transport);
        let mut client = Client::new();
        let flow = client.handle_event(
            &mut ctx,
            &KeyBindings::default(),
            Event::Paste("two\nlines".into()),
            Instant::now(),
        );
        assert_eq!(flow, ControlFlow::Continue);
        assert_eq!(client.input.text(), "twolines");
    }
}
