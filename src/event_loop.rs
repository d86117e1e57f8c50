use std::io;
use std::time::Duration;

use crossterm::event::Event;

use crate::constants::{INPUT_TIMEOUT_MIN, INPUT_TIMEOUT_STEP};
use crate::drivers::InputDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Quit,
}

/// How long one input poll may block.
///
/// In dynamic mode the timeout starts at zero after every keystroke and
/// grows by a fixed step on each idle iteration up to `max`, so typing stays
/// responsive while an idle client sleeps. Otherwise every poll waits `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputTimeout {
    current: Duration,
    max: Duration,
    dynamic: bool,
}

impl InputTimeout {
    pub fn new(max: Duration, dynamic: bool) -> Self {
        Self {
            current: INPUT_TIMEOUT_MIN,
            max,
            dynamic,
        }
    }

    pub fn configure(&mut self, max: Duration, dynamic: bool) {
        self.max = max;
        self.dynamic = dynamic;
        self.current = self.current.min(max);
    }

    /// Timeout for the next poll.
    pub fn next(&mut self) -> Duration {
        if !self.dynamic {
            return self.max;
        }
        let timeout = self.current;
        self.current = (self.current + INPUT_TIMEOUT_STEP).min(self.max);
        timeout
    }

    /// Called on input.
    pub fn reset(&mut self) {
        self.current = INPUT_TIMEOUT_MIN;
    }
}

/// The single-threaded main loop.
///
/// Each iteration first calls the handler with `None` (drain the transport,
/// run timers, redraw), then blocks on the input driver for at most the
/// current [`InputTimeout`]. Pending input is drained in one go so a paste
/// or a burst of keys does not cost one idle iteration per key.
pub struct EventLoop<D> {
    driver: D,
    timeout: InputTimeout,
}

impl<D: InputDriver> EventLoop<D> {
    pub fn new(driver: D, timeout: InputTimeout) -> Self {
        Self { driver, timeout }
    }

    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Runs until the handler returns [`ControlFlow::Quit`]. The handler may
    /// reconfigure the timeout, e.g. after a preference changed.
    pub fn run<F>(&mut self, mut handler: F) -> io::Result<()>
    where
        F: FnMut(&mut InputTimeout, Option<Event>) -> io::Result<ControlFlow>,
    {
        loop {
            if handler(&mut self.timeout, None)? == ControlFlow::Quit {
                return Ok(());
            }

            if self.driver.poll(self.timeout.next())? {
                self.timeout.reset();
                loop {
                    let event = self.driver.read()?;
                    if handler(&mut self.timeout, Some(event))? == ControlFlow::Quit {
                        return Ok(());
                    }
                    if !self.driver.poll(Duration::ZERO)? {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::collections::VecDeque;

    struct Scripted {
        events: VecDeque<Event>,
        polls: Vec<Duration>,
    }

    impl InputDriver for Scripted {
        fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
            self.polls.push(timeout);
            Ok(!self.events.is_empty())
        }

        fn read(&mut self) -> io::Result<Event> {
            self.events
                .pop_front()
                .ok_or_else(|| io::Error::other("no event"))
        }
    }

    fn key(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[test]
    fn dynamic_timeout_grows_and_resets() {
        let mut t = InputTimeout::new(Duration::from_millis(25), true);
        assert_eq!(t.next(), Duration::ZERO);
        assert_eq!(t.next(), Duration::from_millis(10));
        assert_eq!(t.next(), Duration::from_millis(20));
        assert_eq!(t.next(), Duration::from_millis(25));
        assert_eq!(t.next(), Duration::from_millis(25));
        t.reset();
        assert_eq!(t.next(), Duration::ZERO);
    }

    #[test]
    fn fixed_timeout_is_constant() {
        let mut t = InputTimeout::new(Duration::from_millis(500), false);
        assert_eq!(t.next(), Duration::from_millis(500));
        assert_eq!(t.next(), Duration::from_millis(500));
    }

    #[test]
    fn burst_is_drained_before_next_tick() {
        let driver = Scripted {
            events: [key('a'), key('b')].into_iter().collect(),
            polls: Vec::new(),
        };
        let mut event_loop = EventLoop::new(driver, InputTimeout::new(Duration::from_millis(100), true));
        let mut seen = Vec::new();
        let mut ticks = 0;
        event_loop
            .run(|_, event| {
                match event {
                    Some(Event::Key(k)) => seen.push(k.code),
                    Some(_) => {}
                    None => ticks += 1,
                }
                Ok(if ticks == 2 { ControlFlow::Quit } else { ControlFlow::Continue })
            })
            .unwrap();
        assert_eq!(seen, vec![KeyCode::Char('a'), KeyCode::Char('b')]);
        assert_eq!(ticks, 2);
    }

    #[test]
    fn quit_from_event_stops_loop() {
        let driver = Scripted {
            events: [key('q'), key('x')].into_iter().collect(),
            polls: Vec::new(),
        };
        let mut event_loop = EventLoop::new(driver, InputTimeout::new(Duration::ZERO, false));
        event_loop
            .run(|_, event| Ok(if event.is_some() { ControlFlow::Quit } else { ControlFlow::Continue }))
            .unwrap();
        assert_eq!(event_loop.driver().events.len(), 1);
    }
}
