use std::time::{Duration, Instant};

/// Whether the idle timer has changed our presence on the user's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoAway {
    #[default]
    Inactive,
    /// Presence was set to away.
    Away,
    /// Presence stayed online but an idle time is being advertised.
    Idle,
}

/// Process-wide UI bookkeeping: the redraw signal and the idle timer.
#[derive(Debug, Clone, Copy)]
pub struct AppState {
    redraw: bool,
    last_input: Instant,
    auto_away: AutoAway,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl AppState {
    pub fn new(now: Instant) -> Self {
        Self {
            redraw: true,
            last_input: now,
            auto_away: AutoAway::Inactive,
        }
    }

    /// Asks the render layer to redraw on its next pass.
    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    /// Resets the idle timer. Returns the auto-away state that was active,
    /// which the caller must undo.
    pub fn keystroke(&mut self, now: Instant) -> AutoAway {
        self.last_input = now;
        std::mem::take(&mut self.auto_away)
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_input)
    }

    pub fn auto_away(&self) -> AutoAway {
        self.auto_away
    }

    pub fn set_auto_away(&mut self, state: AutoAway) {
        self.auto_away = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redraw_flag_is_consumed() {
        let mut s = AppState::new(Instant::now());
        // starts dirty so the first frame is drawn
        assert!(s.take_redraw());
        assert!(!s.take_redraw());
        s.request_redraw();
        s.request_redraw();
        assert!(s.take_redraw());
        assert!(!s.take_redraw());
    }

    #[test]
    fn keystroke_resets_idle_and_auto_away() {
        let t0 = Instant::now();
        let mut s = AppState::new(t0);
        let later = t0 + Duration::from_secs(90);
        assert_eq!(s.idle_for(later), Duration::from_secs(90));
        s.set_auto_away(AutoAway::Away);
        assert_eq!(s.keystroke(later), AutoAway::Away);
        assert_eq!(s.auto_away(), AutoAway::Inactive);
        assert_eq!(s.idle_for(later), Duration::ZERO);
    }
}
