use std::collections::HashMap;
use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    Submit,
    Complete,
    /// Alt-1 .. Alt-0; the payload is the slot (Alt-0 is slot 10).
    SwitchWindow(usize),
    PrevWindow,
    NextWindow,
    // Line editing
    Backspace,
    Delete,
    CursorLeft,
    CursorRight,
    CursorHome,
    CursorEnd,
    ClearLine,
    DeleteWord,
    HistoryPrev,
    HistoryNext,
    // Scrolling
    ScrollPageUp,
    ScrollPageDown,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Quit => write!(f, "Quit"),
            Action::Submit => write!(f, "Submit line"),
            Action::Complete => write!(f, "Complete command or nick"),
            Action::SwitchWindow(slot) => write!(f, "Focus window {}", crate::window::display_slot(*slot)),
            Action::PrevWindow => write!(f, "Previous window"),
            Action::NextWindow => write!(f, "Next window"),
            Action::Backspace => write!(f, "Delete previous character"),
            Action::Delete => write!(f, "Delete next character"),
            Action::CursorLeft => write!(f, "Cursor left"),
            Action::CursorRight => write!(f, "Cursor right"),
            Action::CursorHome => write!(f, "Start of line"),
            Action::CursorEnd => write!(f, "End of line"),
            Action::ClearLine => write!(f, "Clear line"),
            Action::DeleteWord => write!(f, "Delete previous word"),
            Action::HistoryPrev => write!(f, "Previous input"),
            Action::HistoryNext => write!(f, "Next input"),
            Action::ScrollPageUp => write!(f, "Scroll page up"),
            Action::ScrollPageDown => write!(f, "Scroll page down"),
        }
    }
}

/// Listing order of everything except window switching.
const LISTED: &[Action] = &[
    Action::Quit,
    Action::Submit,
    Action::Complete,
    Action::PrevWindow,
    Action::NextWindow,
    Action::Backspace,
    Action::Delete,
    Action::CursorLeft,
    Action::CursorRight,
    Action::CursorHome,
    Action::CursorEnd,
    Action::ClearLine,
    Action::DeleteWord,
    Action::HistoryPrev,
    Action::HistoryNext,
    Action::ScrollPageUp,
    Action::ScrollPageDown,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyCombo {
    pub fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        Self { code, mods }
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        key.code == self.code && key.modifiers == self.mods
    }

    /// Human-readable form, e.g. `Alt+1` or `Ctrl+W`.
    pub fn display(&self) -> String {
        let mods = [
            (KeyModifiers::CONTROL, "Ctrl"),
            (KeyModifiers::SHIFT, "Shift"),
            (KeyModifiers::ALT, "Alt"),
        ];
        let key = match self.code {
            KeyCode::Char(c) => c.to_ascii_uppercase().to_string(),
            KeyCode::F(n) => format!("F{n}"),
            other => format!("{other:?}"),
        };
        mods.iter()
            .filter(|(flag, _)| self.mods.contains(*flag))
            .map(|(_, name)| name.to_string())
            .chain(std::iter::once(key))
            .collect::<Vec<_>>()
            .join("+")
    }
}

#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: HashMap<Action, Vec<KeyCombo>>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use Action::*;
        let none = KeyModifiers::NONE;
        let ctrl = KeyModifiers::CONTROL;
        let alt = KeyModifiers::ALT;

        let mut kb = Self::new();
        kb.add(Quit, KeyCombo::new(KeyCode::Char('q'), ctrl));
        kb.add(Submit, KeyCombo::new(KeyCode::Enter, none));
        kb.add(Complete, KeyCombo::new(KeyCode::Tab, none));
        for (key, slot) in ('1'..='9').zip(1..) {
            kb.add(SwitchWindow(slot), KeyCombo::new(KeyCode::Char(key), alt));
        }
        kb.add(SwitchWindow(10), KeyCombo::new(KeyCode::Char('0'), alt));
        // function keys for terminals that swallow Alt
        for n in 1..=10u8 {
            kb.add(SwitchWindow(usize::from(n)), KeyCombo::new(KeyCode::F(n), none));
        }
        kb.add(PrevWindow, KeyCombo::new(KeyCode::Left, alt));
        kb.add(NextWindow, KeyCombo::new(KeyCode::Right, alt));

        kb.add(Backspace, KeyCombo::new(KeyCode::Backspace, none));
        kb.add(Delete, KeyCombo::new(KeyCode::Delete, none));
        kb.add(CursorLeft, KeyCombo::new(KeyCode::Left, none));
        kb.add(CursorRight, KeyCombo::new(KeyCode::Right, none));
        kb.add(CursorHome, KeyCombo::new(KeyCode::Home, none));
        kb.add(CursorHome, KeyCombo::new(KeyCode::Char('a'), ctrl));
        kb.add(CursorEnd, KeyCombo::new(KeyCode::End, none));
        kb.add(CursorEnd, KeyCombo::new(KeyCode::Char('e'), ctrl));
        kb.add(ClearLine, KeyCombo::new(KeyCode::Char('u'), ctrl));
        kb.add(DeleteWord, KeyCombo::new(KeyCode::Char('w'), ctrl));
        kb.add(HistoryPrev, KeyCombo::new(KeyCode::Up, none));
        kb.add(HistoryNext, KeyCombo::new(KeyCode::Down, none));
        kb.add(ScrollPageUp, KeyCombo::new(KeyCode::PageUp, none));
        kb.add(ScrollPageDown, KeyCombo::new(KeyCode::PageDown, none));
        kb
    }
}

impl KeyBindings {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn add(&mut self, action: Action, combo: KeyCombo) {
        self.map.entry(action).or_default().push(combo);
    }

    pub fn action_for_key(&self, key: &KeyEvent) -> Option<Action> {
        self.map
            .iter()
            .find(|(_, list)| list.iter().any(|c| c.matches(key)))
            .map(|(action, _)| *action)
    }

    pub fn combos_for(&self, action: Action) -> Vec<String> {
        self.map
            .get(&action)
            .map(|list| list.iter().map(KeyCombo::display).collect())
            .unwrap_or_default()
    }

    /// One `(action, keys)` row per bound action for `/help keys`.
    pub fn describe(&self) -> Vec<(Action, String)> {
        let windows = (1..=10).map(Action::SwitchWindow);
        LISTED
            .iter()
            .copied()
            .chain(windows)
            .filter(|action| self.map.contains_key(action))
            .map(|action| (action, self.combos_for(action).join(", ")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_quit() {
        let kb = KeyBindings::default();
        let ev = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert_eq!(kb.action_for_key(&ev), Some(Action::Quit));
    }

    #[test]
    fn describe_lists_every_action() {
        let rows = KeyBindings::default().describe();
        assert_eq!(rows[0], (Action::Quit, "Ctrl+Q".to_string()));
        assert!(rows.contains(&(Action::DeleteWord, "Ctrl+W".to_string())));
        assert!(rows.contains(&(Action::CursorHome, "Home, Ctrl+A".to_string())));
        let slots: Vec<usize> = rows
            .iter()
            .filter_map(|(a, _)| match a {
                Action::SwitchWindow(slot) => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(slots, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn alt_digits_switch_windows() {
        let kb = KeyBindings::default();
        let alt3 = KeyEvent::new(KeyCode::Char('3'), KeyModifiers::ALT);
        assert_eq!(kb.action_for_key(&alt3), Some(Action::SwitchWindow(3)));
        let alt0 = KeyEvent::new(KeyCode::Char('0'), KeyModifiers::ALT);
        assert_eq!(kb.action_for_key(&alt0), Some(Action::SwitchWindow(10)));
        assert_eq!(kb.combos_for(Action::SwitchWindow(10)), vec!["Alt+0", "F10"]);
    }

    #[test]
    fn plain_keys_are_not_bound() {
        let kb = KeyBindings::default();
        let ev = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(kb.action_for_key(&ev), None);
    }
}
