use std::collections::{BTreeMap, HashMap};

use crate::autocomplete::Autocomplete;
use crate::constants::{CONSOLE_SLOT, MAX_WINDOWS};
use crate::error::RegistryError;

use super::{
    ChatWindow, PrivateWindow, RoomConfigWindow, RoomWindow, Window, WindowKey, WindowKind,
    WindowPayload,
};

const SLOT_MASK: u32 = if MAX_WINDOWS >= 32 {
    u32::MAX
} else {
    (1u32 << MAX_WINDOWS) - 1
};

fn bit(slot: usize) -> u32 {
    1u32 << (slot - 1)
}

/// Owns every open window, keyed by slot number.
///
/// The console lives outside the slot map so it can never be removed; all
/// other windows sit in `windows`, with `used` mirroring the occupied slots
/// as a bitset and `index` mapping natural keys to slots.
#[derive(Debug)]
pub struct WindowRegistry {
    console: Window,
    windows: BTreeMap<usize, Window>,
    used: u32,
    index: HashMap<WindowKey, usize>,
    current: usize,
    form_fields: Autocomplete,
    activity: u64,
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowRegistry {
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(WindowKey::Console, CONSOLE_SLOT);
        Self {
            console: Window::new(WindowPayload::Console),
            windows: BTreeMap::new(),
            used: bit(CONSOLE_SLOT),
            index,
            current: CONSOLE_SLOT,
            form_fields: Autocomplete::new(),
            activity: 0,
        }
    }

    fn next_free(&self) -> Option<usize> {
        let free = !self.used & SLOT_MASK;
        (free != 0).then(|| free.trailing_zeros() as usize + 1)
    }

    /// Opens a window for `payload`, or returns the slot of the window that
    /// already holds the same key.
    pub fn create(&mut self, payload: WindowPayload) -> Result<usize, RegistryError> {
        let key = payload.key();
        if let Some(&slot) = self.index.get(&key) {
            return Ok(slot);
        }
        let slot = self.next_free().ok_or(RegistryError::CapacityExceeded)?;
        let kind = payload.kind();
        let mut window = Window::new(payload);
        self.activity += 1;
        window.last_activity = self.activity;
        self.windows.insert(slot, window);
        self.used |= bit(slot);
        self.index.insert(key, slot);
        tracing::debug!(slot, %kind, "opened window");
        self.debug_check();
        Ok(slot)
    }

    pub fn lookup(&self, key: &WindowKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn get(&self, slot: usize) -> Option<&Window> {
        if slot == CONSOLE_SLOT {
            Some(&self.console)
        } else {
            self.windows.get(&slot)
        }
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Window> {
        if slot == CONSOLE_SLOT {
            Some(&mut self.console)
        } else {
            self.windows.get_mut(&slot)
        }
    }

    pub fn window(&self, key: &WindowKey) -> Option<&Window> {
        self.lookup(key).and_then(|slot| self.get(slot))
    }

    pub fn window_mut(&mut self, key: &WindowKey) -> Option<&mut Window> {
        let slot = self.lookup(key)?;
        self.get_mut(slot)
    }

    pub fn console(&self) -> &Window {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut Window {
        &mut self.console
    }

    pub fn chat(&self, barejid: &str) -> Option<&ChatWindow> {
        self.window(&WindowKey::Chat(barejid.to_string()))
            .and_then(Window::as_chat)
    }

    pub fn chat_mut(&mut self, barejid: &str) -> Option<&mut ChatWindow> {
        self.window_mut(&WindowKey::Chat(barejid.to_string()))
            .and_then(Window::as_chat_mut)
    }

    pub fn private_mut(&mut self, fulljid: &str) -> Option<&mut PrivateWindow> {
        self.window_mut(&WindowKey::Private(fulljid.to_string()))
            .and_then(Window::as_private_mut)
    }

    pub fn room(&self, roomjid: &str) -> Option<&RoomWindow> {
        self.window(&WindowKey::Room(roomjid.to_string()))
            .and_then(Window::as_room)
    }

    pub fn room_mut(&mut self, roomjid: &str) -> Option<&mut RoomWindow> {
        self.window_mut(&WindowKey::Room(roomjid.to_string()))
            .and_then(Window::as_room_mut)
    }

    pub fn room_config(&self, roomjid: &str) -> Option<&RoomConfigWindow> {
        self.window(&WindowKey::RoomConfig(roomjid.to_string()))
            .and_then(Window::as_room_config)
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_window(&self) -> &Window {
        self.get(self.current).unwrap_or(&self.console)
    }

    pub fn current_window_mut(&mut self) -> &mut Window {
        let slot = self.current;
        if slot != CONSOLE_SLOT
            && let Some(window) = self.windows.get_mut(&slot)
        {
            return window;
        }
        &mut self.console
    }

    pub fn is_current(&self, key: &WindowKey) -> bool {
        self.lookup(key) == Some(self.current)
    }

    /// Focuses `slot`, moving form-field completion from the outgoing window
    /// to the incoming one and clearing the incoming window's unread count.
    pub fn set_current(&mut self, slot: usize) -> Result<(), RegistryError> {
        if self.get(slot).is_none() {
            return Err(RegistryError::NotFound);
        }
        if slot == self.current {
            return Ok(());
        }
        self.deregister_fields(self.current);
        self.register_fields(slot);
        self.activity += 1;
        let activity = self.activity;
        if let Some(window) = self.get_mut(slot) {
            window.clear_unread();
            window.last_activity = activity;
        }
        tracing::debug!(from = self.current, to = slot, "switched window");
        self.current = slot;
        Ok(())
    }

    fn deregister_fields(&mut self, slot: usize) {
        let Some(conf) = self.get(slot).and_then(Window::as_room_config) else {
            return;
        };
        let commands: Vec<String> = conf.field_commands().collect();
        for cmd in commands {
            self.form_fields.remove(&cmd);
        }
    }

    fn register_fields(&mut self, slot: usize) {
        let Some(conf) = self.get(slot).and_then(Window::as_room_config) else {
            return;
        };
        let commands: Vec<String> = conf.field_commands().collect();
        for cmd in commands {
            self.form_fields.add(cmd);
        }
    }

    /// Field commands of the focused room configuration form, if any.
    pub fn form_fields(&mut self) -> &mut Autocomplete {
        &mut self.form_fields
    }

    /// Closes a window. Room configuration forms with unsaved edits are
    /// refused; use [`WindowRegistry::force_close`] for submit/cancel.
    pub fn close(&mut self, slot: usize) -> Result<Window, RegistryError> {
        if let Some(conf) = self.get(slot).and_then(Window::as_room_config)
            && conf.is_modified()
        {
            return Err(RegistryError::UnsavedChanges);
        }
        self.force_close(slot)
    }

    pub fn force_close(&mut self, slot: usize) -> Result<Window, RegistryError> {
        if slot == CONSOLE_SLOT {
            return Err(RegistryError::ConsoleProtected);
        }
        if !self.windows.contains_key(&slot) {
            return Err(RegistryError::NotFound);
        }
        if slot == self.current {
            self.deregister_fields(slot);
            self.current = CONSOLE_SLOT;
        }
        let window = self
            .windows
            .remove(&slot)
            .ok_or(RegistryError::NotFound)?;
        self.used &= !bit(slot);
        self.index.remove(&window.key());
        tracing::debug!(slot, kind = %window.kind(), "closed window");
        self.debug_check();
        Ok(window)
    }

    /// Exchanges the windows in two occupied, non-console slots. Focus stays
    /// with the window, not the slot.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), RegistryError> {
        if a == CONSOLE_SLOT || b == CONSOLE_SLOT {
            return Err(RegistryError::NotFound);
        }
        if !self.windows.contains_key(&a) || !self.windows.contains_key(&b) {
            return Err(RegistryError::NotFound);
        }
        if a == b {
            return Ok(());
        }
        let (Some(win_a), Some(win_b)) = (self.windows.remove(&a), self.windows.remove(&b)) else {
            return Err(RegistryError::NotFound);
        };
        self.index.insert(win_a.key(), b);
        self.index.insert(win_b.key(), a);
        self.windows.insert(a, win_b);
        self.windows.insert(b, win_a);
        if self.current == a {
            self.current = b;
        } else if self.current == b {
            self.current = a;
        }
        tracing::debug!(a, b, "swapped windows");
        self.debug_check();
        Ok(())
    }

    /// Renumbers windows to close gaps, keeping their order. Returns whether
    /// any window moved.
    pub fn tidy(&mut self) -> bool {
        let expected = (CONSOLE_SLOT + 1)..(CONSOLE_SLOT + 1 + self.windows.len());
        if self.windows.keys().copied().eq(expected) {
            return false;
        }
        let old = std::mem::take(&mut self.windows);
        self.used = bit(CONSOLE_SLOT);
        let mut new_current = CONSOLE_SLOT;
        for (new_slot, (old_slot, window)) in (CONSOLE_SLOT + 1..).zip(old) {
            if old_slot == self.current {
                new_current = new_slot;
            }
            self.index.insert(window.key(), new_slot);
            self.used |= bit(new_slot);
            self.windows.insert(new_slot, window);
        }
        self.current = new_current;
        tracing::debug!(windows = self.windows.len(), "tidied windows");
        self.debug_check();
        true
    }

    /// Chat and private windows that have nothing unread and are not
    /// focused, minus the `retain` most recently active ones.
    pub fn prune(&self, retain: usize) -> Vec<usize> {
        let mut candidates: Vec<(usize, u64)> = self
            .windows
            .iter()
            .filter(|(slot, window)| {
                **slot != self.current
                    && window.unread_count() == 0
                    && matches!(window.kind(), WindowKind::Chat | WindowKind::Private)
            })
            .map(|(slot, window)| (*slot, window.last_activity))
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        let mut slots: Vec<usize> = candidates.into_iter().skip(retain).map(|(s, _)| s).collect();
        slots.sort_unstable();
        slots
    }

    pub fn total_unread(&self) -> u32 {
        self.iter().map(|(_, w)| w.unread_count()).sum()
    }

    /// Records that a window received a line, for prune retention.
    pub fn touch(&mut self, slot: usize) {
        self.activity += 1;
        let activity = self.activity;
        if let Some(window) = self.get_mut(slot) {
            window.last_activity = activity;
        }
    }

    /// The slot after (or before) the current one, wrapping around.
    pub fn cycle(&self, forward: bool) -> usize {
        let order = self.slots();
        let idx = order.iter().position(|s| *s == self.current).unwrap_or(0);
        let step = if forward { 1isize } else { -1isize };
        let next = (idx as isize + step).rem_euclid(order.len() as isize) as usize;
        order[next]
    }

    pub fn slots(&self) -> Vec<usize> {
        std::iter::once(CONSOLE_SLOT)
            .chain(self.windows.keys().copied())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Window)> {
        std::iter::once((CONSOLE_SLOT, &self.console))
            .chain(self.windows.iter().map(|(slot, w)| (*slot, w)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Window)> {
        std::iter::once((CONSOLE_SLOT, &mut self.console))
            .chain(self.windows.iter_mut().map(|(slot, w)| (*slot, w)))
    }

    /// Number of open windows, console included.
    pub fn len(&self) -> usize {
        self.windows.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn chat_recipients(&self) -> Vec<String> {
        self.windows
            .values()
            .filter_map(|w| w.as_chat().map(|c| c.barejid.clone()))
            .collect()
    }

    fn debug_check(&self) {
        debug_assert_eq!(self.used.count_ones() as usize, self.windows.len() + 1);
        debug_assert_eq!(self.index.len(), self.windows.len() + 1);
        debug_assert!(
            self.windows
                .iter()
                .all(|(slot, w)| self.index.get(&w.key()) == Some(slot))
        );
        debug_assert!(self.current == CONSOLE_SLOT || self.windows.contains_key(&self.current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::form::{DataForm, FieldType, FormField};

    fn chat(jid: &str) -> WindowPayload {
        WindowPayload::Chat(ChatWindow::new(jid))
    }

    fn config(room: &str) -> WindowPayload {
        let form = DataForm::new(
            None,
            None,
            vec![
                FormField::new("a", FieldType::Boolean),
                FormField::new("b", FieldType::TextSingle),
            ],
        );
        WindowPayload::RoomConfig(RoomConfigWindow::new(room, form))
    }

    #[test]
    fn create_uses_lowest_free_slot_after_console() {
        let mut reg = WindowRegistry::new();
        assert_eq!(reg.create(chat("a@x")).unwrap(), 2);
        assert_eq!(reg.create(chat("b@x")).unwrap(), 3);
        reg.close(2).unwrap();
        assert_eq!(reg.create(chat("c@x")).unwrap(), 2);
        // existing key returns existing slot
        assert_eq!(reg.create(chat("b@x")).unwrap(), 3);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn capacity_exceeded_when_full() {
        let mut reg = WindowRegistry::new();
        for i in 2..=MAX_WINDOWS {
            assert_eq!(reg.create(chat(&format!("u{i}@x"))).unwrap(), i);
        }
        assert_eq!(
            reg.create(chat("extra@x")),
            Err(RegistryError::CapacityExceeded)
        );
    }

    #[test]
    fn console_cannot_be_closed() {
        let mut reg = WindowRegistry::new();
        assert_eq!(reg.close(1).unwrap_err(), RegistryError::ConsoleProtected);
        assert_eq!(reg.close(4).unwrap_err(), RegistryError::NotFound);
    }

    #[test]
    fn closing_current_rehomes_to_console() {
        let mut reg = WindowRegistry::new();
        let slot = reg.create(chat("a@x")).unwrap();
        reg.set_current(slot).unwrap();
        reg.close(slot).unwrap();
        assert_eq!(reg.current(), CONSOLE_SLOT);
    }

    #[test]
    fn swap_requires_two_occupied_slots() {
        let mut reg = WindowRegistry::new();
        reg.create(chat("a@x")).unwrap();
        reg.create(chat("b@x")).unwrap();
        assert_eq!(reg.swap(3, 7), Err(RegistryError::NotFound));
        assert_eq!(reg.swap(1, 2), Err(RegistryError::NotFound));
        reg.set_current(2).unwrap();
        reg.swap(2, 3).unwrap();
        assert_eq!(reg.lookup(&WindowKey::Chat("a@x".into())), Some(3));
        assert_eq!(reg.current(), 3);
    }

    #[test]
    fn tidy_compacts_and_is_idempotent() {
        let mut reg = WindowRegistry::new();
        for jid in ["a@x", "b@x", "c@x", "d@x"] {
            reg.create(chat(jid)).unwrap();
        }
        reg.close(2).unwrap();
        reg.close(4).unwrap();
        reg.set_current(5).unwrap();
        assert!(reg.tidy());
        assert_eq!(reg.slots(), vec![1, 2, 3]);
        assert_eq!(reg.lookup(&WindowKey::Chat("d@x".into())), Some(3));
        assert_eq!(reg.current(), 3);
        assert!(!reg.tidy());
        // freed slots are reusable
        assert_eq!(reg.create(chat("e@x")).unwrap(), 4);
    }

    #[test]
    fn set_current_moves_form_field_completion() {
        let mut reg = WindowRegistry::new();
        let conf = reg.create(config("r@c.x")).unwrap();
        let other = reg.create(chat("a@x")).unwrap();
        reg.set_current(conf).unwrap();
        assert!(reg.form_fields().contains("/field1"));
        reg.set_current(conf).unwrap();
        assert_eq!(reg.form_fields().len(), 2);
        reg.set_current(other).unwrap();
        assert!(reg.form_fields().is_empty());
    }

    #[test]
    fn unsaved_form_refuses_plain_close() {
        let mut reg = WindowRegistry::new();
        let slot = reg.create(config("r@c.x")).unwrap();
        if let Some(conf) = reg.get_mut(slot).and_then(Window::as_room_config_mut) {
            conf.form.edit("field1", &["on"]);
        }
        assert_eq!(reg.close(slot).unwrap_err(), RegistryError::UnsavedChanges);
        assert!(reg.force_close(slot).is_ok());
    }

    #[test]
    fn prune_skips_unread_current_and_rooms() {
        let mut reg = WindowRegistry::new();
        let a = reg.create(chat("a@x")).unwrap();
        let b = reg.create(chat("b@x")).unwrap();
        let c = reg.create(chat("c@x")).unwrap();
        reg.create(WindowPayload::Room(RoomWindow::new("r@c.x", true, false)))
            .unwrap();
        reg.get_mut(b).unwrap().mark_unread();
        reg.set_current(c).unwrap();
        assert_eq!(reg.prune(0), vec![a]);
        assert!(reg.prune(1).is_empty());
        assert_eq!(reg.total_unread(), 1);
    }

    #[test]
    fn cycle_wraps() {
        let mut reg = WindowRegistry::new();
        reg.create(chat("a@x")).unwrap();
        reg.create(chat("b@x")).unwrap();
        assert_eq!(reg.cycle(true), 2);
        assert_eq!(reg.cycle(false), 3);
    }
}
