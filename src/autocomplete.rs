use std::collections::BTreeSet;

/// Sorted set of completion candidates with a cycling cursor.
///
/// Repeated calls to [`Autocomplete::complete`] with the same prefix walk
/// through every match in order and wrap around; [`Autocomplete::reset`]
/// starts a fresh search.
#[derive(Debug, Clone, Default)]
pub struct Autocomplete {
    items: BTreeSet<String>,
    last: Option<String>,
}

impl Autocomplete {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: impl Into<String>) {
        self.items.insert(item.into());
    }

    pub fn remove(&mut self, item: &str) -> bool {
        self.items.remove(item)
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.last = None;
    }

    /// Candidates starting with `prefix`, in order.
    pub fn matches<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.items
            .iter()
            .filter(move |item| item.starts_with(prefix))
            .map(String::as_str)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn complete(&mut self, prefix: &str) -> Option<String> {
        let after = self.last.as_deref().filter(|last| last.starts_with(prefix));
        let next = after
            .and_then(|last| {
                self.items
                    .range::<str, _>((std::ops::Bound::Excluded(last), std::ops::Bound::Unbounded))
                    .find(|item| item.starts_with(prefix))
            })
            .or_else(|| self.items.iter().find(|item| item.starts_with(prefix)))
            .cloned();
        self.last = next.clone();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_matches() {
        let mut ac = Autocomplete::new();
        for item in ["/wins", "/win", "/who", "/close"] {
            ac.add(item);
        }
        assert_eq!(ac.complete("/wi").as_deref(), Some("/win"));
        assert_eq!(ac.complete("/wi").as_deref(), Some("/wins"));
        assert_eq!(ac.complete("/wi").as_deref(), Some("/win"));
        ac.reset();
        assert_eq!(ac.complete("/c").as_deref(), Some("/close"));
        assert_eq!(ac.complete("/x"), None);
    }

    #[test]
    fn matches_are_sorted() {
        let mut ac = Autocomplete::new();
        for item in ["/wins", "/win", "/close"] {
            ac.add(item);
        }
        assert_eq!(ac.matches("/w").collect::<Vec<_>>(), vec!["/win", "/wins"]);
    }

    #[test]
    fn remove_drops_candidate() {
        let mut ac = Autocomplete::new();
        ac.add("/field1");
        assert!(ac.remove("/field1"));
        assert!(!ac.remove("/field1"));
        assert!(ac.is_empty());
    }
}
