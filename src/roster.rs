//! Contact list with per-resource presence.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presence {
    #[default]
    Online,
    Chat,
    Away,
    Xa,
    Dnd,
}

impl Presence {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "online" => Presence::Online,
            "chat" => Presence::Chat,
            "away" => Presence::Away,
            "xa" => Presence::Xa,
            "dnd" => Presence::Dnd,
            _ => return None,
        })
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Presence::Online => "online",
            Presence::Chat => "chat",
            Presence::Away => "away",
            Presence::Xa => "xa",
            Presence::Dnd => "dnd",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub presence: Presence,
    pub status: Option<String>,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contact {
    pub barejid: String,
    pub name: Option<String>,
    pub subscription: String,
    pub pending_out: bool,
    pub groups: Vec<String>,
    resources: BTreeMap<String, Resource>,
}

impl Contact {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.barejid)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn is_online(&self) -> bool {
        !self.resources.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Roster {
    contacts: BTreeMap<String, Contact>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates a contact from a roster push.
    pub fn update(
        &mut self,
        barejid: &str,
        name: Option<String>,
        groups: Vec<String>,
        subscription: &str,
        pending_out: bool,
    ) {
        let contact = self
            .contacts
            .entry(barejid.to_string())
            .or_insert_with(|| Contact {
                barejid: barejid.to_string(),
                ..Contact::default()
            });
        contact.name = name;
        contact.groups = groups;
        contact.subscription = subscription.to_string();
        contact.pending_out = pending_out;
    }

    pub fn remove(&mut self, barejid: &str) -> Option<Contact> {
        self.contacts.remove(barejid)
    }

    pub fn get(&self, barejid: &str) -> Option<&Contact> {
        self.contacts.get(barejid)
    }

    pub fn contains(&self, barejid: &str) -> bool {
        self.contacts.contains_key(barejid)
    }

    /// Records a resource coming online. Returns `false` for unknown
    /// contacts.
    pub fn resource_online(&mut self, barejid: &str, resource: Resource) -> bool {
        match self.contacts.get_mut(barejid) {
            Some(contact) => {
                contact.resources.insert(resource.name.clone(), resource);
                true
            }
            None => false,
        }
    }

    /// Records a resource going offline. Returns whether it was known.
    pub fn resource_offline(&mut self, barejid: &str, resource: &str) -> bool {
        self.contacts
            .get_mut(barejid)
            .is_some_and(|c| c.resources.remove(resource).is_some())
    }

    /// Resolves a roster nickname to an address, falling back to the input.
    pub fn barejid_from_name(&self, name: &str) -> String {
        self.contacts
            .values()
            .find(|c| c.name.as_deref() == Some(name))
            .map(|c| c.barejid.clone())
            .unwrap_or_else(|| name.to_string())
    }

    pub fn display_name(&self, barejid: &str) -> String {
        self.contacts
            .get(barejid)
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| barejid.to_string())
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(name: &str) -> Resource {
        Resource {
            name: name.into(),
            presence: Presence::Online,
            status: None,
            priority: 0,
        }
    }

    #[test]
    fn names_resolve_both_ways() {
        let mut roster = Roster::new();
        roster.update("bob@x.org", Some("Bob".into()), vec![], "both", false);
        assert_eq!(roster.barejid_from_name("Bob"), "bob@x.org");
        assert_eq!(roster.barejid_from_name("carol@x.org"), "carol@x.org");
        assert_eq!(roster.display_name("bob@x.org"), "Bob");
        assert_eq!(roster.display_name("carol@x.org"), "carol@x.org");
    }

    #[test]
    fn resources_track_presence() {
        let mut roster = Roster::new();
        assert!(!roster.resource_online("bob@x.org", res("pc")));
        roster.update("bob@x.org", None, vec![], "both", false);
        assert!(roster.resource_online("bob@x.org", res("pc")));
        assert!(roster.get("bob@x.org").unwrap().is_online());
        assert!(roster.resource_offline("bob@x.org", "pc"));
        assert!(!roster.resource_offline("bob@x.org", "pc"));
        assert!(!roster.get("bob@x.org").unwrap().is_online());
    }
}
