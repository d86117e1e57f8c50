use std::fmt;
use std::str::FromStr;

use crate::error::JidError;

/// An address of the form `[local@]domain[/resource]`.
///
/// Room occupants are addressed as `room@service/nick`, so the resource part
/// doubles as the occupant nickname.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jid {
    local: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    pub fn parse(input: &str) -> Result<Self, JidError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(JidError::Empty);
        }
        let (bare, resource) = match input.split_once('/') {
            Some((_, "")) => return Err(JidError::EmptyResource(input.to_string())),
            Some((bare, res)) => (bare, Some(res.to_string())),
            None => (input, None),
        };
        let (local, domain) = match bare.split_once('@') {
            Some(("", _)) => return Err(JidError::EmptyLocal(input.to_string())),
            Some((local, domain)) => (Some(local.to_lowercase()), domain),
            None => (None, bare),
        };
        if domain.is_empty() {
            return Err(JidError::MissingDomain(input.to_string()));
        }
        Ok(Self {
            local,
            domain: domain.to_lowercase(),
            resource,
        })
    }

    /// Builds `bare/resource` from an already bare address.
    pub fn with_resource(bare: &str, resource: &str) -> Result<Self, JidError> {
        let mut jid = Self::parse(bare)?;
        if resource.is_empty() {
            return Err(JidError::EmptyResource(bare.to_string()));
        }
        jid.resource = Some(resource.to_string());
        Ok(jid)
    }

    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn is_full(&self) -> bool {
        self.resource.is_some()
    }

    pub fn barejid(&self) -> String {
        match &self.local {
            Some(local) => format!("{local}@{}", self.domain),
            None => self.domain.clone(),
        }
    }

    /// The full address, or `None` when no resource is present.
    pub fn fulljid(&self) -> Option<String> {
        self.resource
            .as_ref()
            .map(|res| format!("{}/{res}", self.barejid()))
    }

    pub fn to_bare(&self) -> Jid {
        Jid {
            local: self.local.clone(),
            domain: self.domain.clone(),
            resource: None,
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(res) => write!(f, "{}/{res}", self.barejid()),
            None => write!(f, "{}", self.barejid()),
        }
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_address() {
        let jid = Jid::parse("Alice@Example.org/laptop").unwrap();
        assert_eq!(jid.local(), Some("alice"));
        assert_eq!(jid.domain(), "example.org");
        assert_eq!(jid.resource(), Some("laptop"));
        assert_eq!(jid.barejid(), "alice@example.org");
        assert_eq!(jid.fulljid().as_deref(), Some("alice@example.org/laptop"));
    }

    #[test]
    fn resource_keeps_slashes_and_case() {
        // occupant nicks may contain anything after the first slash
        let jid = Jid::parse("room@conf.example.org/Bob/Away").unwrap();
        assert_eq!(jid.resource(), Some("Bob/Away"));
    }

    #[test]
    fn domain_only() {
        let jid = Jid::parse("conf.example.org").unwrap();
        assert_eq!(jid.local(), None);
        assert_eq!(jid.barejid(), "conf.example.org");
        assert!(jid.fulljid().is_none());
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(Jid::parse("  "), Err(JidError::Empty));
        assert!(matches!(Jid::parse("@x.org"), Err(JidError::EmptyLocal(_))));
        assert!(matches!(Jid::parse("a@"), Err(JidError::MissingDomain(_))));
        assert!(matches!(
            Jid::parse("a@x.org/"),
            Err(JidError::EmptyResource(_))
        ));
    }

    #[test]
    fn with_resource_builds_full() {
        let jid = Jid::with_resource("room@conf.x.org", "nick").unwrap();
        assert_eq!(jid.to_string(), "room@conf.x.org/nick");
        assert_eq!(jid.to_bare().to_string(), "room@conf.x.org");
    }
}
