//! Typed `verb:resource` RBAC permissions.
//!
//! Grammar:
//!
//! ```text
//! permission := verb ":" resource
//! verb       := "get" | "list" | "watch" | "create" | "update" | "patch"
//!             | "delete" | "deletecollection" | "*"
//! resource   := "*" | name [ "/" name ]
//! name       := [a-z0-9.-]+
//! ```

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Watch,
    Create,
    Update,
    Patch,
    Delete,
    DeleteCollection,
    Any,
}

impl Verb {
    pub fn is_read(self) -> bool {
        matches!(self, Verb::Get | Verb::List | Verb::Watch | Verb::Any)
    }

    pub fn is_write(self) -> bool {
        !matches!(self, Verb::Get | Verb::List | Verb::Watch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Watch => "watch",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
            Verb::DeleteCollection => "deletecollection",
            Verb::Any => "*",
        }
    }
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "get" => Verb::Get,
            "list" => Verb::List,
            "watch" => Verb::Watch,
            "create" => Verb::Create,
            "update" => Verb::Update,
            "patch" => Verb::Patch,
            "delete" => Verb::Delete,
            "deletecollection" => Verb::DeleteCollection,
            "*" => Verb::Any,
            _ => return Err(()),
        })
    }
}

/// A parsed `verb:resource` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RbacPermission {
    pub verb: Verb,
    pub resource: String,
}

impl RbacPermission {
    /// Parse one permission string; `None` for anything outside the grammar.
    pub fn parse(raw: &str) -> Option<Self> {
        let (verb, resource) = raw.trim().split_once(':')?;
        let verb = verb.parse().ok()?;
        if !valid_resource(resource) {
            return None;
        }
        Some(Self {
            verb,
            resource: resource.to_string(),
        })
    }

    /// Parse every string, dropping the ones that do not fit the grammar.
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Vec<Self> {
        raw.iter()
            .filter_map(|s| {
                let parsed = Self::parse(s.as_ref());
                if parsed.is_none() {
                    tracing::debug!(permission = s.as_ref(), "ignoring unparseable RBAC permission");
                }
                parsed
            })
            .collect()
    }

    /// Whether this permission covers `resource` (wildcards included).
    pub fn covers(&self, resource: &str) -> bool {
        self.resource == "*" || self.resource == resource
    }
}

impl fmt::Display for RbacPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.verb.as_str(), self.resource)
    }
}

fn valid_resource(resource: &str) -> bool {
    if resource == "*" {
        return true;
    }
    let mut parts = resource.split('/');
    let valid_name = |name: &str| {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    };
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) => valid_name(name),
        (Some(name), Some(sub), None) => valid_name(name) && valid_name(sub),
        _ => false,
    }
}
