//! Resource type names and identifiers.
//!
//! JSON:API renders every identifier as a string. Internally authors, books
//! and comments use numeric keys while users use UUIDs; [`ResourceId`] keeps
//! the distinction so adapters can bind the right column type.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

/// A registered resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// `authors`
    Authors,
    /// `books`
    Books,
    /// `comments`
    Comments,
    /// `users`
    Users,
}

impl ResourceType {
    /// Every registered type, in registration order.
    pub const ALL: [Self; 4] = [Self::Authors, Self::Books, Self::Comments, Self::Users];

    /// Wire name used in `type` members and URLs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authors => "authors",
            Self::Books => "books",
            Self::Comments => "comments",
            Self::Users => "users",
        }
    }

    /// Primary key representation for the type.
    pub const fn key_kind(self) -> KeyKind {
        match self {
            Self::Users => KeyKind::Uuid,
            Self::Authors | Self::Books | Self::Comments => KeyKind::Numeric,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a type name is not registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("resource type `{name}` is not registered")]
pub struct UnknownResourceType {
    /// The rejected name.
    pub name: String,
}

impl FromStr for ResourceType {
    type Err = UnknownResourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| UnknownResourceType { name: s.to_owned() })
    }
}

/// Primary key representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Auto-incrementing integer.
    Numeric,
    /// UUID string.
    Uuid,
}

impl KeyKind {
    /// Parse a wire identifier. Returns `None` when `raw` cannot be a key of
    /// this kind, which callers treat as "does not exist".
    pub fn parse(self, raw: &str) -> Option<ResourceId> {
        match self {
            Self::Numeric => raw.parse::<i64>().ok().map(ResourceId::Numeric),
            Self::Uuid => Uuid::parse_str(raw).ok().map(ResourceId::Uuid),
        }
    }
}

/// A primary key value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceId {
    /// Numeric key.
    Numeric(i64),
    /// UUID key.
    Uuid(Uuid),
}

impl ResourceId {
    /// Numeric value, if this is a numeric key.
    pub const fn as_numeric(&self) -> Option<i64> {
        match self {
            Self::Numeric(value) => Some(*value),
            Self::Uuid(_) => None,
        }
    }

    /// UUID value, if this is a UUID key.
    pub const fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(value) => Some(*value),
            Self::Numeric(_) => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(value) => value.fmt(f),
            Self::Uuid(value) => value.fmt(f),
        }
    }
}

/// Fully qualified resource address: type plus key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    /// Resource type.
    pub resource_type: ResourceType,
    /// Primary key.
    pub id: ResourceId,
}

impl ResourceKey {
    /// Combine a type and key.
    pub const fn new(resource_type: ResourceType, id: ResourceId) -> Self {
        Self { resource_type, id }
    }

    /// Parse a wire id for `resource_type`; `None` means the key cannot exist.
    pub fn parse(resource_type: ResourceType, raw: &str) -> Option<Self> {
        resource_type
            .key_kind()
            .parse(raw)
            .map(|id| Self::new(resource_type, id))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}
