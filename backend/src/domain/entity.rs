//! Entity records and their rendered attribute projections.
//!
//! Each record holds every stored column. [`Entity::attributes`] is the
//! explicit allow-list of what clients may see: primary keys, foreign keys
//! and credential columns never appear in it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::registry::ForeignKey;
use super::resource::{ResourceId, ResourceKey, ResourceType};

/// Rendered attribute mapping.
pub type Attributes = Map<String, Value>;

/// Render a timestamp the way every document exposes it
/// (`2019-01-01T00:00:00.000000Z`).
pub fn render_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Account role used by the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Regular account.
    #[default]
    User,
    /// Administrator.
    Admin,
}

impl Role {
    /// Stored and rendered name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised for role names other than `user` and `admin`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// Book author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub publication_year: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's comment on a book. Both owners are optional so a comment can be
/// detached by a to-one relationship update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub message: String,
    pub user_id: Option<Uuid>,
    pub book_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// SHA-256 hex digest; never rendered.
    pub password_digest: String,
    /// Never rendered.
    pub remember_token: Option<String>,
    /// Never rendered.
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Any stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Author(Author),
    Book(Book),
    Comment(Comment),
    User(User),
}

fn text(value: &str) -> Value {
    Value::String(value.to_owned())
}

fn with_timestamps(
    mut attributes: Attributes,
    created_at: &DateTime<Utc>,
    updated_at: &DateTime<Utc>,
) -> Attributes {
    attributes.insert("created_at".into(), Value::String(render_timestamp(created_at)));
    attributes.insert("updated_at".into(), Value::String(render_timestamp(updated_at)));
    attributes
}

impl Entity {
    /// Discriminator used as the JSON:API `type`.
    pub const fn resource_type(&self) -> ResourceType {
        match self {
            Self::Author(_) => ResourceType::Authors,
            Self::Book(_) => ResourceType::Books,
            Self::Comment(_) => ResourceType::Comments,
            Self::User(_) => ResourceType::Users,
        }
    }

    /// Primary key.
    pub const fn id(&self) -> ResourceId {
        match self {
            Self::Author(author) => ResourceId::Numeric(author.id),
            Self::Book(book) => ResourceId::Numeric(book.id),
            Self::Comment(comment) => ResourceId::Numeric(comment.id),
            Self::User(user) => ResourceId::Uuid(user.id),
        }
    }

    /// Type plus key.
    pub const fn key(&self) -> ResourceKey {
        ResourceKey::new(self.resource_type(), self.id())
    }

    /// Visible attributes, timestamps included.
    pub fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        match self {
            Self::Author(author) => {
                attributes.insert("name".into(), text(&author.name));
                with_timestamps(attributes, &author.created_at, &author.updated_at)
            }
            Self::Book(book) => {
                attributes.insert("title".into(), text(&book.title));
                attributes.insert("description".into(), text(&book.description));
                attributes.insert("publication_year".into(), text(&book.publication_year));
                with_timestamps(attributes, &book.created_at, &book.updated_at)
            }
            Self::Comment(comment) => {
                attributes.insert("message".into(), text(&comment.message));
                with_timestamps(attributes, &comment.created_at, &comment.updated_at)
            }
            Self::User(user) => {
                attributes.insert("name".into(), text(&user.name));
                attributes.insert("email".into(), text(&user.email));
                attributes.insert("role".into(), text(user.role.as_str()));
                with_timestamps(attributes, &user.created_at, &user.updated_at)
            }
        }
    }

    /// Value of an owned foreign key, if this entity carries it and it is set.
    pub fn owner(&self, foreign_key: ForeignKey) -> Option<ResourceId> {
        match (self, foreign_key) {
            (Self::Comment(comment), ForeignKey::CommentUser) => {
                comment.user_id.map(ResourceId::Uuid)
            }
            (Self::Comment(comment), ForeignKey::CommentBook) => {
                comment.book_id.map(ResourceId::Numeric)
            }
            _ => None,
        }
    }
}
