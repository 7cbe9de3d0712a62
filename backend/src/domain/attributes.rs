//! Typed attribute input for create and update.
//!
//! Request attributes arrive as an untyped JSON object. Only allow-listed,
//! writable attributes are read; anything else is ignored. Violations are
//! collected rather than short-circuited so a client sees every problem at
//! once.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::entity::{Attributes, Entity, Role};
use super::error::FieldViolation;
use super::resource::ResourceType;

/// SHA-256 hex digest used for stored passwords and access tokens.
pub fn sha256_hex(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorDraft {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub description: String,
    pub publication_year: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub password_digest: String,
    pub role: Role,
}

/// Attributes for a record that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityDraft {
    Author(AuthorDraft),
    Book(BookDraft),
    Comment(CommentDraft),
    User(UserDraft),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorPatch {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub publication_year: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentPatch {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_digest: Option<String>,
    pub role: Option<Role>,
}

/// Partial attribute update; `None` leaves a column untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityPatch {
    Author(AuthorPatch),
    Book(BookPatch),
    Comment(CommentPatch),
    User(UserPatch),
}

struct AttributeReader<'a> {
    attributes: &'a Attributes,
    violations: Vec<FieldViolation>,
}

impl<'a> AttributeReader<'a> {
    fn new(attributes: &'a Attributes) -> Self {
        Self {
            attributes,
            violations: Vec::new(),
        }
    }

    fn violate(&mut self, field: &str, message: String) {
        self.violations
            .push(FieldViolation::new(format!("/data/attributes/{field}"), message));
    }

    fn required(&mut self, field: &str) -> String {
        match self.attributes.get(field) {
            Some(Value::String(value)) if !value.trim().is_empty() => value.clone(),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                self.violate(
                    field,
                    format!("The data.attributes.{field} field is required."),
                );
                String::new()
            }
            Some(_) => {
                self.not_a_string(field);
                String::new()
            }
        }
    }

    fn optional(&mut self, field: &str) -> Option<String> {
        match self.attributes.get(field) {
            None => None,
            Some(Value::String(value)) => Some(value.clone()),
            Some(_) => {
                self.not_a_string(field);
                None
            }
        }
    }

    fn not_a_string(&mut self, field: &str) {
        self.violate(field, format!("The data.attributes.{field} must be a string."));
    }

    fn email(&mut self, value: Option<String>) -> Option<String> {
        match value {
            Some(email) if !email.is_empty() && !email.contains('@') => {
                self.violate(
                    "email",
                    "The data.attributes.email must be a valid email address.".to_owned(),
                );
                None
            }
            other => other,
        }
    }

    fn role(&mut self, value: Option<String>) -> Option<Role> {
        let raw = value?;
        match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                self.violate(
                    "role",
                    "The selected data.attributes.role is invalid.".to_owned(),
                );
                None
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<FieldViolation>> {
        if self.violations.is_empty() {
            Ok(value)
        } else {
            Err(self.violations)
        }
    }
}

impl EntityDraft {
    /// Validate and read create attributes for `resource_type`.
    ///
    /// # Errors
    ///
    /// Returns every violated rule, each pointing at its attribute.
    pub fn from_attributes(
        resource_type: ResourceType,
        attributes: &Attributes,
    ) -> Result<Self, Vec<FieldViolation>> {
        let mut reader = AttributeReader::new(attributes);
        let draft = match resource_type {
            ResourceType::Authors => Self::Author(AuthorDraft {
                name: reader.required("name"),
            }),
            ResourceType::Books => Self::Book(BookDraft {
                title: reader.required("title"),
                description: reader.required("description"),
                publication_year: reader.required("publication_year"),
            }),
            ResourceType::Comments => Self::Comment(CommentDraft {
                message: reader.required("message"),
            }),
            ResourceType::Users => {
                let name = reader.required("name");
                let email = reader.required("email");
                let email = reader.email(Some(email)).unwrap_or_default();
                let password = reader.required("password");
                let role = reader.optional("role");
                let role = reader.role(role).unwrap_or_default();
                Self::User(UserDraft {
                    name,
                    email,
                    password_digest: sha256_hex(&password),
                    role,
                })
            }
        };
        reader.finish(draft)
    }

    /// Type of the record to create.
    pub const fn resource_type(&self) -> ResourceType {
        match self {
            Self::Author(_) => ResourceType::Authors,
            Self::Book(_) => ResourceType::Books,
            Self::Comment(_) => ResourceType::Comments,
            Self::User(_) => ResourceType::Users,
        }
    }
}

impl EntityPatch {
    /// Validate and read update attributes for `resource_type`.
    ///
    /// # Errors
    ///
    /// Returns every violated rule, each pointing at its attribute.
    pub fn from_attributes(
        resource_type: ResourceType,
        attributes: &Attributes,
    ) -> Result<Self, Vec<FieldViolation>> {
        let mut reader = AttributeReader::new(attributes);
        let patch = match resource_type {
            ResourceType::Authors => Self::Author(AuthorPatch {
                name: reader.optional("name"),
            }),
            ResourceType::Books => Self::Book(BookPatch {
                title: reader.optional("title"),
                description: reader.optional("description"),
                publication_year: reader.optional("publication_year"),
            }),
            ResourceType::Comments => Self::Comment(CommentPatch {
                message: reader.optional("message"),
            }),
            ResourceType::Users => {
                let name = reader.optional("name");
                let email = reader.optional("email");
                let email = reader.email(email);
                let password = reader.optional("password");
                let role = reader.optional("role");
                Self::User(UserPatch {
                    name,
                    email,
                    password_digest: password.as_deref().map(sha256_hex),
                    role: reader.role(role),
                })
            }
        };
        reader.finish(patch)
    }

    /// A patch that changes no attribute of `resource_type`.
    pub fn unchanged(resource_type: ResourceType) -> Self {
        match resource_type {
            ResourceType::Authors => Self::Author(AuthorPatch::default()),
            ResourceType::Books => Self::Book(BookPatch::default()),
            ResourceType::Comments => Self::Comment(CommentPatch::default()),
            ResourceType::Users => Self::User(UserPatch::default()),
        }
    }

    /// Whether applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Author(patch) => patch.name.is_none(),
            Self::Book(patch) => {
                patch.title.is_none()
                    && patch.description.is_none()
                    && patch.publication_year.is_none()
            }
            Self::Comment(patch) => patch.message.is_none(),
            Self::User(patch) => {
                patch.name.is_none()
                    && patch.email.is_none()
                    && patch.password_digest.is_none()
                    && patch.role.is_none()
            }
        }
    }

    /// Apply to a record of the same kind. Returns `false`, leaving the
    /// record untouched, when the kinds differ.
    pub fn apply_to(&self, entity: &mut Entity) -> bool {
        fn set<T: Clone>(slot: &mut T, value: Option<&T>) {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }

        match (self, entity) {
            (Self::Author(patch), Entity::Author(author)) => {
                set(&mut author.name, patch.name.as_ref());
            }
            (Self::Book(patch), Entity::Book(book)) => {
                set(&mut book.title, patch.title.as_ref());
                set(&mut book.description, patch.description.as_ref());
                set(&mut book.publication_year, patch.publication_year.as_ref());
            }
            (Self::Comment(patch), Entity::Comment(comment)) => {
                set(&mut comment.message, patch.message.as_ref());
            }
            (Self::User(patch), Entity::User(user)) => {
                set(&mut user.name, patch.name.as_ref());
                set(&mut user.email, patch.email.as_ref());
                set(&mut user.password_digest, patch.password_digest.as_ref());
                set(&mut user.role, patch.role.as_ref());
            }
            _ => return false,
        }
        true
    }
}
