//! Entity Registry: the immutable per-type configuration consumed by the
//! query translator, document assembler and mediator.
//!
//! Every relationship carries a declared [`Cardinality`] and a
//! [`RelationshipMechanism`]. Rendering branches on the former and mutation
//! dispatch on the latter; neither is inferred from loaded data.

use super::resource::{ResourceType, UnknownResourceType};
use super::Error;

/// Declared relationship cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one related resource; renders as an object or `null`.
    ToOne,
    /// Any number of related resources; renders as an array.
    ToMany,
}

/// Foreign-key columns that realise relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForeignKey {
    /// `comments.user_id` referencing `users.id`.
    CommentUser,
    /// `comments.book_id` referencing `books.id`.
    CommentBook,
}

impl ForeignKey {
    /// Column name on the holding table.
    pub const fn column(self) -> &'static str {
        match self {
            Self::CommentUser => "user_id",
            Self::CommentBook => "book_id",
        }
    }

    /// Type whose rows carry the column.
    pub const fn holder(self) -> ResourceType {
        match self {
            Self::CommentUser | Self::CommentBook => ResourceType::Comments,
        }
    }

    /// Type the column references.
    pub const fn target(self) -> ResourceType {
        match self {
            Self::CommentUser => ResourceType::Users,
            Self::CommentBook => ResourceType::Books,
        }
    }
}

/// Association tables that realise many-to-many relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinTable {
    /// `author_book (author_id, book_id)`.
    AuthorBook,
}

impl JoinTable {
    /// Table name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::AuthorBook => "author_book",
        }
    }

    /// Column holding keys of `side`, if `side` participates.
    pub const fn column_for(self, side: ResourceType) -> Option<&'static str> {
        match (self, side) {
            (Self::AuthorBook, ResourceType::Authors) => Some("author_id"),
            (Self::AuthorBook, ResourceType::Books) => Some("book_id"),
            _ => None,
        }
    }

    /// The type opposite `side`, if `side` participates.
    pub const fn counterpart(self, side: ResourceType) -> Option<ResourceType> {
        match (self, side) {
            (Self::AuthorBook, ResourceType::Authors) => Some(ResourceType::Books),
            (Self::AuthorBook, ResourceType::Books) => Some(ResourceType::Authors),
            _ => None,
        }
    }
}

/// How a relationship is stored, selected at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipMechanism {
    /// The parent row owns the foreign key (belongs-to).
    BelongsTo(ForeignKey),
    /// Related rows hold a foreign key back to the parent (has-many).
    HasMany(ForeignKey),
    /// A join table links both sides.
    ManyToMany(JoinTable),
}

/// Actions the access gate decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateAction {
    /// Change which authors wrote which books.
    ManageAuthorship,
}

/// A named edge from a parent type to a target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    name: &'static str,
    target: ResourceType,
    cardinality: Cardinality,
    mechanism: RelationshipMechanism,
    guard: Option<GateAction>,
}

impl RelationshipDescriptor {
    /// To-one relationship through a foreign key on the parent.
    pub const fn belongs_to(name: &'static str, foreign_key: ForeignKey) -> Self {
        Self {
            name,
            target: foreign_key.target(),
            cardinality: Cardinality::ToOne,
            mechanism: RelationshipMechanism::BelongsTo(foreign_key),
            guard: None,
        }
    }

    /// To-many relationship through a foreign key on the related rows.
    pub const fn has_many(name: &'static str, foreign_key: ForeignKey) -> Self {
        Self {
            name,
            target: foreign_key.holder(),
            cardinality: Cardinality::ToMany,
            mechanism: RelationshipMechanism::HasMany(foreign_key),
            guard: None,
        }
    }

    /// To-many relationship through a join table, seen from `parent`.
    ///
    /// Returns `None` when `parent` does not participate in `join`.
    pub const fn many_to_many(
        name: &'static str,
        parent: ResourceType,
        join: JoinTable,
    ) -> Option<Self> {
        match join.counterpart(parent) {
            Some(target) => Some(Self {
                name,
                target,
                cardinality: Cardinality::ToMany,
                mechanism: RelationshipMechanism::ManyToMany(join),
                guard: None,
            }),
            None => None,
        }
    }

    /// Require the gate to allow `action` before this edge is written.
    #[must_use]
    pub const fn guarded_by(mut self, action: GateAction) -> Self {
        self.guard = Some(action);
        self
    }

    /// Relationship name used in URLs, `include` and documents.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Related type.
    pub const fn target(&self) -> ResourceType {
        self.target
    }

    /// Declared cardinality.
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Storage mechanism.
    pub const fn mechanism(&self) -> RelationshipMechanism {
        self.mechanism
    }

    /// Gate action required before writes, if any.
    pub const fn guard(&self) -> Option<GateAction> {
        self.guard
    }
}

/// Per-type configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    resource_type: ResourceType,
    allowed_sorts: Vec<&'static str>,
    allowed_filters: Vec<&'static str>,
    relationships: Vec<RelationshipDescriptor>,
}

impl ResourceDescriptor {
    /// Describe `resource_type` with no sorts, filters or relationships.
    pub const fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            allowed_sorts: Vec::new(),
            allowed_filters: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Set the ordered list of sortable fields.
    #[must_use]
    pub fn with_sorts(mut self, fields: &[&'static str]) -> Self {
        self.allowed_sorts = fields.to_vec();
        self
    }

    /// Set the filterable fields.
    #[must_use]
    pub fn with_filters(mut self, fields: &[&'static str]) -> Self {
        self.allowed_filters = fields.to_vec();
        self
    }

    /// Declare a relationship.
    #[must_use]
    pub fn with_relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Described type.
    pub const fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Sortable fields in declaration order.
    pub fn allowed_sorts(&self) -> &[&'static str] {
        &self.allowed_sorts
    }

    /// Filterable fields in declaration order.
    pub fn allowed_filters(&self) -> &[&'static str] {
        &self.allowed_filters
    }

    /// Names accepted by `include`, in declaration order.
    pub fn allowed_includes(&self) -> Vec<&'static str> {
        self.relationships
            .iter()
            .map(RelationshipDescriptor::name)
            .collect()
    }

    /// Every declared relationship.
    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    /// Look up a declared relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships
            .iter()
            .find(|relationship| relationship.name == name)
    }

    /// Look up a declared relationship, failing with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::not_found`] when `name` is not declared for this type.
    pub fn require_relationship(&self, name: &str) -> Result<&RelationshipDescriptor, Error> {
        self.relationship(name).ok_or_else(|| {
            Error::not_found(format!(
                "Relationship `{name}` is not defined for resource type `{}`",
                self.resource_type
            ))
        })
    }
}

/// The immutable registry passed to every component at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRegistry {
    descriptors: Vec<ResourceDescriptor>,
}

impl EntityRegistry {
    /// Build a registry from explicit descriptors. Later descriptors for the
    /// same type replace earlier ones.
    pub fn new(descriptors: impl IntoIterator<Item = ResourceDescriptor>) -> Self {
        let mut registry = Self {
            descriptors: Vec::new(),
        };
        for descriptor in descriptors {
            registry
                .descriptors
                .retain(|existing| existing.resource_type != descriptor.resource_type);
            registry.descriptors.push(descriptor);
        }
        registry
    }

    /// The bookshelf configuration: authors, books, comments and users.
    pub fn standard() -> Self {
        let mut authors = ResourceDescriptor::new(ResourceType::Authors)
            .with_sorts(&["name", "created_at", "updated_at"])
            .with_filters(&["name"]);
        if let Some(books) = RelationshipDescriptor::many_to_many(
            "books",
            ResourceType::Authors,
            JoinTable::AuthorBook,
        ) {
            authors = authors.with_relationship(books.guarded_by(GateAction::ManageAuthorship));
        }

        let mut books = ResourceDescriptor::new(ResourceType::Books)
            .with_sorts(&["title", "publication_year", "created_at", "updated_at"])
            .with_filters(&["title", "publication_year"]);
        if let Some(authors) = RelationshipDescriptor::many_to_many(
            "authors",
            ResourceType::Books,
            JoinTable::AuthorBook,
        ) {
            books = books.with_relationship(authors.guarded_by(GateAction::ManageAuthorship));
        }
        let books = books.with_relationship(RelationshipDescriptor::has_many(
            "comments",
            ForeignKey::CommentBook,
        ));

        let comments = ResourceDescriptor::new(ResourceType::Comments)
            .with_sorts(&["created_at", "updated_at"])
            .with_relationship(RelationshipDescriptor::belongs_to(
                "users",
                ForeignKey::CommentUser,
            ))
            .with_relationship(RelationshipDescriptor::belongs_to(
                "books",
                ForeignKey::CommentBook,
            ));

        let users = ResourceDescriptor::new(ResourceType::Users)
            .with_sorts(&["name", "email", "created_at", "updated_at"])
            .with_filters(&["role"])
            .with_relationship(RelationshipDescriptor::has_many(
                "comments",
                ForeignKey::CommentUser,
            ));

        Self::new([authors, books, comments, users])
    }

    /// Configuration for `resource_type`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownResourceType`] when the type was not registered.
    pub fn describe(
        &self,
        resource_type: ResourceType,
    ) -> Result<&ResourceDescriptor, UnknownResourceType> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.resource_type == resource_type)
            .ok_or_else(|| UnknownResourceType {
                name: resource_type.as_str().to_owned(),
            })
    }

    /// Configuration for a wire type name.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownResourceType`] when `name` is not registered.
    pub fn resolve(&self, name: &str) -> Result<&ResourceDescriptor, UnknownResourceType> {
        let resource_type = name.parse::<ResourceType>()?;
        self.describe(resource_type)
    }

    /// Whether `name` is a registered wire type.
    pub fn is_registered(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }
}

impl From<UnknownResourceType> for Error {
    fn from(value: UnknownResourceType) -> Self {
        Self::not_found(format!("Resource type `{}` is not registered", value.name))
    }
}
