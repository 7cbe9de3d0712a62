//! Domain primitives, the resource mediation engine, and its ports.
//!
//! Purpose: map bookshelf entities and their relationships onto JSON:API
//! documents without knowing about HTTP or SQL. Inbound adapters call the
//! [`ResourceMediator`]; outbound adapters implement the traits in [`ports`].
//!
//! Public surface:
//! - Error (alias to `error::Error`) — failure carried to the boundary.
//! - ErrorCode (alias to `error::ErrorCode`) — stable error identifier.
//! - ResourceType / ResourceId / ResourceKey — registered names and keys.
//! - Entity and its records — stored rows with allow-listed attributes.
//! - EntityRegistry — immutable per-type configuration.
//! - ResourceMediator — one operation per JSON:API interaction.

pub mod attributes;
pub mod auth;
pub mod document;
pub mod entity;
pub mod error;
pub mod mediator;
pub mod ports;
pub mod query;
pub mod registry;
pub mod resource;
pub mod seed;
pub mod trace_id;

pub use self::attributes::{
    AuthorDraft, AuthorPatch, BookDraft, BookPatch, CommentDraft, CommentPatch, EntityDraft,
    EntityPatch, UserDraft, UserPatch, sha256_hex,
};
pub use self::auth::{AccessToken, Actor, RoleAccessGate, digest_token};
pub use self::document::{DocumentAssembler, Hydrated, ResourceDocument};
pub use self::entity::{Attributes, Author, Book, Comment, Entity, Role, User, render_timestamp};
pub use self::error::{Error, ErrorCode, FieldViolation};
pub use self::mediator::{
    CreateInput, Created, IdentifierInput, LinkageInput, MediatorParts, RelationshipInput,
    ResourceMediator, UpdateInput,
};
pub use self::registry::EntityRegistry;
pub use self::resource::{KeyKind, ResourceId, ResourceKey, ResourceType, UnknownResourceType};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use bookshelf::domain::{ApiResult, Error};
///
/// fn lookup() -> ApiResult<()> {
///     Err(Error::not_found("No query results for model [books] 7"))
/// }
/// # assert!(lookup().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
