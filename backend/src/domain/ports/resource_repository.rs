//! Port for entity persistence.
//!
//! Every write carries the relationship changes that must land with it.
//! Adapters apply a write and its [`LinkageChange`]s in one transaction so a
//! failure part-way through leaves nothing committed.

use async_trait::async_trait;

use crate::domain::query::{FilterClause, SortKey};
use crate::domain::registry::{ForeignKey, JoinTable, RelationshipMechanism};
use crate::domain::{Entity, EntityDraft, EntityPatch, Error, ResourceId, ResourceKey, ResourceType};

use super::define_port_error;

define_port_error! {
    /// Errors raised by resource repository adapters.
    pub enum RepositoryError {
        /// The store could not be reached.
        Connection { message: String } =>
            "resource repository connection failed: {message}",
        /// A query or mutation failed while executing.
        Query { message: String } =>
            "resource repository query failed: {message}",
        /// Relationship targets did not exist; nothing was written.
        MissingTargets { resource_type: ResourceType, ids: Vec<String> } =>
            "missing {resource_type} targets: {ids:?}",
        /// A foreign-key constraint rejected the write.
        ConstraintViolation { message: String } =>
            "resource repository constraint violated: {message}",
        /// A uniqueness constraint rejected the write.
        Duplicate { message: String } =>
            "resource repository duplicate value: {message}",
    }
}

impl RepositoryError {
    /// Unique-email clash reported the same way by every adapter.
    pub fn email_taken(email: &str) -> Self {
        Self::duplicate(format!("The email `{email}` has already been taken."))
    }
}

impl From<RepositoryError> for Error {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Connection { message } => Self::service_unavailable(message),
            RepositoryError::Query { message } => Self::internal("RepositoryError", message),
            RepositoryError::MissingTargets { resource_type, ids } => Self::not_found(format!(
                "No query results for model [{resource_type}] {}",
                ids.join(", ")
            )),
            RepositoryError::ConstraintViolation { message } => Self::not_found(message),
            RepositoryError::Duplicate { message } => Self::conflict(message),
        }
    }
}

/// One relationship change applied alongside a write.
///
/// The parent is the record being inserted or updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkageChange {
    /// Point the parent's own foreign key at `target`, or clear it.
    /// Adapters verify `target` exists before writing.
    AssignOwner {
        foreign_key: ForeignKey,
        target: Option<ResourceId>,
    },
    /// Detach every row currently pointing at the parent through
    /// `foreign_key`, then attach `targets`. Adapters verify every target
    /// exists before detaching anything.
    ReplaceInverse {
        foreign_key: ForeignKey,
        targets: Vec<ResourceId>,
    },
    /// Make the parent's join rows exactly `targets`. Existence is left to
    /// the join table's foreign keys.
    SyncJoin {
        join: JoinTable,
        targets: Vec<ResourceId>,
    },
}

/// Filtered, sorted, paginated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filters: Vec<FilterClause>,
    /// Applied left to right; adapters append an ascending primary-key
    /// tie-breaker.
    pub sort: Vec<SortKey>,
    pub offset: u64,
    pub limit: u32,
}

/// One page of a listing plus the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub items: Vec<Entity>,
    pub total: u64,
}

/// Port for reading and writing entities of every registered type.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Load one record.
    async fn find(&self, key: ResourceKey) -> Result<Option<Entity>, RepositoryError>;

    /// Load one page of `resource_type` records and the matching total.
    async fn list(
        &self,
        resource_type: ResourceType,
        query: &ListQuery,
    ) -> Result<Listing, RepositoryError>;

    /// Create a record and apply `linkage` to it atomically.
    async fn insert(
        &self,
        draft: &EntityDraft,
        linkage: &[LinkageChange],
    ) -> Result<Entity, RepositoryError>;

    /// Patch a record and apply `linkage` to it atomically. Returns `None`
    /// when the record does not exist.
    async fn update(
        &self,
        key: ResourceKey,
        patch: &EntityPatch,
        linkage: &[LinkageChange],
    ) -> Result<Option<Entity>, RepositoryError>;

    /// Remove a record. Returns `false` when it did not exist.
    async fn delete(&self, key: ResourceKey) -> Result<bool, RepositoryError>;

    /// Records reached from `key` through `mechanism`, ordered by primary key.
    async fn related(
        &self,
        key: ResourceKey,
        mechanism: RelationshipMechanism,
    ) -> Result<Vec<Entity>, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(RepositoryError::connection("refused"), ErrorCode::ServiceUnavailable)]
    #[case(RepositoryError::query("syntax"), ErrorCode::InternalError)]
    #[case(
        RepositoryError::missing_targets(ResourceType::Comments, vec!["9".to_owned()]),
        ErrorCode::NotFound
    )]
    #[case(RepositoryError::constraint_violation("fk"), ErrorCode::NotFound)]
    #[case(RepositoryError::duplicate("email"), ErrorCode::Conflict)]
    fn repository_errors_map_to_domain_codes(
        #[case] error: RepositoryError,
        #[case] code: ErrorCode,
    ) {
        assert_eq!(Error::from(error).code(), code);
    }

    #[rstest]
    fn missing_targets_name_every_id() {
        let error = Error::from(RepositoryError::missing_targets(
            ResourceType::Books,
            vec!["7".to_owned(), "9".to_owned()],
        ));
        assert_eq!(error.message(), "No query results for model [books] 7, 9");
    }

    #[rstest]
    fn query_failures_are_titled_by_kind() {
        let error = Error::from(RepositoryError::query("boom"));
        assert_eq!(error.title(), "RepositoryError");
    }
}
