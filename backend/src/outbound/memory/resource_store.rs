//! In-memory resource repository.
//!
//! Every operation runs under one lock, so a write and its linkage changes
//! are observed together or not at all. Foreign keys are emulated: join
//! rows require both ends to exist, deleting an author or book drops its
//! join rows, and deleting a book or user clears the owning column on its
//! comments.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::ports::{LinkageChange, ListQuery, Listing, RepositoryError, ResourceRepository};
use crate::domain::query::SortDirection;
use crate::domain::registry::{ForeignKey, JoinTable, RelationshipMechanism};
use crate::domain::{
    Attributes, Author, Book, Comment, Entity, EntityDraft, EntityPatch, ResourceId, ResourceKey,
    ResourceType, User, UserPatch,
};

#[derive(Debug, Default, Clone)]
struct Tables {
    authors: BTreeMap<i64, Author>,
    books: BTreeMap<i64, Book>,
    comments: BTreeMap<i64, Comment>,
    users: BTreeMap<Uuid, User>,
    /// `(author_id, book_id)` rows.
    author_book: BTreeSet<(i64, i64)>,
    sequences: BTreeMap<ResourceType, i64>,
}

fn comment_owner(comment: &Comment, foreign_key: ForeignKey) -> Option<ResourceId> {
    match foreign_key {
        ForeignKey::CommentUser => comment.user_id.map(ResourceId::Uuid),
        ForeignKey::CommentBook => comment.book_id.map(ResourceId::Numeric),
    }
}

fn set_comment_owner(comment: &mut Comment, foreign_key: ForeignKey, owner: Option<ResourceId>) {
    match foreign_key {
        ForeignKey::CommentUser => comment.user_id = owner.and_then(|id| id.as_uuid()),
        ForeignKey::CommentBook => comment.book_id = owner.and_then(|id| id.as_numeric()),
    }
}

fn touch(entity: &mut Entity, now: DateTime<Utc>) {
    match entity {
        Entity::Author(author) => author.updated_at = now,
        Entity::Book(book) => book.updated_at = now,
        Entity::Comment(comment) => comment.updated_at = now,
        Entity::User(user) => user.updated_at = now,
    }
}

/// `(author_id, book_id)` for a join row seen from `parent`.
fn author_book_row(parent: ResourceKey, target: ResourceId) -> Option<(i64, i64)> {
    let parent_id = parent.id.as_numeric()?;
    let target_id = target.as_numeric()?;
    match parent.resource_type {
        ResourceType::Authors => Some((parent_id, target_id)),
        ResourceType::Books => Some((target_id, parent_id)),
        ResourceType::Comments | ResourceType::Users => None,
    }
}

fn sort_value<'a>(attributes: &'a Attributes, field: &str) -> &'a str {
    attributes.get(field).and_then(Value::as_str).unwrap_or_default()
}

impl Tables {
    fn next_id(&mut self, resource_type: ResourceType) -> i64 {
        let next = self.sequences.entry(resource_type).or_insert(0);
        *next += 1;
        *next
    }

    fn get(&self, key: ResourceKey) -> Option<Entity> {
        match (key.resource_type, key.id) {
            (ResourceType::Authors, ResourceId::Numeric(id)) => {
                self.authors.get(&id).cloned().map(Entity::Author)
            }
            (ResourceType::Books, ResourceId::Numeric(id)) => {
                self.books.get(&id).cloned().map(Entity::Book)
            }
            (ResourceType::Comments, ResourceId::Numeric(id)) => {
                self.comments.get(&id).cloned().map(Entity::Comment)
            }
            (ResourceType::Users, ResourceId::Uuid(id)) => {
                self.users.get(&id).cloned().map(Entity::User)
            }
            _ => None,
        }
    }

    fn exists(&self, resource_type: ResourceType, id: ResourceId) -> bool {
        self.get(ResourceKey::new(resource_type, id)).is_some()
    }

    fn all(&self, resource_type: ResourceType) -> Vec<Entity> {
        match resource_type {
            ResourceType::Authors => self.authors.values().cloned().map(Entity::Author).collect(),
            ResourceType::Books => self.books.values().cloned().map(Entity::Book).collect(),
            ResourceType::Comments => self
                .comments
                .values()
                .cloned()
                .map(Entity::Comment)
                .collect(),
            ResourceType::Users => self.users.values().cloned().map(Entity::User).collect(),
        }
    }

    fn put(&mut self, entity: Entity) {
        match entity {
            Entity::Author(author) => {
                self.authors.insert(author.id, author);
            }
            Entity::Book(book) => {
                self.books.insert(book.id, book);
            }
            Entity::Comment(comment) => {
                self.comments.insert(comment.id, comment);
            }
            Entity::User(user) => {
                self.users.insert(user.id, user);
            }
        }
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|user| user.email == email && Some(user.id) != except)
    }

    fn create(&mut self, draft: &EntityDraft, now: DateTime<Utc>) -> Entity {
        let entity = match draft {
            EntityDraft::Author(draft) => Entity::Author(Author {
                id: self.next_id(ResourceType::Authors),
                name: draft.name.clone(),
                created_at: now,
                updated_at: now,
            }),
            EntityDraft::Book(draft) => Entity::Book(Book {
                id: self.next_id(ResourceType::Books),
                title: draft.title.clone(),
                description: draft.description.clone(),
                publication_year: draft.publication_year.clone(),
                created_at: now,
                updated_at: now,
            }),
            EntityDraft::Comment(draft) => Entity::Comment(Comment {
                id: self.next_id(ResourceType::Comments),
                message: draft.message.clone(),
                user_id: None,
                book_id: None,
                created_at: now,
                updated_at: now,
            }),
            EntityDraft::User(draft) => Entity::User(User {
                id: Uuid::new_v4(),
                name: draft.name.clone(),
                email: draft.email.clone(),
                role: draft.role,
                password_digest: draft.password_digest.clone(),
                remember_token: None,
                email_verified_at: None,
                created_at: now,
                updated_at: now,
            }),
        };
        self.put(entity.clone());
        entity
    }

    fn remove(&mut self, key: ResourceKey) -> bool {
        match (key.resource_type, key.id) {
            (ResourceType::Authors, ResourceId::Numeric(id)) => {
                self.author_book.retain(|(author_id, _)| *author_id != id);
                self.authors.remove(&id).is_some()
            }
            (ResourceType::Books, ResourceId::Numeric(id)) => {
                self.author_book.retain(|(_, book_id)| *book_id != id);
                self.detach_comments(ForeignKey::CommentBook, key.id);
                self.books.remove(&id).is_some()
            }
            (ResourceType::Comments, ResourceId::Numeric(id)) => {
                self.comments.remove(&id).is_some()
            }
            (ResourceType::Users, ResourceId::Uuid(id)) => {
                self.detach_comments(ForeignKey::CommentUser, key.id);
                self.users.remove(&id).is_some()
            }
            _ => false,
        }
    }

    fn detach_comments(&mut self, foreign_key: ForeignKey, owner: ResourceId) {
        for comment in self.comments.values_mut() {
            if comment_owner(comment, foreign_key) == Some(owner) {
                set_comment_owner(comment, foreign_key, None);
            }
        }
    }

    /// Verify every change can be applied to a `parent_type` record.
    fn check(
        &self,
        parent_type: ResourceType,
        linkage: &[LinkageChange],
    ) -> Result<(), RepositoryError> {
        for change in linkage {
            match change {
                LinkageChange::AssignOwner {
                    foreign_key,
                    target,
                } => {
                    if foreign_key.holder() != parent_type {
                        return Err(RepositoryError::query(format!(
                            "{parent_type} has no `{}` column",
                            foreign_key.column()
                        )));
                    }
                    if let Some(target) = target.filter(|id| !self.exists(foreign_key.target(), *id)) {
                        return Err(RepositoryError::missing_targets(
                            foreign_key.target(),
                            vec![target.to_string()],
                        ));
                    }
                }
                LinkageChange::ReplaceInverse {
                    foreign_key,
                    targets,
                } => {
                    if foreign_key.target() != parent_type {
                        return Err(RepositoryError::query(format!(
                            "`{}` does not reference {parent_type}",
                            foreign_key.column()
                        )));
                    }
                    let missing: Vec<String> = targets
                        .iter()
                        .filter(|id| !self.exists(foreign_key.holder(), **id))
                        .map(ToString::to_string)
                        .collect();
                    if !missing.is_empty() {
                        return Err(RepositoryError::missing_targets(
                            foreign_key.holder(),
                            missing,
                        ));
                    }
                }
                LinkageChange::SyncJoin { join, targets } => {
                    let Some(counterpart) = join.counterpart(parent_type) else {
                        return Err(RepositoryError::query(format!(
                            "{parent_type} is not joined through `{}`",
                            join.name()
                        )));
                    };
                    if targets.iter().any(|id| !self.exists(counterpart, *id)) {
                        return Err(RepositoryError::constraint_violation(format!(
                            "insert or update on table \"{}\" violates a foreign key constraint",
                            join.name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply already checked changes to `parent`.
    fn apply(&mut self, parent: ResourceKey, linkage: &[LinkageChange], now: DateTime<Utc>) {
        for change in linkage {
            match change {
                LinkageChange::AssignOwner {
                    foreign_key,
                    target,
                } => {
                    if let Some(comment) = parent
                        .id
                        .as_numeric()
                        .and_then(|id| self.comments.get_mut(&id))
                    {
                        set_comment_owner(comment, *foreign_key, *target);
                        comment.updated_at = now;
                    }
                }
                LinkageChange::ReplaceInverse {
                    foreign_key,
                    targets,
                } => {
                    for comment in self.comments.values_mut() {
                        let linked = comment_owner(comment, *foreign_key) == Some(parent.id);
                        let wanted = targets.contains(&ResourceId::Numeric(comment.id));
                        if linked || wanted {
                            set_comment_owner(comment, *foreign_key, wanted.then_some(parent.id));
                            comment.updated_at = now;
                        }
                    }
                }
                LinkageChange::SyncJoin {
                    join: JoinTable::AuthorBook,
                    targets,
                } => {
                    let rows: BTreeSet<(i64, i64)> = targets
                        .iter()
                        .filter_map(|target| author_book_row(parent, *target))
                        .collect();
                    let parent_id = parent.id.as_numeric();
                    self.author_book.retain(|(author_id, book_id)| {
                        let owned = match parent.resource_type {
                            ResourceType::Authors => Some(*author_id) == parent_id,
                            _ => Some(*book_id) == parent_id,
                        };
                        !owned
                    });
                    self.author_book.extend(rows);
                }
            }
        }
    }

    fn related(&self, key: ResourceKey, mechanism: RelationshipMechanism) -> Vec<Entity> {
        match mechanism {
            RelationshipMechanism::BelongsTo(foreign_key) => self
                .get(key)
                .and_then(|entity| entity.owner(foreign_key))
                .and_then(|id| self.get(ResourceKey::new(foreign_key.target(), id)))
                .into_iter()
                .collect(),
            RelationshipMechanism::HasMany(foreign_key) => self
                .comments
                .values()
                .filter(|comment| comment_owner(comment, foreign_key) == Some(key.id))
                .cloned()
                .map(Entity::Comment)
                .collect(),
            RelationshipMechanism::ManyToMany(JoinTable::AuthorBook) => {
                let Some(parent_id) = key.id.as_numeric() else {
                    return Vec::new();
                };
                let mut ids: Vec<i64> = self
                    .author_book
                    .iter()
                    .filter_map(|(author_id, book_id)| match key.resource_type {
                        ResourceType::Authors => (*author_id == parent_id).then_some(*book_id),
                        _ => (*book_id == parent_id).then_some(*author_id),
                    })
                    .collect();
                ids.sort_unstable();
                let Some(target) = JoinTable::AuthorBook.counterpart(key.resource_type) else {
                    return Vec::new();
                };
                ids.into_iter()
                    .filter_map(|id| self.get(ResourceKey::new(target, ResourceId::Numeric(id))))
                    .collect()
            }
        }
    }
}

/// Resource repository backed by process memory.
pub struct MemoryResourceStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl Default for MemoryResourceStore {
    fn default() -> Self {
        Self::new(Arc::new(DefaultClock))
    }
}

impl MemoryResourceStore {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::connection("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl ResourceRepository for MemoryResourceStore {
    async fn find(&self, key: ResourceKey) -> Result<Option<Entity>, RepositoryError> {
        Ok(self.lock()?.get(key))
    }

    async fn list(
        &self,
        resource_type: ResourceType,
        query: &ListQuery,
    ) -> Result<Listing, RepositoryError> {
        let tables = self.lock()?;
        let mut rows: Vec<(Attributes, Entity)> = tables
            .all(resource_type)
            .into_iter()
            .map(|entity| (entity.attributes(), entity))
            .filter(|(attributes, _)| {
                query
                    .filters
                    .iter()
                    .all(|clause| sort_value(attributes, clause.field) == clause.value)
            })
            .collect();

        rows.sort_by(|(left, left_entity), (right, right_entity)| {
            query
                .sort
                .iter()
                .map(|key| {
                    let ordering = sort_value(left, key.field).cmp(sort_value(right, key.field));
                    match key.direction {
                        SortDirection::Ascending => ordering,
                        SortDirection::Descending => ordering.reverse(),
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or_else(|| left_entity.id().cmp(&right_entity.id()))
        });

        let total = u64::try_from(rows.len()).unwrap_or(u64::MAX);
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let items = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, entity)| entity)
            .collect();
        Ok(Listing { items, total })
    }

    async fn insert(
        &self,
        draft: &EntityDraft,
        linkage: &[LinkageChange],
    ) -> Result<Entity, RepositoryError> {
        let mut tables = self.lock()?;
        tables.check(draft.resource_type(), linkage)?;
        if let EntityDraft::User(user) = draft {
            if tables.email_taken(&user.email, None) {
                return Err(RepositoryError::email_taken(&user.email));
            }
        }

        let now = self.clock.utc();
        let entity = tables.create(draft, now);
        let key = entity.key();
        tables.apply(key, linkage, now);
        Ok(tables.get(key).unwrap_or(entity))
    }

    async fn update(
        &self,
        key: ResourceKey,
        patch: &EntityPatch,
        linkage: &[LinkageChange],
    ) -> Result<Option<Entity>, RepositoryError> {
        let mut tables = self.lock()?;
        let Some(mut entity) = tables.get(key) else {
            return Ok(None);
        };
        tables.check(key.resource_type, linkage)?;
        if let EntityPatch::User(UserPatch {
            email: Some(email), ..
        }) = patch
        {
            if tables.email_taken(email, key.id.as_uuid()) {
                return Err(RepositoryError::email_taken(email));
            }
        }

        let now = self.clock.utc();
        if !patch.is_empty() && patch.apply_to(&mut entity) {
            touch(&mut entity, now);
            tables.put(entity);
        }
        tables.apply(key, linkage, now);
        Ok(tables.get(key))
    }

    async fn delete(&self, key: ResourceKey) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.remove(key))
    }

    async fn related(
        &self,
        key: ResourceKey,
        mechanism: RelationshipMechanism,
    ) -> Result<Vec<Entity>, RepositoryError> {
        Ok(self.lock()?.related(key, mechanism))
    }
}
