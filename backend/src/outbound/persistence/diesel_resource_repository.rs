//! PostgreSQL-backed `ResourceRepository` using Diesel.
//!
//! Every write runs inside one transaction together with its linkage
//! changes. `AssignOwner` and `ReplaceInverse` targets are checked before
//! anything is written; `SyncJoin` relies on the `author_book` foreign keys,
//! so a dangling id rolls the whole write back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use mockable::Clock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{LinkageChange, ListQuery, Listing, RepositoryError, ResourceRepository};
use crate::domain::query::{FilterClause, SortDirection, SortKey};
use crate::domain::registry::{ForeignKey, JoinTable, RelationshipMechanism};
use crate::domain::{
    Entity, EntityDraft, EntityPatch, ResourceId, ResourceKey, ResourceType, UserPatch,
};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{
    AuthorBookRow, AuthorChanges, AuthorRow, BookChanges, BookRow, CommentChanges, CommentRow,
    NewAuthorRow, NewBookRow, NewCommentRow, NewUserRow, UserChanges, UserRow,
};
use super::pool::DbPool;
use super::schema::{author_book, authors, books, comments, users};

/// Failure inside a transaction: either raw Diesel or already mapped.
#[derive(Debug)]
enum TxError {
    Diesel(DieselError),
    Repository(RepositoryError),
}

impl From<DieselError> for TxError {
    fn from(value: DieselError) -> Self {
        Self::Diesel(value)
    }
}

impl From<RepositoryError> for TxError {
    fn from(value: RepositoryError) -> Self {
        Self::Repository(value)
    }
}

impl TxError {
    fn into_repository(self) -> RepositoryError {
        match self {
            Self::Diesel(error) => map_diesel_error(&error),
            Self::Repository(error) => error,
        }
    }
}

macro_rules! then_order {
    ($query:expr, $column:expr, $direction:expr) => {
        match $direction {
            SortDirection::Ascending => $query.then_order_by($column.asc()),
            SortDirection::Descending => $query.then_order_by($column.desc()),
        }
    };
}

fn unsupported(kind: &str, resource_type: ResourceType, field: &str) -> RepositoryError {
    RepositoryError::query(format!("{resource_type} cannot {kind} by `{field}`"))
}

fn clamp_offset(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

fn total_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}

/// Filtered queries are rebuilt for the count and the page because boxed
/// statements cannot be cloned.
fn filtered_authors<'a>(
    filters: &'a [FilterClause],
) -> Result<authors::BoxedQuery<'a, Pg>, RepositoryError> {
    let mut query = authors::table.into_boxed();
    for clause in filters {
        query = match clause.field {
            "name" => query.filter(authors::name.eq(clause.value.as_str())),
            other => return Err(unsupported("filter", ResourceType::Authors, other)),
        };
    }
    Ok(query)
}

fn ordered_authors<'a>(
    mut query: authors::BoxedQuery<'a, Pg>,
    sort: &[SortKey],
) -> Result<authors::BoxedQuery<'a, Pg>, RepositoryError> {
    for key in sort {
        query = match key.field {
            "name" => then_order!(query, authors::name, key.direction),
            "created_at" => then_order!(query, authors::created_at, key.direction),
            "updated_at" => then_order!(query, authors::updated_at, key.direction),
            other => return Err(unsupported("sort", ResourceType::Authors, other)),
        };
    }
    Ok(query.then_order_by(authors::id.asc()))
}

fn filtered_books<'a>(
    filters: &'a [FilterClause],
) -> Result<books::BoxedQuery<'a, Pg>, RepositoryError> {
    let mut query = books::table.into_boxed();
    for clause in filters {
        query = match clause.field {
            "title" => query.filter(books::title.eq(clause.value.as_str())),
            "publication_year" => {
                query.filter(books::publication_year.eq(clause.value.as_str()))
            }
            other => return Err(unsupported("filter", ResourceType::Books, other)),
        };
    }
    Ok(query)
}

fn ordered_books<'a>(
    mut query: books::BoxedQuery<'a, Pg>,
    sort: &[SortKey],
) -> Result<books::BoxedQuery<'a, Pg>, RepositoryError> {
    for key in sort {
        query = match key.field {
            "title" => then_order!(query, books::title, key.direction),
            "publication_year" => then_order!(query, books::publication_year, key.direction),
            "created_at" => then_order!(query, books::created_at, key.direction),
            "updated_at" => then_order!(query, books::updated_at, key.direction),
            other => return Err(unsupported("sort", ResourceType::Books, other)),
        };
    }
    Ok(query.then_order_by(books::id.asc()))
}

fn filtered_comments(
    filters: &[FilterClause],
) -> Result<comments::BoxedQuery<'_, Pg>, RepositoryError> {
    match filters.first() {
        Some(clause) => Err(unsupported("filter", ResourceType::Comments, clause.field)),
        None => Ok(comments::table.into_boxed()),
    }
}

fn ordered_comments<'a>(
    mut query: comments::BoxedQuery<'a, Pg>,
    sort: &[SortKey],
) -> Result<comments::BoxedQuery<'a, Pg>, RepositoryError> {
    for key in sort {
        query = match key.field {
            "created_at" => then_order!(query, comments::created_at, key.direction),
            "updated_at" => then_order!(query, comments::updated_at, key.direction),
            other => return Err(unsupported("sort", ResourceType::Comments, other)),
        };
    }
    Ok(query.then_order_by(comments::id.asc()))
}

fn filtered_users<'a>(
    filters: &'a [FilterClause],
) -> Result<users::BoxedQuery<'a, Pg>, RepositoryError> {
    let mut query = users::table.into_boxed();
    for clause in filters {
        query = match clause.field {
            "role" => query.filter(users::role.eq(clause.value.as_str())),
            other => return Err(unsupported("filter", ResourceType::Users, other)),
        };
    }
    Ok(query)
}

fn ordered_users<'a>(
    mut query: users::BoxedQuery<'a, Pg>,
    sort: &[SortKey],
) -> Result<users::BoxedQuery<'a, Pg>, RepositoryError> {
    for key in sort {
        query = match key.field {
            "name" => then_order!(query, users::name, key.direction),
            "email" => then_order!(query, users::email, key.direction),
            "created_at" => then_order!(query, users::created_at, key.direction),
            "updated_at" => then_order!(query, users::updated_at, key.direction),
            other => return Err(unsupported("sort", ResourceType::Users, other)),
        };
    }
    Ok(query.then_order_by(users::id.asc()))
}

async fn load(conn: &mut AsyncPgConnection, key: ResourceKey) -> QueryResult<Option<Entity>> {
    match (key.resource_type, key.id) {
        (ResourceType::Authors, ResourceId::Numeric(id)) => Ok(authors::table
            .find(id)
            .select(AuthorRow::as_select())
            .first::<AuthorRow>(conn)
            .await
            .optional()?
            .map(|row| Entity::Author(row.into()))),
        (ResourceType::Books, ResourceId::Numeric(id)) => Ok(books::table
            .find(id)
            .select(BookRow::as_select())
            .first::<BookRow>(conn)
            .await
            .optional()?
            .map(|row| Entity::Book(row.into()))),
        (ResourceType::Comments, ResourceId::Numeric(id)) => Ok(comments::table
            .find(id)
            .select(CommentRow::as_select())
            .first::<CommentRow>(conn)
            .await
            .optional()?
            .map(|row| Entity::Comment(row.into()))),
        (ResourceType::Users, ResourceId::Uuid(id)) => Ok(users::table
            .find(id)
            .select(UserRow::as_select())
            .first::<UserRow>(conn)
            .await
            .optional()?
            .map(|row| Entity::User(row.into()))),
        _ => Ok(None),
    }
}

async fn ensure_email_free(
    conn: &mut AsyncPgConnection,
    email: &str,
    except: Option<Uuid>,
) -> Result<(), TxError> {
    let mut query = users::table
        .filter(users::email.eq(email))
        .select(users::id)
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(users::id.ne(id));
    }
    let clash: Option<Uuid> = query.first(conn).await.optional()?;
    match clash {
        Some(_) => Err(RepositoryError::email_taken(email).into()),
        None => Ok(()),
    }
}

/// Comment ids from `targets` with no stored row, in request order.
async fn missing_comments(
    conn: &mut AsyncPgConnection,
    targets: &[ResourceId],
) -> QueryResult<Vec<String>> {
    let wanted: Vec<i64> = targets.iter().filter_map(ResourceId::as_numeric).collect();
    let found: Vec<i64> = comments::table
        .filter(comments::id.eq_any(&wanted))
        .select(comments::id)
        .load(conn)
        .await?;
    Ok(targets
        .iter()
        .filter(|id| id.as_numeric().is_none_or(|id| !found.contains(&id)))
        .map(ToString::to_string)
        .collect())
}

/// Verify every change can be applied to a `parent_type` record.
async fn check(
    conn: &mut AsyncPgConnection,
    parent_type: ResourceType,
    linkage: &[LinkageChange],
) -> Result<(), TxError> {
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
                    ))
                    .into());
                }
                if let Some(target) = target {
                    let owner = ResourceKey::new(foreign_key.target(), *target);
                    if load(conn, owner).await?.is_none() {
                        return Err(RepositoryError::missing_targets(
                            foreign_key.target(),
                            vec![target.to_string()],
                        )
                        .into());
                    }
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
                    ))
                    .into());
                }
                let missing = missing_comments(conn, targets).await?;
                if !missing.is_empty() {
                    return Err(
                        RepositoryError::missing_targets(foreign_key.holder(), missing).into(),
                    );
                }
            }
            LinkageChange::SyncJoin { join, .. } => {
                if join.counterpart(parent_type).is_none() {
                    return Err(RepositoryError::query(format!(
                        "{parent_type} is not joined through `{}`",
                        join.name()
                    ))
                    .into());
                }
            }
        }
    }
    Ok(())
}

async fn assign_owner(
    conn: &mut AsyncPgConnection,
    comment_id: i64,
    foreign_key: ForeignKey,
    target: Option<ResourceId>,
    now: DateTime<Utc>,
) -> QueryResult<usize> {
    let row = comments::table.find(comment_id);
    match foreign_key {
        ForeignKey::CommentUser => {
            diesel::update(row)
                .set((
                    comments::user_id.eq(target.and_then(|id| id.as_uuid())),
                    comments::updated_at.eq(now),
                ))
                .execute(conn)
                .await
        }
        ForeignKey::CommentBook => {
            diesel::update(row)
                .set((
                    comments::book_id.eq(target.and_then(|id| id.as_numeric())),
                    comments::updated_at.eq(now),
                ))
                .execute(conn)
                .await
        }
    }
}

/// Clear the owner column on comments outside `targets`, then point every
/// target at `parent`.
async fn replace_inverse(
    conn: &mut AsyncPgConnection,
    parent: ResourceId,
    foreign_key: ForeignKey,
    targets: &[ResourceId],
    now: DateTime<Utc>,
) -> QueryResult<()> {
    let wanted: Vec<i64> = targets.iter().filter_map(ResourceId::as_numeric).collect();
    match (foreign_key, parent) {
        (ForeignKey::CommentUser, ResourceId::Uuid(user_id)) => {
            diesel::update(
                comments::table
                    .filter(comments::user_id.eq(user_id))
                    .filter(comments::id.ne_all(&wanted)),
            )
            .set((
                comments::user_id.eq(None::<Uuid>),
                comments::updated_at.eq(now),
            ))
            .execute(conn)
            .await?;
            diesel::update(comments::table.filter(comments::id.eq_any(&wanted)))
                .set((
                    comments::user_id.eq(Some(user_id)),
                    comments::updated_at.eq(now),
                ))
                .execute(conn)
                .await?;
        }
        (ForeignKey::CommentBook, ResourceId::Numeric(book_id)) => {
            diesel::update(
                comments::table
                    .filter(comments::book_id.eq(book_id))
                    .filter(comments::id.ne_all(&wanted)),
            )
            .set((
                comments::book_id.eq(None::<i64>),
                comments::updated_at.eq(now),
            ))
            .execute(conn)
            .await?;
            diesel::update(comments::table.filter(comments::id.eq_any(&wanted)))
                .set((
                    comments::book_id.eq(Some(book_id)),
                    comments::updated_at.eq(now),
                ))
                .execute(conn)
                .await?;
        }
        (ForeignKey::CommentUser | ForeignKey::CommentBook, _) => {}
    }
    Ok(())
}

/// Make `parent`'s `author_book` rows exactly `targets`.
async fn sync_author_book(
    conn: &mut AsyncPgConnection,
    parent: ResourceKey,
    targets: &[ResourceId],
) -> Result<(), TxError> {
    let Some(parent_id) = parent.id.as_numeric() else {
        return Err(RepositoryError::query("author_book rows need numeric keys").into());
    };
    let others: Vec<i64> = targets.iter().filter_map(ResourceId::as_numeric).collect();
    let rows: Vec<AuthorBookRow> = match parent.resource_type {
        ResourceType::Authors => {
            diesel::delete(
                author_book::table
                    .filter(author_book::author_id.eq(parent_id))
                    .filter(author_book::book_id.ne_all(&others)),
            )
            .execute(conn)
            .await?;
            others
                .iter()
                .map(|book_id| AuthorBookRow {
                    author_id: parent_id,
                    book_id: *book_id,
                })
                .collect()
        }
        ResourceType::Books => {
            diesel::delete(
                author_book::table
                    .filter(author_book::book_id.eq(parent_id))
                    .filter(author_book::author_id.ne_all(&others)),
            )
            .execute(conn)
            .await?;
            others
                .iter()
                .map(|author_id| AuthorBookRow {
                    author_id: *author_id,
                    book_id: parent_id,
                })
                .collect()
        }
        other => {
            return Err(RepositoryError::query(format!(
                "{other} is not joined through `author_book`"
            ))
            .into());
        }
    };
    if !rows.is_empty() {
        diesel::insert_into(author_book::table)
            .values(&rows)
            .on_conflict_do_nothing()
            .execute(conn)
            .await?;
    }
    Ok(())
}

/// Apply already checked changes to `parent`.
async fn apply(
    conn: &mut AsyncPgConnection,
    parent: ResourceKey,
    linkage: &[LinkageChange],
    now: DateTime<Utc>,
) -> Result<(), TxError> {
    for change in linkage {
        match change {
            LinkageChange::AssignOwner {
                foreign_key,
                target,
            } => {
                if let Some(comment_id) = parent.id.as_numeric() {
                    assign_owner(conn, comment_id, *foreign_key, *target, now).await?;
                }
            }
            LinkageChange::ReplaceInverse {
                foreign_key,
                targets,
            } => replace_inverse(conn, parent.id, *foreign_key, targets, now).await?,
            LinkageChange::SyncJoin {
                join: JoinTable::AuthorBook,
                targets,
            } => sync_author_book(conn, parent, targets).await?,
        }
    }
    Ok(())
}

async fn insert_row(
    conn: &mut AsyncPgConnection,
    draft: &EntityDraft,
    now: DateTime<Utc>,
) -> QueryResult<Entity> {
    match draft {
        EntityDraft::Author(draft) => diesel::insert_into(authors::table)
            .values(NewAuthorRow {
                name: &draft.name,
                created_at: now,
                updated_at: now,
            })
            .returning(AuthorRow::as_returning())
            .get_result::<AuthorRow>(conn)
            .await
            .map(|row| Entity::Author(row.into())),
        EntityDraft::Book(draft) => diesel::insert_into(books::table)
            .values(NewBookRow {
                title: &draft.title,
                description: &draft.description,
                publication_year: &draft.publication_year,
                created_at: now,
                updated_at: now,
            })
            .returning(BookRow::as_returning())
            .get_result::<BookRow>(conn)
            .await
            .map(|row| Entity::Book(row.into())),
        EntityDraft::Comment(draft) => diesel::insert_into(comments::table)
            .values(NewCommentRow {
                message: &draft.message,
                created_at: now,
                updated_at: now,
            })
            .returning(CommentRow::as_returning())
            .get_result::<CommentRow>(conn)
            .await
            .map(|row| Entity::Comment(row.into())),
        EntityDraft::User(draft) => diesel::insert_into(users::table)
            .values(NewUserRow {
                id: Uuid::new_v4(),
                name: &draft.name,
                email: &draft.email,
                role: draft.role.as_str(),
                password: &draft.password_digest,
                created_at: now,
                updated_at: now,
            })
            .returning(UserRow::as_returning())
            .get_result::<UserRow>(conn)
            .await
            .map(|row| Entity::User(row.into())),
    }
}

/// Write the non-empty `patch` to `key`'s row.
async fn patch_row(
    conn: &mut AsyncPgConnection,
    key: ResourceKey,
    patch: &EntityPatch,
    now: DateTime<Utc>,
) -> Result<(), TxError> {
    match (key.id, patch) {
        (ResourceId::Numeric(id), EntityPatch::Author(patch)) => {
            diesel::update(authors::table.find(id))
                .set(AuthorChanges {
                    name: patch.name.as_deref(),
                    updated_at: now,
                })
                .execute(conn)
                .await?;
        }
        (ResourceId::Numeric(id), EntityPatch::Book(patch)) => {
            diesel::update(books::table.find(id))
                .set(BookChanges {
                    title: patch.title.as_deref(),
                    description: patch.description.as_deref(),
                    publication_year: patch.publication_year.as_deref(),
                    updated_at: now,
                })
                .execute(conn)
                .await?;
        }
        (ResourceId::Numeric(id), EntityPatch::Comment(patch)) => {
            diesel::update(comments::table.find(id))
                .set(CommentChanges {
                    message: patch.message.as_deref(),
                    updated_at: now,
                })
                .execute(conn)
                .await?;
        }
        (ResourceId::Uuid(id), EntityPatch::User(patch)) => {
            diesel::update(users::table.find(id))
                .set(UserChanges {
                    name: patch.name.as_deref(),
                    email: patch.email.as_deref(),
                    role: patch.role.map(|role| role.as_str()),
                    password: patch.password_digest.as_deref(),
                    updated_at: now,
                })
                .execute(conn)
                .await?;
        }
        _ => {
            return Err(RepositoryError::query(format!(
                "patch does not apply to {}",
                key.resource_type
            ))
            .into());
        }
    }
    Ok(())
}

async fn related_rows(
    conn: &mut AsyncPgConnection,
    key: ResourceKey,
    mechanism: RelationshipMechanism,
) -> QueryResult<Vec<Entity>> {
    match mechanism {
        RelationshipMechanism::BelongsTo(foreign_key) => {
            let owner = load(conn, key)
                .await?
                .and_then(|entity| entity.owner(foreign_key));
            match owner {
                Some(id) => Ok(load(conn, ResourceKey::new(foreign_key.target(), id))
                    .await?
                    .into_iter()
                    .collect()),
                None => Ok(Vec::new()),
            }
        }
        RelationshipMechanism::HasMany(foreign_key) => {
            let query = comments::table
                .select(CommentRow::as_select())
                .order_by(comments::id.asc())
                .into_boxed();
            let query = match (foreign_key, key.id) {
                (ForeignKey::CommentUser, ResourceId::Uuid(id)) => {
                    query.filter(comments::user_id.eq(id))
                }
                (ForeignKey::CommentBook, ResourceId::Numeric(id)) => {
                    query.filter(comments::book_id.eq(id))
                }
                (ForeignKey::CommentUser | ForeignKey::CommentBook, _) => return Ok(Vec::new()),
            };
            let rows: Vec<CommentRow> = query.load(conn).await?;
            Ok(rows.into_iter().map(|row| Entity::Comment(row.into())).collect())
        }
        RelationshipMechanism::ManyToMany(JoinTable::AuthorBook) => {
            let Some(parent_id) = key.id.as_numeric() else {
                return Ok(Vec::new());
            };
            match key.resource_type {
                ResourceType::Authors => {
                    let rows: Vec<BookRow> = books::table
                        .inner_join(author_book::table)
                        .filter(author_book::author_id.eq(parent_id))
                        .select(BookRow::as_select())
                        .order_by(books::id.asc())
                        .load(conn)
                        .await?;
                    Ok(rows.into_iter().map(|row| Entity::Book(row.into())).collect())
                }
                ResourceType::Books => {
                    let rows: Vec<AuthorRow> = authors::table
                        .inner_join(author_book::table)
                        .filter(author_book::book_id.eq(parent_id))
                        .select(AuthorRow::as_select())
                        .order_by(authors::id.asc())
                        .load(conn)
                        .await?;
                    Ok(rows.into_iter().map(|row| Entity::Author(row.into())).collect())
                }
                ResourceType::Comments | ResourceType::Users => Ok(Vec::new()),
            }
        }
    }
}

/// Diesel-backed implementation of the `ResourceRepository` port.
#[derive(Clone)]
pub struct DieselResourceRepository {
    pool: DbPool,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl DieselResourceRepository {
    /// Create a repository stamping timestamps from `clock`.
    pub fn new(pool: DbPool, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl ResourceRepository for DieselResourceRepository {
    async fn find(&self, key: ResourceKey) -> Result<Option<Entity>, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        load(&mut conn, key)
            .await
            .map_err(|error| map_diesel_error(&error))
    }

    async fn list(
        &self,
        resource_type: ResourceType,
        query: &ListQuery,
    ) -> Result<Listing, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let offset = clamp_offset(query.offset);
        let limit = i64::from(query.limit);
        let mapped = |error: DieselError| map_diesel_error(&error);

        let (items, total): (Vec<Entity>, i64) = match resource_type {
            ResourceType::Authors => {
                let total = filtered_authors(&query.filters)?
                    .count()
                    .get_result(&mut conn)
                    .await
                    .map_err(mapped)?;
                let rows: Vec<AuthorRow> = ordered_authors(filtered_authors(&query.filters)?, &query.sort)?
                    .select(AuthorRow::as_select())
                    .offset(offset)
                    .limit(limit)
                    .load(&mut conn)
                    .await
                    .map_err(mapped)?;
                (rows.into_iter().map(|row| Entity::Author(row.into())).collect(), total)
            }
            ResourceType::Books => {
                let total = filtered_books(&query.filters)?
                    .count()
                    .get_result(&mut conn)
                    .await
                    .map_err(mapped)?;
                let rows: Vec<BookRow> = ordered_books(filtered_books(&query.filters)?, &query.sort)?
                    .select(BookRow::as_select())
                    .offset(offset)
                    .limit(limit)
                    .load(&mut conn)
                    .await
                    .map_err(mapped)?;
                (rows.into_iter().map(|row| Entity::Book(row.into())).collect(), total)
            }
            ResourceType::Comments => {
                let total = filtered_comments(&query.filters)?
                    .count()
                    .get_result(&mut conn)
                    .await
                    .map_err(mapped)?;
                let rows: Vec<CommentRow> =
                    ordered_comments(filtered_comments(&query.filters)?, &query.sort)?
                        .select(CommentRow::as_select())
                        .offset(offset)
                        .limit(limit)
                        .load(&mut conn)
                        .await
                        .map_err(mapped)?;
                (rows.into_iter().map(|row| Entity::Comment(row.into())).collect(), total)
            }
            ResourceType::Users => {
                let total = filtered_users(&query.filters)?
                    .count()
                    .get_result(&mut conn)
                    .await
                    .map_err(mapped)?;
                let rows: Vec<UserRow> = ordered_users(filtered_users(&query.filters)?, &query.sort)?
                    .select(UserRow::as_select())
                    .offset(offset)
                    .limit(limit)
                    .load(&mut conn)
                    .await
                    .map_err(mapped)?;
                (rows.into_iter().map(|row| Entity::User(row.into())).collect(), total)
            }
        };
        Ok(Listing {
            items,
            total: total_count(total),
        })
    }

    async fn insert(
        &self,
        draft: &EntityDraft,
        linkage: &[LinkageChange],
    ) -> Result<Entity, RepositoryError> {
        let now = self.clock.utc();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                check(conn, draft.resource_type(), linkage).await?;
                if let EntityDraft::User(user) = draft {
                    ensure_email_free(conn, &user.email, None).await?;
                }
                let entity = insert_row(conn, draft, now).await?;
                let key = entity.key();
                apply(conn, key, linkage, now).await?;
                Ok(load(conn, key).await?.unwrap_or(entity))
            }
            .scope_boxed()
        })
        .await
        .map_err(TxError::into_repository)
    }

    async fn update(
        &self,
        key: ResourceKey,
        patch: &EntityPatch,
        linkage: &[LinkageChange],
    ) -> Result<Option<Entity>, RepositoryError> {
        let now = self.clock.utc();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                if load(conn, key).await?.is_none() {
                    return Ok(None);
                }
                check(conn, key.resource_type, linkage).await?;
                if let EntityPatch::User(UserPatch {
                    email: Some(email), ..
                }) = patch
                {
                    ensure_email_free(conn, email, key.id.as_uuid()).await?;
                }
                if !patch.is_empty() {
                    patch_row(conn, key, patch, now).await?;
                }
                apply(conn, key, linkage, now).await?;
                Ok(load(conn, key).await?)
            }
            .scope_boxed()
        })
        .await
        .map_err(TxError::into_repository)
    }

    async fn delete(&self, key: ResourceKey) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = match (key.resource_type, key.id) {
            (ResourceType::Authors, ResourceId::Numeric(id)) => {
                diesel::delete(authors::table.find(id)).execute(&mut conn).await
            }
            (ResourceType::Books, ResourceId::Numeric(id)) => {
                diesel::delete(books::table.find(id)).execute(&mut conn).await
            }
            (ResourceType::Comments, ResourceId::Numeric(id)) => {
                diesel::delete(comments::table.find(id)).execute(&mut conn).await
            }
            (ResourceType::Users, ResourceId::Uuid(id)) => {
                diesel::delete(users::table.find(id)).execute(&mut conn).await
            }
            _ => Ok(0),
        }
        .map_err(|error| map_diesel_error(&error))?;
        debug!(%key, deleted, "delete executed");
        Ok(deleted > 0)
    }

    async fn related(
        &self,
        key: ResourceKey,
        mechanism: RelationshipMechanism,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        related_rows(&mut conn, key, mechanism)
            .await
            .map_err(|error| map_diesel_error(&error))
    }
}
