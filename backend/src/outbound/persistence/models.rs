//! Diesel row structs and their conversions into domain records.
//!
//! These types stay inside the persistence layer.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{Author, Book, Comment, Role, User};

use super::schema::{author_book, authors, books, comments, personal_access_tokens, users};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = authors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AuthorRow {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = authors)]
pub(crate) struct NewAuthorRow<'a> {
    pub name: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `None` fields are left untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = authors)]
pub(crate) struct AuthorChanges<'a> {
    pub name: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

impl From<AuthorRow> for Author {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = books)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct BookRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub publication_year: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = books)]
pub(crate) struct NewBookRow<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub publication_year: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = books)]
pub(crate) struct BookChanges<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub publication_year: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            publication_year: row.publication_year,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CommentRow {
    pub id: i64,
    pub message: String,
    pub user_id: Option<Uuid>,
    pub book_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owners start empty and are set by the linkage changes of the same write.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = comments)]
pub(crate) struct NewCommentRow<'a> {
    pub message: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = comments)]
pub(crate) struct CommentChanges<'a> {
    pub message: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            message: row.message,
            user_id: row.user_id,
            book_id: row.book_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub password: String,
    pub remember_token: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub email: &'a str,
    pub role: &'a str,
    pub password: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub(crate) struct UserChanges<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub role: Option<&'a str>,
    pub password: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn parse_role(user_id: Uuid, raw: &str) -> Role {
    raw.parse::<Role>().unwrap_or_else(|_| {
        warn!(value = raw, %user_id, "unrecognised role value, defaulting to user");
        Role::User
    })
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            role: parse_role(row.id, &row.role),
            name: row.name,
            email: row.email,
            password_digest: row.password,
            remember_token: row.remember_token,
            email_verified_at: row.email_verified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = author_book)]
pub(crate) struct AuthorBookRow {
    pub author_id: i64,
    pub book_id: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = personal_access_tokens)]
pub(crate) struct NewAccessTokenRow<'a> {
    pub user_id: Uuid,
    pub name: &'a str,
    pub token: &'a str,
    pub created_at: DateTime<Utc>,
}
