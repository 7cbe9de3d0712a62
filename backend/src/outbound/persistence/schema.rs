//! Diesel table definitions.
//!
//! Must match `migrations/` exactly; regenerate with `diesel print-schema`
//! after changing a migration.

diesel::table! {
    /// Book authors.
    authors (id) {
        id -> Int8,
        name -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Catalogue entries.
    books (id) {
        id -> Int8,
        title -> Varchar,
        description -> Text,
        publication_year -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Comments. Both owners are nullable and cleared when the owner is
    /// deleted.
    comments (id) {
        id -> Int8,
        message -> Text,
        user_id -> Nullable<Uuid>,
        book_id -> Nullable<Int8>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Accounts. `email` carries the `users_email_key` unique constraint and
    /// `password` holds a SHA-256 hex digest.
    users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        role -> Varchar,
        password -> Varchar,
        remember_token -> Nullable<Varchar>,
        email_verified_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Author/book join rows; both foreign keys cascade on delete.
    author_book (author_id, book_id) {
        author_id -> Int8,
        book_id -> Int8,
    }
}

diesel::table! {
    /// Personal access tokens stored as SHA-256 hex digests.
    personal_access_tokens (id) {
        id -> Int8,
        user_id -> Uuid,
        name -> Varchar,
        token -> Bpchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(comments -> users (user_id));
diesel::joinable!(comments -> books (book_id));
diesel::joinable!(author_book -> authors (author_id));
diesel::joinable!(author_book -> books (book_id));
diesel::joinable!(personal_access_tokens -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    authors,
    books,
    comments,
    users,
    author_book,
    personal_access_tokens,
);
