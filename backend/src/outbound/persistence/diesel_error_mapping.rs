//! Classification of pool and Diesel failures shared by the repositories.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::{AccessTokenRepositoryError, RepositoryError};

use super::pool::PoolError;

/// Coarse failure classes the ports distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureKind {
    Connection,
    UniqueViolation,
    ForeignKeyViolation,
    Query,
}

/// Classify `error`, logging the driver detail before it is discarded.
pub(crate) fn classify(error: &DieselError) -> FailureKind {
    match error {
        DieselError::DatabaseError(kind, info) => {
            debug!(
                ?kind,
                message = info.message(),
                constraint = info.constraint_name(),
                "diesel operation failed"
            );
            match kind {
                DatabaseErrorKind::ClosedConnection => FailureKind::Connection,
                DatabaseErrorKind::UniqueViolation => FailureKind::UniqueViolation,
                DatabaseErrorKind::ForeignKeyViolation => FailureKind::ForeignKeyViolation,
                _ => FailureKind::Query,
            }
        }
        other => {
            debug!(error = %other, "diesel operation failed");
            FailureKind::Query
        }
    }
}

pub(crate) fn map_pool_error(error: PoolError) -> RepositoryError {
    RepositoryError::connection(error.into_message())
}

pub(crate) fn map_diesel_error(error: &DieselError) -> RepositoryError {
    match classify(error) {
        FailureKind::Connection => RepositoryError::connection("database connection error"),
        FailureKind::UniqueViolation => unique_violation(error),
        FailureKind::ForeignKeyViolation => RepositoryError::constraint_violation(
            database_message(error).unwrap_or("foreign key constraint violated"),
        ),
        FailureKind::Query => RepositoryError::query("database error"),
    }
}

pub(crate) fn map_token_pool_error(error: PoolError) -> AccessTokenRepositoryError {
    AccessTokenRepositoryError::connection(error.into_message())
}

pub(crate) fn map_token_diesel_error(error: &DieselError) -> AccessTokenRepositoryError {
    match classify(error) {
        FailureKind::Connection => {
            AccessTokenRepositoryError::connection("database connection error")
        }
        FailureKind::UniqueViolation | FailureKind::ForeignKeyViolation | FailureKind::Query => {
            AccessTokenRepositoryError::query("database error")
        }
    }
}

fn database_message(error: &DieselError) -> Option<&str> {
    match error {
        DieselError::DatabaseError(_, info) => Some(info.message()),
        _ => None,
    }
}

fn unique_violation(error: &DieselError) -> RepositoryError {
    let on_email = match error {
        DieselError::DatabaseError(_, info) => info
            .constraint_name()
            .is_some_and(|name| name.contains("email")),
        _ => false,
    };
    if on_email {
        RepositoryError::duplicate("The email has already been taken.")
    } else {
        RepositoryError::duplicate("A record with the same unique value already exists.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorInformation;
    use rstest::rstest;

    struct Info {
        message: &'static str,
        constraint: Option<&'static str>,
    }

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            self.message
        }

        fn details(&self) -> Option<&str> {
            None
        }

        fn hint(&self) -> Option<&str> {
            None
        }

        fn table_name(&self) -> Option<&str> {
            None
        }

        fn column_name(&self) -> Option<&str> {
            None
        }

        fn constraint_name(&self) -> Option<&str> {
            self.constraint
        }

        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn database_error(kind: DatabaseErrorKind, constraint: Option<&'static str>) -> DieselError {
        DieselError::DatabaseError(
            kind,
            Box::new(Info {
                message: "violates constraint",
                constraint,
            }),
        )
    }

    #[rstest]
    #[case(DatabaseErrorKind::ClosedConnection, FailureKind::Connection)]
    #[case(DatabaseErrorKind::UniqueViolation, FailureKind::UniqueViolation)]
    #[case(DatabaseErrorKind::ForeignKeyViolation, FailureKind::ForeignKeyViolation)]
    #[case(DatabaseErrorKind::SerializationFailure, FailureKind::Query)]
    fn database_kinds_are_classified(
        #[case] kind: DatabaseErrorKind,
        #[case] expected: FailureKind,
    ) {
        assert_eq!(classify(&database_error(kind, None)), expected);
    }

    #[rstest]
    fn not_found_is_a_query_failure() {
        assert_eq!(classify(&DieselError::NotFound), FailureKind::Query);
    }

    #[rstest]
    fn email_clashes_become_duplicates() {
        let error = database_error(DatabaseErrorKind::UniqueViolation, Some("users_email_key"));
        assert_eq!(
            map_diesel_error(&error),
            RepositoryError::duplicate("The email has already been taken.")
        );
    }

    #[rstest]
    fn join_violations_become_constraint_violations() {
        let error = database_error(
            DatabaseErrorKind::ForeignKeyViolation,
            Some("author_book_author_id_fkey"),
        );
        assert_eq!(
            map_diesel_error(&error),
            RepositoryError::constraint_violation("violates constraint")
        );
    }

    #[rstest]
    fn pool_failures_are_connection_errors() {
        assert_eq!(
            map_token_pool_error(PoolError::checkout("timed out")),
            AccessTokenRepositoryError::connection("timed out")
        );
    }
}
