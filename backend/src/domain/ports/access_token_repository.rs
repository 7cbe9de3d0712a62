//! Port for personal access token storage.
//!
//! Only SHA-256 digests of tokens are stored; the plaintext is shown once
//! when issued.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Actor, Error};

use super::define_port_error;

define_port_error! {
    /// Errors raised by access token adapters.
    pub enum AccessTokenRepositoryError {
        /// The store could not be reached.
        Connection { message: String } =>
            "access token repository connection failed: {message}",
        /// A query or mutation failed while executing.
        Query { message: String } =>
            "access token repository query failed: {message}",
    }
}

impl From<AccessTokenRepositoryError> for Error {
    fn from(value: AccessTokenRepositoryError) -> Self {
        match value {
            AccessTokenRepositoryError::Connection { message } => {
                Self::service_unavailable(message)
            }
            AccessTokenRepositoryError::Query { message } => {
                Self::internal("AccessTokenRepositoryError", message)
            }
        }
    }
}

/// Port resolving bearer tokens to actors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessTokenRepository: Send + Sync {
    /// Resolve a token digest to the owning user, if any.
    async fn find_actor(&self, token_digest: &str)
    -> Result<Option<Actor>, AccessTokenRepositoryError>;

    /// Store a new token digest for `user_id` under a display `name`.
    async fn issue(
        &self,
        user_id: Uuid,
        name: &str,
        token_digest: &str,
    ) -> Result<(), AccessTokenRepositoryError>;
}

/// Fixture implementation for tests where authentication is not under test.
///
/// Lookups never resolve and issued tokens are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureAccessTokenRepository;

#[async_trait]
impl AccessTokenRepository for FixtureAccessTokenRepository {
    async fn find_actor(
        &self,
        _token_digest: &str,
    ) -> Result<Option<Actor>, AccessTokenRepositoryError> {
        Ok(None)
    }

    async fn issue(
        &self,
        _user_id: Uuid,
        _name: &str,
        _token_digest: &str,
    ) -> Result<(), AccessTokenRepositoryError> {
        Ok(())
    }
}
