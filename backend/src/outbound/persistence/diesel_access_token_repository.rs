//! PostgreSQL-backed `AccessTokenRepository` using Diesel.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use mockable::Clock;
use uuid::Uuid;

use crate::domain::Actor;
use crate::domain::ports::{AccessTokenRepository, AccessTokenRepositoryError};

use super::diesel_error_mapping::{map_token_diesel_error, map_token_pool_error};
use super::models::{NewAccessTokenRow, parse_role};
use super::pool::DbPool;
use super::schema::{personal_access_tokens, users};

/// Resolves bearer token digests through `personal_access_tokens`.
#[derive(Clone)]
pub struct DieselAccessTokenRepository {
    pool: DbPool,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl DieselAccessTokenRepository {
    pub fn new(pool: DbPool, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl AccessTokenRepository for DieselAccessTokenRepository {
    async fn find_actor(
        &self,
        token_digest: &str,
    ) -> Result<Option<Actor>, AccessTokenRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_token_pool_error)?;
        let owner: Option<(Uuid, String)> = personal_access_tokens::table
            .inner_join(users::table)
            .filter(personal_access_tokens::token.eq(token_digest))
            .select((users::id, users::role))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_token_diesel_error(&error))?;
        Ok(owner.map(|(user_id, role)| Actor::new(user_id, parse_role(user_id, &role))))
    }

    async fn issue(
        &self,
        user_id: Uuid,
        name: &str,
        token_digest: &str,
    ) -> Result<(), AccessTokenRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_token_pool_error)?;
        diesel::insert_into(personal_access_tokens::table)
            .values(NewAccessTokenRow {
                user_id,
                name,
                token: token_digest,
                created_at: self.clock.utc(),
            })
            .execute(&mut conn)
            .await
            .map_err(|error| map_token_diesel_error(&error))?;
        Ok(())
    }
}
