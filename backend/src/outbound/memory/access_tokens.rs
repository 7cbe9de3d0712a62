//! In-memory access token repository.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::ports::{AccessTokenRepository, AccessTokenRepositoryError, ResourceRepository};
use crate::domain::{Actor, Entity, ResourceId, ResourceKey, ResourceType};

use super::MemoryResourceStore;

#[derive(Debug, Clone)]
struct StoredToken {
    user_id: Uuid,
    name: String,
}

/// Token digests held in memory, resolved against the users of a
/// [`MemoryResourceStore`].
pub struct MemoryAccessTokens {
    users: Arc<MemoryResourceStore>,
    tokens: Mutex<HashMap<String, StoredToken>>,
}

impl MemoryAccessTokens {
    pub fn new(users: Arc<MemoryResourceStore>) -> Self {
        Self {
            users,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Names of the tokens issued to `user_id`.
    pub fn token_names(&self, user_id: Uuid) -> Result<Vec<String>, AccessTokenRepositoryError> {
        let tokens = self.tokens.lock().map_err(|_| poisoned())?;
        let mut names: Vec<String> = tokens
            .values()
            .filter(|token| token.user_id == user_id)
            .map(|token| token.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

fn poisoned() -> AccessTokenRepositoryError {
    AccessTokenRepositoryError::connection("in-memory token lock poisoned")
}

#[async_trait]
impl AccessTokenRepository for MemoryAccessTokens {
    async fn find_actor(
        &self,
        token_digest: &str,
    ) -> Result<Option<Actor>, AccessTokenRepositoryError> {
        let user_id = {
            let tokens = self.tokens.lock().map_err(|_| poisoned())?;
            match tokens.get(token_digest) {
                Some(token) => token.user_id,
                None => return Ok(None),
            }
        };
        let key = ResourceKey::new(ResourceType::Users, ResourceId::Uuid(user_id));
        let user = self
            .users
            .find(key)
            .await
            .map_err(|err| AccessTokenRepositoryError::query(err.to_string()))?;
        Ok(match user {
            Some(Entity::User(user)) => Some(Actor::new(user.id, user.role)),
            _ => None,
        })
    }

    async fn issue(
        &self,
        user_id: Uuid,
        name: &str,
        token_digest: &str,
    ) -> Result<(), AccessTokenRepositoryError> {
        self.tokens.lock().map_err(|_| poisoned())?.insert(
            token_digest.to_owned(),
            StoredToken {
                user_id,
                name: name.to_owned(),
            },
        );
        Ok(())
    }
}
