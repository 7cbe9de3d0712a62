//! Builders for the HTTP handler state.
//!
//! Chooses Diesel adapters when a pool is configured and in-memory adapters
//! otherwise, then wires them into the mediator.

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};
use tracing::{info, warn};

use bookshelf::domain::ports::{AccessTokenRepository, ResourceRepository};
use bookshelf::domain::seed::seed_dev_data;
use bookshelf::domain::{
    DocumentAssembler, EntityRegistry, MediatorParts, ResourceMediator, RoleAccessGate,
};
use bookshelf::inbound::http::state::HttpState;
use bookshelf::outbound::memory::{MemoryAccessTokens, MemoryResourceStore};
use bookshelf::outbound::persistence::{DieselAccessTokenRepository, DieselResourceRepository};

use super::ServerConfig;

type Adapters = (Arc<dyn ResourceRepository>, Arc<dyn AccessTokenRepository>);

fn build_adapters(config: &ServerConfig, clock: Arc<dyn Clock + Send + Sync>) -> Adapters {
    match &config.db_pool {
        Some(pool) => (
            Arc::new(DieselResourceRepository::new(pool.clone(), Arc::clone(&clock))),
            Arc::new(DieselAccessTokenRepository::new(pool.clone(), clock)),
        ),
        None => {
            info!("no database configured; using in-memory adapters");
            let store = Arc::new(MemoryResourceStore::new(clock));
            let tokens = Arc::new(MemoryAccessTokens::new(Arc::clone(&store)));
            (store, tokens)
        }
    }
}

/// Assemble handler state, seeding development data when configured.
///
/// # Errors
///
/// Returns [`std::io::Error`] when seeding fails.
pub(crate) async fn build_http_state(config: &ServerConfig) -> std::io::Result<web::Data<HttpState>> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(DefaultClock);
    let (repository, tokens) = build_adapters(config, clock);

    if config.seed_dev_data {
        let report = seed_dev_data(repository.as_ref(), tokens.as_ref())
            .await
            .map_err(|err| std::io::Error::other(format!("seeding failed: {err}")))?;
        for user in &report.users {
            warn!(
                user = user.name,
                role = %user.role,
                token = user.token.as_str(),
                "issued development access token"
            );
        }
    }

    let registry = Arc::new(EntityRegistry::standard());
    let mediator = ResourceMediator::new(MediatorParts {
        registry: Arc::clone(&registry),
        repository,
        gate: Arc::new(RoleAccessGate),
        assembler: DocumentAssembler::new(config.public_url.clone(), Arc::clone(&registry)),
        page_settings: config.page_settings,
    });
    Ok(web::Data::new(HttpState::new(
        Arc::new(mediator),
        tokens,
        registry,
    )))
}
