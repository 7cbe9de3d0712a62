//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on the mediator and domain ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::AccessTokenRepository;
use crate::domain::{EntityRegistry, ResourceMediator};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub mediator: Arc<ResourceMediator>,
    pub tokens: Arc<dyn AccessTokenRepository>,
    pub registry: Arc<EntityRegistry>,
}

impl HttpState {
    pub fn new(
        mediator: Arc<ResourceMediator>,
        tokens: Arc<dyn AccessTokenRepository>,
        registry: Arc<EntityRegistry>,
    ) -> Self {
        Self {
            mediator,
            tokens,
            registry,
        }
    }
}
