//! HTTP inbound adapter exposing the JSON:API endpoints.

pub mod auth;
pub mod error;
pub mod health;
pub mod jsonapi;
pub mod relationships;
pub mod resources;
pub mod state;
pub mod validation;

use actix_web::{HttpRequest, web};

use crate::domain::Error;

pub use error::ApiResult;

/// Mount prefix for resource routes.
pub const API_PREFIX: &str = "/api/v1";

/// Register the resource routes under [`API_PREFIX`].
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(API_PREFIX)
            .service(relationships::linkage)
            .service(relationships::update_linkage)
            .service(relationships::related)
            .service(resources::index)
            .service(resources::store)
            .service(resources::show)
            .service(resources::update)
            .service(resources::destroy),
    );
}

/// Fallback for unmatched routes, rendered as a JSON:API 404.
pub async fn not_found(req: HttpRequest) -> ApiResult<actix_web::HttpResponse> {
    Err(Error::not_found(format!(
        "The route {} could not be found.",
        req.path()
    )))
}
