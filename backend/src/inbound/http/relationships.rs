//! Related-resource and relationship-linkage endpoints.
//!
//! ```text
//! GET   /api/v1/{type}/{id}/{relationship}
//! GET   /api/v1/{type}/{id}/relationships/{relationship}
//! PATCH /api/v1/{type}/{id}/relationships/{relationship}
//! ```

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, get, patch, web};
use serde::Deserialize;

use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Authenticated;
use crate::inbound::http::jsonapi::document_response;
use crate::inbound::http::resources::registered_type;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation;

#[derive(Debug, Deserialize)]
pub struct RelationshipPath {
    resource_type: String,
    id: String,
    relationship: String,
}

#[get("/{resource_type}/{id}/{relationship}")]
pub async fn related(
    state: web::Data<HttpState>,
    _auth: Authenticated,
    path: web::Path<RelationshipPath>,
) -> ApiResult<HttpResponse> {
    let resource_type = registered_type(&state.registry, &path.resource_type)?;
    let document = state
        .mediator
        .fetch_related(resource_type, &path.id, &path.relationship)
        .await?;
    document_response(StatusCode::OK, &document)
}

#[get("/{resource_type}/{id}/relationships/{relationship}")]
pub async fn linkage(
    state: web::Data<HttpState>,
    _auth: Authenticated,
    path: web::Path<RelationshipPath>,
) -> ApiResult<HttpResponse> {
    let resource_type = registered_type(&state.registry, &path.resource_type)?;
    let document = state
        .mediator
        .fetch_relationship_linkage(resource_type, &path.id, &path.relationship)
        .await?;
    document_response(StatusCode::OK, &document)
}

#[patch("/{resource_type}/{id}/relationships/{relationship}")]
pub async fn update_linkage(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<RelationshipPath>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let resource_type = registered_type(&state.registry, &path.resource_type)?;
    let payload = validation::parse_body(&body)?;
    let data = validation::linkage_input(&state.registry, &payload)?;
    state
        .mediator
        .update_relationship(
            auth.actor(),
            resource_type,
            &path.id,
            &path.relationship,
            &data,
        )
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
