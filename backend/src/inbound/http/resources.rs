//! Resource collection and item endpoints.
//!
//! ```text
//! GET    /api/v1/{type}
//! POST   /api/v1/{type}
//! GET    /api/v1/{type}/{id}
//! PATCH  /api/v1/{type}/{id}
//! DELETE /api/v1/{type}/{id}
//! ```

use actix_web::http::{StatusCode, header};
use actix_web::{HttpRequest, HttpResponse, delete, get, patch, post, web};

use crate::domain::{EntityRegistry, Error, ResourceType};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Authenticated;
use crate::inbound::http::jsonapi::{document_response, query_pairs};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation;

/// Map a path segment onto a registered type.
pub(crate) fn registered_type(registry: &EntityRegistry, name: &str) -> Result<ResourceType, Error> {
    Ok(registry.resolve(name)?.resource_type())
}

#[get("/{resource_type}")]
pub async fn index(
    state: web::Data<HttpState>,
    _auth: Authenticated,
    path: web::Path<String>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let resource_type = registered_type(&state.registry, &path)?;
    let document = state
        .mediator
        .fetch_many(resource_type, &query_pairs(&req))
        .await?;
    document_response(StatusCode::OK, &document)
}

#[post("/{resource_type}")]
pub async fn store(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let resource_type = registered_type(&state.registry, &path)?;
    let payload = validation::parse_body(&body)?;
    let input = validation::create_input(&state.registry, resource_type, &payload)?;
    let created = state.mediator.create(auth.actor(), input).await?;
    let mut response = document_response(StatusCode::CREATED, &created.document)?;
    let location = header::HeaderValue::from_str(&created.location)
        .map_err(|err| Error::internal("HeaderError", err.to_string()))?;
    response.headers_mut().insert(header::LOCATION, location);
    Ok(response)
}

#[get("/{resource_type}/{id}")]
pub async fn show(
    state: web::Data<HttpState>,
    _auth: Authenticated,
    path: web::Path<(String, String)>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let (name, id) = path.into_inner();
    let resource_type = registered_type(&state.registry, &name)?;
    let document = state
        .mediator
        .fetch_one(resource_type, &id, &query_pairs(&req))
        .await?;
    document_response(StatusCode::OK, &document)
}

#[patch("/{resource_type}/{id}")]
pub async fn update(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<(String, String)>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let (name, id) = path.into_inner();
    let resource_type = registered_type(&state.registry, &name)?;
    let payload = validation::parse_body(&body)?;
    let input = validation::update_input(&state.registry, resource_type, &id, &payload)?;
    let document = state
        .mediator
        .update(auth.actor(), resource_type, &id, input)
        .await?;
    document_response(StatusCode::OK, &document)
}

#[delete("/{resource_type}/{id}")]
pub async fn destroy(
    state: web::Data<HttpState>,
    _auth: Authenticated,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (name, id) = path.into_inner();
    let resource_type = registered_type(&state.registry, &name)?;
    state.mediator.delete(resource_type, &id).await?;
    Ok(HttpResponse::NoContent().finish())
}
