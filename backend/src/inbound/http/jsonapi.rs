//! JSON:API response and query helpers shared by handlers.

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;

use crate::domain::Error;

/// Media type for every JSON:API document.
pub const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json";

/// Serialise `document` with the JSON:API media type.
///
/// # Errors
///
/// Returns an internal error when the document cannot be encoded.
pub fn document_response<T: Serialize>(
    status: StatusCode,
    document: &T,
) -> Result<HttpResponse, Error> {
    let body = serde_json::to_vec(document)
        .map_err(|err| Error::internal("SerializationError", err.to_string()))?;
    Ok(HttpResponse::build(status)
        .content_type(JSON_API_CONTENT_TYPE)
        .body(body))
}

/// Decoded query-string pairs in request order. Bracketed keys such as
/// `filter[name]` are kept verbatim.
pub fn query_pairs(req: &HttpRequest) -> Vec<(String, String)> {
    url::form_urlencoded::parse(req.query_string().as_bytes())
        .into_owned()
        .collect()
}
