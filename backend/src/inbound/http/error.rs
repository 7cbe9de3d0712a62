//! HTTP adapter mapping for domain errors.
//!
//! Purpose: keep the domain error type HTTP-agnostic while allowing Actix
//! handlers to turn domain failures into JSON:API error documents with
//! consistent status codes.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use tracing::error;

use crate::domain::{Error, ErrorCode, TRACE_ID_HEADER};

use super::jsonapi::JSON_API_CONTENT_TYPE;

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
struct ErrorSource<'a> {
    pointer: &'a str,
}

#[derive(Debug, Serialize)]
struct ErrorObject<'a> {
    title: &'a str,
    details: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<ErrorSource<'a>>,
}

#[derive(Debug, Serialize)]
struct ErrorDocument<'a> {
    errors: Vec<ErrorObject<'a>>,
}

/// One entry per field violation, or a single entry otherwise.
fn error_document(error: &Error) -> ErrorDocument<'_> {
    let errors = if error.violations().is_empty() {
        vec![ErrorObject {
            title: error.title(),
            details: error.message(),
            source: None,
        }]
    } else {
        error
            .violations()
            .iter()
            .map(|violation| ErrorObject {
                title: error.title(),
                details: violation.message(),
                source: Some(ErrorSource {
                    pointer: violation.pointer(),
                }),
            })
            .collect()
    };
    ErrorDocument { errors }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        builder.content_type(JSON_API_CONTENT_TYPE);
        if let Some(id) = self.trace_id() {
            builder.insert_header((TRACE_ID_HEADER, id.to_owned()));
        }

        match serde_json::to_vec(&error_document(self)) {
            Ok(body) => builder.body(body),
            Err(err) => {
                error!(error = %err, "failed to encode error document");
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        error!(error = %err, "actix error promoted to domain error");
        Error::internal("HttpError", err.to_string())
    }
}
