//! Bearer token authentication for HTTP handlers.
//!
//! Handlers take an [`Authenticated`] argument; the extractor resolves the
//! `Authorization: Bearer <token>` credential through the access token port
//! before the handler body runs.

use actix_web::dev::Payload;
use actix_web::http::header::{AUTHORIZATION, HeaderMap};
use actix_web::{FromRequest, HttpRequest, web};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::domain::{Actor, Error, digest_token};

use super::state::HttpState;

/// The actor behind an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authenticated(pub Actor);

impl Authenticated {
    pub const fn actor(&self) -> &Actor {
        &self.0
    }
}

/// Extract the token from an `Authorization: Bearer` header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_owned())
}

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<HttpState>>().cloned();
        let token = bearer_token(req.headers());
        Box::pin(async move {
            let state = state.ok_or_else(|| {
                Error::internal("ConfigurationError", "HTTP state is not registered")
            })?;
            let Some(token) = token else {
                warn!("request rejected: missing bearer token");
                return Err(Error::unauthenticated());
            };
            match state.tokens.find_actor(&digest_token(&token)).await? {
                Some(actor) => Ok(Self(actor)),
                None => {
                    warn!("request rejected: unknown bearer token");
                    Err(Error::unauthenticated())
                }
            }
        })
    }
}
