//! Shared harness for HTTP integration suites.
//!
//! Builds the full actix app over the in-memory adapters with a pinned
//! clock, one administrator and one regular user.

use std::sync::Arc;

use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::test::TestRequest;
use actix_web::{App, web};
use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use pagination::PageSettings;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use bookshelf::Trace;
use bookshelf::domain::ports::{AccessTokenRepository, ResourceRepository};
use bookshelf::domain::{
    DocumentAssembler, EntityDraft, EntityRegistry, MediatorParts, ResourceId, ResourceMediator,
    Role, RoleAccessGate, UserDraft, digest_token, sha256_hex,
};
use bookshelf::inbound::http::state::HttpState;
use bookshelf::inbound::http::{configure, not_found};
use bookshelf::outbound::memory::{MemoryAccessTokens, MemoryResourceStore};

pub const BASE: &str = "http://localhost:8080/api/v1";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const READER_TOKEN: &str = "reader-token";
pub const PINNED_AT: &str = "2019-01-01T00:00:00.000000Z";

struct PinnedClock(DateTime<Utc>);

impl Clock for PinnedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

fn pinned_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub struct TestContext {
    pub state: web::Data<HttpState>,
    pub admin_id: Uuid,
    pub reader_id: Uuid,
}

async fn account(
    store: &MemoryResourceStore,
    tokens: &MemoryAccessTokens,
    (name, email, role, token): (&str, &str, Role, &str),
) -> Uuid {
    let draft = EntityDraft::User(UserDraft {
        name: name.to_owned(),
        email: email.to_owned(),
        password_digest: sha256_hex("secret"),
        role,
    });
    let user = store.insert(&draft, &[]).await.expect("user inserted");
    let ResourceId::Uuid(user_id) = user.id() else {
        panic!("users have UUID keys");
    };
    tokens
        .issue(user_id, "test", &digest_token(token))
        .await
        .expect("token issued");
    user_id
}

pub async fn context_with_page_size(default_size: u32) -> TestContext {
    let store = Arc::new(MemoryResourceStore::new(Arc::new(PinnedClock(pinned_now()))));
    let tokens = Arc::new(MemoryAccessTokens::new(Arc::clone(&store)));
    let admin_id = account(
        &store,
        &tokens,
        ("John Doe", "john@example.com", Role::Admin, ADMIN_TOKEN),
    )
    .await;
    let reader_id = account(
        &store,
        &tokens,
        ("Jane Doe", "jane@example.com", Role::User, READER_TOKEN),
    )
    .await;

    let registry = Arc::new(EntityRegistry::standard());
    let base = Url::parse(BASE).expect("static base url");
    let mediator = ResourceMediator::new(MediatorParts {
        registry: Arc::clone(&registry),
        repository: Arc::clone(&store) as Arc<dyn ResourceRepository>,
        gate: Arc::new(RoleAccessGate),
        assembler: DocumentAssembler::new(base, Arc::clone(&registry)),
        page_settings: PageSettings::new(default_size, 100).expect("valid page sizes"),
    });
    let state = web::Data::new(HttpState::new(
        Arc::new(mediator),
        tokens as Arc<dyn AccessTokenRepository>,
        registry,
    ));
    TestContext {
        state,
        admin_id,
        reader_id,
    }
}

pub async fn context() -> TestContext {
    context_with_page_size(30).await
}

pub fn app(
    state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(state)
        .wrap(Trace)
        .configure(configure)
        .default_service(web::to(not_found))
}

/// Request carrying a bearer token and a JSON:API body.
pub fn authorised(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .insert_header((header::CONTENT_TYPE, "application/vnd.api+json"))
}

pub fn with_body(req: TestRequest, token: &str, body: &Value) -> TestRequest {
    authorised(req, token).set_payload(body.to_string())
}

/// `(pointer, details)` pairs of an error document.
pub fn error_entries(body: &Value) -> Vec<(String, String)> {
    body["errors"]
        .as_array()
        .expect("errors array")
        .iter()
        .map(|entry| {
            (
                entry["source"]["pointer"].as_str().unwrap_or_default().to_owned(),
                entry["details"].as_str().unwrap_or_default().to_owned(),
            )
        })
        .collect()
}
