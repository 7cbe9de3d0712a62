//! Mediator behaviour against mocked ports.

use super::*;
use crate::domain::ports::{
    ListQuery, Listing, MockAccessGate, MockResourceRepository, RepositoryError,
};
use crate::domain::registry::GateAction;
use crate::domain::{Author, Book, BookDraft, Comment, ErrorCode, Role};
use chrono::{DateTime, TimeZone, Utc};
use rstest::rstest;
use serde_json::{Value, json};
use url::Url;
use uuid::Uuid;

const BASE: &str = "http://localhost:8080/api/v1";

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn book(id: i64) -> Entity {
    Entity::Book(Book {
        id,
        title: format!("Book {id}"),
        description: "A description".into(),
        publication_year: "2019".into(),
        created_at: at(),
        updated_at: at(),
    })
}

fn author(id: i64) -> Entity {
    Entity::Author(Author {
        id,
        name: format!("Author {id}"),
        created_at: at(),
        updated_at: at(),
    })
}

fn comment(id: i64) -> Entity {
    Entity::Comment(Comment {
        id,
        message: "Nice".into(),
        user_id: None,
        book_id: Some(1),
        created_at: at(),
        updated_at: at(),
    })
}

fn admin() -> Actor {
    Actor::new(Uuid::nil(), Role::Admin)
}

fn mediator(repository: MockResourceRepository, gate: MockAccessGate) -> ResourceMediator {
    let registry = Arc::new(EntityRegistry::standard());
    ResourceMediator::new(MediatorParts {
        registry: Arc::clone(&registry),
        repository: Arc::new(repository),
        gate: Arc::new(gate),
        assembler: DocumentAssembler::new(Url::parse(BASE).expect("valid base url"), registry),
        page_settings: PageSettings::default(),
    })
}

fn allowing_gate() -> MockAccessGate {
    let mut gate = MockAccessGate::new();
    gate.expect_is_allowed().return_const(true);
    gate
}

fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
    raw.iter()
        .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
        .collect()
}

fn to_value(document: &ResourceDocument) -> Value {
    serde_json::to_value(document).expect("serializable document")
}

fn numeric(id: i64) -> ResourceId {
    ResourceId::Numeric(id)
}

#[rstest]
#[tokio::test]
async fn fetch_one_reports_missing_records() {
    let mut repository = MockResourceRepository::new();
    repository.expect_find().returning(|_| Ok(None));

    let err = mediator(repository, allowing_gate())
        .fetch_one(ResourceType::Books, "7", &[])
        .await
        .expect_err("missing book");

    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(err.message(), "No query results for model [books] 7");
}

#[rstest]
#[tokio::test]
async fn unparsable_ids_never_reach_the_repository() {
    let err = mediator(MockResourceRepository::new(), allowing_gate())
        .fetch_one(ResourceType::Users, "not-a-uuid", &[])
        .await
        .expect_err("invalid uuid");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn fetch_one_loads_requested_includes() {
    let mut repository = MockResourceRepository::new();
    repository.expect_find().returning(|_| Ok(Some(book(1))));
    repository
        .expect_related()
        .withf(|key, mechanism| {
            key.id == numeric(1)
                && matches!(mechanism, RelationshipMechanism::ManyToMany(JoinTable::AuthorBook))
        })
        .returning(|_, _| Ok(vec![author(3)]));

    let document = mediator(repository, allowing_gate())
        .fetch_one(ResourceType::Books, "1", &pairs(&[("include", "authors")]))
        .await
        .expect("book found");
    let value = to_value(&document);

    assert_eq!(
        value["data"]["relationships"]["authors"]["data"],
        json!([{"id": "3", "type": "authors"}])
    );
    assert_eq!(value["included"][0]["id"], json!("3"));
    assert!(value["data"]["relationships"]["comments"].get("data").is_none());
}

#[rstest]
#[tokio::test]
async fn fetch_many_rejects_unknown_filters_before_querying() {
    let err = mediator(MockResourceRepository::new(), allowing_gate())
        .fetch_many(ResourceType::Users, &pairs(&[("filter[foo]", "bar")]))
        .await
        .expect_err("unknown filter");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(
        err.message(),
        "Given filter(s) `foo` are not allowed. Allowed filter(s) are `role`."
    );
}

#[rstest]
#[tokio::test]
async fn fetch_many_pages_and_links() {
    let mut repository = MockResourceRepository::new();
    repository
        .expect_list()
        .withf(|resource_type, query: &ListQuery| {
            *resource_type == ResourceType::Books && query.offset == 0 && query.limit == 5
        })
        .returning(|_, _| {
            Ok(Listing {
                items: (1..=5).map(book).collect(),
                total: 10,
            })
        });

    let document = mediator(repository, allowing_gate())
        .fetch_many(
            ResourceType::Books,
            &pairs(&[("page[size]", "5"), ("page[number]", "1")]),
        )
        .await
        .expect("listing");
    let value = to_value(&document);

    assert_eq!(value["data"].as_array().map(Vec::len), Some(5));
    assert_eq!(value["links"]["prev"], Value::Null);
    assert_eq!(
        value["links"]["next"],
        json!(format!("{BASE}/books?page%5Bsize%5D=5&page%5Bnumber%5D=2"))
    );
    assert!(value.get("included").is_none());
}

#[rstest]
#[tokio::test]
async fn related_to_one_renders_a_single_resource() {
    let mut repository = MockResourceRepository::new();
    repository.expect_find().returning(|_| Ok(Some(comment(4))));
    repository
        .expect_related()
        .returning(|_, _| Ok(vec![book(1)]));

    let document = mediator(repository, allowing_gate())
        .fetch_related(ResourceType::Comments, "4", "books")
        .await
        .expect("related book");
    let value = to_value(&document);
    assert_eq!(value["data"]["type"], json!("books"));
    assert_eq!(value["data"]["id"], json!("1"));
}

#[rstest]
#[tokio::test]
async fn linkage_for_single_row_to_many_is_still_an_array() {
    let mut repository = MockResourceRepository::new();
    repository.expect_find().returning(|_| Ok(Some(book(1))));
    repository
        .expect_related()
        .returning(|_, _| Ok(vec![comment(2)]));

    let document = mediator(repository, allowing_gate())
        .fetch_relationship_linkage(ResourceType::Books, "1", "comments")
        .await
        .expect("linkage");
    assert_eq!(
        to_value(&document),
        json!({"data": [{"id": "2", "type": "comments"}]})
    );
}

#[rstest]
#[tokio::test]
async fn undeclared_relationships_are_not_found() {
    let err = mediator(MockResourceRepository::new(), allowing_gate())
        .update_relationship(
            &admin(),
            ResourceType::Comments,
            "1",
            "authors",
            &LinkageInput::ToMany(Vec::new()),
        )
        .await
        .expect_err("undeclared relationship");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn gate_denial_blocks_authorship_changes() {
    let mut gate = MockAccessGate::new();
    gate.expect_is_allowed()
        .withf(|action, actor| {
            *action == GateAction::ManageAuthorship && actor.role() == Role::User
        })
        .return_const(false);

    let err = mediator(MockResourceRepository::new(), gate)
        .update_relationship(
            &Actor::new(Uuid::nil(), Role::User),
            ResourceType::Books,
            "1",
            "authors",
            &LinkageInput::ToMany(vec![IdentifierInput::new("authors", "1")]),
        )
        .await
        .expect_err("forbidden");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn identifier_type_mismatch_is_a_conflict() {
    let err = mediator(MockResourceRepository::new(), allowing_gate())
        .update_relationship(
            &admin(),
            ResourceType::Books,
            "1",
            "comments",
            &LinkageInput::ToMany(vec![IdentifierInput::new("books", "2")]),
        )
        .await
        .expect_err("wrong type");
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[rstest]
#[case(ResourceType::Comments, "users", LinkageInput::ToMany(Vec::new()))]
#[case(ResourceType::Users, "comments", LinkageInput::ToOne(None))]
#[tokio::test]
async fn payload_cardinality_must_match_declaration(
    #[case] resource_type: ResourceType,
    #[case] name: &str,
    #[case] data: LinkageInput,
) {
    let raw_id = match resource_type {
        ResourceType::Users => Uuid::nil().to_string(),
        _ => "1".to_owned(),
    };
    let err = mediator(MockResourceRepository::new(), allowing_gate())
        .update_relationship(&admin(), resource_type, &raw_id, name, &data)
        .await
        .expect_err("cardinality mismatch");
    assert_eq!(err.code(), ErrorCode::ValidationFailed);
    assert_eq!(err.violations()[0].pointer(), "/data");
}

#[rstest]
#[tokio::test]
async fn to_many_updates_send_one_replace_with_unique_targets() {
    let mut repository = MockResourceRepository::new();
    repository
        .expect_update()
        .withf(|key, patch, linkage| {
            key.id == numeric(1)
                && patch.is_empty()
                && linkage
                    == [LinkageChange::ReplaceInverse {
                        foreign_key: ForeignKey::CommentBook,
                        targets: vec![numeric(2), numeric(3)],
                    }]
        })
        .times(1)
        .returning(|_, _, _| Ok(Some(book(1))));

    mediator(repository, allowing_gate())
        .update_relationship(
            &admin(),
            ResourceType::Books,
            "1",
            "comments",
            &LinkageInput::ToMany(vec![
                IdentifierInput::new("comments", "2"),
                IdentifierInput::new("comments", "3"),
                IdentifierInput::new("comments", "2"),
            ]),
        )
        .await
        .expect("relationship replaced");
}

#[rstest]
#[tokio::test]
async fn missing_targets_surface_as_not_found() {
    let mut repository = MockResourceRepository::new();
    repository.expect_update().returning(|_, _, _| {
        Err(RepositoryError::missing_targets(
            ResourceType::Comments,
            vec!["9".to_owned()],
        ))
    });

    let err = mediator(repository, allowing_gate())
        .update_relationship(
            &admin(),
            ResourceType::Books,
            "1",
            "comments",
            &LinkageInput::ToMany(vec![IdentifierInput::new("comments", "9")]),
        )
        .await
        .expect_err("missing comment");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn to_one_null_clears_the_owner() {
    let mut repository = MockResourceRepository::new();
    repository
        .expect_update()
        .withf(|_, _, linkage| {
            linkage
                == [LinkageChange::AssignOwner {
                    foreign_key: ForeignKey::CommentUser,
                    target: None,
                }]
        })
        .returning(|_, _, _| Ok(Some(comment(1))));

    mediator(repository, allowing_gate())
        .update_relationship(
            &admin(),
            ResourceType::Comments,
            "1",
            "users",
            &LinkageInput::ToOne(None),
        )
        .await
        .expect("owner cleared");
}

#[rstest]
#[tokio::test]
async fn create_returns_location_and_supplied_relationships() {
    let mut repository = MockResourceRepository::new();
    repository
        .expect_insert()
        .withf(|_, linkage| {
            linkage
                == [LinkageChange::SyncJoin {
                    join: JoinTable::AuthorBook,
                    targets: vec![numeric(1)],
                }]
        })
        .returning(|_, _| Ok(book(5)));
    repository
        .expect_related()
        .returning(|_, _| Ok(vec![author(1)]));

    let created = mediator(repository, allowing_gate())
        .create(
            &admin(),
            CreateInput {
                draft: EntityDraft::Book(BookDraft {
                    title: "Book 5".into(),
                    description: "A description".into(),
                    publication_year: "2019".into(),
                }),
                relationships: vec![RelationshipInput {
                    name: "authors".into(),
                    data: LinkageInput::ToMany(vec![IdentifierInput::new("authors", "1")]),
                }],
            },
        )
        .await
        .expect("book created");

    assert_eq!(created.location, format!("{BASE}/books/5"));
    let value = to_value(&created.document);
    assert_eq!(
        value["data"]["relationships"]["authors"]["data"],
        json!([{"id": "1", "type": "authors"}])
    );
}

#[rstest]
#[tokio::test]
async fn update_of_missing_record_is_not_found() {
    let mut repository = MockResourceRepository::new();
    repository.expect_update().returning(|_, _, _| Ok(None));

    let err = mediator(repository, allowing_gate())
        .update(
            &admin(),
            ResourceType::Books,
            "8",
            UpdateInput {
                patch: EntityPatch::unchanged(ResourceType::Books),
                relationships: Vec::new(),
            },
        )
        .await
        .expect_err("missing book");
    assert_eq!(err.message(), "No query results for model [books] 8");
}

#[rstest]
#[tokio::test]
async fn delete_of_missing_record_is_not_found() {
    let mut repository = MockResourceRepository::new();
    repository.expect_delete().returning(|_| Ok(false));

    let err = mediator(repository, allowing_gate())
        .delete(ResourceType::Authors, "3")
        .await
        .expect_err("missing author");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn repository_outages_are_service_unavailable() {
    let mut repository = MockResourceRepository::new();
    repository
        .expect_find()
        .returning(|_| Err(RepositoryError::connection("pool exhausted")));

    let err = mediator(repository, allowing_gate())
        .fetch_one(ResourceType::Authors, "1", &[])
        .await
        .expect_err("outage");
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}
