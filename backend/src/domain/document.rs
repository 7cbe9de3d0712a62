//! Document Assembler: renders entities into JSON:API document trees.
//!
//! Every relationship a type declares is rendered with `self` and `related`
//! links. Linkage `data` is only present for relationships that were loaded
//! for the request, and loaded targets are merged into `included`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use pagination::{PageInfo, PageLinks};
use serde::Serialize;
use url::Url;

use super::registry::{Cardinality, EntityRegistry};
use super::{Attributes, Entity, ResourceKey, ResourceType};

/// `{id, type}` reference to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceIdentifier {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

impl ResourceIdentifier {
    /// Identifier of `entity`.
    pub fn of(entity: &Entity) -> Self {
        Self::from_key(entity.key())
    }

    pub fn from_key(key: ResourceKey) -> Self {
        Self {
            id: key.id.to_string(),
            resource_type: key.resource_type,
        }
    }
}

/// Relationship linkage: `null`, one identifier, or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Linkage {
    ToOne(Option<ResourceIdentifier>),
    ToMany(Vec<ResourceIdentifier>),
}

impl Linkage {
    /// Linkage for `related`, shaped by the declared cardinality.
    pub fn for_cardinality(cardinality: Cardinality, related: &[Entity]) -> Self {
        match cardinality {
            Cardinality::ToOne => Self::ToOne(related.first().map(ResourceIdentifier::of)),
            Cardinality::ToMany => Self::ToMany(related.iter().map(ResourceIdentifier::of).collect()),
        }
    }
}

/// `self` and `related` URLs of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipLinks {
    /// `{base}/{type}/{id}/relationships/{name}`.
    #[serde(rename = "self")]
    pub self_link: String,
    /// `{base}/{type}/{id}/{name}`.
    pub related: String,
}

/// One entry of a resource object's `relationships` member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipObject {
    pub links: RelationshipLinks,
    /// Present only when the relationship was loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Linkage>,
}

/// JSON:API resource object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceObject {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Allow-listed attributes; hidden fields never appear.
    pub attributes: Attributes,
    /// Every declared relationship, keyed by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<&'static str, RelationshipObject>,
}

/// Top-level `data` member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Resource(Option<Box<ResourceObject>>),
    Collection(Vec<ResourceObject>),
    Identifiers(Linkage),
}

/// Top-level JSON:API envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDocument {
    pub data: PrimaryData,
    /// Deduplicated related resources, omitted when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<ResourceObject>>,
    /// Pagination links, set on collection documents only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<PageLinks>,
}

/// Targets of one relationship loaded for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRelationship {
    pub name: &'static str,
    /// Declared cardinality, which shapes the rendered linkage.
    pub cardinality: Cardinality,
    /// Related records ordered by primary key. At most one for to-one.
    pub related: Vec<Entity>,
}

/// An entity together with the relationships loaded for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hydrated {
    pub entity: Entity,
    pub loaded: Vec<LoadedRelationship>,
}

impl Hydrated {
    /// An entity with nothing loaded.
    pub const fn bare(entity: Entity) -> Self {
        Self {
            entity,
            loaded: Vec::new(),
        }
    }
}

/// Builds documents and links rooted at the public API URL.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    base: Url,
    registry: Arc<EntityRegistry>,
}

impl DocumentAssembler {
    /// Assembler rooted at the public API `base` URL.
    pub fn new(base: Url, registry: Arc<EntityRegistry>) -> Self {
        Self { base, registry }
    }

    fn base_str(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// `{base}/{type}`.
    pub fn collection_url(&self, resource_type: ResourceType) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(resource_type.as_str());
        }
        url
    }

    /// Canonical `{base}/{type}/{id}` reference, used for `Location`.
    pub fn location(&self, key: ResourceKey) -> String {
        format!("{}/{}/{}", self.base_str(), key.resource_type, key.id)
    }

    /// Links for relationship `name` of `key`.
    pub fn relationship_links(&self, key: ResourceKey, name: &str) -> RelationshipLinks {
        let parent = self.location(key);
        RelationshipLinks {
            self_link: format!("{parent}/relationships/{name}"),
            related: format!("{parent}/{name}"),
        }
    }

    /// Render one resource object: allow-listed attributes plus one
    /// relationship object per declared relationship.
    pub fn render_resource(&self, hydrated: &Hydrated) -> ResourceObject {
        let entity = &hydrated.entity;
        let key = entity.key();
        let mut relationships = BTreeMap::new();
        if let Ok(descriptor) = self.registry.describe(key.resource_type) {
            for relationship in descriptor.relationships() {
                let data = hydrated
                    .loaded
                    .iter()
                    .find(|loaded| loaded.name == relationship.name())
                    .map(|loaded| Linkage::for_cardinality(loaded.cardinality, &loaded.related));
                relationships.insert(
                    relationship.name(),
                    RelationshipObject {
                        links: self.relationship_links(key, relationship.name()),
                        data,
                    },
                );
            }
        }
        ResourceObject {
            id: key.id.to_string(),
            resource_type: key.resource_type,
            attributes: entity.attributes(),
            relationships,
        }
    }

    /// Single-resource document with its loaded relationships in `included`.
    pub fn resource_document(&self, hydrated: &Hydrated) -> ResourceDocument {
        ResourceDocument {
            data: PrimaryData::Resource(Some(Box::new(self.render_resource(hydrated)))),
            included: self.included(std::slice::from_ref(hydrated)),
            links: None,
        }
    }

    /// Collection document. `included` merges every member's loaded targets,
    /// deduplicated by type and id, and is omitted when empty.
    pub fn collection_document(
        &self,
        members: &[Hydrated],
        links: Option<PageLinks>,
    ) -> ResourceDocument {
        ResourceDocument {
            data: PrimaryData::Collection(
                members
                    .iter()
                    .map(|member| self.render_resource(member))
                    .collect(),
            ),
            included: self.included(members),
            links,
        }
    }

    /// Document for a related endpoint, shaped by declared cardinality.
    pub fn related_document(&self, cardinality: Cardinality, related: Vec<Entity>) -> ResourceDocument {
        match cardinality {
            Cardinality::ToOne => ResourceDocument {
                data: PrimaryData::Resource(
                    related
                        .into_iter()
                        .next()
                        .map(|entity| Box::new(self.render_resource(&Hydrated::bare(entity)))),
                ),
                included: None,
                links: None,
            },
            Cardinality::ToMany => {
                let members: Vec<Hydrated> = related.into_iter().map(Hydrated::bare).collect();
                self.collection_document(&members, None)
            }
        }
    }

    /// Linkage-only document for a relationship endpoint.
    pub fn identifier_document(cardinality: Cardinality, related: &[Entity]) -> ResourceDocument {
        ResourceDocument {
            data: PrimaryData::Identifiers(Linkage::for_cardinality(cardinality, related)),
            included: None,
            links: None,
        }
    }

    /// Pagination links for a `resource_type` listing.
    pub fn page_links<'a, I>(&self, resource_type: ResourceType, params: I, info: &PageInfo) -> PageLinks
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        PageLinks::build(&self.collection_url(resource_type), params, info)
    }

    fn included(&self, members: &[Hydrated]) -> Option<Vec<ResourceObject>> {
        let mut seen = HashSet::new();
        let included: Vec<ResourceObject> = members
            .iter()
            .flat_map(|member| member.loaded.iter())
            .flat_map(|loaded| loaded.related.iter())
            .filter(|entity| seen.insert(entity.key()))
            .map(|entity| self.render_resource(&Hydrated::bare(entity.clone())))
            .collect();
        (!included.is_empty()).then_some(included)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Author, Book, Comment};
    use chrono::{DateTime, TimeZone, Utc};
    use pagination::PageRequest;
    use rstest::{fixture, rstest};
    use serde_json::json;

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
            book_id: None,
            created_at: at(),
            updated_at: at(),
        })
    }

    fn with_books(entity: Entity, books: Vec<Entity>) -> Hydrated {
        Hydrated {
            entity,
            loaded: vec![LoadedRelationship {
                name: "books",
                cardinality: Cardinality::ToMany,
                related: books,
            }],
        }
    }

    #[fixture]
    fn assembler() -> DocumentAssembler {
        DocumentAssembler::new(
            Url::parse("http://localhost:8080/api/v1").expect("valid url"),
            Arc::new(EntityRegistry::standard()),
        )
    }

    #[rstest]
    fn resources_render_string_ids_and_links(assembler: DocumentAssembler) {
        let document = assembler.resource_document(&Hydrated::bare(book(1)));
        let value = serde_json::to_value(&document).expect("serializable");

        assert_eq!(value["data"]["id"], json!("1"));
        assert_eq!(value["data"]["type"], json!("books"));
        assert_eq!(value["data"]["attributes"]["publication_year"], json!("2019"));
        assert_eq!(
            value["data"]["relationships"]["authors"]["links"],
            json!({
                "self": "http://localhost:8080/api/v1/books/1/relationships/authors",
                "related": "http://localhost:8080/api/v1/books/1/authors",
            })
        );
        assert!(value["data"]["relationships"]["authors"].get("data").is_none());
        assert!(value.get("included").is_none());
        assert!(value.get("links").is_none());
    }

    #[rstest]
    fn included_members_are_deduplicated(assembler: DocumentAssembler) {
        let members = vec![
            with_books(author(1), vec![book(1), book(2)]),
            with_books(author(2), vec![book(2), book(3)]),
        ];
        let document = assembler.collection_document(&members, None);
        let included = document.included.expect("included present");
        let ids: Vec<&str> = included.iter().map(|object| object.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[rstest]
    fn empty_includes_are_omitted(assembler: DocumentAssembler) {
        let members = vec![with_books(author(1), Vec::new())];
        let value = serde_json::to_value(assembler.collection_document(&members, None))
            .expect("serializable");
        assert!(value.get("included").is_none());
        assert_eq!(value["data"][0]["relationships"]["books"]["data"], json!([]));
    }

    #[rstest]
    fn unset_to_one_linkage_is_null(assembler: DocumentAssembler) {
        let hydrated = Hydrated {
            entity: comment(4),
            loaded: vec![LoadedRelationship {
                name: "users",
                cardinality: Cardinality::ToOne,
                related: Vec::new(),
            }],
        };
        let value =
            serde_json::to_value(assembler.resource_document(&hydrated)).expect("serializable");
        assert_eq!(value["data"]["relationships"]["users"]["data"], json!(null));
        assert!(value["data"]["relationships"]["books"].get("data").is_none());
    }

    #[rstest]
    fn to_many_with_one_row_still_renders_a_collection(assembler: DocumentAssembler) {
        let value = serde_json::to_value(
            assembler.related_document(Cardinality::ToMany, vec![book(7)]),
        )
        .expect("serializable");
        assert!(value["data"].is_array());

        let linkage = serde_json::to_value(DocumentAssembler::identifier_document(
            Cardinality::ToMany,
            &[book(7)],
        ))
        .expect("serializable");
        assert_eq!(linkage, json!({"data": [{"id": "7", "type": "books"}]}));
    }

    #[rstest]
    fn empty_to_one_related_document_is_null(assembler: DocumentAssembler) {
        let value = serde_json::to_value(assembler.related_document(Cardinality::ToOne, Vec::new()))
            .expect("serializable");
        assert_eq!(value, json!({"data": null}));
    }

    #[rstest]
    fn page_links_target_the_collection(assembler: DocumentAssembler) {
        let info = PageInfo::new(PageRequest::new(1, 5).expect("valid page"), 10);
        let links = assembler.page_links(ResourceType::Books, [("sort", "title")], &info);
        assert_eq!(
            links.next.as_deref(),
            Some("http://localhost:8080/api/v1/books?sort=title&page%5Bsize%5D=5&page%5Bnumber%5D=2")
        );
        assert_eq!(links.prev, None);
    }

    #[rstest]
    fn location_points_at_the_resource(assembler: DocumentAssembler) {
        assert_eq!(
            assembler.location(book(12).key()),
            "http://localhost:8080/api/v1/books/12"
        );
    }
}
