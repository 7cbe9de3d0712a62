//! Request document validation for inbound JSON:API writes.
//!
//! Bodies are checked before the mediator runs. Every violated rule is
//! collected into one 422 error whose entries point at the offending member;
//! only malformed JSON (400) and an id that contradicts the route (409)
//! short-circuit.

use serde_json::{Map, Value};

use crate::domain::{
    CreateInput, EntityDraft, EntityPatch, EntityRegistry, Error, FieldViolation,
    IdentifierInput, LinkageInput, RelationshipInput, ResourceType, UpdateInput,
};

/// Parse a request body as JSON.
///
/// # Errors
///
/// Returns an invalid-request error when the body is not JSON.
pub(crate) fn parse_body(body: &[u8]) -> Result<Value, Error> {
    serde_json::from_slice(body)
        .map_err(|err| Error::invalid_request(format!("The request body is not valid JSON: {err}")))
}

/// JSON pointer plus the dotted name Laravel-style messages use.
#[derive(Debug, Clone)]
struct Member {
    pointer: String,
    dotted: String,
}

impl Member {
    fn root(name: &str) -> Self {
        Self {
            pointer: format!("/{name}"),
            dotted: name.to_owned(),
        }
    }

    fn child(&self, name: impl std::fmt::Display) -> Self {
        Self {
            pointer: format!("{}/{name}", self.pointer),
            dotted: format!("{}.{name}", self.dotted),
        }
    }
}

struct DocumentReader<'a> {
    registry: &'a EntityRegistry,
    violations: Vec<FieldViolation>,
}

impl<'a> DocumentReader<'a> {
    const fn new(registry: &'a EntityRegistry) -> Self {
        Self {
            registry,
            violations: Vec::new(),
        }
    }

    fn violate(&mut self, member: &Member, message: String) {
        self.violations
            .push(FieldViolation::new(member.pointer.clone(), message));
    }

    fn required(&mut self, member: &Member) {
        self.violate(member, format!("The {} field is required.", member.dotted));
    }

    fn object<'v>(&mut self, value: Option<&'v Value>, member: &Member) -> Option<&'v Map<String, Value>> {
        match value {
            None | Some(Value::Null) => {
                self.required(member);
                None
            }
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                self.violate(member, format!("The {} must be an object.", member.dotted));
                None
            }
        }
    }

    fn string<'v>(&mut self, value: Option<&'v Value>, member: &Member) -> Option<&'v str> {
        match value {
            None | Some(Value::Null) => {
                self.required(member);
                None
            }
            Some(Value::String(text)) if text.is_empty() => {
                self.required(member);
                None
            }
            Some(Value::String(text)) => Some(text),
            Some(_) => {
                self.violate(member, format!("The {} must be a string.", member.dotted));
                None
            }
        }
    }

    fn resource_type(&mut self, data: &Map<String, Value>, data_member: &Member, expected: ResourceType) {
        let member = data_member.child("type");
        if let Some(given) = self.string(data.get("type"), &member) {
            if given != expected.as_str() {
                self.violate(&member, format!("The selected {} is invalid.", member.dotted));
            }
        }
    }

    fn identifier(&mut self, value: &Value, member: &Member) -> Option<IdentifierInput> {
        let Value::Object(map) = value else {
            self.violate(
                member,
                format!("The {} must be a resource identifier.", member.dotted),
            );
            return None;
        };
        let type_member = member.child("type");
        let resource_type = self.string(map.get("type"), &type_member).and_then(|given| {
            if self.registry.is_registered(given) {
                Some(given)
            } else {
                self.violate(
                    &type_member,
                    format!("The selected {} is invalid.", type_member.dotted),
                );
                None
            }
        });
        let id = self.string(map.get("id"), &member.child("id"));
        match (resource_type, id) {
            (Some(resource_type), Some(id)) => Some(IdentifierInput::new(resource_type, id)),
            _ => None,
        }
    }

    /// `data` of a relationship entry: `null`, one identifier, or an array.
    fn linkage(&mut self, parent: &Map<String, Value>, member: &Member) -> Option<LinkageInput> {
        match parent.get("data") {
            None => {
                self.violate(member, format!("The {} field must be present.", member.dotted));
                None
            }
            Some(Value::Null) => Some(LinkageInput::ToOne(None)),
            Some(Value::Array(items)) => {
                let before = self.violations.len();
                let identifiers: Vec<IdentifierInput> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| self.identifier(item, &member.child(index)))
                    .collect();
                (self.violations.len() == before).then_some(LinkageInput::ToMany(identifiers))
            }
            Some(value) => self
                .identifier(value, member)
                .map(|identifier| LinkageInput::ToOne(Some(identifier))),
        }
    }

    fn relationships(&mut self, data: &Map<String, Value>, data_member: &Member) -> Vec<RelationshipInput> {
        let member = data_member.child("relationships");
        let Some(value) = data.get("relationships") else {
            return Vec::new();
        };
        let Value::Object(entries) = value else {
            self.violate(&member, format!("The {} must be an object.", member.dotted));
            return Vec::new();
        };
        let mut relationships = Vec::with_capacity(entries.len());
        for (name, entry) in entries {
            let entry_member = member.child(name);
            let Value::Object(entry) = entry else {
                self.violate(
                    &entry_member,
                    format!("The {} must be an object.", entry_member.dotted),
                );
                continue;
            };
            if let Some(data) = self.linkage(entry, &entry_member.child("data")) {
                relationships.push(RelationshipInput {
                    name: name.clone(),
                    data,
                });
            }
        }
        relationships
    }

    fn attributes(&mut self, violations: Vec<FieldViolation>) {
        self.violations.extend(violations);
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, Error> {
        match value {
            Some(value) if self.violations.is_empty() => Ok(value),
            _ => Err(Error::validation(self.violations)),
        }
    }
}

fn empty_attributes() -> Map<String, Value> {
    Map::new()
}

/// Validate a `POST /{type}` document.
///
/// # Errors
///
/// Returns a validation error listing every violated rule.
pub(crate) fn create_input(
    registry: &EntityRegistry,
    resource_type: ResourceType,
    body: &Value,
) -> Result<CreateInput, Error> {
    let mut reader = DocumentReader::new(registry);
    let data_member = Member::root("data");
    let Some(data) = reader.object(body.get("data"), &data_member) else {
        return reader.finish(None);
    };
    reader.resource_type(data, &data_member, resource_type);

    let attributes_member = data_member.child("attributes");
    let attributes = reader.object(data.get("attributes"), &attributes_member);
    let fallback = empty_attributes();
    let draft = match EntityDraft::from_attributes(resource_type, attributes.unwrap_or(&fallback)) {
        Ok(draft) => Some(draft),
        Err(violations) => {
            if attributes.is_some() {
                reader.attributes(violations);
            }
            None
        }
    };
    let relationships = reader.relationships(data, &data_member);
    reader.finish(draft.map(|draft| CreateInput {
        draft,
        relationships,
    }))
}

/// Validate a `PATCH /{type}/{id}` document.
///
/// # Errors
///
/// Returns a conflict error when `data.id` names another record, otherwise a
/// validation error listing every violated rule.
pub(crate) fn update_input(
    registry: &EntityRegistry,
    resource_type: ResourceType,
    route_id: &str,
    body: &Value,
) -> Result<UpdateInput, Error> {
    let mut reader = DocumentReader::new(registry);
    let data_member = Member::root("data");
    let Some(data) = reader.object(body.get("data"), &data_member) else {
        return reader.finish(None);
    };
    if let Some(id) = reader.string(data.get("id"), &data_member.child("id")) {
        if id != route_id {
            return Err(Error::conflict(format!(
                "The resource id `{id}` does not match the endpoint id `{route_id}`."
            )));
        }
    }
    reader.resource_type(data, &data_member, resource_type);

    let attributes_member = data_member.child("attributes");
    let fallback = empty_attributes();
    let attributes = match data.get("attributes") {
        None => Some(&fallback),
        value => reader.object(value, &attributes_member),
    };
    let patch = attributes.and_then(|attributes| {
        match EntityPatch::from_attributes(resource_type, attributes) {
            Ok(patch) => Some(patch),
            Err(violations) => {
                reader.attributes(violations);
                None
            }
        }
    });
    let relationships = reader.relationships(data, &data_member);
    reader.finish(patch.map(|patch| UpdateInput {
        patch,
        relationships,
    }))
}

/// Validate a `PATCH /{type}/{id}/relationships/{name}` document.
///
/// # Errors
///
/// Returns a validation error when `data` is absent or holds a malformed
/// identifier.
pub(crate) fn linkage_input(registry: &EntityRegistry, body: &Value) -> Result<LinkageInput, Error> {
    let mut reader = DocumentReader::new(registry);
    let Value::Object(document) = body else {
        reader.violate(&Member::root("data"), "The data field must be present.".to_owned());
        return reader.finish(None);
    };
    let linkage = reader.linkage(document, &Member::root("data"));
    reader.finish(linkage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookDraft, ErrorCode};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn registry() -> EntityRegistry {
        EntityRegistry::standard()
    }

    fn pointers(error: &Error) -> Vec<&str> {
        error.violations().iter().map(FieldViolation::pointer).collect()
    }

    #[rstest]
    fn create_reads_attributes_and_relationships(registry: EntityRegistry) {
        let body = json!({
            "data": {
                "type": "books",
                "attributes": {
                    "title": "Dune",
                    "description": "Spice",
                    "publication_year": "1965",
                    "ignored": true
                },
                "relationships": {
                    "authors": {"data": [{"type": "authors", "id": "1"}]}
                }
            }
        });

        let input = create_input(&registry, ResourceType::Books, &body).expect("valid document");
        assert_eq!(
            input.draft,
            EntityDraft::Book(BookDraft {
                title: "Dune".to_owned(),
                description: "Spice".to_owned(),
                publication_year: "1965".to_owned(),
            })
        );
        assert_eq!(
            input.relationships,
            vec![RelationshipInput {
                name: "authors".to_owned(),
                data: LinkageInput::ToMany(vec![IdentifierInput::new("authors", "1")]),
            }]
        );
    }

    #[rstest]
    fn create_reports_every_violation(registry: EntityRegistry) {
        let body = json!({
            "data": {
                "type": "authors",
                "attributes": {"title": 5, "description": "x"},
                "relationships": {"comments": {}}
            }
        });

        let error = create_input(&registry, ResourceType::Books, &body).expect_err("invalid");
        assert_eq!(error.code(), ErrorCode::ValidationFailed);
        assert_eq!(
            pointers(&error),
            [
                "/data/type",
                "/data/attributes/title",
                "/data/attributes/publication_year",
                "/data/relationships/comments/data",
            ]
        );
        assert_eq!(
            error.violations().first().map(FieldViolation::message),
            Some("The selected data.type is invalid.")
        );
    }

    #[rstest]
    #[case(json!({}), "/data", "The data field is required.")]
    #[case(json!({"data": {"attributes": {"name": "x"}}}), "/data/type", "The data.type field is required.")]
    #[case(json!({"data": {"type": "authors"}}), "/data/attributes", "The data.attributes field is required.")]
    fn create_requires_core_members(
        registry: EntityRegistry,
        #[case] body: Value,
        #[case] pointer: &str,
        #[case] message: &str,
    ) {
        let error = create_input(&registry, ResourceType::Authors, &body).expect_err("invalid");
        let violation = error.violations().first().expect("one violation");
        assert_eq!(violation.pointer(), pointer);
        assert_eq!(violation.message(), message);
    }

    #[rstest]
    fn update_without_attributes_is_an_empty_patch(registry: EntityRegistry) {
        let body = json!({"data": {"type": "authors", "id": "1"}});
        let input = update_input(&registry, ResourceType::Authors, "1", &body).expect("valid");
        assert!(input.patch.is_empty());
        assert!(input.relationships.is_empty());
    }

    #[rstest]
    fn update_requires_an_id(registry: EntityRegistry) {
        let body = json!({"data": {"type": "authors", "attributes": {"name": "x"}}});
        let error = update_input(&registry, ResourceType::Authors, "1", &body).expect_err("no id");
        assert_eq!(pointers(&error), ["/data/id"]);
    }

    #[rstest]
    fn update_with_another_id_conflicts(registry: EntityRegistry) {
        let body = json!({"data": {"type": "authors", "id": "2"}});
        let error = update_input(&registry, ResourceType::Authors, "1", &body).expect_err("mismatch");
        assert_eq!(error.code(), ErrorCode::Conflict);
    }

    #[rstest]
    #[case(json!({"data": null}), LinkageInput::ToOne(None))]
    #[case(
        json!({"data": {"type": "books", "id": "3"}}),
        LinkageInput::ToOne(Some(IdentifierInput::new("books", "3")))
    )]
    #[case(json!({"data": []}), LinkageInput::ToMany(Vec::new()))]
    fn relationship_documents_accept_every_shape(
        registry: EntityRegistry,
        #[case] body: Value,
        #[case] expected: LinkageInput,
    ) {
        assert_eq!(linkage_input(&registry, &body), Ok(expected));
    }

    #[rstest]
    fn relationship_documents_check_each_identifier(registry: EntityRegistry) {
        let body = json!({"data": [{"type": "books", "id": "1"}, {"type": "planets", "id": 2}]});
        let error = linkage_input(&registry, &body).expect_err("invalid");
        assert_eq!(pointers(&error), ["/data/1/type", "/data/1/id"]);
        assert_eq!(
            error.violations().first().map(FieldViolation::message),
            Some("The selected data.1.type is invalid.")
        );
    }

    #[rstest]
    fn relationship_documents_need_data(registry: EntityRegistry) {
        let error = linkage_input(&registry, &json!({"meta": {}})).expect_err("missing");
        assert_eq!(pointers(&error), ["/data"]);
    }

    #[rstest]
    fn malformed_json_is_a_bad_request() {
        let error = parse_body(b"{").expect_err("malformed");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }
}
