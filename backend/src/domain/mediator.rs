//! Resource Mediator: one operation per JSON:API interaction.
//!
//! The mediator resolves relationship payloads against the registry, asks
//! the gate before guarded writes, and hands each write to the repository
//! together with every linkage change it implies so the two commit
//! together. Rendering is delegated to the [`DocumentAssembler`].

use std::sync::Arc;

use pagination::{PageInfo, PageSettings};
use tracing::info;

use super::document::{DocumentAssembler, Hydrated, LoadedRelationship, ResourceDocument};
use super::ports::{AccessGate, LinkageChange, ResourceRepository};
use super::query::QueryTranslator;
use super::registry::{
    Cardinality, EntityRegistry, ForeignKey, JoinTable, RelationshipDescriptor,
    RelationshipMechanism, ResourceDescriptor,
};
use super::{
    Actor, Entity, EntityDraft, EntityPatch, Error, FieldViolation, ResourceId, ResourceKey,
    ResourceType,
};

/// `{type, id}` pair as supplied by a client, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierInput {
    /// Type name as sent, checked against the relationship target.
    pub resource_type: String,
    /// Raw id, parsed against the target's key kind.
    pub id: String,
}

impl IdentifierInput {
    /// Identifier from a raw type name and id.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

/// Linkage payload: `null`, one identifier, or an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkageInput {
    ToOne(Option<IdentifierInput>),
    ToMany(Vec<IdentifierInput>),
}

/// One `data.relationships.<name>` entry of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipInput {
    /// Relationship name under `data.relationships`.
    pub name: String,
    pub data: LinkageInput,
}

/// Validated `POST` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInput {
    /// Attributes of the record to insert.
    pub draft: EntityDraft,
    /// Relationship writes applied with the insert.
    pub relationships: Vec<RelationshipInput>,
}

/// Validated `PATCH` payload. Absent attributes are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInput {
    pub patch: EntityPatch,
    /// Relationship writes applied with the update.
    pub relationships: Vec<RelationshipInput>,
}

/// Result of a create: the rendered document and its canonical URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    /// Single-resource document for the new record.
    pub document: ResourceDocument,
    /// Value of the `Location` header.
    pub location: String,
}

/// Collaborators the mediator is built from.
#[derive(Clone)]
pub struct MediatorParts {
    pub registry: Arc<EntityRegistry>,
    /// Persistence port; receives writes with their linkage changes.
    pub repository: Arc<dyn ResourceRepository>,
    /// Authorization port consulted before guarded relationship writes.
    pub gate: Arc<dyn AccessGate>,
    pub assembler: DocumentAssembler,
    /// Default and maximum page sizes for collections.
    pub page_settings: PageSettings,
}

/// The JSON:API resource mediation engine.
#[derive(Clone)]
pub struct ResourceMediator {
    registry: Arc<EntityRegistry>,
    repository: Arc<dyn ResourceRepository>,
    gate: Arc<dyn AccessGate>,
    translator: QueryTranslator,
    assembler: DocumentAssembler,
}

fn no_results(resource_type: ResourceType, id: &str) -> Error {
    Error::not_found(format!("No query results for model [{resource_type}] {id}"))
}

fn parse_key(resource_type: ResourceType, raw_id: &str) -> Result<ResourceKey, Error> {
    ResourceKey::parse(resource_type, raw_id).ok_or_else(|| no_results(resource_type, raw_id))
}

impl ResourceMediator {
    /// Assemble the mediator from its collaborators.
    pub fn new(parts: MediatorParts) -> Self {
        let MediatorParts {
            registry,
            repository,
            gate,
            assembler,
            page_settings,
        } = parts;
        Self {
            translator: QueryTranslator::new(Arc::clone(&registry), page_settings),
            registry,
            repository,
            gate,
            assembler,
        }
    }

    pub fn assembler(&self) -> &DocumentAssembler {
        &self.assembler
    }

    fn describe(&self, resource_type: ResourceType) -> Result<&ResourceDescriptor, Error> {
        Ok(self.registry.describe(resource_type)?)
    }

    async fn load(&self, key: ResourceKey, raw_id: &str) -> Result<Entity, Error> {
        self.repository
            .find(key)
            .await?
            .ok_or_else(|| no_results(key.resource_type, raw_id))
    }

    async fn load_related(
        &self,
        key: ResourceKey,
        relationship: &RelationshipDescriptor,
    ) -> Result<LoadedRelationship, Error> {
        let mut related = self
            .repository
            .related(key, relationship.mechanism())
            .await?;
        if relationship.cardinality() == Cardinality::ToOne {
            related.truncate(1);
        }
        Ok(LoadedRelationship {
            name: relationship.name(),
            cardinality: relationship.cardinality(),
            related,
        })
    }

    /// Attach the named relationships to `entity`. Unknown names are skipped;
    /// callers validate them beforehand.
    async fn hydrate<'a, I>(&self, entity: Entity, names: I) -> Result<Hydrated, Error>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let descriptor = self.describe(entity.resource_type())?;
        let key = entity.key();
        let mut loaded = Vec::new();
        for name in names {
            if let Some(relationship) = descriptor.relationship(name) {
                loaded.push(self.load_related(key, relationship).await?);
            }
        }
        Ok(Hydrated { entity, loaded })
    }

    /// `GET /{type}/{id}`.
    pub async fn fetch_one(
        &self,
        resource_type: ResourceType,
        raw_id: &str,
        query: &[(String, String)],
    ) -> Result<ResourceDocument, Error> {
        let include = self.translator.translate_include(resource_type, query)?;
        let key = parse_key(resource_type, raw_id)?;
        let entity = self.load(key, raw_id).await?;
        let hydrated = self.hydrate(entity, include).await?;
        Ok(self.assembler.resource_document(&hydrated))
    }

    /// `GET /{type}`: filtered, sorted, paginated collection with links.
    pub async fn fetch_many(
        &self,
        resource_type: ResourceType,
        query: &[(String, String)],
    ) -> Result<ResourceDocument, Error> {
        let query = self.translator.translate(resource_type, query)?;
        let listing = self
            .repository
            .list(resource_type, &query.list_query())
            .await?;

        let mut members = Vec::with_capacity(listing.items.len());
        for entity in listing.items {
            members.push(self.hydrate(entity, query.include.iter().copied()).await?);
        }

        let info = PageInfo::new(query.page, listing.total);
        let links = self
            .assembler
            .page_links(resource_type, query.link_params(), &info);
        Ok(self.assembler.collection_document(&members, Some(links)))
    }

    /// `GET /{type}/{id}/{relationship}`.
    pub async fn fetch_related(
        &self,
        resource_type: ResourceType,
        raw_id: &str,
        name: &str,
    ) -> Result<ResourceDocument, Error> {
        let relationship = self.describe(resource_type)?.require_relationship(name)?;
        let key = parse_key(resource_type, raw_id)?;
        self.load(key, raw_id).await?;
        let loaded = self.load_related(key, relationship).await?;
        Ok(self
            .assembler
            .related_document(loaded.cardinality, loaded.related))
    }

    /// `GET /{type}/{id}/relationships/{relationship}`.
    pub async fn fetch_relationship_linkage(
        &self,
        resource_type: ResourceType,
        raw_id: &str,
        name: &str,
    ) -> Result<ResourceDocument, Error> {
        let relationship = self.describe(resource_type)?.require_relationship(name)?;
        let key = parse_key(resource_type, raw_id)?;
        self.load(key, raw_id).await?;
        let loaded = self.load_related(key, relationship).await?;
        Ok(DocumentAssembler::identifier_document(
            loaded.cardinality,
            &loaded.related,
        ))
    }

    /// `POST /{type}`.
    pub async fn create(&self, actor: &Actor, input: CreateInput) -> Result<Created, Error> {
        let resource_type = input.draft.resource_type();
        let changes = self
            .resolve_relationships(actor, resource_type, &input.relationships)
            .await?;
        let entity = self.repository.insert(&input.draft, &changes).await?;
        let key = entity.key();
        info!(resource_type = %resource_type, id = %key.id, "resource created");

        let hydrated = self
            .hydrate(entity, input.relationships.iter().map(|r| r.name.as_str()))
            .await?;
        Ok(Created {
            document: self.assembler.resource_document(&hydrated),
            location: self.assembler.location(key),
        })
    }

    /// `PATCH /{type}/{id}`: partial attribute update plus relationship
    /// writes, committed together.
    pub async fn update(
        &self,
        actor: &Actor,
        resource_type: ResourceType,
        raw_id: &str,
        input: UpdateInput,
    ) -> Result<ResourceDocument, Error> {
        let key = parse_key(resource_type, raw_id)?;
        let changes = self
            .resolve_relationships(actor, resource_type, &input.relationships)
            .await?;
        let entity = self
            .repository
            .update(key, &input.patch, &changes)
            .await?
            .ok_or_else(|| no_results(resource_type, raw_id))?;
        info!(resource_type = %resource_type, id = %key.id, "resource updated");

        let hydrated = self
            .hydrate(entity, input.relationships.iter().map(|r| r.name.as_str()))
            .await?;
        Ok(self.assembler.resource_document(&hydrated))
    }

    /// `DELETE /{type}/{id}`.
    pub async fn delete(&self, resource_type: ResourceType, raw_id: &str) -> Result<(), Error> {
        let key = parse_key(resource_type, raw_id)?;
        if !self.repository.delete(key).await? {
            return Err(no_results(resource_type, raw_id));
        }
        info!(resource_type = %resource_type, id = %key.id, "resource deleted");
        Ok(())
    }

    /// `PATCH /{type}/{id}/relationships/{relationship}`, dispatched on the
    /// declared mechanism.
    pub async fn update_relationship(
        &self,
        actor: &Actor,
        resource_type: ResourceType,
        raw_id: &str,
        name: &str,
        data: &LinkageInput,
    ) -> Result<(), Error> {
        let relationship = self.describe(resource_type)?.require_relationship(name)?;
        let key = parse_key(resource_type, raw_id)?;
        self.authorize(actor, relationship)?;
        let targets = resolve_targets(relationship, data, "/data")?;
        match (relationship.mechanism(), targets) {
            (RelationshipMechanism::BelongsTo(foreign_key), Targets::One(target)) => {
                self.set_to_one(key, raw_id, foreign_key, target).await
            }
            (RelationshipMechanism::HasMany(foreign_key), Targets::Many(targets)) => {
                self.set_to_many(key, raw_id, foreign_key, targets).await
            }
            (RelationshipMechanism::ManyToMany(join), Targets::Many(targets)) => {
                self.set_many_to_many(key, raw_id, join, targets).await
            }
            _ => Err(cardinality_mismatch(
                relationship,
                relationship.cardinality(),
                "/data",
            )),
        }
    }

    /// Point `key`'s owned foreign key at `target`, or clear it. A missing
    /// target fails with `NotFound` and leaves the link unchanged.
    pub async fn set_to_one(
        &self,
        key: ResourceKey,
        raw_id: &str,
        foreign_key: ForeignKey,
        target: Option<ResourceId>,
    ) -> Result<(), Error> {
        self.relink(
            key,
            raw_id,
            LinkageChange::AssignOwner {
                foreign_key,
                target,
            },
        )
        .await
    }

    /// Replace the rows pointing at `key` through `foreign_key`. Every target
    /// is checked before any existing link is cleared.
    pub async fn set_to_many(
        &self,
        key: ResourceKey,
        raw_id: &str,
        foreign_key: ForeignKey,
        targets: Vec<ResourceId>,
    ) -> Result<(), Error> {
        self.relink(
            key,
            raw_id,
            LinkageChange::ReplaceInverse {
                foreign_key,
                targets,
            },
        )
        .await
    }

    /// Make `key`'s join rows exactly `targets`.
    pub async fn set_many_to_many(
        &self,
        key: ResourceKey,
        raw_id: &str,
        join: JoinTable,
        targets: Vec<ResourceId>,
    ) -> Result<(), Error> {
        self.relink(key, raw_id, LinkageChange::SyncJoin { join, targets })
            .await
    }

    async fn relink(
        &self,
        key: ResourceKey,
        raw_id: &str,
        change: LinkageChange,
    ) -> Result<(), Error> {
        let patch = EntityPatch::unchanged(key.resource_type);
        self.repository
            .update(key, &patch, std::slice::from_ref(&change))
            .await?
            .ok_or_else(|| no_results(key.resource_type, raw_id))?;
        info!(resource_type = %key.resource_type, id = %key.id, ?change, "relationship updated");
        Ok(())
    }

    fn authorize(&self, actor: &Actor, relationship: &RelationshipDescriptor) -> Result<(), Error> {
        match relationship.guard() {
            Some(action) if !self.gate.is_allowed(action, actor) => Err(Error::forbidden()),
            _ => Ok(()),
        }
    }

    async fn resolve_relationships(
        &self,
        actor: &Actor,
        resource_type: ResourceType,
        inputs: &[RelationshipInput],
    ) -> Result<Vec<LinkageChange>, Error> {
        let descriptor = self.describe(resource_type)?;
        let mut changes = Vec::with_capacity(inputs.len());
        for input in inputs {
            let relationship = descriptor.require_relationship(&input.name)?;
            self.authorize(actor, relationship)?;
            let pointer = format!("/data/relationships/{}/data", input.name);
            let targets = resolve_targets(relationship, &input.data, &pointer)?;
            let change = match (relationship.mechanism(), targets) {
                (RelationshipMechanism::BelongsTo(foreign_key), Targets::One(target)) => {
                    LinkageChange::AssignOwner {
                        foreign_key,
                        target,
                    }
                }
                (RelationshipMechanism::HasMany(foreign_key), Targets::Many(targets)) => {
                    LinkageChange::ReplaceInverse {
                        foreign_key,
                        targets,
                    }
                }
                (RelationshipMechanism::ManyToMany(join), Targets::Many(targets)) => {
                    LinkageChange::SyncJoin { join, targets }
                }
                _ => {
                    return Err(cardinality_mismatch(
                        relationship,
                        relationship.cardinality(),
                        &pointer,
                    ));
                }
            };
            changes.push(change);
        }
        Ok(changes)
    }
}

enum Targets {
    One(Option<ResourceId>),
    Many(Vec<ResourceId>),
}

fn cardinality_mismatch(
    relationship: &RelationshipDescriptor,
    declared: Cardinality,
    pointer: &str,
) -> Error {
    let expected = match declared {
        Cardinality::ToMany => "must be an array of resource identifiers",
        Cardinality::ToOne => "must be a single resource identifier or null",
    };
    Error::validation(vec![FieldViolation::new(
        pointer,
        format!("The {} relationship {expected}.", relationship.name()),
    )])
}

/// Check the payload against the declared target.
///
/// The payload shape must match the declared cardinality, identifier types
/// must equal the target type, and ids that cannot parse as the target's
/// key kind cannot exist. Checks run in that order.
fn resolve_targets(
    relationship: &RelationshipDescriptor,
    data: &LinkageInput,
    pointer: &str,
) -> Result<Targets, Error> {
    match (relationship.cardinality(), data) {
        (Cardinality::ToOne, LinkageInput::ToMany(_)) => {
            return Err(cardinality_mismatch(relationship, Cardinality::ToOne, pointer));
        }
        (Cardinality::ToMany, LinkageInput::ToOne(_)) => {
            return Err(cardinality_mismatch(relationship, Cardinality::ToMany, pointer));
        }
        _ => {}
    }

    let target_type = relationship.target();
    let resolve = |identifier: &IdentifierInput| -> Result<ResourceId, Error> {
        if identifier.resource_type != target_type.as_str() {
            return Err(Error::conflict(format!(
                "Resource identifier type `{}` does not match the `{}` relationship type `{target_type}`",
                identifier.resource_type,
                relationship.name()
            )));
        }
        target_type
            .key_kind()
            .parse(&identifier.id)
            .ok_or_else(|| no_results(target_type, &identifier.id))
    };

    match data {
        LinkageInput::ToOne(identifier) => {
            Ok(Targets::One(identifier.as_ref().map(resolve).transpose()?))
        }
        LinkageInput::ToMany(identifiers) => {
            let mut ids: Vec<ResourceId> = Vec::with_capacity(identifiers.len());
            for identifier in identifiers {
                let id = resolve(identifier)?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Ok(Targets::Many(ids))
        }
    }
}

#[cfg(test)]
mod tests;
