//! `CatalogObject`: the unit of caching.

use crate::config::EcosystemOperator;
use crate::did;
use crate::error::CatalogError;
use crate::hash::{canonical_json, content_hash};
use crate::resource_type::{KebabTypeTable, ResourceType};
use crate::value::Value;

pub const URN_PREFIX: &str = "urn:ngsi-ld:";
pub const DEFAULT_VERSION: &str = "0.1";

/// A cached catalog object. Every field here is a materialized column in
/// the Disk Store's `tmfobject` table except `contentMap`,
/// which the store reconstructs from the `content` blob on read.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogObject {
    pub id: String,
    pub href: String,
    pub resource_type: ResourceType,
    pub version: String,
    pub name: String,
    pub description: String,
    pub lifecycle_status: String,
    pub last_update: String,
    pub seller: String,
    pub buyer: String,
    pub seller_operator: String,
    pub buyer_operator: String,
    pub organization: String,
    pub organization_identifier: String,
    pub content_map: Value,
    pub content_bytes: Vec<u8>,
    pub hash: [u8; 32],
    pub created: i64,
    pub updated: i64,
}

/// Owner hints threaded into `RetrieveOrUpdate` and applied to
/// an object that is missing owner fields.
#[derive(Debug, Clone, Default)]
pub struct OwnerHints {
    pub seller_did: Option<String>,
    pub seller_name: Option<String>,
    pub seller_href: Option<String>,
}

impl CatalogObject {
    /// Constructs a `CatalogObject` from an upstream JSON body, enforcing
    /// every construction-time invariant. This is the single factory
    /// both the Remote Client and the Cloner go through — no partial object
    /// is ever cached (`SchemaViolation`).
    ///
    /// `declared_type` is the resource type implied by context (e.g. the
    /// path the object was fetched from); it is cross-checked against the
    /// id's kebab-type segment and the body's own `@type`, if present.
    pub fn from_upstream(
        content_map: Value,
        declared_type: Option<&ResourceType>,
        kebab_types: &KebabTypeTable,
        now: i64,
    ) -> Result<CatalogObject, CatalogError> {
        let object = content_map
            .as_object()
            .ok_or_else(|| CatalogError::schema_violation("<unknown>", "body is not a JSON object"))?;

        let id = object
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CatalogError::schema_violation("<unknown>", "missing id"))?
            .to_string();

        let href = object
            .get("href")
            .and_then(Value::as_str)
            .unwrap_or(&id)
            .to_string();

        if href != id {
            return Err(CatalogError::schema_violation(&id, "href does not equal id"));
        }
        if !id.starts_with(URN_PREFIX) {
            return Err(CatalogError::schema_violation(
                &id,
                format!("id does not start with {URN_PREFIX}"),
            ));
        }

        let kebab = urn_kebab_segment(&id)
            .ok_or_else(|| CatalogError::schema_violation(&id, "id has no kebab-type segment"))?;
        let type_from_id = kebab_types
            .resource_type_for_kebab(kebab)
            .cloned()
            .ok_or_else(|| CatalogError::schema_violation(&id, format!("unknown kebab-type segment {kebab}")))?;

        let type_from_body = object
            .get("@type")
            .and_then(Value::as_str)
            .map(ResourceType::from_camel_case);

        let resource_type = reconcile_resource_type(
            &id,
            Some(&type_from_id),
            type_from_body.as_ref(),
            declared_type,
        )?;

        let version = object
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_VERSION)
            .to_string();

        let mut result = CatalogObject {
            id,
            href,
            resource_type,
            version,
            name: string_field(object, "name"),
            description: string_field(object, "description"),
            lifecycle_status: string_field(object, "lifecycleStatus"),
            last_update: string_field(object, "lastUpdate"),
            seller: String::new(),
            buyer: String::new(),
            seller_operator: String::new(),
            buyer_operator: String::new(),
            organization: String::new(),
            organization_identifier: String::new(),
            content_map: Value::Object(object.clone()),
            content_bytes: Vec::new(),
            hash: [0u8; 32],
            created: now,
            updated: now,
        };
        result.recompute_content();
        Ok(result)
    }

    /// Recomputes `contentBytes` and `hash` from `contentMap`. Called
    /// whenever `contentMap` is mutated (construction, resolver write-back).
    pub fn recompute_content(&mut self) {
        self.content_bytes = canonical_json(&self.content_map);
        self.hash = content_hash(&self.content_map);
    }

    /// Applies owner hints to an object missing owner fields. Only writes
    /// fields that are currently empty — hints never overwrite a known owner.
    /// Callers that also touch `contentMap` are responsible for calling
    /// `recompute_content` afterward.
    pub fn apply_owner_hints(&mut self, hints: &OwnerHints) {
        if self.seller.is_empty() {
            if let Some(did) = &hints.seller_did {
                self.seller = did::normalize(did);
            }
        }
        if self.organization.is_empty() {
            if let Some(name) = &hints.seller_name {
                self.organization = name.clone();
            }
        }
        if self.organization_identifier.is_empty() {
            if let Some(did) = &hints.seller_did {
                self.organization_identifier = did::normalize(did);
            }
        }
    }

    /// Forces owner fields to the ecosystem operator's fixed identity, as
    /// required for every `category` object.
    pub fn force_operator_ownership(&mut self, operator: &EcosystemOperator) {
        self.organization_identifier = operator.did.clone();
        self.organization = operator.name.clone();
    }

    /// Returns `false` if any role-bearing field fails the `did:elsi:`
    /// prefix invariant ("DID normalization").
    #[must_use]
    pub fn dids_normalized(&self) -> bool {
        did::is_normalized(&self.seller)
            && did::is_normalized(&self.buyer)
            && did::is_normalized(&self.seller_operator)
            && did::is_normalized(&self.buyer_operator)
    }

    /// Returns `true` if this object is a forced-ownership `category` row
    /// and its owner fields match the operator ("Category ownership").
    #[must_use]
    pub fn has_operator_ownership(&self, operator: &EcosystemOperator) -> bool {
        self.resource_type != ResourceType::Category
            || (self.organization_identifier == operator.did && self.organization == operator.name)
    }

    /// The store's primary key tuple.
    #[must_use]
    pub fn primary_key(&self) -> (&str, &str, &str) {
        (&self.id, self.resource_type.as_str(), &self.version)
    }
}

fn string_field(object: &std::collections::BTreeMap<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Splits a URN of the form `urn:ngsi-ld:<kebab-type>:<uuid>` and returns
/// the kebab-type segment (the third colon-separated field).
#[must_use]
pub fn urn_kebab_segment(urn: &str) -> Option<&str> {
    urn.splitn(4, ':').nth(2)
}

fn reconcile_resource_type(
    id: &str,
    from_id: Option<&ResourceType>,
    from_body: Option<&ResourceType>,
    declared: Option<&ResourceType>,
) -> Result<ResourceType, CatalogError> {
    let candidates = [from_id, from_body, declared];
    let mut agreed: Option<ResourceType> = None;
    for candidate in candidates.into_iter().flatten() {
        match &agreed {
            None => agreed = Some(candidate.clone()),
            Some(existing) => {
                if !existing.as_str().eq_ignore_ascii_case(candidate.as_str()) {
                    return Err(CatalogError::schema_violation(
                        id,
                        format!(
                            "resource type mismatch: {} vs {}",
                            existing.as_str(),
                            candidate.as_str()
                        ),
                    ));
                }
            }
        }
    }
    agreed.ok_or_else(|| CatalogError::schema_violation(id, "unable to determine resource type"))
}
