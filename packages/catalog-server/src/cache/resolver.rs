//! Owner / RelatedParty Resolver: deduces canonical owner
//! attributes for objects that only carry ownership indirectly.

use std::collections::BTreeMap;

use catalog_core::{did, CatalogError, CatalogObject, OwnerHints, ResourceType, Value};

use super::{CacheCore, RetrieveMode};

const IDM_ID_TYPE: &str = "idm_id";
const OWNER_ROLE: &str = "owner";

/// Role-bearing party kinds materialized as their own columns on every
/// cached object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Seller,
    Buyer,
    SellerOperator,
    BuyerOperator,
}

impl Role {
    fn from_str(s: &str) -> Option<Role> {
        match s.to_ascii_lowercase().as_str() {
            "seller" => Some(Role::Seller),
            "buyer" => Some(Role::Buyer),
            "selleroperator" => Some(Role::SellerOperator),
            "buyeroperator" => Some(Role::BuyerOperator),
            _ => None,
        }
    }
}

pub struct OwnerResolver<'a> {
    core: &'a CacheCore,
}

impl<'a> OwnerResolver<'a> {
    #[must_use]
    pub fn new(core: &'a CacheCore) -> Self {
        OwnerResolver { core }
    }

    /// The `productOffering`-specific seller deduction path: follow the
    /// offering's `productSpecification` reference, find its `owner`
    /// relatedParty, fetch that organization, and derive a `did:elsi:`
    /// seller from its `idm_id` external reference. A no-op if the offering
    /// already has a seller or carries no `productSpecification` reference.
    pub async fn resolve_product_offering_seller(
        &self,
        offering: &mut CatalogObject,
        now: i64,
    ) -> Result<(), CatalogError> {
        if !offering.seller.is_empty() {
            return Ok(());
        }
        let Some(spec_ref) = offering.content_map.get_path("productSpecification") else {
            return Ok(());
        };
        let spec_id = spec_ref
            .get_path("id")
            .or_else(|| spec_ref.get_path("href"))
            .and_then(Value::as_str);
        let Some(spec_id) = spec_id else {
            return Ok(());
        };

        let spec_outcome = self
            .core
            .retrieve_or_update(
                spec_id,
                ResourceType::ProductSpecification.as_str(),
                &OwnerHints::default(),
                RetrieveMode::LocalOrRemote,
                now,
            )
            .await?;
        let mut spec = spec_outcome.object;

        let owner_entry = related_party_entries(&spec.content_map)
            .into_iter()
            .find(|entry| {
                entry
                    .get("role")
                    .and_then(Value::as_str)
                    .is_some_and(|r| r.eq_ignore_ascii_case(OWNER_ROLE))
            });
        let Some(owner_entry) = owner_entry else {
            return Ok(());
        };
        let Some(org_href) = owner_entry.get("href").and_then(Value::as_str) else {
            return Ok(());
        };

        let org_outcome = self
            .core
            .retrieve_or_update(
                org_href,
                ResourceType::Organization.as_str(),
                &OwnerHints::default(),
                RetrieveMode::LocalOrRemote,
                now,
            )
            .await?;
        let mut organization = org_outcome.object;

        let legal_id = external_reference_value(&organization.content_map, IDM_ID_TYPE);
        let Some(legal_id) = legal_id else {
            return Ok(());
        };
        let seller_did = did::normalize(&legal_id);
        let display_name = organization
            .content_map
            .get_path("tradingName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        offering.seller = seller_did.clone();
        offering.organization = display_name.clone();
        offering.organization_identifier = seller_did.clone();
        offering.content_map = upsert_related_party(
            &offering.content_map,
            "seller",
            &seller_did,
            &org_href.to_string(),
            ResourceType::Organization.as_str(),
        );
        offering.recompute_content();

        spec.seller = seller_did.clone();
        spec.recompute_content();
        organization.seller = seller_did;
        organization.recompute_content();

        self.core
            .store()
            .upsert(&spec, self.core.config().max_freshness_seconds, now)
            .await
            .map_err(CatalogError::from)?;
        self.core
            .store()
            .upsert(&organization, self.core.config().max_freshness_seconds, now)
            .await
            .map_err(CatalogError::from)?;

        Ok(())
    }

    /// The general-case `ProcessRelatedParties` pass: normalizes
    /// every `relatedParty` entry's `id`/`href`/`@referredType`/`did`, and
    /// sets the materialized role fields from the matching entries. Category
    /// objects are force-assigned to the operator's fixed identity.
    pub async fn process_related_parties(
        &self,
        object: &mut CatalogObject,
        now: i64,
    ) -> Result<(), CatalogError> {
        if object.resource_type == ResourceType::Category {
            object.force_operator_ownership(&self.core.config().operator);
            object.recompute_content();
            return Ok(());
        }

        let entries = related_party_entries(&object.content_map);
        if entries.is_empty() {
            return Ok(());
        }

        let mut normalized_entries = Vec::with_capacity(entries.len());
        for entry in entries {
            normalized_entries.push(self.normalize_related_party_entry(entry, now).await?);
        }

        for entry in &normalized_entries {
            let Some(role) = entry.get("role").and_then(Value::as_str).and_then(Role::from_str) else {
                continue;
            };
            let Some(entry_did) = entry.get("did").and_then(Value::as_str) else {
                continue;
            };
            let normalized = did::normalize(entry_did);
            match role {
                Role::Seller => object.seller = normalized,
                Role::Buyer => object.buyer = normalized,
                Role::SellerOperator => object.seller_operator = normalized,
                Role::BuyerOperator => object.buyer_operator = normalized,
            }
        }

        object.content_map = replace_related_party_array(&object.content_map, normalized_entries);
        object.recompute_content();
        Ok(())
    }

    async fn normalize_related_party_entry(
        &self,
        mut entry: BTreeMap<String, Value>,
        now: i64,
    ) -> Result<BTreeMap<String, Value>, CatalogError> {
        let id = entry.get("id").and_then(Value::as_str).map(str::to_string);
        let href = entry.get("href").and_then(Value::as_str).map(str::to_string);

        match (&id, &href) {
            (Some(id), None) => {
                tracing::warn!(id = %id, "relatedParty entry missing href, deriving from id");
                entry.insert("href".to_string(), Value::String(id.clone()));
            }
            (None, Some(href)) => {
                tracing::warn!(href = %href, "relatedParty entry missing id, deriving from href");
                entry.insert("id".to_string(), Value::String(href.clone()));
            }
            _ => {}
        }

        if !entry.contains_key("@referredType") {
            if let Some(reference) = entry.get("href").and_then(Value::as_str) {
                if let Some(kebab) = catalog_core::object::urn_kebab_segment(reference) {
                    if let Some(resource_type) = self.core.config().kebab_types.resource_type_for_kebab(kebab) {
                        entry.insert(
                            "@referredType".to_string(),
                            Value::String(resource_type.as_str().to_string()),
                        );
                    }
                }
            }
        }

        let referred_type = entry.get("@referredType").and_then(Value::as_str);
        let needs_did = match entry.get("did").and_then(Value::as_str) {
            None => true,
            Some(d) if d.is_empty() => true,
            Some(d) => !did::is_normalized(d),
        };

        if referred_type == Some(ResourceType::Organization.as_str()) && needs_did {
            if let Some(href) = entry.get("href").and_then(Value::as_str).map(str::to_string) {
                let outcome = self
                    .core
                    .retrieve_or_update(
                        &href,
                        ResourceType::Organization.as_str(),
                        &OwnerHints::default(),
                        RetrieveMode::LocalOrRemote,
                        now,
                    )
                    .await?;
                let identification_id = outcome
                    .object
                    .content_map
                    .get_path("identificationId")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !identification_id.is_empty() {
                    entry.insert(
                        "did".to_string(),
                        Value::String(did::normalize(identification_id)),
                    );
                    entry.insert(
                        "@schemaLocation".to_string(),
                        Value::String(format!("{href}/schema")),
                    );
                }
            }
        }

        Ok(entry)
    }
}

fn related_party_entries(content_map: &Value) -> Vec<BTreeMap<String, Value>> {
    content_map
        .get_path("relatedParty")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).cloned().collect())
        .unwrap_or_default()
}

fn replace_related_party_array(content_map: &Value, entries: Vec<BTreeMap<String, Value>>) -> Value {
    let Some(mut map) = content_map.as_object().cloned() else {
        return content_map.clone();
    };
    map.insert(
        "relatedParty".to_string(),
        Value::Array(entries.into_iter().map(Value::Object).collect()),
    );
    Value::Object(map)
}

fn upsert_related_party(content_map: &Value, role: &str, did: &str, href: &str, referred_type: &str) -> Value {
    let mut entries = related_party_entries(content_map);
    if let Some(existing) = entries
        .iter_mut()
        .find(|e| e.get("role").and_then(Value::as_str) == Some(role))
    {
        existing.insert("did".to_string(), Value::String(did.to_string()));
        existing.insert("href".to_string(), Value::String(href.to_string()));
        existing.insert("id".to_string(), Value::String(href.to_string()));
    } else {
        let mut entry = BTreeMap::new();
        entry.insert("role".to_string(), Value::String(role.to_string()));
        entry.insert("did".to_string(), Value::String(did.to_string()));
        entry.insert("href".to_string(), Value::String(href.to_string()));
        entry.insert("id".to_string(), Value::String(href.to_string()));
        entry.insert(
            "@referredType".to_string(),
            Value::String(referred_type.to_string()),
        );
        entries.push(entry);
    }
    replace_related_party_array(content_map, entries)
}

fn external_reference_value(content_map: &Value, reference_type: &str) -> Option<String> {
    content_map
        .get_path("externalReference")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(Value::as_object)
        .find(|entry| {
            entry.get("externalReferenceType").and_then(Value::as_str) == Some(reference_type)
        })
        .and_then(|entry| entry.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use crate::storedb::sqlite::SqliteDiskStore;
    use async_trait::async_trait;
    use catalog_core::{CacheConfig, KebabTypeTable};
    use std::sync::Arc;

    struct FixedRemote {
        spec: Value,
        org: Value,
    }

    #[async_trait]
    impl crate::remote::RemoteFetch for FixedRemote {
        async fn fetch_one(&self, id: &str, _resource_type: &str) -> Result<Value, RemoteError> {
            if id.contains("product-specification") {
                Ok(self.spec.clone())
            } else {
                Ok(self.org.clone())
            }
        }

        async fn fetch_list_page(
            &self,
            _resource_type: &str,
            _limit: u32,
            _offset: u32,
            _query: &crate::query::FilterParams,
        ) -> Result<Vec<Value>, RemoteError> {
            Ok(Vec::new())
        }

        async fn post_create(
            &self,
            _resource_type: &str,
            _body: &Value,
            _bearer_token: &str,
        ) -> Result<Value, RemoteError> {
            Ok(Value::Null)
        }
    }

    fn object_body(id: &str, resource_type: &str) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), Value::String(id.to_string()));
        map.insert("href".to_string(), Value::String(id.to_string()));
        map.insert("@type".to_string(), Value::String(resource_type.to_string()));
        map
    }

    #[tokio::test]
    async fn resolves_seller_from_product_specification_owner() {
        let org_id = "urn:ngsi-ld:organization:acme";
        let spec_id = "urn:ngsi-ld:product-specification:s1";

        let mut org_body = object_body(org_id, "organization");
        org_body.insert("tradingName".to_string(), Value::String("Acme".to_string()));
        let mut ext_ref = BTreeMap::new();
        ext_ref.insert(
            "externalReferenceType".to_string(),
            Value::String("idm_id".to_string()),
        );
        ext_ref.insert("name".to_string(), Value::String("VATES-B12345678".to_string()));
        org_body.insert(
            "externalReference".to_string(),
            Value::Array(vec![Value::Object(ext_ref)]),
        );

        let mut spec_body = object_body(spec_id, "productSpecification");
        let mut owner_entry = BTreeMap::new();
        owner_entry.insert("role".to_string(), Value::String("owner".to_string()));
        owner_entry.insert("href".to_string(), Value::String(org_id.to_string()));
        spec_body.insert(
            "relatedParty".to_string(),
            Value::Array(vec![Value::Object(owner_entry)]),
        );

        let store = Arc::new(SqliteDiskStore::connect_in_memory().await.unwrap());
        let remote = Arc::new(FixedRemote {
            spec: Value::Object(spec_body),
            org: Value::Object(org_body),
        });
        let core = CacheCore::new(store, remote, CacheConfig::default());

        let mut offering_body_map = object_body("urn:ngsi-ld:product-offering:o1", "productOffering");
        let mut spec_ref = BTreeMap::new();
        spec_ref.insert("id".to_string(), Value::String(spec_id.to_string()));
        offering_body_map.insert("productSpecification".to_string(), Value::Object(spec_ref));

        let table = KebabTypeTable::default_table();
        let mut offering = CatalogObject::from_upstream(
            Value::Object(offering_body_map),
            None,
            &table,
            0,
        )
        .unwrap();

        let resolver = OwnerResolver::new(&core);
        resolver.resolve_product_offering_seller(&mut offering, 0).await.unwrap();

        assert_eq!(offering.seller, "did:elsi:VATES-B12345678");
        assert_eq!(offering.organization, "Acme");
        assert!(offering.dids_normalized());
    }

    #[tokio::test]
    async fn category_objects_force_operator_ownership() {
        let store = Arc::new(SqliteDiskStore::connect_in_memory().await.unwrap());
        let remote = Arc::new(FixedRemote {
            spec: Value::Null,
            org: Value::Null,
        });
        let config = CacheConfig::default();
        let operator = config.operator.clone();
        let core = CacheCore::new(store, remote, config);

        let table = KebabTypeTable::default_table();
        let mut category = CatalogObject::from_upstream(
            Value::Object(object_body("urn:ngsi-ld:category:c1", "category")),
            None,
            &table,
            0,
        )
        .unwrap();

        let resolver = OwnerResolver::new(&core);
        resolver.process_related_parties(&mut category, 0).await.unwrap();

        assert!(category.has_operator_ownership(&operator));
    }
}
