//! TMForum resource types and the kebab-type table that maps URN segments to
//! them.
//!
//! Open Question: "the kebab-type table in the source lists
//! roughly nine types plus later additions — take it as data, not code."
//! Resolved here as: the *table* ([`KebabTypeTable`]) is a runtime value
//! built from a list of `(kebab, ResourceType)` pairs supplied by
//! configuration, so the set of known kebab-types can grow without a
//! recompile. The *variant set* stays a closed Rust enum plus an `Other`
//! catch-all, so match arms that only care about well-known types don't need
//! a wildcard scattered through the codebase, while still tolerating
//! table growth.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A TMForum resource class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    ProductOffering,
    ProductSpecification,
    ProductOfferingPrice,
    Catalog,
    Category,
    Organization,
    Individual,
    ServiceSpecification,
    ResourceSpecification,
    /// Any resource type not in the closed set above, carrying its raw
    /// camelCase name as seen on the wire.
    Other(String),
}

impl ResourceType {
    /// The canonical camelCase name used in `@type`, the query translator's
    /// `resourceType` column, and the remote client's path table key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::ProductOffering => "productOffering",
            ResourceType::ProductSpecification => "productSpecification",
            ResourceType::ProductOfferingPrice => "productOfferingPrice",
            ResourceType::Catalog => "catalog",
            ResourceType::Category => "category",
            ResourceType::Organization => "organization",
            ResourceType::Individual => "individual",
            ResourceType::ServiceSpecification => "serviceSpecification",
            ResourceType::ResourceSpecification => "resourceSpecification",
            ResourceType::Other(name) => name,
        }
    }

    /// Parses a camelCase resource type name, falling back to `Other`.
    #[must_use]
    pub fn from_camel_case(name: &str) -> ResourceType {
        match name {
            "productOffering" => ResourceType::ProductOffering,
            "productSpecification" => ResourceType::ProductSpecification,
            "productOfferingPrice" => ResourceType::ProductOfferingPrice,
            "catalog" => ResourceType::Catalog,
            "category" => ResourceType::Category,
            "organization" => ResourceType::Organization,
            "individual" => ResourceType::Individual,
            "serviceSpecification" => ResourceType::ServiceSpecification,
            "resourceSpecification" => ResourceType::ResourceSpecification,
            other => ResourceType::Other(other.to_string()),
        }
    }

    /// The kebab-case URN segment for the default table entries
    /// (`productOffering` -> `product-offering`). `Other` types use the
    /// [`KebabTypeTable`] for this mapping instead, since it has no fixed rule.
    #[must_use]
    pub fn default_kebab(&self) -> Option<&'static str> {
        Some(match self {
            ResourceType::ProductOffering => "product-offering",
            ResourceType::ProductSpecification => "product-specification",
            ResourceType::ProductOfferingPrice => "product-offering-price",
            ResourceType::Catalog => "catalog",
            ResourceType::Category => "category",
            ResourceType::Organization => "organization",
            ResourceType::Individual => "individual",
            ResourceType::ServiceSpecification => "service-specification",
            ResourceType::ResourceSpecification => "resource-specification",
            ResourceType::Other(_) => return None,
        })
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime mapping between URN kebab-type segments and [`ResourceType`]s,
/// built once at startup from configuration rather than baked in as match
/// arms.
#[derive(Debug, Clone, Default)]
pub struct KebabTypeTable {
    kebab_to_type: HashMap<String, ResourceType>,
    type_to_kebab: HashMap<String, String>,
}

impl KebabTypeTable {
    /// Builds a table from `(kebab, resourceType)` pairs. Later entries
    /// overwrite earlier ones with the same kebab segment.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (String, ResourceType)>) -> Self {
        let mut kebab_to_type = HashMap::new();
        let mut type_to_kebab = HashMap::new();
        for (kebab, resource_type) in entries {
            type_to_kebab.insert(resource_type.as_str().to_string(), kebab.clone());
            kebab_to_type.insert(kebab, resource_type);
        }
        KebabTypeTable {
            kebab_to_type,
            type_to_kebab,
        }
    }

    /// The default nine-type table, built from each known variant's
    /// [`ResourceType::default_kebab`].
    #[must_use]
    pub fn default_table() -> Self {
        let known = [
            ResourceType::ProductOffering,
            ResourceType::ProductSpecification,
            ResourceType::ProductOfferingPrice,
            ResourceType::Catalog,
            ResourceType::Category,
            ResourceType::Organization,
            ResourceType::Individual,
            ResourceType::ServiceSpecification,
            ResourceType::ResourceSpecification,
        ];
        let entries = known.into_iter().map(|rt| {
            let kebab = rt.default_kebab().expect("known variant has a kebab form");
            (kebab.to_string(), rt)
        });
        Self::from_entries(entries)
    }

    /// Resolves a kebab-type URN segment to its resource type.
    #[must_use]
    pub fn resource_type_for_kebab(&self, kebab: &str) -> Option<&ResourceType> {
        self.kebab_to_type.get(kebab)
    }

    /// Resolves a resource type's camelCase name to its kebab URN segment.
    #[must_use]
    pub fn kebab_for_resource_type(&self, resource_type: &ResourceType) -> Option<&str> {
        self.type_to_kebab
            .get(resource_type.as_str())
            .map(String::as_str)
    }

    pub fn insert(&mut self, kebab: impl Into<String>, resource_type: ResourceType) {
        let kebab = kebab.into();
        self.type_to_kebab
            .insert(resource_type.as_str().to_string(), kebab.clone());
        self.kebab_to_type.insert(kebab, resource_type);
    }

    /// All registered resource types' camelCase names, for iterating over
    /// the known resource-type catalog (e.g. to clone every type in turn).
    #[must_use]
    pub fn resource_types(&self) -> Vec<String> {
        self.type_to_kebab.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_resolves_known_types() {
        let table = KebabTypeTable::default_table();
        assert_eq!(
            table.resource_type_for_kebab("product-offering"),
            Some(&ResourceType::ProductOffering)
        );
        assert_eq!(
            table.kebab_for_resource_type(&ResourceType::Category),
            Some("category")
        );
    }

    #[test]
    fn unknown_kebab_is_none() {
        let table = KebabTypeTable::default_table();
        assert_eq!(table.resource_type_for_kebab("not-a-type"), None);
    }

    #[test]
    fn table_grows_without_recompiling_match_arms() {
        let mut table = KebabTypeTable::default_table();
        table.insert("widget", ResourceType::Other("widget".to_string()));
        assert_eq!(
            table.resource_type_for_kebab("widget"),
            Some(&ResourceType::Other("widget".to_string()))
        );
    }

    #[test]
    fn from_camel_case_falls_back_to_other() {
        assert_eq!(ResourceType::from_camel_case("productOffering"), ResourceType::ProductOffering);
        assert_eq!(
            ResourceType::from_camel_case("widget"),
            ResourceType::Other("widget".to_string())
        );
    }
}
