//! Canonical JSON serialization and content hashing for [`crate::value::Value`].
//!
//! `contentBytes` and `hash` move together: both are recomputed whenever
//! `contentMap` changes, and never stored independently of it.

use sha2::{Digest, Sha256};

use crate::value::Value;

/// Serializes a [`Value`] to canonical JSON bytes.
///
/// Canonical here means: object keys in sorted order (guaranteed by
/// `Value::Object`'s `BTreeMap`), no insignificant whitespace. `serde_json`'s
/// default compact writer already omits whitespace, so the only thing this
/// function owns is picking the sorted-map representation before handing
/// off to `serde_json`.
#[must_use]
pub fn canonical_json(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// Computes the 32-byte SHA-256 digest of a value's canonical JSON form.
#[must_use]
pub fn content_hash(value: &Value) -> [u8; 32] {
    let bytes = canonical_json(value);
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hasher.finalize().into()
}

/// Hex-encodes a hash, for logging and for the `ORDER BY hash` stable order.
#[must_use]
pub fn hash_to_hex(hash: &[u8; 32]) -> String {
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn identical_content_yields_identical_hash() {
        let mut a = BTreeMap::new();
        a.insert("name".to_string(), Value::String("Acme".to_string()));
        a.insert("active".to_string(), Value::Bool(true));

        let mut b = BTreeMap::new();
        b.insert("active".to_string(), Value::Bool(true));
        b.insert("name".to_string(), Value::String("Acme".to_string()));

        assert_eq!(
            content_hash(&Value::Object(a)),
            content_hash(&Value::Object(b))
        );
    }

    #[test]
    fn mutation_changes_hash() {
        let mut a = BTreeMap::new();
        a.insert("name".to_string(), Value::String("Acme".to_string()));
        let h1 = content_hash(&Value::Object(a.clone()));

        a.insert("name".to_string(), Value::String("Other".to_string()));
        let h2 = content_hash(&Value::Object(a));

        assert_ne!(h1, h2);
    }

    #[test]
    fn hex_encoding_is_64_chars() {
        let hash = content_hash(&Value::Null);
        assert_eq!(hash_to_hex(&hash).len(), 64);
    }

    proptest::proptest! {
        #[test]
        fn content_hash_is_deterministic(name in ".*", active in proptest::bool::ANY) {
            let mut map = BTreeMap::new();
            map.insert("name".to_string(), Value::String(name));
            map.insert("active".to_string(), Value::Bool(active));
            let value = Value::Object(map);

            prop_assert_eq!(content_hash(&value), content_hash(&value));
        }

        #[test]
        fn hash_to_hex_always_64_lowercase_hex_chars(name in ".*") {
            let mut map = BTreeMap::new();
            map.insert("name".to_string(), Value::String(name));
            let hex_str = hash_to_hex(&content_hash(&Value::Object(map)));

            prop_assert_eq!(hex_str.len(), 64);
            prop_assert!(hex_str.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }
}
