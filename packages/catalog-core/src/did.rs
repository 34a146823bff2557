//! Normalization helpers for `did:elsi:<legalId>` decentralized identifiers.
//!
//! Every non-empty `seller`/`buyer`/`sellerOperator`/`buyerOperator` field
//! must carry this prefix; the owner resolver is the main producer of raw
//! legal identifiers that need normalizing on the way in.

pub const DID_ELSI_PREFIX: &str = "did:elsi:";

/// Returns `true` if `value` is empty or already carries the `did:elsi:` prefix.
#[must_use]
pub fn is_normalized(value: &str) -> bool {
    value.is_empty() || value.starts_with(DID_ELSI_PREFIX)
}

/// Normalizes a raw legal identifier (or an already-prefixed DID) to
/// `did:elsi:<legalId>`. Empty input stays empty — an empty owner field
/// means "not yet known", not an identifier to normalize.
#[must_use]
pub fn normalize(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with(DID_ELSI_PREFIX) {
        return trimmed.to_string();
    }
    format!("{DID_ELSI_PREFIX}{trimmed}")
}

/// Strips the `did:elsi:` prefix, if present, returning the bare legal identifier.
#[must_use]
pub fn strip_prefix(value: &str) -> &str {
    value.strip_prefix(DID_ELSI_PREFIX).unwrap_or(value)
}
