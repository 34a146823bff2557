//! Abstract request/credential records the policy hook reasons over.

use std::collections::BTreeMap;

/// An abstract inbound request, stripped down to what the policy hook needs
/// ("method, host, path, headers, remote IP, path params, query
/// params, a `user` record").
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub host: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub remote_ip: String,
    pub path_params: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, Vec<String>>,
}

impl Request {
    #[must_use]
    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// The `user` record attached to a request after authentication.
#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: String,
    pub is_owner: bool,
}

/// A parsed mandate credential ("a parsed credential with a
/// `mandate.mandator.country` field").
#[derive(Debug, Clone)]
pub struct Credential {
    pub mandate: Mandate,
    pub powers: Vec<Power>,
}

#[derive(Debug, Clone)]
pub struct Mandate {
    pub mandator: Mandator,
}

#[derive(Debug, Clone)]
pub struct Mandator {
    pub country: String,
}

/// One entry of a credential's `power` array: a `(function, domain, action)`
/// tuple.
#[derive(Debug, Clone)]
pub struct Power {
    pub function: String,
    pub domain: String,
    pub action: String,
}
