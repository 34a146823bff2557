//! Default policy: allow any `GET` for owners; restrict non-`GET`
//! to a country allow-list with an explicit deny-list checked first.

use std::collections::HashSet;

use async_trait::async_trait;

use super::types::{Credential, Request, User};
use super::{AuthDecision, Authenticator, Authorizer};

/// Opaque hook for the out-of-scope policy script interpreter. The default
/// authorizer never calls this; it exists so a future scripted policy can
/// be plugged in without changing the `Authorizer` contract.
pub trait PolicyHook: Send + Sync {
    fn evaluate(&self, request: &Request, credential: &Credential, user: &User) -> Option<AuthDecision>;
}

/// Authenticates by trusting whatever `Credential` the caller already
/// parsed; the only work done here is deriving the `User` record's
/// `isOwner` field, not the JWT/mandate parsing itself.
pub struct DefaultAuthenticator {
    owner_country: String,
}

impl DefaultAuthenticator {
    #[must_use]
    pub fn new(owner_country: impl Into<String>) -> Self {
        DefaultAuthenticator { owner_country: owner_country.into() }
    }
}

#[async_trait]
impl Authenticator for DefaultAuthenticator {
    async fn authenticate(&self, _request: &Request, credential: &Credential) -> anyhow::Result<AuthDecision> {
        let is_owner = credential.mandate.mandator.country.eq_ignore_ascii_case(&self.owner_country);
        if is_owner || !credential.mandate.mandator.country.is_empty() {
            Ok(AuthDecision::Allow)
        } else {
            Ok(AuthDecision::deny("missing mandate.mandator.country"))
        }
    }
}

/// Default authorization policy: any `GET` is allowed for owners.
/// Non-`GET` methods are checked against `deny_countries` first, then
/// against `allow_countries`.
pub struct DefaultAuthorizer {
    pub allow_countries: HashSet<String>,
    pub deny_countries: HashSet<String>,
}

impl DefaultAuthorizer {
    #[must_use]
    pub fn new(allow_countries: HashSet<String>, deny_countries: HashSet<String>) -> Self {
        DefaultAuthorizer { allow_countries, deny_countries }
    }
}

#[async_trait]
impl Authorizer for DefaultAuthorizer {
    async fn authorize(&self, request: &Request, credential: &Credential, user: &User) -> anyhow::Result<AuthDecision> {
        if request.is_get() && user.is_owner {
            return Ok(AuthDecision::Allow);
        }

        let country = credential.mandate.mandator.country.as_str();
        if self.deny_countries.iter().any(|c| c.eq_ignore_ascii_case(country)) {
            return Ok(AuthDecision::deny(format!("country {country} is denylisted")));
        }
        if self.allow_countries.iter().any(|c| c.eq_ignore_ascii_case(country)) {
            return Ok(AuthDecision::Allow);
        }
        Ok(AuthDecision::deny(format!("country {country} is not allow-listed for non-GET requests")))
    }
}
