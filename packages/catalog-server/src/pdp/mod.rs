//! PDP (policy decision point) handler contract.
//!
//! Only the contract the MITM proxy calls into is in scope here; the HTTP
//! routing layer that would host these handlers behind an actual listener
//! is left to a front-end that embeds this crate.

mod policy;
mod types;

pub use policy::{DefaultAuthenticator, DefaultAuthorizer, PolicyHook};
pub use types::{Credential, Mandate, Mandator, Power, Request, User};

use async_trait::async_trait;

/// Verifies the caller's credential and attaches a `User` to the request.
/// Implementations: the default (JWT/mandate parsing), a stub for tests.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &Request, credential: &Credential) -> anyhow::Result<AuthDecision>;
}

/// Decides whether an authenticated request is allowed to proceed.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: &Request, credential: &Credential, user: &User) -> anyhow::Result<AuthDecision>;
}

/// Outcome of an `authenticate`/`authorize` call ("Each returns
/// allow/deny").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny { reason: String },
}

impl AuthDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allow)
    }

    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        AuthDecision::Deny { reason: reason.into() }
    }
}

/// Tests a `(function, domain, action)` tuple against a credential's `power`
/// array ("Resource powers are optionally examined through a
/// helper...").
#[must_use]
pub fn has_power(credential: &Credential, function: &str, domain: &str, action: &str) -> bool {
    credential.powers.iter().any(|p| {
        p.function.eq_ignore_ascii_case(function)
            && p.domain.eq_ignore_ascii_case(domain)
            && p.action.eq_ignore_ascii_case(action)
    })
}
