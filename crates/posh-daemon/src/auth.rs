//! Bearer-token authentication.
//!
//! Token verification is delegated to an external identity provider behind
//! [`IdentityProvider`]; this module only extracts the header, asks the
//! provider who the subject is, and pairs that with the role held in the
//! store's directory. Roles are never read from the token.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;

use posh_schemas::Role;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A subject the external provider vouches for.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: String,
    pub name: String,
    pub email: Option<String>,
}

/// The authenticated caller as handlers see it: verified identity plus the
/// locally-owned role.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token to an identity, or `None` when the token is
    /// invalid or expired.
    async fn verify(&self, token: &str) -> Option<Identity>;
}

// ---------------------------------------------------------------------------
// UserInfoIdentity: production provider
// ---------------------------------------------------------------------------

/// OIDC-style userinfo introspection: presents the caller's bearer token to
/// the provider's userinfo endpoint and trusts the subject it returns. Any
/// transport or decode failure is an invalid token.
pub struct UserInfoIdentity {
    http: reqwest::Client,
    userinfo_url: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl UserInfoIdentity {
    pub fn new(userinfo_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            userinfo_url,
        }
    }
}

#[async_trait]
impl IdentityProvider for UserInfoIdentity {
    async fn verify(&self, token: &str) -> Option<Identity> {
        let resp = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let info: UserInfoResponse = resp.json().await.ok()?;
        let name = info
            .name
            .or_else(|| {
                info.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string());
        Some(Identity {
            subject: info.sub,
            name,
            email: info.email,
        })
    }
}

// ---------------------------------------------------------------------------
// StaticIdentity: fixed token table for tests and local development
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StaticIdentity {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, subject: &str, name: &str) -> Self {
        self.tokens.insert(
            token.to_string(),
            Identity {
                subject: subject.to_string(),
                name: name.to_string(),
                email: None,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verify(&self, token: &str) -> Option<Identity> {
        self.tokens.get(token).cloned()
    }
}

// ---------------------------------------------------------------------------
// Header extraction
// ---------------------------------------------------------------------------

/// Pull the bearer token out of an `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
