//! Credential session management
//!
//! Every storage operation asks a [`TokenProvider`] for a token first.
//! Two sources are supported:
//! - Static tokens, provisioned out of band and never renewed
//! - Role login (role id + secret id), cached until its lease runs out and
//!   then lazily replaced on the next request

pub mod approle;
pub mod static_token;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::client::Transport;
use crate::config::AuthConfig;
use crate::error::Result;

pub use approle::AppRoleProvider;
pub use static_token::StaticTokenProvider;

/// How a credential was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Static,
    AppRole,
}

/// A bearer token. Credentials are immutable; renewal replaces the whole value.
#[derive(Debug, Clone)]
pub struct Credential {
    token: String,
    kind: CredentialKind,
    expires_at: Option<Instant>,
}

impl Credential {
    pub fn static_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            kind: CredentialKind::Static,
            expires_at: None,
        }
    }

    /// A dynamically issued token valid for `lease` from now
    pub fn leased(token: impl Into<String>, lease: Duration) -> Self {
        Self::leased_until(token, Instant::now() + lease)
    }

    pub fn leased_until(token: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            token: token.into(),
            kind: CredentialKind::AppRole,
            expires_at: Some(expires_at),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Static credentials never expire
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// Source of the token sent with every backend request
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current token. Never fails: when no token can be obtained the result
    /// is empty and the backend rejects the request that uses it.
    async fn token(&self) -> String;

    /// Currently cached credential, if any
    fn credential(&self) -> Option<Arc<Credential>>;

    /// Revoke and forget a dynamically obtained credential.
    ///
    /// Default implementation does nothing.
    async fn logout(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the provider for the configured authentication method
pub fn provider_for(auth: &AuthConfig, transport: Arc<dyn Transport>) -> Arc<dyn TokenProvider> {
    match auth {
        AuthConfig::Token(token) => Arc::new(StaticTokenProvider::new(token.clone())),
        AuthConfig::AppRole(approle) => Arc::new(AppRoleProvider::new(approle.clone(), transport)),
    }
}
