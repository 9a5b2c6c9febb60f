//! Static token provider.
//!
//! Returns a pre-provisioned token without any login or renewal. Managing
//! the token's lifetime (create, renew, revoke) is up to whoever issued it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Credential, TokenProvider};

/// A token provider that returns a static token.
pub struct StaticTokenProvider {
    credential: Arc<Credential>,
}

impl StaticTokenProvider {
    /// Create a new static token provider.
    pub fn new(token: String) -> Self {
        Self {
            credential: Arc::new(Credential::static_token(token)),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> String {
        debug!("Using static token for auth");
        self.credential.token().to_string()
    }

    fn credential(&self) -> Option<Arc<Credential>> {
        Some(self.credential.clone())
    }
}
