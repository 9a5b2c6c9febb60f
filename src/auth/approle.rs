//! Role login token provider.
//!
//! Logs in with a role id / secret id pair and caches the issued token until
//! its lease runs out. Expiry is detected lazily on the next `token()` call;
//! there is no background renewal, so a request already in flight when the
//! lease ends is not renewed mid-flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use super::{Credential, TokenProvider};
use crate::client::{Method, Request, Transport};
use crate::config::AppRoleConfig;
use crate::error::{Result, StorageError};
use crate::wire::{LoginRequest, LoginResponse};

/// A token provider that logs in with role credentials.
///
/// The cached credential is swapped atomically: concurrent callers see
/// either the old or the new `Arc<Credential>`, never a partial update.
/// Two callers racing past an expired credential may both log in; the last
/// login wins the cache.
pub struct AppRoleProvider {
    config: AppRoleConfig,
    transport: Arc<dyn Transport>,
    cached: RwLock<Option<Arc<Credential>>>,
}

impl AppRoleProvider {
    pub fn new(config: AppRoleConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            cached: RwLock::new(None),
        }
    }

    /// Perform a login exchange and cache the resulting credential
    pub async fn login(&self) -> Result<Arc<Credential>> {
        info!("Logging in using approle credentials");

        let url = self.transport.url(&self.config.login_path);
        let body = LoginRequest {
            role_id: self.config.role_id.clone(),
            secret_id: self.config.secret_id.clone(),
        };
        let request = Request::new(Method::Post, &self.config.login_path).json(&body)?;

        let response = self.transport.send(request).await.map_err(|e| {
            error!("Login using approle credentials failed: url={} error={}", url, e);
            e
        })?;

        if !response.is_success() {
            error!(
                "Login using approle credentials failed: url={} vault_errors={} response_code={} response_body={}",
                url,
                response.vault_errors(),
                response.status.as_u16(),
                response.text()
            );
            return Err(StorageError::Auth(response.error_message()));
        }

        let auth = response
            .json::<LoginResponse>()?
            .auth
            .ok_or_else(|| StorageError::Auth("login response has no auth section".to_string()))?;

        let credential = Arc::new(Credential::leased(
            auth.client_token,
            Duration::from_secs(auth.lease_duration),
        ));
        *self.cached.write() = Some(credential.clone());

        Ok(credential)
    }
}

#[async_trait]
impl TokenProvider for AppRoleProvider {
    async fn token(&self) -> String {
        if let Some(credential) = self.credential() {
            if !credential.is_expired() {
                debug!("Using approle client token for auth");
                return credential.token().to_string();
            }

            let expired_for = credential
                .expires_at()
                .map(|at| at.elapsed())
                .unwrap_or_default();
            warn!("Approle client token expired {:?} ago", expired_for);
        }

        match self.login().await {
            Ok(credential) => {
                debug!("Using newly created approle token for auth");
                credential.token().to_string()
            }
            Err(e) => {
                warn!("No approle token available: {}", e);
                String::new()
            }
        }
    }

    fn credential(&self) -> Option<Arc<Credential>> {
        self.cached.read().clone()
    }

    async fn logout(&self) -> Result<()> {
        let Some(credential) = self.credential() else {
            return Ok(());
        };

        let url = self.transport.url(&self.config.logout_path);
        let request = Request::new(Method::Post, &self.config.logout_path)
            .token(credential.token())
            .json(&serde_json::json!({}))?;

        let response = self.transport.send(request).await.map_err(|e| {
            error!("Logout using approle credentials failed: url={} error={}", url, e);
            e
        })?;

        if !response.is_success() {
            error!(
                "Logout using approle credentials failed: url={} vault_errors={} response_code={} response_body={}",
                url,
                response.vault_errors(),
                response.status.as_u16(),
                response.text()
            );
            return Err(StorageError::Auth(response.error_message()));
        }

        // Only forget the credential we revoked; a concurrent login may have
        // already replaced it.
        let mut cached = self.cached.write();
        if cached.as_ref().is_some_and(|c| Arc::ptr_eq(c, &credential)) {
            *cached = None;
        }

        Ok(())
    }
}
