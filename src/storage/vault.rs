//! Storage over a versioned KV secrets engine
//!
//! Each key maps to one secret. Values are written and read through the data
//! path; deletion goes through the metadata path, which also purges every
//! stored version.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::auth::{provider_for, TokenProvider};
use crate::client::{HttpTransport, Method, Request, Response, Transport};
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::path::PathFormatter;
use crate::storage::{KeyInfo, Storage};
use crate::wire::{CertificateSecret, ReadResponse, VersionMetadata, WriteOptions, WriteRequest};

/// Latest live version of a secret
#[derive(Debug, Clone)]
pub(crate) struct SecretVersion {
    pub secret: CertificateSecret,
    pub metadata: VersionMetadata,
}

/// Storage backed by a secret store reachable through a [`Transport`]
pub struct VaultStorage {
    transport: Arc<dyn Transport>,
    session: Arc<dyn TokenProvider>,
    paths: PathFormatter,
    pub(crate) lock_timeout: Duration,
    pub(crate) lock_polling_interval: Duration,
    pub(crate) lock_compare_and_swap: bool,
}

impl VaultStorage {
    /// Create storage talking HTTP(S) to the configured address
    pub fn new(config: StorageConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(
            &config.address,
            config.insecure_skip_verify,
        )?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create storage over an arbitrary transport
    pub fn with_transport(config: StorageConfig, transport: Arc<dyn Transport>) -> Self {
        let session = provider_for(&config.auth, transport.clone());
        Self {
            transport,
            session,
            paths: PathFormatter::new(config.secrets_path, config.path_prefix),
            lock_timeout: config.lock_timeout,
            lock_polling_interval: config.lock_polling_interval,
            lock_compare_and_swap: config.lock_compare_and_swap,
        }
    }

    /// The credential session shared by every operation
    pub fn session(&self) -> &Arc<dyn TokenProvider> {
        &self.session
    }

    pub fn paths(&self) -> &PathFormatter {
        &self.paths
    }

    /// Revoke the dynamically obtained token, if any
    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await
    }

    /// Send an authenticated request
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        action: &str,
    ) -> Result<Response> {
        let token = self.session.token().await;
        let mut request = Request::new(method, path).token(token);
        request.body = body;

        self.transport.send(request).await.map_err(|e| {
            error!(
                "Unable to {}: url={} error={}",
                action,
                self.transport.url(path),
                e
            );
            e
        })
    }

    pub(crate) fn log_failure(&self, action: &str, path: &str, response: &Response) {
        error!(
            "Unable to {}: url={} vault_errors={} response_code={} response_body={}",
            action,
            self.transport.url(path),
            response.vault_errors(),
            response.status.as_u16(),
            response.text()
        );
    }

    /// Read the latest live version of `key`
    pub(crate) async fn read_secret(&self, key: &str, action: &str) -> Result<SecretVersion> {
        let path = self.paths.data(key);
        let response = self.send(Method::Get, &path, None, action).await?;

        if response.is_not_found() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        if !response.is_success() {
            self.log_failure(action, &path, &response);
            return Err(StorageError::Backend(response.error_message()));
        }

        let read: ReadResponse = response.json()?;
        if !read.data.is_live() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        Ok(SecretVersion {
            secret: read.data.data.unwrap_or_default(),
            metadata: read.data.metadata,
        })
    }

    /// Write a new version of `key`.
    ///
    /// With `cas` set, the write only happens if the current version matches;
    /// `Ok(false)` means the backend rejected that precondition.
    pub(crate) async fn write_secret(
        &self,
        key: &str,
        secret: CertificateSecret,
        cas: Option<u64>,
        action: &str,
    ) -> Result<bool> {
        let path = self.paths.data(key);
        let body = serde_json::to_value(WriteRequest {
            data: secret,
            options: cas.map(|cas| WriteOptions { cas }),
        })?;
        let response = self.send(Method::Post, &path, Some(body), action).await?;

        if response.is_success() {
            return Ok(true);
        }

        if cas.is_some() && response.is_cas_mismatch() {
            debug!(
                "{}: check-and-set rejected for key={}: {}",
                action,
                key,
                response.error_message()
            );
            return Ok(false);
        }

        self.log_failure(action, &path, &response);
        Err(StorageError::Backend(response.error_message()))
    }

    /// Delete every version of `key`
    pub(crate) async fn delete_secret(&self, key: &str, action: &str) -> Result<()> {
        let path = self.paths.metadata(key);
        let response = self.send(Method::Delete, &path, None, action).await?;

        if response.is_not_found() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        if !response.is_success() {
            self.log_failure(action, &path, &response);
            return Err(StorageError::Backend(response.error_message()));
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for VaultStorage {
    async fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        debug!("store: key={} url={}", key, self.transport.url(&self.paths.data(key)));
        self.write_secret(key, CertificateSecret::certificate(value), None, "store certificate")
            .await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Bytes> {
        debug!("load: key={} url={}", key, self.transport.url(&self.paths.data(key)));
        let version = self.read_secret(key, "load certificate").await?;
        Ok(Bytes::from(version.secret.certificate_payload.unwrap_or_default()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        debug!("delete: key={} url={}", key, self.transport.url(&self.paths.metadata(key)));
        self.delete_secret(key, "delete certificate").await
    }

    async fn exists(&self, key: &str) -> bool {
        debug!("exists: key={} url={}", key, self.transport.url(&self.paths.data(key)));
        match self.read_secret(key, "check certificate").await {
            Ok(version) => version
                .secret
                .certificate_payload
                .is_some_and(|payload| !payload.is_empty()),
            Err(_) => false,
        }
    }

    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
        debug!(
            "list: prefix={} recursive={} url={}",
            prefix,
            recursive,
            self.transport.url(&self.paths.metadata(prefix))
        );
        self.list_keys(prefix, recursive).await
    }

    async fn stat(&self, key: &str) -> Result<KeyInfo> {
        debug!("stat: key={} url={}", key, self.transport.url(&self.paths.data(key)));
        let version = self.read_secret(key, "stat certificate").await?;
        let size = version
            .secret
            .certificate_payload
            .as_ref()
            .map_or(0, |payload| payload.len() as u64);

        Ok(KeyInfo {
            key: key.to_string(),
            modified: version.metadata.created_time.unwrap_or_default(),
            size,
            is_terminal: true,
        })
    }

    async fn lock(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        self.acquire_lock(key, cancel).await
    }

    async fn unlock(&self, key: &str) -> Result<()> {
        self.release_lock(key).await
    }
}
