//! Vault container management for e2e tests

use anyhow::{Context, Result};
use bollard::container::{Config, CreateContainerOptions, StartContainerOptions};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const VAULT_IMAGE: &str = "hashicorp/vault:latest";
const VAULT_CONTAINER_NAME: &str = "vault-cert-storage-e2e-vault";
const DEFAULT_ROOT_TOKEN: &str = "root";
const DEFAULT_PORT: u16 = 8200;

/// KV v2 engine mounted by a dev-mode server
pub const DEV_SECRETS_PATH: &str = "secret";

/// Manages a dev-mode Vault container for testing
pub struct VaultContainer {
    docker: Option<Docker>,
    container_id: Option<String>,
    address: String,
    root_token: String,
    keep_alive: bool,
}

impl VaultContainer {
    /// Start or connect to a Vault server
    ///
    /// Environment variables:
    /// - `VAULT_ADDR`: Use an existing server at this address (for CI)
    /// - `VAULT_TOKEN`: Root token (default: root)
    /// - `KEEP_VAULT`: If set, don't stop the container
    pub async fn start() -> Result<Self> {
        let root_token = env::var("VAULT_TOKEN").unwrap_or_else(|_| DEFAULT_ROOT_TOKEN.to_string());
        let keep_alive = env::var("KEEP_VAULT").is_ok();

        if let Ok(address) = env::var("VAULT_ADDR") {
            info!("Using existing Vault at {}", address);
            Self::wait_for_vault(&address).await?;

            return Ok(Self {
                docker: None,
                container_id: None,
                address,
                root_token,
                keep_alive: true, // Never stop external Vault
            });
        }

        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker. Is Docker running?")?;

        let containers = docker
            .list_containers::<String>(None)
            .await
            .context("Failed to list containers")?;

        let existing = containers.iter().find(|c| {
            c.names
                .as_ref()
                .map(|names| names.iter().any(|n| n.contains(VAULT_CONTAINER_NAME)))
                .unwrap_or(false)
        });

        let container_id = if let Some(container) = existing {
            let id = container.id.clone().unwrap_or_default();
            info!("Found existing Vault container: {}", id);

            let inspect = docker.inspect_container(&id, None).await?;
            if !inspect.state.as_ref().map(|s| s.running.unwrap_or(false)).unwrap_or(false) {
                info!("Starting stopped Vault container");
                docker.start_container(&id, None::<StartContainerOptions<String>>).await?;
            }
            id
        } else {
            info!("Pulling Vault image...");
            let mut stream = docker.create_image(
                Some(CreateImageOptions {
                    from_image: VAULT_IMAGE,
                    ..Default::default()
                }),
                None,
                None,
            );
            while let Some(result) = stream.next().await {
                if let Err(e) = result {
                    warn!("Image pull warning: {}", e);
                }
            }

            info!("Creating Vault container...");
            let mut port_bindings = HashMap::new();
            port_bindings.insert(
                "8200/tcp".to_string(),
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(DEFAULT_PORT.to_string()),
                }]),
            );

            let host_config = HostConfig {
                port_bindings: Some(port_bindings),
                cap_add: Some(vec!["IPC_LOCK".to_string()]),
                ..Default::default()
            };

            let env_token = format!("VAULT_DEV_ROOT_TOKEN_ID={}", root_token);
            let env_listen = format!("VAULT_DEV_LISTEN_ADDRESS=0.0.0.0:{}", DEFAULT_PORT);
            let config = Config {
                image: Some(VAULT_IMAGE),
                env: Some(vec![&env_token, &env_listen]),
                cmd: Some(vec!["server", "-dev"]),
                host_config: Some(host_config),
                ..Default::default()
            };

            let container = docker
                .create_container(
                    Some(CreateContainerOptions {
                        name: VAULT_CONTAINER_NAME,
                        platform: None,
                    }),
                    config,
                )
                .await
                .context("Failed to create Vault container")?;

            docker
                .start_container(&container.id, None::<StartContainerOptions<String>>)
                .await
                .context("Failed to start Vault container")?;

            info!("Vault container started: {}", container.id);
            container.id
        };

        let address = format!("http://localhost:{}", DEFAULT_PORT);
        Self::wait_for_vault(&address).await?;

        Ok(Self {
            docker: Some(docker),
            container_id: Some(container_id),
            address,
            root_token,
            keep_alive,
        })
    }

    async fn wait_for_vault(address: &str) -> Result<()> {
        info!("Waiting for Vault to be ready...");
        let client = reqwest::Client::new();
        let url = format!("{}/v1/sys/health", address.trim_end_matches('/'));
        let max_attempts = 30;

        for attempt in 1..=max_attempts {
            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    info!("Vault is ready");
                    return Ok(());
                }
                Ok(response) => debug!("Vault not ready yet (attempt {}): {}", attempt, response.status()),
                Err(e) => debug!("Vault not ready yet (attempt {}): {}", attempt, e),
            }
            sleep(Duration::from_secs(1)).await;
        }

        Err(anyhow::anyhow!(
            "Vault failed to become ready after {} attempts",
            max_attempts
        ))
    }

    /// Call the Vault API directly with the root token
    ///
    /// Returns the parsed body, or `Value::Null` for empty responses.
    pub async fn api(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/v1/{}", self.address.trim_end_matches('/'), path);
        let mut request = reqwest::Client::new()
            .request(method.clone(), &url)
            .header("X-Vault-Token", &self.root_token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.with_context(|| format!("{} {} failed", method, url))?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!("{} {} returned {}: {}", method, url, status, text));
        }

        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Vault address without the API version
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn root_token(&self) -> &str {
        &self.root_token
    }

    /// Stop and remove the container
    pub async fn stop(self) -> Result<()> {
        if self.keep_alive {
            info!("Keeping Vault container alive (KEEP_VAULT is set)");
            return Ok(());
        }

        if let (Some(docker), Some(container_id)) = (&self.docker, &self.container_id) {
            info!("Stopping Vault container: {}", container_id);
            docker
                .stop_container(container_id, None)
                .await
                .context("Failed to stop Vault container")?;

            docker
                .remove_container(container_id, None)
                .await
                .context("Failed to remove Vault container")?;
        }

        Ok(())
    }
}
