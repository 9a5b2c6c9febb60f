//! vault-cert-storage: certificate storage on a versioned KV secrets engine
//!
//! This library stores certificates, keys and related blobs as secrets in a
//! KV version 2 engine and coordinates exclusive access between processes
//! sharing that engine.
//!
//! # Architecture
//!
//! - **Transport**: Sends requests to the secret store. `HttpTransport` talks
//!   to a real server; `MemoryTransport` emulates one in-process.
//! - **Auth**: Supplies the token for each request, either a static token or
//!   a role login that is renewed lazily when its lease runs out.
//! - **Storage**: The `Storage` trait and its `VaultStorage` implementation:
//!   store/load/delete/exists/stat, recursive listing and polling locks.
//!
//! # Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use vault_cert_storage::config::Config;
//! use vault_cert_storage::storage::{Storage, VaultStorage};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file(&"config.yaml".into())?;
//! let storage = VaultStorage::new(config.storage)?;
//!
//! let cancel = CancellationToken::new();
//! storage.lock("example.com", &cancel).await?;
//! storage.store("example.com/cert.pem", b"-----BEGIN CERTIFICATE-----").await?;
//! storage.unlock("example.com").await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod env;
pub mod error;
pub mod path;
pub mod storage;
pub mod wire;

pub use error::{Result, StorageError};
