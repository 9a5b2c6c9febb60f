pub mod list;
pub mod lock;
pub mod vault;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use vault::VaultStorage;

/// Metadata for a stored key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
    /// Always true: the backend has no directory entries, every listed key is a leaf
    pub is_terminal: bool,
}

/// Key-value storage with filesystem-like semantics
///
/// Keys are slash-delimited paths. Every mutation is immediately visible to
/// subsequent reads; nothing is cached client-side. `lock`/`unlock` coordinate
/// exclusive access to a key across processes sharing the same backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `value` at `key`, replacing any previous value
    async fn store(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Read the value at `key`
    ///
    /// Returns `NotFound` if the key was never written or was deleted.
    async fn load(&self, key: &str) -> Result<Bytes>;

    /// Delete `key` and all of its versions
    async fn delete(&self, key: &str) -> Result<()>;

    /// True only if `key` holds a non-empty value
    ///
    /// Every failure, transient or not, collapses to `false`. Use `load` or
    /// `stat` to tell "missing" from "unreachable".
    async fn exists(&self, key: &str) -> bool;

    /// List keys under `prefix`, descending into nested groups if `recursive`
    ///
    /// Order follows the backend's enumeration, depth first. Returns
    /// `NotFound` if nothing lives under `prefix`.
    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>>;

    /// Metadata for `key`
    async fn stat(&self, key: &str) -> Result<KeyInfo>;

    /// Block until the lock for `key` is acquired or `cancel` fires
    async fn lock(&self, key: &str, cancel: &CancellationToken) -> Result<()>;

    /// Release the lock for `key`
    ///
    /// Returns `NotFound` if no lock record exists.
    async fn unlock(&self, key: &str) -> Result<()>;
}
