//! Distributed locking
//!
//! A lock on `key` is a record stored at `key.lock` carrying its expiration
//! time. Holders never refresh it: once the expiration has passed, any
//! contender may reclaim the lock. Waiting is done by polling.
//!
//! By default acquisition is read-then-write, so two contenders that both
//! see the lock free may both believe they hold it. With
//! `lock.compare_and_swap` enabled, the write carries the version that was
//! read and the backend rejects it if another contender got there first.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::path::lock_key;
use crate::storage::VaultStorage;
use crate::wire::CertificateSecret;

/// What a single poll observed about a lock record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockState {
    /// No record, or a record without an expiration; `version` is 0 if absent
    Free { version: u64 },
    /// Someone holds the lock until `expires_at`
    Held { expires_at: DateTime<Utc> },
    /// A record whose expiration has passed
    Expired { version: u64, expires_at: DateTime<Utc> },
}

impl VaultStorage {
    async fn lock_state(&self, lock: &str) -> Result<LockState> {
        let version = match self.read_secret(lock, "get lock").await {
            Ok(version) => version,
            Err(StorageError::NotFound(_)) => return Ok(LockState::Free { version: 0 }),
            Err(e) => return Err(e),
        };

        let state = match version.secret.lock_expiration {
            None => LockState::Free {
                version: version.metadata.version,
            },
            Some(expires_at) if Utc::now() > expires_at => LockState::Expired {
                version: version.metadata.version,
                expires_at,
            },
            Some(expires_at) => LockState::Held { expires_at },
        };

        Ok(state)
    }

    /// Write a fresh lock record. Returns false if a check-and-set write lost
    /// the race.
    async fn write_lock(&self, lock: &str, version: u64) -> Result<bool> {
        let lifetime = chrono::Duration::from_std(self.lock_timeout)
            .map_err(|e| StorageError::Config(format!("lock timeout out of range: {}", e)))?;
        let expires_at = Utc::now() + lifetime;
        let owner = Uuid::new_v4().to_string();
        let cas = self.lock_compare_and_swap.then_some(version);

        let written = self
            .write_secret(lock, CertificateSecret::lock(expires_at, owner.clone()), cas, "create lock")
            .await?;

        if written {
            debug!("Lock written: key={} owner={} expires={}", lock, owner, expires_at);
        }
        Ok(written)
    }

    /// One acquisition attempt. Returns true once the lock is ours.
    async fn try_acquire(&self, key: &str, lock: &str) -> Result<bool> {
        match self.lock_state(lock).await? {
            LockState::Free { version } => self.write_lock(lock, version).await,
            LockState::Expired { version, expires_at } => {
                info!("Lock for {} expired at {}, reclaiming", key, expires_at);

                if !self.lock_compare_and_swap {
                    match self.release_lock(key).await {
                        Ok(()) | Err(StorageError::NotFound(_)) => {}
                        Err(e) => return Err(e),
                    }
                    return self.write_lock(lock, 0).await;
                }

                self.write_lock(lock, version).await
            }
            LockState::Held { expires_at } => {
                debug!("Lock for {} is held until {}", key, expires_at);
                Ok(false)
            }
        }
    }

    pub(crate) async fn acquire_lock(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        let lock = lock_key(key);
        debug!("lock: key={} url={}", key, self.paths().data(&lock));

        loop {
            if self.try_acquire(key, &lock).await? {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Waiting for lock on {} cancelled", key);
                    return Err(StorageError::Cancelled);
                }
                _ = tokio::time::sleep(self.lock_polling_interval) => {}
            }
        }
    }

    pub(crate) async fn release_lock(&self, key: &str) -> Result<()> {
        let lock = lock_key(key);
        debug!("unlock: key={} url={}", key, self.paths().metadata(&lock));
        self.delete_secret(&lock, "remove lock").await
    }
}
