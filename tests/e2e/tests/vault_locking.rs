//! Locking against a real server


use anyhow::Result;
use common::*;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use vault_cert_storage::storage::Storage;

#[tokio::test]
async fn test_lock_and_unlock() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    let storage = ctx.storage();
    let cancel = CancellationToken::new();

    storage.lock("example.com", &cancel).await?;
    assert!(storage.stat("example.com.lock").await.is_ok());

    storage.unlock("example.com").await?;
    assert!(storage.stat("example.com.lock").await.unwrap_err().is_not_found());

    // Released: a second acquisition does not wait
    let start = Instant::now();
    storage.lock("example.com", &cancel).await?;
    assert!(start.elapsed() < TEST_LOCK_TIMEOUT);
    storage.unlock("example.com").await?;

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_contender_waits_for_expiry() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    let cancel = CancellationToken::new();

    ctx.storage().lock("busy.com", &cancel).await?;

    let contender = ctx.contender()?;
    let start = Instant::now();
    contender.lock("busy.com", &cancel).await?;
    let waited = start.elapsed();

    assert!(
        waited >= TEST_LOCK_TIMEOUT - Duration::from_millis(500),
        "acquired after only {:?}",
        waited
    );
    contender.unlock("busy.com").await?;

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_cancel_while_waiting() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    ctx.storage().lock("cancel.com", &CancellationToken::new()).await?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let contender = ctx.contender()?;
    let err = contender.lock("cancel.com", &cancel).await.unwrap_err();
    assert!(err.is_cancelled());

    ctx.storage().unlock("cancel.com").await?;
    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_unlock_without_lock_succeeds_or_not_found() -> Result<()> {
    let ctx = shared_harness().await.context()?;

    // Vault answers a metadata delete of an absent key with 204
    match ctx.storage().unlock("never-locked.com").await {
        Ok(()) => {}
        Err(e) => assert!(e.is_not_found(), "unexpected error: {:?}", e),
    }

    ctx.cleanup().await?;
    Ok(())
}
