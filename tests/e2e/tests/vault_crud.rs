//! Store, load, stat and delete against a real server


use anyhow::Result;
use common::*;
use vault_cert_storage::storage::Storage;

#[tokio::test]
async fn test_store_and_load() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    let storage = ctx.storage();

    storage.store("example.com/cert.pem", b"-----BEGIN CERTIFICATE-----").await?;
    let value = storage.load("example.com/cert.pem").await?;
    assert_eq!(&value[..], b"-----BEGIN CERTIFICATE-----");
    assert!(storage.exists("example.com/cert.pem").await);

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_overwrite_returns_latest_value() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    let storage = ctx.storage();

    storage.store("overwrite", b"first").await?;
    storage.store("overwrite", b"second").await?;
    assert_eq!(&storage.load("overwrite").await?[..], b"second");

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_binary_payload_survives() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    let storage = ctx.storage();

    let payload: Vec<u8> = (0..=255u8).collect();
    storage.store("binary.der", &payload).await?;
    assert_eq!(storage.load("binary.der").await?.to_vec(), payload);

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_missing_key_is_not_found() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    let storage = ctx.storage();

    assert!(storage.load("missing").await.unwrap_err().is_not_found());
    assert!(storage.stat("missing").await.unwrap_err().is_not_found());
    assert!(!storage.exists("missing").await);

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_stat_reports_size_and_time() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    let storage = ctx.storage();

    let before = unix_time_minute_ago();
    storage.store("stat.pem", b"12345").await?;

    let info = storage.stat("stat.pem").await?;
    assert_eq!(info.key, "stat.pem");
    assert_eq!(info.size, 5);
    assert!(info.is_terminal);
    assert!(info.modified.timestamp() > before);

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_delete_removes_all_versions() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    let storage = ctx.storage();

    storage.store("delete.pem", b"v1").await?;
    storage.store("delete.pem", b"v2").await?;
    storage.delete("delete.pem").await?;

    assert!(storage.load("delete.pem").await.unwrap_err().is_not_found());
    assert!(!storage.exists("delete.pem").await);

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_keys_are_case_insensitive() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    let storage = ctx.storage();

    storage.store("Example.COM", b"value").await?;
    assert_eq!(&storage.load("example.com").await?[..], b"value");

    ctx.cleanup().await?;
    Ok(())
}

fn unix_time_minute_ago() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch");
    now.as_secs() as i64 - 60
}
