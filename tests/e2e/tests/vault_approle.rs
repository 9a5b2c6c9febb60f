//! Role login against a real server


use anyhow::Result;
use common::*;
use std::time::Duration;
use vault_cert_storage::auth::CredentialKind;
use vault_cert_storage::config::AuthConfig;
use vault_cert_storage::storage::Storage;

#[tokio::test]
async fn test_approle_login_and_storage() -> Result<()> {
    let harness = shared_harness().await;
    let ctx = harness.context()?;
    let approle = harness.approle("1h").await?;

    let storage = ctx.storage_with(AuthConfig::AppRole(approle))?;
    storage.store("approle.pem", b"via role").await?;
    assert_eq!(&ctx.storage().load("approle.pem").await?[..], b"via role");

    let credential = storage.session().credential().expect("logged in");
    assert_eq!(credential.kind(), CredentialKind::AppRole);

    storage.logout().await?;
    assert!(storage.session().credential().is_none());

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_renewed() -> Result<()> {
    let harness = shared_harness().await;
    let ctx = harness.context()?;
    let approle = harness.approle("2s").await?;

    let storage = ctx.storage_with(AuthConfig::AppRole(approle))?;
    storage.store("renew.pem", b"one").await?;
    let first = storage.session().credential().expect("logged in");

    tokio::time::sleep(Duration::from_millis(2500)).await;

    storage.store("renew.pem", b"two").await?;
    let second = storage.session().credential().expect("logged in");
    assert_ne!(first.token(), second.token());
    assert_eq!(&ctx.storage().load("renew.pem").await?[..], b"two");

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_secret_id_fails_requests() -> Result<()> {
    let harness = shared_harness().await;
    let ctx = harness.context()?;
    let mut approle = harness.approle("1h").await?;
    approle.secret_id = "not-the-secret".to_string();

    let storage = ctx.storage_with(AuthConfig::AppRole(approle))?;
    assert!(storage.store("denied.pem", b"x").await.is_err());
    assert!(storage.session().credential().is_none());

    ctx.cleanup().await?;
    Ok(())
}
