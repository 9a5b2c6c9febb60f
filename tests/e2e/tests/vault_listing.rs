//! Listing against a real server


use anyhow::Result;
use common::*;
use vault_cert_storage::storage::Storage;

async fn seed(ctx: &TestContext<'_>) -> Result<()> {
    for key in LISTING_FIXTURE {
        ctx.storage().store(key, key.as_bytes()).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_recursive_listing_order() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    seed(&ctx).await?;

    let keys = ctx.storage().list("", true).await?;
    assert_eq!(
        keys,
        vec![
            "foo.bar.baz",
            "foo.bar.com",
            "production/test1.baz.com",
            "production/test2.baz.com",
            "production/test3.baz.com",
            "staging/abc123/test3.whatever.com",
            "staging/abc456/test1.whatever.com",
            "staging/abc456/test3.whatever.com",
            "staging/test3.baz.com",
            "staging/test3.quux.org",
        ]
    );

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_non_recursive_listing_skips_groups() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    seed(&ctx).await?;

    assert_eq!(ctx.storage().list("", false).await?, vec!["foo.bar.baz", "foo.bar.com"]);
    assert_eq!(
        ctx.storage().list("staging", false).await?,
        vec!["staging/test3.baz.com", "staging/test3.quux.org"]
    );

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_recursive_listing_of_group() -> Result<()> {
    let ctx = shared_harness().await.context()?;
    seed(&ctx).await?;

    assert_eq!(
        ctx.storage().list("staging/", true).await?,
        vec![
            "staging/abc123/test3.whatever.com",
            "staging/abc456/test1.whatever.com",
            "staging/abc456/test3.whatever.com",
            "staging/test3.baz.com",
            "staging/test3.quux.org",
        ]
    );

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn test_listing_empty_prefix_is_not_found() -> Result<()> {
    let ctx = shared_harness().await.context()?;

    let err = ctx.storage().list("", true).await.unwrap_err();
    assert!(err.is_not_found());

    ctx.cleanup().await?;
    Ok(())
}
