use anyhow::Result;
use fkey_updater::config::UpdaterConfig;
use fkey_updater::core::ErrorKind;
use fkey_updater::test_utils::{CannedResponse, TestHttpServer, init_test_logging};
use fkey_updater::upgrade::UpdaterService;
use std::sync::Arc;

async fn service_for(server: &TestHttpServer, current: &str) -> Result<UpdaterService> {
    let config = UpdaterConfig::new(current).with_version_url_template(server.url("/VERSION"));
    Ok(UpdaterService::new(config)?)
}

#[tokio::test]
async fn test_update_available() -> Result<()> {
    init_test_logging(None);
    let server = TestHttpServer::start().await?;
    server.route("/VERSION", CannedResponse::ok("v1.3.0\n"));

    let service = service_for(&server, "1.2.0").await?;
    let decision = service.check_for_updates(false).await?;

    assert!(decision.available);
    assert_eq!(decision.current_version, "1.2.0");
    assert_eq!(decision.latest_version, "v1.3.0");
    assert_eq!(decision.asset_name, "FKey-v1.3.0-portable.zip");
    assert_eq!(
        decision.download_url,
        "https://github.com/miken90/fkey/releases/download/v1.3.0/FKey-v1.3.0-portable.zip"
    );
    assert_eq!(decision.release_url, "https://github.com/miken90/fkey/releases/tag/v1.3.0");

    Ok(())
}

#[tokio::test]
async fn test_same_version_not_available() -> Result<()> {
    let server = TestHttpServer::start().await?;
    server.route("/VERSION", CannedResponse::ok("1.3.0"));

    let service = service_for(&server, "v1.3.0").await?;
    let decision = service.check_for_updates(false).await?;
    assert!(!decision.available);
    assert_eq!(decision.latest_version, "v1.3.0");

    Ok(())
}

#[tokio::test]
async fn test_cached_within_interval_and_forced_refetch() -> Result<()> {
    let server = TestHttpServer::start().await?;
    server.route("/VERSION", CannedResponse::ok("1.3.0"));
    let service = service_for(&server, "1.2.0").await?;

    let first = service.check_for_updates(false).await?;
    let second = service.check_for_updates(false).await?;
    assert_eq!(first, second);
    assert_eq!(server.hits("/VERSION"), 1);

    // A newer publish is only seen when forced
    server.route("/VERSION", CannedResponse::ok("1.4.0"));
    assert_eq!(service.check_for_updates(false).await?.latest_version, "v1.3.0");
    assert_eq!(service.check_for_updates(true).await?.latest_version, "v1.4.0");
    assert_eq!(server.hits("/VERSION"), 2);

    Ok(())
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_decision() -> Result<()> {
    let server = TestHttpServer::start().await?;
    server.route("/VERSION", CannedResponse::ok("1.3.0"));
    let service = service_for(&server, "1.2.0").await?;

    let decision = service.check_for_updates(false).await?;
    let stamped = service.cached().await.map(|entry| entry.checked_at);

    server.route("/VERSION", CannedResponse::status(500, "boom"));
    let err = service.check_for_updates(true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);

    assert_eq!(service.cached().await.map(|entry| entry.checked_at), stamped);
    assert_eq!(service.check_for_updates(false).await?, decision);
    assert_eq!(server.hits("/VERSION"), 2);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_checks_fetch_once() -> Result<()> {
    let server = TestHttpServer::start().await?;
    server.route("/VERSION", CannedResponse::ok("1.3.0"));
    let service = Arc::new(service_for(&server, "1.2.0").await?);

    let mut handles = Vec::new();
    for _ in 0..6 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move { service.check_for_updates(false).await }));
    }
    for handle in handles {
        assert!(handle.await??.available);
    }
    assert_eq!(server.hits("/VERSION"), 1);

    Ok(())
}

#[tokio::test]
async fn test_decision_json_uses_camel_case() -> Result<()> {
    let server = TestHttpServer::start().await?;
    server.route("/VERSION", CannedResponse::ok("1.3.0"));
    let service = service_for(&server, "1.2.0").await?;

    let json = serde_json::to_value(service.check_for_updates(false).await?)?;
    assert_eq!(json["available"], true);
    assert_eq!(json["currentVersion"], "1.2.0");
    assert_eq!(json["latestVersion"], "v1.3.0");
    assert_eq!(json["assetName"], "FKey-v1.3.0-portable.zip");
    assert!(json["releaseNotesURL"].is_string());
    assert!(json["assetSize"].is_null());

    Ok(())
}
