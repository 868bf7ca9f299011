//! TorrentClientConfiguration health-check flows

mod common;

use common::{condition, configuration, credentials_secret, secret, Harness, NAMESPACE};
use kube_runtime::controller::Action;
use qbittorrent_operator::controller::reconciler::client_configuration::reconcile;
use qbittorrent_operator::crd::{TorrentClientConfiguration, TorrentClientConfigurationStatus};
use qbittorrent_operator::store::ObjectStore;
use std::time::Duration;

async fn status_after_reconcile(h: &Harness, name: &str) -> (Action, TorrentClientConfigurationStatus) {
    let action = reconcile(&h.ctx, NAMESPACE, name)
        .await
        .expect("reconcile should not fail");
    let stored: TorrentClientConfiguration = h
        .stores
        .configurations
        .get(NAMESPACE, name)
        .await
        .unwrap()
        .unwrap();
    (action, stored.status.unwrap())
}

fn degraded_reason(status: &TorrentClientConfigurationStatus) -> (&str, &str) {
    let degraded = condition(&status.conditions, "Degraded");
    assert_eq!(degraded.status, "True");
    (
        degraded.reason.as_deref().unwrap(),
        degraded.message.as_deref().unwrap(),
    )
}

#[tokio::test]
async fn test_connected_configuration_is_available() {
    let h = Harness::new();
    h.stores
        .secrets
        .insert(credentials_secret("qbt-credentials"))
        .await
        .unwrap();
    h.stores
        .configurations
        .insert(configuration("home", "qbt-credentials"))
        .await
        .unwrap();

    let (action, status) = status_after_reconcile(&h, "home").await;

    assert_eq!(action, Action::requeue(Duration::from_secs(60)));
    assert!(status.connected);
    assert_eq!(status.qbittorrent_version.as_deref(), Some("v5.1.4"));
    assert!(status.last_checked.is_some());
    let available = condition(&status.conditions, "Available");
    assert_eq!(available.reason.as_deref(), Some("Connected"));
    assert_eq!(
        available.message.as_deref(),
        Some("Successfully connected to qBittorrent at http://qbittorrent.media.svc:8080")
    );
    assert!(status.conditions.iter().all(|c| c.r#type != "Degraded"));
}

#[tokio::test]
async fn test_missing_secret() {
    let h = Harness::new();
    h.stores
        .configurations
        .insert(configuration("home", "absent"))
        .await
        .unwrap();

    let (action, status) = status_after_reconcile(&h, "home").await;

    assert_eq!(action, Action::requeue(Duration::from_secs(60)));
    assert!(!status.connected);
    let (reason, message) = degraded_reason(&status);
    assert_eq!(reason, "SecretNotFound");
    assert!(message.starts_with("Credentials secret \"absent\" not found"));
}

#[tokio::test]
async fn test_secret_without_password() {
    let h = Harness::new();
    h.stores
        .secrets
        .insert(secret("qbt-credentials", &[("username", "admin")]))
        .await
        .unwrap();
    h.stores
        .configurations
        .insert(configuration("home", "qbt-credentials"))
        .await
        .unwrap();

    let (_, status) = status_after_reconcile(&h, "home").await;

    let (reason, message) = degraded_reason(&status);
    assert_eq!(reason, "SecretInvalid");
    assert_eq!(
        message,
        "Credentials secret \"qbt-credentials\" missing 'username' or 'password' key"
    );
}

#[tokio::test]
async fn test_login_failure_is_client_creation_failure() {
    let h = Harness::new();
    h.stores
        .secrets
        .insert(credentials_secret("qbt-credentials"))
        .await
        .unwrap();
    h.stores
        .configurations
        .insert(configuration("home", "qbt-credentials"))
        .await
        .unwrap();
    h.fail(&h.connector.fail_login);

    let (_, status) = status_after_reconcile(&h, "home").await;

    let (reason, message) = degraded_reason(&status);
    assert_eq!(reason, "ClientCreationFailed");
    assert!(message.starts_with("Failed to create qBittorrent client for http://qbittorrent.media.svc:8080"));
    assert!(!status.connected);
}

#[tokio::test]
async fn test_invalid_url_is_client_creation_failure() {
    let h = Harness::new();
    h.stores
        .secrets
        .insert(credentials_secret("qbt-credentials"))
        .await
        .unwrap();
    let mut bad = configuration("home", "qbt-credentials");
    bad.spec.url = "ftp://qbittorrent".to_string();
    h.stores.configurations.insert(bad).await.unwrap();

    let (_, status) = status_after_reconcile(&h, "home").await;

    let (reason, _) = degraded_reason(&status);
    assert_eq!(reason, "ClientCreationFailed");
    assert_eq!(h.connector.logins.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_version_failure_is_health_check_failure() {
    let h = Harness::new();
    h.stores
        .secrets
        .insert(credentials_secret("qbt-credentials"))
        .await
        .unwrap();
    h.stores
        .configurations
        .insert(configuration("home", "qbt-credentials"))
        .await
        .unwrap();
    h.fail(&h.engine().fail_version);

    let (_, status) = status_after_reconcile(&h, "home").await;

    let (reason, message) = degraded_reason(&status);
    assert_eq!(reason, "HealthCheckFailed");
    assert!(message.starts_with("qBittorrent health check failed at http://qbittorrent.media.svc:8080"));
}

#[tokio::test]
async fn test_recovery_flips_back_to_available() {
    let h = Harness::new();
    h.stores
        .configurations
        .insert(configuration("home", "qbt-credentials"))
        .await
        .unwrap();

    let (_, status) = status_after_reconcile(&h, "home").await;
    assert!(!status.connected);

    h.stores
        .secrets
        .insert(credentials_secret("qbt-credentials"))
        .await
        .unwrap();
    let (_, status) = status_after_reconcile(&h, "home").await;

    assert!(status.connected);
    assert_eq!(condition(&status.conditions, "Available").status, "True");
    assert!(status.conditions.iter().all(|c| c.r#type != "Degraded"));
}

#[tokio::test]
async fn test_check_interval_is_honoured_and_falls_back() {
    let h = Harness::new();
    h.stores
        .secrets
        .insert(credentials_secret("qbt-credentials"))
        .await
        .unwrap();
    let mut fast = configuration("fast", "qbt-credentials");
    fast.spec.check_interval = Some("1m30s".to_string());
    h.stores.configurations.insert(fast).await.unwrap();
    let mut broken = configuration("broken", "qbt-credentials");
    broken.spec.check_interval = Some("soon".to_string());
    h.stores.configurations.insert(broken).await.unwrap();

    let (action, _) = status_after_reconcile(&h, "fast").await;
    assert_eq!(action, Action::requeue(Duration::from_secs(90)));

    let (action, _) = status_after_reconcile(&h, "broken").await;
    assert_eq!(action, Action::requeue(Duration::from_secs(60)));
}
