//! Reconnection loop behavior as seen through the whole layer: the log
//! feed, stop semantics and the notifications derived from them.

mod common;

use std::time::Duration;
use tokio::time::sleep;

use common::{health_url, settle, TestLayerBuilder, SERVER, STALE_SERVER};
use poslink::adapters::mock::MockResponse;
use poslink::config::ResilienceConfig;
use poslink::reconnect::{LogLevel, ReconnectStatus};
use poslink::traits::{NetworkStatus, SnackbarKind};

#[tokio::test(start_paused = true)]
async fn test_log_feed_stays_bounded() {
    let config = ResilienceConfig::default().with_cycle_delay(Duration::from_secs(1));
    let t = TestLayerBuilder::new()
        .with_config(config)
        .with_network(NetworkStatus::offline())
        .build();

    assert!(t.layer.reconnector().start_auto_reconnect());
    sleep(Duration::from_secs(40)).await;

    let state = t.layer.reconnector().state();
    assert!(state.attempts > 30);
    assert_eq!(state.logs.len(), 50);
    assert!(state
        .logs
        .iter()
        .zip(state.logs.iter().skip(1))
        .all(|(newer, older)| newer.seq == older.seq + 1));
    assert!(state
        .logs
        .iter()
        .any(|entry| entry.level == LogLevel::Error && entry.message == "Sin conexión WiFi"));
}

#[tokio::test(start_paused = true)]
async fn test_stop_takes_effect_immediately() {
    let t = TestLayerBuilder::new().with_last_known(STALE_SERVER).build();
    t.http
        .set_response(&health_url(STALE_SERVER), MockResponse::refused());

    assert!(t.layer.coordinator().retry());
    sleep(Duration::from_secs(3)).await;
    assert_eq!(
        t.layer.reconnector().state().status,
        ReconnectStatus::CheckingHealth
    );

    t.layer.reconnector().stop_auto_reconnect();
    let stopped = t.layer.reconnector().state();
    assert!(!stopped.is_reconnecting);
    assert!(!t.layer.reconnector().is_running());

    let requests = t.http.total_requests();
    sleep(Duration::from_secs(60)).await;

    assert_eq!(t.layer.reconnector().state().logs, stopped.logs);
    assert_eq!(t.http.total_requests(), requests);
    assert!(!t.layer.coordinator().state().is_searching);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_notifications() {
    let t = TestLayerBuilder::new().with_last_known(STALE_SERVER).build();
    t.http
        .set_response(&health_url(STALE_SERVER), MockResponse::refused());
    t.http.set_response(&health_url(SERVER), MockResponse::healthy());
    t.discovery
        .set_rediscovery_result(Ok(Some(SERVER.to_string())));

    assert!(t.layer.coordinator().retry());
    sleep(Duration::from_secs(5)).await;

    assert_eq!(
        t.sink.messages(),
        vec![
            "Verificando servidor...".to_string(),
            "Buscando servidor en la red...".to_string(),
            format!("Servidor encontrado en {}", SERVER),
            "Conexión restablecida".to_string(),
        ]
    );
    let restored: Vec<_> = t
        .sink
        .shown()
        .into_iter()
        .filter(|s| s.kind == SnackbarKind::Success)
        .collect();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].message, "Conexión restablecida");
}

#[tokio::test(start_paused = true)]
async fn test_quick_recovery_shows_one_confirmation() {
    let t = TestLayerBuilder::new().with_last_known(SERVER).build();
    t.http.set_response(&health_url(SERVER), MockResponse::healthy());

    assert!(t.layer.coordinator().retry());
    sleep(Duration::from_secs(1)).await;

    assert_eq!(
        t.sink.messages(),
        vec![
            "Verificando servidor...".to_string(),
            "Conexión restablecida".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_notifications_when_signed_out() {
    let t = TestLayerBuilder::new()
        .with_network(NetworkStatus::offline())
        .signed_out()
        .build();

    t.layer.reconnector().start_auto_reconnect();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(t.layer.reconnector().state().status, ReconnectStatus::NoWifi);
    assert!(t.sink.shown().is_empty());

    t.session.set_authenticated(true);
    t.network.set(NetworkStatus::wifi());
    t.http.set_response(&health_url(SERVER), MockResponse::healthy());
    t.discovery.set_active(Some(SERVER));
    sleep(Duration::from_secs(15)).await;
    settle().await;

    assert!(t
        .sink
        .messages()
        .contains(&"Conexión restablecida".to_string()));
}
