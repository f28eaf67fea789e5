//! Integration tests for MQTT client
//!
//! Tests the MQTT client's lifecycle against an address where nothing listens:
//! - Lifecycle events while the broker is unreachable
//! - Backoff and giving up after the configured attempts
//! - Publishing while the link is down
//! - Shutdown during reconnection

use led_toggler::config::MqttSection;
use led_toggler::transport::mqtt::{MqttClient, ReconnectConfig};
use led_toggler::transport::{ConnectionState, LinkEvent, Transport};
use rumqttc::QoS;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

// Port 1 on loopback refuses connections immediately
fn unreachable_config() -> MqttSection {
    MqttSection {
        broker_url: "mqtt://127.0.0.1:1".to_string(),
        reconnect_backoff_ms: vec![20],
        reconnect_sustained_ms: 20,
        ..MqttSection::default()
    }
}

async fn next_event(events: &mut mpsc::Receiver<LinkEvent>) -> LinkEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for link event")
        .expect("link event channel closed")
}

#[tokio::test]
async fn test_unreachable_broker_reports_lifecycle() {
    let mut client = MqttClient::new(unreachable_config()).unwrap();
    let mut events = client.connect().await.unwrap();

    assert_eq!(next_event(&mut events).await, LinkEvent::Connecting);
    assert!(matches!(next_event(&mut events).await, LinkEvent::Error(_)));
    // Never connected, so no Offline
    assert_eq!(next_event(&mut events).await, LinkEvent::Closed);
    assert_eq!(next_event(&mut events).await, LinkEvent::Reconnecting(1));
    assert!(matches!(next_event(&mut events).await, LinkEvent::Error(_)));

    assert!(!client.is_connected());
    client.disconnect().await.ok();
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let config = MqttSection {
        max_reconnect_attempts: Some(2),
        ..unreachable_config()
    };
    let mut client = MqttClient::new(config).unwrap();
    let mut events = client.connect().await.unwrap();

    let mut reconnects = Vec::new();
    let reason = loop {
        match next_event(&mut events).await {
            LinkEvent::Reconnecting(attempt) => reconnects.push(attempt),
            LinkEvent::GaveUp(reason) => break reason,
            _ => {}
        }
    };

    assert_eq!(reconnects, vec![1, 2]);
    assert!(reason.contains("2"));
    assert!(matches!(
        client.connection_state(),
        ConnectionState::PermanentlyDisconnected(_)
    ));

    // The supervisor has stopped, so the channel closes
    assert!(timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_reconnect_config_override() {
    let mut client = MqttClient::new(unreachable_config())
        .unwrap()
        .with_reconnect_config(ReconnectConfig {
            max_attempts: Some(1),
            backoff_pattern: vec![10],
            sustained_delay: 10,
        });
    let mut events = client.connect().await.unwrap();

    let mut saw_gave_up = false;
    while let Ok(Some(event)) = timeout(Duration::from_secs(5), events.recv()).await {
        if matches!(event, LinkEvent::GaveUp(_)) {
            saw_gave_up = true;
        }
    }
    assert!(saw_gave_up);
}

#[tokio::test]
async fn test_publish_while_unreachable_is_buffered() {
    let mut client = MqttClient::new(unreachable_config()).unwrap();
    let mut events = client.connect().await.unwrap();
    assert_eq!(next_event(&mut events).await, LinkEvent::Connecting);

    let result = client
        .publish("esp32/led", b"ON".to_vec(), QoS::AtMostOnce, false)
        .await;
    assert!(result.is_ok());

    client.disconnect().await.ok();
}

#[tokio::test]
async fn test_disconnect_during_backoff_is_prompt() {
    let config = MqttSection {
        reconnect_backoff_ms: vec![60_000],
        reconnect_sustained_ms: 60_000,
        ..unreachable_config()
    };
    let mut client = MqttClient::new(config).unwrap();
    let mut events = client.connect().await.unwrap();

    // Wait for the first failure so the supervisor is sleeping
    assert_eq!(next_event(&mut events).await, LinkEvent::Connecting);
    assert!(matches!(next_event(&mut events).await, LinkEvent::Error(_)));
    assert_eq!(next_event(&mut events).await, LinkEvent::Closed);

    let result = timeout(Duration::from_secs(3), client.disconnect()).await;
    assert!(result.is_ok(), "disconnect should not wait out the backoff");
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}
