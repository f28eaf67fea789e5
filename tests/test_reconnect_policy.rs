//! Reconnection behavior of the publisher
//!
//! A reconnect never resets the toggle and never leaves two timers running.
//! What happens to the cadence depends on `on_reconnect`.


use led_toggler::config::ReconnectPolicy;
use led_toggler::transport::{ConnectionState, LinkEvent};
use std::time::Duration;
use test_helpers::*;
use tokio::time::sleep;

async fn drop_and_recover(running: &RunningPublisher) {
    let transport = &running.transport;
    transport
        .emit(LinkEvent::Error("connection reset by peer".to_string()))
        .await;
    transport.emit(LinkEvent::Closed).await;
    transport.emit(LinkEvent::Offline).await;
    transport.emit(LinkEvent::Reconnecting(1)).await;
    transport.emit(LinkEvent::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn test_continue_keeps_cadence_across_reconnect() {
    let running = spawn_publisher(settings_with_policy(ReconnectPolicy::Continue)).await;

    running.transport.emit(LinkEvent::Connected).await;
    sleep(Duration::from_millis(4000)).await;
    drop_and_recover(&running).await;
    sleep(Duration::from_millis(6500)).await;

    let published = running.transport.published().await;
    let payloads: Vec<&str> = published.iter().map(|p| p.payload_str()).collect();
    assert_eq!(payloads, vec!["ON", "OFF", "ON", "OFF"]);

    for (publish, expected_ms) in published.iter().zip([0, 3000, 6000, 9000]) {
        assert_at_ms(running.offset_of(publish), expected_ms);
    }

    let (result, publisher) = running.stop().await;
    assert_eq!(result.unwrap().connections, 2);
    assert_eq!(publisher.link_state(), &ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_connected_does_not_stack_timers() {
    let running = spawn_publisher(settings_with_policy(ReconnectPolicy::Continue)).await;

    running.transport.emit(LinkEvent::Connected).await;
    sleep(Duration::from_millis(1000)).await;
    running.transport.emit(LinkEvent::Connected).await;
    running.transport.emit(LinkEvent::Connected).await;
    sleep(Duration::from_millis(9500)).await;

    // One timer: 0, 3s, 6s, 9s
    assert_eq!(
        running.transport.published_payloads().await,
        vec!["ON", "OFF", "ON", "OFF"]
    );

    let (result, publisher) = running.stop().await;
    assert_eq!(result.unwrap().connections, 3);
    assert_eq!(publisher.toggle().flips(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_publishes_on_reconnect_and_restarts_cadence() {
    let running = spawn_publisher(settings_with_policy(ReconnectPolicy::Rearm)).await;

    running.transport.emit(LinkEvent::Connected).await;
    sleep(Duration::from_millis(4000)).await;
    drop_and_recover(&running).await;
    sleep(Duration::from_millis(6500)).await;

    let published = running.transport.published().await;
    let payloads: Vec<&str> = published.iter().map(|p| p.payload_str()).collect();
    // The toggle carries on from where it was
    assert_eq!(payloads, vec!["ON", "OFF", "ON", "OFF", "ON"]);

    for (publish, expected_ms) in published.iter().zip([0, 3000, 4000, 7000, 10_000]) {
        assert_at_ms(running.offset_of(publish), expected_ms);
    }

    let (result, publisher) = running.stop().await;
    let stats = result.unwrap();
    assert_eq!(stats.attempted, 5);
    assert_eq!(stats.connections, 2);
    assert_eq!(publisher.toggle().flips(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_publishing_continues_during_reconnect_attempts() {
    let running = spawn_publisher(settings_with_policy(ReconnectPolicy::Rearm)).await;

    running.transport.emit(LinkEvent::Connected).await;
    settle().await;
    running
        .transport
        .emit(LinkEvent::Error("keep alive timeout".to_string()))
        .await;
    running.transport.emit(LinkEvent::Closed).await;
    running.transport.emit(LinkEvent::Offline).await;

    for attempt in 1..=3 {
        running.transport.emit(LinkEvent::Reconnecting(attempt)).await;
        sleep(Duration::from_millis(1000)).await;
    }
    sleep(Duration::from_millis(3500)).await;

    // No reconnect completed, so the first timer keeps firing: 0, 3s, 6s
    assert_eq!(
        running.transport.published_payloads().await,
        vec!["ON", "OFF", "ON"]
    );

    let (_, publisher) = running.stop().await;
    assert_eq!(publisher.link_state(), &ConnectionState::Reconnecting(3));
}
