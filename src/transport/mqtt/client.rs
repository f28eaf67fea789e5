//! Impure I/O operations for MQTT client
//!
//! This module owns the rumqttc client. The event loop runs in a supervisor
//! task that turns rumqttc output into [`LinkEvent`]s and reconnects with
//! backoff; rumqttc re-establishes the session on the next poll after an error.

use super::connection::{
    configure_mqtt_options, generate_client_id, ConnectionState, MqttError, ReconnectConfig,
};
use super::event_router::{EventRoute, EventRouter};
use super::link_monitor::{LinkEvent, LinkMonitor, ReconnectionDecision};
use crate::config::MqttSection;
use crate::mqtt_span;
use crate::transport::Transport;
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, EventLoop, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn, Instrument};

const LINK_EVENT_CAPACITY: usize = 64;
const SUPERVISOR_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// MQTT transport client
pub struct MqttClient {
    client_id: String,
    config: MqttSection,
    client: AsyncClient,
    // Taken by `connect`; the mutex keeps the client `Sync`
    event_loop: Mutex<Option<EventLoop>>,
    reconnect_config: ReconnectConfig,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    event_loop_handle: Option<JoinHandle<()>>,
}

impl MqttClient {
    /// Build the client; nothing touches the network until [`Transport::connect`]
    pub fn new(config: MqttSection) -> Result<Self, MqttError> {
        let client_id = generate_client_id(&config.client_id_prefix);
        let mqtt_options = configure_mqtt_options(&client_id, &config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, config.request_queue_capacity);

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(MqttClient {
            client_id,
            reconnect_config: ReconnectConfig::from_section(&config),
            config,
            client,
            event_loop: Mutex::new(Some(event_loop)),
            state_tx: Arc::new(state_tx),
            state_rx,
            shutdown_tx,
            event_loop_handle: None,
        })
    }

    /// Override the reconnection policy derived from the config
    pub fn with_reconnect_config(mut self, reconnect_config: ReconnectConfig) -> Self {
        self.reconnect_config = reconnect_config;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn broker_url(&self) -> &str {
        &self.config.broker_url
    }
}

#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<mpsc::Receiver<LinkEvent>, MqttError> {
        let event_loop = self
            .event_loop
            .get_mut()
            .take()
            .ok_or(MqttError::AlreadyStarted)?;
        let (events_tx, events_rx) = mpsc::channel(LINK_EVENT_CAPACITY);

        info!(
            broker_url = %self.config.broker_url,
            client_id = %self.client_id,
            "Starting MQTT session"
        );

        let supervisor = Supervisor {
            event_loop,
            events_tx,
            state_tx: self.state_tx.clone(),
            shutdown_rx: self.shutdown_tx.subscribe(),
            reconnect_config: self.reconnect_config.clone(),
            reconnect_attempts: 0,
        };
        let span = mqtt_span!(client_id = %self.client_id);
        self.event_loop_handle = Some(tokio::spawn(supervisor.run().instrument(span)));

        Ok(events_rx)
    }

    /// Queue a DISCONNECT, stop the supervisor once it has been flushed and
    /// mark the link as disconnected
    async fn disconnect(&mut self) -> Result<(), MqttError> {
        let queued = self
            .client
            .try_disconnect()
            .map_err(|e| MqttError::DisconnectFailed(Box::new(e)));

        // The supervisor may already be gone after giving up
        let _ = self.shutdown_tx.send(true);

        if let Some(mut handle) = self.event_loop_handle.take() {
            match tokio::time::timeout(SUPERVISOR_SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(())) => debug!("Event loop supervisor shut down gracefully"),
                Ok(Err(e)) => warn!("Event loop supervisor ended with error: {}", e),
                Err(_) => {
                    warn!("Event loop supervisor didn't shut down in time, aborting");
                    handle.abort();
                }
            }
        }

        self.state_tx.send_replace(ConnectionState::Disconnected);
        info!("MQTT client disconnected");
        queued
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), MqttError> {
        self.client
            .try_publish(topic, qos, retain, payload)
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;
        trace!(topic, ?qos, retain, "Publish queued");
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }
}

/// Event loop owner running in its own task
struct Supervisor {
    event_loop: EventLoop,
    events_tx: mpsc::Sender<LinkEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    shutdown_rx: watch::Receiver<bool>,
    reconnect_config: ReconnectConfig,
    reconnect_attempts: u32,
}

impl Supervisor {
    async fn run(mut self) {
        debug!("MQTT event loop supervisor started");
        self.report(LinkEvent::Connecting).await;

        loop {
            tokio::select! {
                biased;

                // Shutdown wins over a ready poll
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping event loop supervisor");
                        self.flush_disconnect().await;
                        break;
                    }
                }

                polled = self.event_loop.poll() => match polled {
                    Ok(event) => self.handle_route(EventRouter::route(&event)).await,
                    Err(error) => {
                        if !self.handle_poll_error(error).await {
                            break;
                        }
                    }
                }
            }
        }

        debug!("MQTT event loop supervisor stopped");
    }

    async fn handle_route(&mut self, route: EventRoute) {
        match route {
            EventRoute::ConnectionAcknowledged { session_present } => {
                debug!(session_present, "ConnAck received");
                self.reconnect_attempts = 0;
                self.report(LinkEvent::Connected).await;
            }
            EventRoute::ConnectionRefused(reason) => {
                self.report(LinkEvent::Error(format!("connection refused: {reason}")))
                    .await;
            }
            EventRoute::BrokerDisconnected => {
                self.report(LinkEvent::Closed).await;
            }
            EventRoute::PublishAcknowledged(pkid) => {
                debug!(pkid, "Publish acknowledged");
            }
            EventRoute::DisconnectSent => {
                debug!("DISCONNECT sent");
            }
            EventRoute::InfrastructureEvent(event) => {
                trace!("MQTT event: {}", event);
            }
        }
    }

    /// Returns true to keep polling (a reconnect is due), false to stop
    async fn handle_poll_error(&mut self, error: ConnectionError) -> bool {
        let current = self.state_tx.borrow().clone();
        for event in LinkMonitor::failure_events(&current, error.to_string()) {
            self.report(event).await;
        }

        let decision = LinkMonitor::should_attempt_reconnection(
            self.reconnect_attempts,
            &self.reconnect_config,
            *self.shutdown_rx.borrow(),
        );

        match decision {
            ReconnectionDecision::Proceed { attempt, delay_ms } => {
                self.reconnect_attempts = attempt;
                let max_display = self
                    .reconnect_config
                    .max_attempts
                    .map_or("∞".to_string(), |max| max.to_string());
                debug!(
                    "Reconnection {}/{} scheduled in {}ms",
                    attempt, max_display, delay_ms
                );

                if !self.interruptible_sleep(delay_ms).await {
                    return false;
                }
                self.report(LinkEvent::Reconnecting(attempt)).await;
                true
            }
            ReconnectionDecision::AbortShutdownRequested => {
                info!("Shutdown signal received, stopping reconnection");
                false
            }
            ReconnectionDecision::AbortMaxAttemptsExceeded => {
                let reason = format!(
                    "Max reconnection attempts ({}) exceeded",
                    self.reconnect_attempts
                );
                self.report(LinkEvent::GaveUp(reason)).await;
                false
            }
        }
    }

    /// Perform interruptible sleep with shutdown monitoring
    /// Returns true if sleep completed, false if shutdown requested
    async fn interruptible_sleep(&mut self, delay_ms: u64) -> bool {
        tokio::select! {
            changed = self.shutdown_rx.changed() => {
                if changed.is_err() || *self.shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnection delay, stopping");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
        }
    }

    /// Poll until our queued DISCONNECT has gone out, bounded by a timeout
    async fn flush_disconnect(&mut self) {
        let event_loop = &mut self.event_loop;
        let flushed = tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, async {
            loop {
                match event_loop.poll().await {
                    Ok(event) if EventRouter::route(&event) == EventRoute::DisconnectSent => break,
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
        })
        .await;

        if flushed.is_err() {
            debug!("DISCONNECT not flushed before timeout");
        }
    }

    /// Fold the event into the shared state, then forward it
    async fn report(&mut self, event: LinkEvent) {
        self.state_tx
            .send_modify(|state| *state = LinkMonitor::transition(state, &event));
        debug!(event = %event, "Link event");

        if self.events_tx.send(event).await.is_err() {
            trace!("Link event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens on port 1, so every attempt is refused quickly
    fn unreachable_config() -> MqttSection {
        MqttSection {
            broker_url: "mqtt://127.0.0.1:1".to_string(),
            ..MqttSection::default()
        }
    }

    #[test]
    fn test_client_can_cross_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MqttClient>();
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let config = MqttSection {
            broker_url: "invalid-url".to_string(),
            ..MqttSection::default()
        };
        assert!(matches!(
            MqttClient::new(config),
            Err(MqttError::InvalidBrokerUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_new_client_is_disconnected() {
        let client = MqttClient::new(unreachable_config()).unwrap();
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
        assert!(client.client_id().starts_with("led-toggler-"));
        assert_eq!(client.broker_url(), "mqtt://127.0.0.1:1");
    }

    #[tokio::test]
    async fn test_connect_twice_fails() {
        let mut client = MqttClient::new(unreachable_config()).unwrap();
        let _events = client.connect().await.unwrap();

        assert!(matches!(
            client.connect().await,
            Err(MqttError::AlreadyStarted)
        ));

        let _ = client.disconnect().await;
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_publish_is_queued_without_connection() {
        let client = MqttClient::new(unreachable_config()).unwrap();
        let result = client
            .publish("esp32/led", b"ON".to_vec(), QoS::AtMostOnce, false)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_full_queue_rejects_publish() {
        let config = MqttSection {
            request_queue_capacity: 1,
            ..unreachable_config()
        };
        let client = MqttClient::new(config).unwrap();

        let first = client
            .publish("esp32/led", b"ON".to_vec(), QoS::AtMostOnce, false)
            .await;
        let second = client
            .publish("esp32/led", b"OFF".to_vec(), QoS::AtMostOnce, false)
            .await;

        assert!(first.is_ok());
        assert!(matches!(second, Err(MqttError::PublishFailed(_))));
    }
}
