//! Mock implementations for testing
//!
//! Provides a mock Transport so the publisher can be driven without a broker.
//! Tests script the link lifecycle with [`MockTransport::emit`] and inspect
//! what was handed to the transport afterwards.

use crate::error::TogglerError;
use crate::transport::mqtt::LinkMonitor;
use crate::transport::{ConnectionState, LinkEvent, Transport};
use async_trait::async_trait;
use rumqttc::QoS;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;

/// A publish as the transport received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPublish {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    /// Tokio clock reading at the time of the call
    pub at: Instant,
}

impl RecordedPublish {
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("<binary>")
    }
}

/// Mock transport for testing
///
/// Clones share all state, so a test can keep a handle while the publisher
/// owns another.
#[derive(Debug, Clone)]
pub struct MockTransport {
    published: Arc<Mutex<Vec<RecordedPublish>>>,
    link_tx: mpsc::Sender<LinkEvent>,
    link_rx: Arc<Mutex<Option<mpsc::Receiver<LinkEvent>>>>,
    state: Arc<watch::Sender<ConnectionState>>,
    fail_publishes: Arc<AtomicBool>,
    fail_connect: bool,
    connect_calls: Arc<AtomicUsize>,
    disconnect_calls: Arc<AtomicUsize>,
}

impl Default for MockTransport {
    fn default() -> Self {
        let (link_tx, link_rx) = mpsc::channel(64);
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            link_tx,
            link_rx: Arc::new(Mutex::new(Some(link_rx))),
            state: Arc::new(state),
            fail_publishes: Arc::new(AtomicBool::new(false)),
            fail_connect: false,
            connect_calls: Arc::new(AtomicUsize::new(0)),
            disconnect_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `connect` always fails
    pub fn with_connect_failure() -> Self {
        Self {
            fail_connect: true,
            ..Default::default()
        }
    }

    /// Deliver a lifecycle event to whoever called `connect`
    pub async fn emit(&self, event: LinkEvent) {
        self.state
            .send_modify(|state| *state = LinkMonitor::transition(state, &event));
        // The receiver is gone once the publisher has stopped
        let _ = self.link_tx.send(event).await;
    }

    /// Make subsequent publishes fail (or succeed again)
    pub fn set_publish_failure(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<RecordedPublish> {
        self.published.lock().await.clone()
    }

    pub async fn published_payloads(&self) -> Vec<String> {
        self.published
            .lock()
            .await
            .iter()
            .map(|p| p.payload_str().to_string())
            .collect()
    }

    pub async fn clear_history(&self) {
        self.published.lock().await.clear();
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = TogglerError;

    async fn connect(&mut self) -> Result<mpsc::Receiver<LinkEvent>, Self::Error> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(TogglerError::internal_error("Mock connection failure"));
        }

        self.link_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| TogglerError::internal_error("Mock transport already connected"))
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Disconnected);
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(TogglerError::internal_error("Mock publish failure"));
        }

        self.published.lock().await.push(RecordedPublish {
            topic: topic.to_string(),
            payload,
            qos,
            retain,
            at: Instant::now(),
        });
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }
}
