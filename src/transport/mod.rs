//! Transport layer for the publisher
//!
//! This module provides the transport abstraction and its MQTT implementation.

use rumqttc::QoS;
use tokio::sync::mpsc;

pub mod mqtt;

pub use mqtt::{ConnectionState, LinkEvent};

/// Transport trait for publishing
///
/// This trait provides an abstraction over the broker connection to enable
/// dependency injection and testing.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start the session. Returns immediately; lifecycle notifications,
    /// including the first `Connected`, arrive on the returned channel.
    async fn connect(&mut self) -> Result<mpsc::Receiver<LinkEvent>, Self::Error>;

    /// Disconnect from the broker
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Hand a message to the transport without waiting for delivery
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error>;

    /// Get current connection state
    fn connection_state(&self) -> ConnectionState;

    /// Check if transport is currently connected
    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }
}
