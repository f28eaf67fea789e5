//! MQTT client implementation
//!
//! Pure functions are kept apart from I/O for testability:
//!
//! - [`connection`] - Connection state, reconnect settings and option construction
//! - [`link_monitor`] - Lifecycle transition function and reconnection decisions
//! - [`event_router`] - Routing of rumqttc events
//! - [`client`] - Impure I/O operations and the reconnection supervisor
//!
//! # Usage
//!
//! ```rust,no_run
//! use led_toggler::config::MqttSection;
//! use led_toggler::transport::mqtt::MqttClient;
//! use led_toggler::transport::{LinkEvent, Transport};
//! use rumqttc::QoS;
//!
//! # tokio_test::block_on(async {
//! let config = MqttSection {
//!     broker_url: "mqtt://localhost:1883".to_string(),
//!     ..MqttSection::default()
//! };
//!
//! let mut client = MqttClient::new(config)?;
//! let mut events = client.connect().await?;
//! while let Some(event) = events.recv().await {
//!     if event == LinkEvent::Connected {
//!         client.publish("esp32/led", b"ON".to_vec(), QoS::AtMostOnce, false).await?;
//!         break;
//!     }
//! }
//! client.disconnect().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod event_router;
pub mod link_monitor;

// Re-export public types for convenience
pub use client::MqttClient;
pub use connection::{ConnectionState, MqttError, ReconnectConfig};
pub use event_router::{EventRoute, EventRouter};
pub use link_monitor::{LinkEvent, LinkMonitor, ReconnectionDecision};
