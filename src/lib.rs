//! LED Toggler - Rust Implementation
//!
//! A small MQTT publisher that drives a remote LED by sending an alternating
//! `ON`/`OFF` payload to a fixed topic on a fixed cadence.
//!
//! # Overview
//!
//! - Configuration loading and validation
//! - MQTT transport with automatic reconnection and lifecycle events
//! - The periodic publisher actor and its toggle state
//! - Structured logging
//!
//! # Quick Start
//!
//! ```rust
//! use led_toggler::config::TogglerConfig;
//! use led_toggler::publisher::ToggleState;
//!
//! let config = TogglerConfig::default();
//! assert_eq!(config.publisher.topic, "esp32/led");
//! assert_eq!(config.publisher.interval_ms, 3000);
//!
//! let mut toggle = ToggleState::new();
//! assert_eq!(config.publisher.payload_for(toggle.advance().is_on()), "ON");
//! assert_eq!(config.publisher.payload_for(toggle.advance().is_on()), "OFF");
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod publisher;
pub mod testing;
pub mod transport;

pub use config::{TogglerConfig, DEFAULT_CONFIG_PATHS};
pub use error::{TogglerError, TogglerResult};
pub use publisher::{PeriodicPublisher, PublishStats};
pub use transport::mqtt::MqttClient;
pub use transport::Transport;
