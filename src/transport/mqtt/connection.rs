//! Pure connection state management for MQTT client
//!
//! This module contains pure functions for connection state management
//! and client option construction.

use crate::config::MqttSection;
use rumqttc::MqttOptions;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Connection state for MQTT client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session has been started, or it was shut down
    Disconnected,
    /// Initial state - attempting to connect
    Connecting,
    /// Successfully connected and ready for operations
    Connected,
    /// Attempting to reconnect (attempt count)
    Reconnecting(u32),
    /// Link dropped while connected; waiting for the next attempt
    Offline,
    /// Network stream closed
    Closed,
    /// Max reconnection attempts exceeded
    PermanentlyDisconnected(String),
}

impl ConnectionState {
    /// Whether the broker will see a publish made right now
    pub fn can_publish(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Reconnection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts (None = unlimited)
    pub max_attempts: Option<u32>,
    /// Backoff pattern in milliseconds for the first attempts
    pub backoff_pattern: Vec<u64>,
    /// Delay to use after pattern is exhausted
    pub sustained_delay: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff_pattern: vec![1000],
            sustained_delay: 1000,
        }
    }
}

impl ReconnectConfig {
    pub fn from_section(config: &MqttSection) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            backoff_pattern: config.reconnect_backoff_ms.clone(),
            sustained_delay: config.reconnect_sustained_ms,
        }
    }

    /// Calculate backoff delay for the given (1-based) attempt
    pub fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        let index = attempt.saturating_sub(1) as usize;
        self.backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Disconnect failed")]
    DisconnectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Event loop already started")]
    AlreadyStarted,
}

/// Host and port of the broker, with 1883 as the default port
pub fn parse_broker_address(broker_url: &str) -> Result<(String, u16), MqttError> {
    let url =
        Url::parse(broker_url).map_err(|_| MqttError::InvalidBrokerUrl(broker_url.to_string()))?;

    if !matches!(url.scheme(), "mqtt" | "tcp") {
        return Err(MqttError::InvalidBrokerUrl(broker_url.to_string()));
    }

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| MqttError::InvalidBrokerUrl(broker_url.to_string()))?;
    let port = url.port().unwrap_or(1883);

    Ok((host.to_string(), port))
}

/// Client id unique to this process: `<prefix>-<8 hex chars>`
pub fn generate_client_id(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &suffix[..8])
}

/// Pure function to configure MQTT options from config
pub fn configure_mqtt_options(
    client_id: &str,
    config: &MqttSection,
) -> Result<MqttOptions, MqttError> {
    let (host, port) = parse_broker_address(&config.broker_url)?;

    let mut mqtt_options = MqttOptions::new(client_id, host, port);
    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    mqtt_options.set_clean_session(config.clean_session);

    Ok(mqtt_options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_config_default() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, None);
        assert_eq!(config.backoff_pattern, vec![1000]);
        assert_eq!(config.sustained_delay, 1000);
    }

    #[test]
    fn test_reconnect_config_from_section() {
        let section = MqttSection {
            reconnect_backoff_ms: vec![25, 50],
            reconnect_sustained_ms: 250,
            max_reconnect_attempts: Some(4),
            ..MqttSection::default()
        };
        let config = ReconnectConfig::from_section(&section);
        assert_eq!(config.max_attempts, Some(4));
        assert_eq!(config.backoff_pattern, vec![25, 50]);
        assert_eq!(config.sustained_delay, 250);
    }

    #[test]
    fn test_calculate_backoff_delay() {
        let config = ReconnectConfig {
            max_attempts: None,
            backoff_pattern: vec![25, 50, 100, 250],
            sustained_delay: 500,
        };

        assert_eq!(config.calculate_backoff_delay(1), 25);
        assert_eq!(config.calculate_backoff_delay(2), 50);
        assert_eq!(config.calculate_backoff_delay(4), 250);

        // Sustained delay after pattern exhausted
        assert_eq!(config.calculate_backoff_delay(5), 500);
        assert_eq!(config.calculate_backoff_delay(100), 500);
    }

    #[test]
    fn test_empty_pattern_uses_sustained_delay() {
        let config = ReconnectConfig {
            max_attempts: None,
            backoff_pattern: Vec::new(),
            sustained_delay: 750,
        };
        assert_eq!(config.calculate_backoff_delay(1), 750);
    }

    #[test]
    fn test_parse_broker_address() {
        assert_eq!(
            parse_broker_address("mqtt://192.168.1.23:1883").unwrap(),
            ("192.168.1.23".to_string(), 1883)
        );
        assert_eq!(
            parse_broker_address("tcp://broker.local").unwrap(),
            ("broker.local".to_string(), 1883)
        );
        assert!(matches!(
            parse_broker_address("invalid-url"),
            Err(MqttError::InvalidBrokerUrl(_))
        ));
        assert!(matches!(
            parse_broker_address("http://localhost:1883"),
            Err(MqttError::InvalidBrokerUrl(_))
        ));
    }

    #[test]
    fn test_generate_client_id() {
        let first = generate_client_id("led-toggler");
        let second = generate_client_id("led-toggler");

        assert!(first.starts_with("led-toggler-"));
        assert_eq!(first.len(), "led-toggler-".len() + 8);
        assert_ne!(first, second);
    }

    #[test]
    fn test_configure_mqtt_options() {
        let section = MqttSection {
            broker_url: "mqtt://localhost:1884".to_string(),
            keep_alive_secs: 30,
            ..MqttSection::default()
        };

        let options = configure_mqtt_options("led-toggler-test", &section).unwrap();
        assert_eq!(options.client_id(), "led-toggler-test");
        assert_eq!(
            options.broker_address(),
            ("localhost".to_string(), 1884)
        );
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert!(options.clean_session());
    }

    #[test]
    fn test_connection_state_can_publish() {
        assert!(ConnectionState::Connected.can_publish());
        assert!(!ConnectionState::Offline.can_publish());
        assert!(!ConnectionState::Reconnecting(2).can_publish());
        assert!(!ConnectionState::Disconnected.can_publish());
    }
}
