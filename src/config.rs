//! Configuration for the LED toggler
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! configuration that talks to the bench broker and drives `esp32/led`.

use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Files probed, in order, when no `--config` path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["led-toggler.toml", "config/led-toggler.toml"];

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TogglerConfig {
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub publisher: PublisherSection,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// MQTT broker URL with protocol and port
    #[serde(default = "default_broker_url")]
    pub broker_url: String,
    /// Prefix of the generated client id (`<prefix>-<8 hex chars>`)
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    /// Keep-alive interval in seconds (rumqttc requires at least 5)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
    /// Capacity of the client request queue; publishes made while the link is
    /// down are buffered here until it is full
    #[serde(default = "default_request_queue_capacity")]
    pub request_queue_capacity: usize,
    /// Delays in milliseconds for the first reconnection attempts
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: Vec<u64>,
    /// Delay used once `reconnect_backoff_ms` is exhausted
    #[serde(default = "default_reconnect_sustained_ms")]
    pub reconnect_sustained_ms: u64,
    /// Give up after this many consecutive failed attempts (unset = never)
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
}

fn default_broker_url() -> String {
    "mqtt://192.168.1.23:1883".to_string()
}

fn default_client_id_prefix() -> String {
    "led-toggler".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_clean_session() -> bool {
    true
}

fn default_request_queue_capacity() -> usize {
    10
}

fn default_reconnect_backoff_ms() -> Vec<u64> {
    vec![1000]
}

fn default_reconnect_sustained_ms() -> u64 {
    1000
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            client_id_prefix: default_client_id_prefix(),
            keep_alive_secs: default_keep_alive_secs(),
            clean_session: default_clean_session(),
            request_queue_capacity: default_request_queue_capacity(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            reconnect_sustained_ms: default_reconnect_sustained_ms(),
            max_reconnect_attempts: None,
        }
    }
}

/// What the publisher does when the link comes back after a drop
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Keep the timer armed on first connect; publish nothing extra
    #[default]
    Continue,
    /// Replace the timer with a fresh one and publish once immediately
    Rearm,
}

/// Periodic publish settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublisherSection {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_on_payload")]
    pub on_payload: String,
    #[serde(default = "default_off_payload")]
    pub off_payload: String,
    /// MQTT QoS level (0, 1 or 2)
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
    #[serde(default)]
    pub on_reconnect: ReconnectPolicy,
}

fn default_topic() -> String {
    "esp32/led".to_string()
}

fn default_interval_ms() -> u64 {
    3000
}

fn default_on_payload() -> String {
    "ON".to_string()
}

fn default_off_payload() -> String {
    "OFF".to_string()
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            interval_ms: default_interval_ms(),
            on_payload: default_on_payload(),
            off_payload: default_off_payload(),
            qos: 0,
            retain: false,
            on_reconnect: ReconnectPolicy::default(),
        }
    }
}

impl PublisherSection {
    /// Map the configured level onto rumqttc's QoS; anything above 2 was
    /// rejected by validation and is treated as exactly-once
    pub fn qos_level(&self) -> QoS {
        match self.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }

    /// Payload for a given toggle value
    pub fn payload_for(&self, is_on: bool) -> &str {
        if is_on {
            &self.on_payload
        } else {
            &self.off_payload
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "publisher.topic must not be empty".to_string(),
            ));
        }
        if self.topic.contains(['+', '#']) {
            return Err(ConfigError::InvalidConfig(format!(
                "publisher.topic '{}' must not contain wildcards",
                self.topic
            )));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "publisher.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.qos > 2 {
            return Err(ConfigError::InvalidConfig(format!(
                "publisher.qos must be 0, 1 or 2 (got {})",
                self.qos
            )));
        }
        Ok(())
    }
}

impl MqttSection {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_broker_url(&self.broker_url)?;

        if self.keep_alive_secs < 5 {
            return Err(ConfigError::InvalidConfig(format!(
                "mqtt.keep_alive_secs must be at least 5 (got {})",
                self.keep_alive_secs
            )));
        }
        if self.request_queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.request_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.reconnect_sustained_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.reconnect_sustained_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_reconnect_attempts == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "mqtt.max_reconnect_attempts must be greater than 0 or unset for unlimited"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TogglerConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TogglerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.validate()?;
        self.publisher.validate()
    }
}

/// Only plain TCP brokers are supported: `mqtt://host[:port]` or `tcp://host[:port]`
fn validate_broker_url(broker_url: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(broker_url).map_err(|_| ConfigError::InvalidBrokerUrl(broker_url.to_string()))?;

    if !matches!(url.scheme(), "mqtt" | "tcp") {
        return Err(ConfigError::InvalidBrokerUrl(format!(
            "{broker_url} (unsupported scheme '{}')",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidBrokerUrl(broker_url.to_string()));
    }

    Ok(())
}
