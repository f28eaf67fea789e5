//! Pure link lifecycle and reconnection logic for MQTT client
//!
//! Lifecycle notifications are modelled as [`LinkEvent`]s and folded into a
//! [`ConnectionState`] by one transition function. The transport and the
//! publisher both use it, so they never disagree on what a notification means.

use super::connection::{ConnectionState, ReconnectConfig};
use std::fmt;

/// Lifecycle notification emitted by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Session start requested
    Connecting,
    /// Broker acknowledged the connection (first connect or any reconnect)
    Connected,
    /// Reconnection attempt about to start
    Reconnecting(u32),
    /// Transport-level error; does not change the state by itself
    Error(String),
    /// Link dropped while connected
    Offline,
    /// Network stream closed
    Closed,
    /// Reconnection abandoned
    GaveUp(String),
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::Connecting => write!(f, "connecting"),
            LinkEvent::Connected => write!(f, "connected"),
            LinkEvent::Reconnecting(attempt) => write!(f, "reconnecting (attempt {attempt})"),
            LinkEvent::Error(message) => write!(f, "error: {message}"),
            LinkEvent::Offline => write!(f, "offline"),
            LinkEvent::Closed => write!(f, "closed"),
            LinkEvent::GaveUp(reason) => write!(f, "gave up: {reason}"),
        }
    }
}

/// Pure link state and reconnection decision logic
pub struct LinkMonitor;

impl LinkMonitor {
    /// Next connection state after an event (pure function)
    pub fn transition(current: &ConnectionState, event: &LinkEvent) -> ConnectionState {
        match event {
            LinkEvent::Connecting => ConnectionState::Connecting,
            LinkEvent::Connected => ConnectionState::Connected,
            LinkEvent::Reconnecting(attempt) => ConnectionState::Reconnecting(*attempt),
            LinkEvent::Error(_) => current.clone(),
            // A close that follows going offline does not bring the link back
            LinkEvent::Closed if *current == ConnectionState::Offline => ConnectionState::Offline,
            LinkEvent::Closed => ConnectionState::Closed,
            LinkEvent::Offline => ConnectionState::Offline,
            LinkEvent::GaveUp(reason) => ConnectionState::PermanentlyDisconnected(reason.clone()),
        }
    }

    /// Events to emit for a failed poll, given the state before the failure
    pub fn failure_events(current: &ConnectionState, error: String) -> Vec<LinkEvent> {
        let mut events = vec![LinkEvent::Error(error), LinkEvent::Closed];
        if current.can_publish() {
            events.push(LinkEvent::Offline);
        }
        events
    }

    /// Determine if reconnection should be attempted (pure function)
    /// Supports unlimited retries when max_attempts is None
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        config: &ReconnectConfig,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        if let Some(max_attempts) = config.max_attempts {
            if current_attempts >= max_attempts {
                return ReconnectionDecision::AbortMaxAttemptsExceeded;
            }
        }

        let attempt = current_attempts + 1;
        ReconnectionDecision::Proceed {
            attempt,
            delay_ms: config.calculate_backoff_delay(attempt),
        }
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq, Eq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32, delay_ms: u64 },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
    /// Abort reconnection - max attempts exceeded
    AbortMaxAttemptsExceeded,
}
