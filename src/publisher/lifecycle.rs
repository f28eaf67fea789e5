//! Periodic state publisher
//!
//! One actor owns the toggle, the transport and the publish timer. Link events,
//! timer firings and the shutdown signal are handled one at a time in a single
//! `select!` loop, so only one timer can ever be armed.

use super::toggle::{SwitchState, ToggleState};
use crate::config::{PublisherSection, ReconnectPolicy};
use crate::error::{TogglerError, TogglerResult};
use crate::lifecycle_span;
use crate::transport::mqtt::LinkMonitor;
use crate::transport::{ConnectionState, LinkEvent, Transport};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn, Instrument};

/// Counters reported when the publisher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Publishes handed to the transport
    pub attempted: u64,
    /// Publishes the transport accepted
    pub accepted: u64,
    /// Publishes the transport rejected
    pub rejected: u64,
    /// `Connected` events observed
    pub connections: u32,
}

/// Publishes an alternating state on a fixed cadence once the link is up
pub struct PeriodicPublisher<T>
where
    T: Transport,
{
    transport: T,
    settings: PublisherSection,
    toggle: ToggleState,
    link: ConnectionState,
    ticker: Option<Interval>,
    stats: PublishStats,
}

impl<T> PeriodicPublisher<T>
where
    T: Transport,
{
    pub fn new(transport: T, settings: PublisherSection) -> Self {
        Self {
            transport,
            settings,
            toggle: ToggleState::new(),
            link: ConnectionState::Disconnected,
            ticker: None,
            stats: PublishStats::default(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn toggle(&self) -> &ToggleState {
        &self.toggle
    }

    /// Link state as observed through transport events
    pub fn link_state(&self) -> &ConnectionState {
        &self.link
    }

    pub fn is_timer_armed(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Connect, then publish on schedule until `shutdown` flips to true (or its
    /// sender is dropped). Only a failure to start the session is an error.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> TogglerResult<PublishStats> {
        let span = lifecycle_span!(topic = %self.settings.topic);
        self.run_loop(shutdown).instrument(span).await
    }

    async fn run_loop(&mut self, mut shutdown: watch::Receiver<bool>) -> TogglerResult<PublishStats> {
        let mut events = self
            .transport
            .connect()
            .await
            .map_err(TogglerError::transport)?;
        let mut events_open = true;

        info!(
            topic = %self.settings.topic,
            interval_ms = self.settings.interval_ms,
            "Publisher started, waiting for broker connection"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested, stopping publisher");
                        break;
                    }
                }

                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_link_event(event).await,
                    None => {
                        warn!("Transport event stream ended; publish timer keeps running");
                        events_open = false;
                    }
                },

                _ = next_tick(&mut self.ticker) => {
                    self.toggle_and_publish().await;
                }
            }
        }

        self.shutdown().await;
        Ok(self.stats)
    }

    async fn shutdown(&mut self) {
        self.ticker = None;
        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "Disconnect failed");
        }

        info!(
            attempted = self.stats.attempted,
            accepted = self.stats.accepted,
            rejected = self.stats.rejected,
            connections = self.stats.connections,
            "Publisher stopped"
        );
    }

    /// Log the event, fold it into the observed link state and react to
    /// `Connected`. No event stops the timer or suppresses publishing.
    pub async fn handle_link_event(&mut self, event: LinkEvent) {
        match &event {
            LinkEvent::Connecting => info!("Connecting to MQTT broker..."),
            LinkEvent::Connected => info!("Connected to MQTT broker"),
            LinkEvent::Reconnecting(attempt) => {
                info!(attempt = *attempt, "Reconnecting to MQTT broker...");
            }
            LinkEvent::Error(message) => error!("MQTT error: {}", message),
            LinkEvent::Offline => warn!("MQTT client is offline"),
            LinkEvent::Closed => info!("Connection closed"),
            LinkEvent::GaveUp(reason) => {
                error!("MQTT reconnection abandoned: {}; still publishing on schedule", reason);
            }
        }

        self.link = LinkMonitor::transition(&self.link, &event);

        if event == LinkEvent::Connected {
            self.on_connected().await;
        }
    }

    async fn on_connected(&mut self) {
        self.stats.connections += 1;
        let armed = self.ticker.is_some();

        match (armed, self.settings.on_reconnect) {
            (false, _) => {
                self.toggle_and_publish().await;
                self.arm_timer();
                info!(interval_ms = self.settings.interval_ms, "Publish timer armed");
            }
            (true, ReconnectPolicy::Continue) => {
                debug!(
                    flips = self.toggle.flips(),
                    "Publish timer already armed, continuing sequence"
                );
            }
            (true, ReconnectPolicy::Rearm) => {
                self.toggle_and_publish().await;
                self.arm_timer();
                info!(interval_ms = self.settings.interval_ms, "Publish timer re-armed");
            }
        }
    }

    /// Replace any armed timer; the first firing is one full interval away
    fn arm_timer(&mut self) {
        let period = Duration::from_millis(self.settings.interval_ms);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    /// Flip the toggle and publish its label. Failures are logged and counted.
    pub async fn toggle_and_publish(&mut self) -> SwitchState {
        let state = self.toggle.advance();
        let topic = &self.settings.topic;
        let payload = self.settings.payload_for(state.is_on());

        info!("Publishing: {} -> {}", topic, payload);
        if !self.link.can_publish() {
            debug!(link = ?self.link, "Link is down, publish goes to the transport queue");
        }

        self.stats.attempted += 1;
        match self
            .transport
            .publish(
                topic,
                payload.as_bytes().to_vec(),
                self.settings.qos_level(),
                self.settings.retain,
            )
            .await
        {
            Ok(()) => self.stats.accepted += 1,
            Err(e) => {
                self.stats.rejected += 1;
                warn!(error = %e, topic = %topic, "Publish failed, continuing on schedule");
            }
        }

        state
    }
}

/// Resolves on the next tick of an armed timer; never resolves otherwise
async fn next_tick(ticker: &mut Option<Interval>) -> Instant {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}

