//! Pure routing of rumqttc event loop output

use rumqttc::{ConnectReturnCode, Event, Outgoing, Packet};

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish
    ConnectionAcknowledged { session_present: bool },
    /// Broker answered CONNECT with a failure code
    ConnectionRefused(String),
    /// Broker sent DISCONNECT
    BrokerDisconnected,
    /// QoS 1/2 publish acknowledged
    PublishAcknowledged(u16),
    /// Our own DISCONNECT went out on the wire
    DisconnectSent,
    /// Anything else we only log
    InfrastructureEvent(String),
}

pub struct EventRouter;

impl EventRouter {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => match &ack.code {
                ConnectReturnCode::Success => EventRoute::ConnectionAcknowledged {
                    session_present: ack.session_present,
                },
                code => EventRoute::ConnectionRefused(format!("{code:?}")),
            },
            Event::Incoming(Packet::Disconnect) => EventRoute::BrokerDisconnected,
            Event::Incoming(Packet::PubAck(ack)) => EventRoute::PublishAcknowledged(ack.pkid),
            Event::Incoming(Packet::PubComp(comp)) => EventRoute::PublishAcknowledged(comp.pkid),
            Event::Outgoing(Outgoing::Disconnect) => EventRoute::DisconnectSent,
            other => EventRoute::InfrastructureEvent(format!("{other:?}")),
        }
    }
}
