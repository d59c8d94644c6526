//! Inbound events from the network supervisor and the messaging session.
//!
//! The set is closed: every collaborator callback maps onto one variant and
//! the [`Controller`](crate::controller::Controller) dispatches on it.

use std::net::SocketAddr;

use rumqttc::QoS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// Network link usable.
    NetworkUp { local_addr: Option<SocketAddr> },

    /// Network link lost. Recovery belongs to the supervisor.
    NetworkDown,

    /// Broker accepted the session.
    SessionUp { session_present: bool },

    /// Session dropped. Broker-side subscriptions are gone.
    SessionDown { reason: String },

    /// Subscribe acknowledged. `None` marks a filter the broker refused.
    Subscribed { pkid: u16, granted: Vec<Option<QoS>> },

    /// Inbound publication.
    Message {
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
        dup: bool,
    },

    /// Outbound publication acknowledged (QoS 1 and 2 only).
    PublishAcked { pkid: u16 },
}
