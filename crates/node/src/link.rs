//! `rumqttc` adapter for the [`Link`] port.
//!
//! The event loop is driven by [`Session::run`], which stays idle until the
//! controller asks for a connection. When the session fails it reports
//! [`NodeEvent::SessionDown`], then polls again after `mqtt.reconnect_secs`
//! or on the next `connect()`, whichever comes first. The controller never
//! retries; this is the transport's own policy.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use tokio::sync::{mpsc, Notify};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::NodeConfig;
use crate::events::NodeEvent;
use crate::ports::{Link, LinkError};

pub struct MqttLink {
    client: AsyncClient,
    wake: Arc<Notify>,
}

/// Owns the event loop. Run it on its own task.
pub struct Session {
    eventloop: EventLoop,
    wake: Arc<Notify>,
    retry: Duration,
}

pub fn mqtt_options(cfg: &NodeConfig) -> MqttOptions {
    let client_id = format!("ubicomp-node-{}", cfg.node_id);
    let mut opts = MqttOptions::new(client_id, cfg.mqtt.host.clone(), cfg.mqtt.port);
    opts.set_keep_alive(Duration::from_secs(cfg.mqtt.keep_alive_secs));
    if let (Some(user), Some(pass)) = (&cfg.mqtt.username, &cfg.mqtt.password) {
        opts.set_credentials(user, pass);
    }
    opts
}

pub fn new(cfg: &NodeConfig) -> (MqttLink, Session) {
    let (client, eventloop) = AsyncClient::new(mqtt_options(cfg), cfg.mqtt.queue_capacity);
    let wake = Arc::new(Notify::new());
    (
        MqttLink {
            client,
            wake: Arc::clone(&wake),
        },
        Session {
            eventloop,
            wake,
            retry: cfg.mqtt.reconnect(),
        },
    )
}

impl MqttLink {
    /// The session task holds the only other handle on `wake`; once it has
    /// returned, nothing drains the request queue.
    fn ensure_open(&self) -> Result<(), LinkError> {
        if Arc::strong_count(&self.wake) < 2 {
            return Err(LinkError::Closed);
        }
        Ok(())
    }
}

impl Link for MqttLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.wake.notify_one();
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.client.try_subscribe(topic, qos)?;
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.client.try_publish(topic, qos, retain, payload)?;
        Ok(())
    }
}

impl Session {
    /// Drive the event loop, forwarding translated events until the
    /// controller side of `events` is dropped.
    pub async fn run(mut self, events: mpsc::Sender<NodeEvent>) {
        let mut lost = false;
        loop {
            if lost {
                tokio::select! {
                    _ = self.wake.notified() => {}
                    _ = sleep(self.retry) => {
                        debug!(after = ?self.retry, "retrying mqtt session");
                    }
                }
            } else {
                self.wake.notified().await;
            }
            info!("mqtt session starting");

            loop {
                let event = match self.eventloop.poll().await {
                    Ok(ev) => match translate(ev) {
                        Some(ev) => ev,
                        None => continue,
                    },
                    Err(e) => NodeEvent::SessionDown {
                        reason: e.to_string(),
                    },
                };

                let down = matches!(event, NodeEvent::SessionDown { .. });
                if events.send(event).await.is_err() {
                    debug!("controller gone, stopping mqtt session");
                    return;
                }
                if down {
                    lost = true;
                    break;
                }
            }
        }
    }
}

/// Map a raw event-loop notification onto the controller's event set.
/// Outgoing notifications and keep-alive traffic are dropped.
pub fn translate(event: Event) -> Option<NodeEvent> {
    let Event::Incoming(packet) = event else {
        return None;
    };

    match packet {
        Packet::ConnAck(ack) => Some(NodeEvent::SessionUp {
            session_present: ack.session_present,
        }),
        Packet::SubAck(ack) => Some(NodeEvent::Subscribed {
            pkid: ack.pkid,
            granted: ack
                .return_codes
                .iter()
                .map(|code| match code {
                    SubscribeReasonCode::Success(qos) => Some(*qos),
                    SubscribeReasonCode::Failure => None,
                })
                .collect(),
        }),
        Packet::Publish(p) => Some(NodeEvent::Message {
            topic: p.topic,
            payload: p.payload.to_vec(),
            qos: p.qos,
            retain: p.retain,
            dup: p.dup,
        }),
        Packet::PubAck(ack) => Some(NodeEvent::PublishAcked { pkid: ack.pkid }),
        Packet::PubComp(comp) => Some(NodeEvent::PublishAcked { pkid: comp.pkid }),
        Packet::Disconnect => Some(NodeEvent::SessionDown {
            reason: "broker closed the session".to_string(),
        }),
        _ => None,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
