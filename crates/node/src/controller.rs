//! Node controller: node state, sensor polling, command dispatch and the
//! connectivity reaction chain.
//!
//! The controller is owned by a single task. Scheduler ticks and collaborator
//! events reach it one at a time, so the node state, the actuator writes and
//! the capture guard never see interleaved mutation.
//!
//! ```text
//! NetworkUp ──▶ link.connect()
//! SessionUp ──▶ link.subscribe(node/<id>/set, QoS 2)
//! Message   ──▶ decode ──▶ target check ──▶ transition ──▶ output, display, retained state
//! tick      ──▶ pulse ──▶ level ──▶ tag (guarded) ──▶ telemetry
//! ```

use std::time::Duration;

use anyhow::{bail, Result};
use rumqttc::QoS;
use tracing::{debug, error, info, warn};

use crate::config::FeatureFlags;
use crate::events::NodeEvent;
use crate::guard::CaptureGuard;
use crate::payload::{decode_command, encode_state, Command, CommandError, SensorReading};
use crate::ports::{
    Devices, DigitalOutput, LevelSensor, Link, PulseSensor, StatusDisplay, TagSensor,
};
use crate::state::NodeState;
use crate::topics::Topics;

/// Commands need exactly-once delivery; a lost or repeated TOGGLE is visible.
const COMMAND_QOS: QoS = QoS::ExactlyOnce;
/// Telemetry and state are fire-and-forget.
const TELEMETRY_QOS: QoS = QoS::AtMostOnce;

pub struct Controller<L: Link> {
    node_id: String,
    flags: FeatureFlags,
    topics: Topics,
    state: NodeState,
    tag_guard: CaptureGuard,
    tag_timeout: Duration,

    pulse: Option<Box<dyn PulseSensor>>,
    level: Option<Box<dyn LevelSensor>>,
    tag: Option<Box<dyn TagSensor>>,
    output: Option<Box<dyn DigitalOutput>>,
    display: Option<Box<dyn StatusDisplay>>,

    link: L,
}

/// Keep a driver only when its feature is on; fail when an enabled feature
/// has nothing to drive.
fn claim<T: ?Sized>(on: bool, slot: Option<Box<T>>, name: &str) -> Result<Option<Box<T>>> {
    match (on, slot) {
        (true, Some(dev)) => Ok(Some(dev)),
        (true, None) => bail!("feature '{name}' is enabled but this build has no driver for it"),
        (false, _) => Ok(None),
    }
}

impl<L: Link> Controller<L> {
    pub fn new(
        node_id: &str,
        flags: FeatureFlags,
        tag_timeout: Duration,
        devices: Devices,
        link: L,
    ) -> Result<Self> {
        anyhow::ensure!(!node_id.is_empty(), "node identity must not be empty");

        Ok(Self {
            node_id: node_id.to_string(),
            topics: Topics::new(node_id, &flags),
            state: NodeState::Disabled,
            tag_guard: CaptureGuard::default(),
            tag_timeout,
            pulse: claim(flags.pulse, devices.pulse, "pulse")?,
            level: claim(flags.level, devices.level, "level")?,
            tag: claim(flags.tag, devices.tag, "tag")?,
            output: claim(flags.digital_output, devices.output, "digital_output")?,
            display: claim(flags.display, devices.display, "display")?,
            flags,
            link,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Force the DISABLED state and announce it.
    pub fn start(&mut self) {
        info!(
            node = %self.node_id,
            features = ?self.flags.enabled(),
            command_topic = %self.topics.command,
            state_topic = %self.topics.state,
            "controller starting"
        );
        self.transition(NodeState::Disabled);
    }

    // -----------------------------------------------------------------------
    // Event dispatch
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::NetworkUp { local_addr } => {
                info!(?local_addr, "network connected");
                info!("connecting to mqtt");
                if let Err(e) = self.link.connect() {
                    error!("mqtt connect request failed: {e}");
                }
            }
            NodeEvent::NetworkDown => {
                warn!("network lost connection");
            }
            NodeEvent::SessionUp { session_present } => {
                info!(session_present, "mqtt connected");
                self.subscribe_commands();
            }
            NodeEvent::SessionDown { reason } => {
                warn!(%reason, "mqtt disconnected");
            }
            NodeEvent::Subscribed { pkid, granted } => self.on_subscribed(pkid, &granted),
            NodeEvent::Message {
                topic,
                payload,
                qos,
                retain,
                dup,
            } => {
                if self.flags.verbose {
                    debug!(
                        %topic,
                        ?qos,
                        retain,
                        dup,
                        len = payload.len(),
                        payload = %String::from_utf8_lossy(&payload),
                        "publish received"
                    );
                }
                self.on_message(&topic, &payload);
            }
            NodeEvent::PublishAcked { pkid } => {
                if self.flags.verbose {
                    debug!(pkid, "publish acknowledged");
                }
            }
        }
    }

    fn subscribe_commands(&mut self) {
        match self.link.subscribe(&self.topics.command, COMMAND_QOS) {
            Ok(()) => info!(topic = %self.topics.command, "subscribing at QoS 2"),
            Err(e) => error!(topic = %self.topics.command, "subscribe failed: {e}"),
        }
    }

    fn on_subscribed(&self, pkid: u16, granted: &[Option<QoS>]) {
        if self.flags.verbose {
            debug!(pkid, ?granted, "subscribe acknowledged");
        }
        for g in granted {
            match g {
                None => warn!(pkid, "broker refused command subscription"),
                Some(qos) if *qos != COMMAND_QOS => {
                    warn!(pkid, ?qos, "broker downgraded command subscription")
                }
                Some(_) => {}
            }
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        if !self.topics.is_command(topic) {
            debug!(%topic, "no matching topic");
            return;
        }

        match decode_command(payload) {
            Ok(cmd) => self.dispatch(cmd),
            Err(CommandError::Malformed(e)) => {
                error!("failed to read command payload: {e}");
            }
            Err(CommandError::UnknownAction(v)) => {
                warn!(command = v, "unsupported command");
            }
        }
    }

    /// Apply `cmd` if it is addressed to this node.
    pub fn dispatch(&mut self, cmd: Command) {
        if cmd.target != self.node_id {
            debug!(
                addressed = %cmd.target,
                node = %self.node_id,
                "command not addressed to this node"
            );
            return;
        }

        let next = self.state.apply(cmd.action);
        debug!(action = ?cmd.action, from = %self.state, to = %next, "applying command");
        self.transition(next);
    }

    /// Store `next` and run every side effect, even when the value is
    /// unchanged. Actuator writes stand if the publication fails.
    fn transition(&mut self, next: NodeState) {
        self.state = next;
        info!(state = %next, "node {next}");

        if let Some(out) = self.output.as_mut() {
            out.set(next.output_level());
        }
        if let Some(display) = self.display.as_mut() {
            display.show(next.color(), next.label());
        }

        self.publish_state();
    }

    fn publish_state(&mut self) {
        let payload = match encode_state(self.state, &self.node_id) {
            Ok(p) => p,
            Err(e) => {
                error!("state encode failed: {e}");
                return;
            }
        };
        if let Err(e) = self
            .link
            .publish(&self.topics.state, payload, TELEMETRY_QOS, true)
        {
            error!(topic = %self.topics.state, "state publish failed: {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Sensors
    // -----------------------------------------------------------------------

    /// One scheduler tick: poll pulse, level, then tag.
    pub fn tick(&mut self) {
        self.poll_pulse();
        self.poll_level();
        self.poll_tag();
    }

    fn poll_pulse(&mut self) {
        let Some(sensor) = self.pulse.as_mut() else {
            return;
        };
        let Some(reading) = sensor.poll() else {
            return;
        };
        sensor.rearm();

        if self.flags.verbose {
            debug!(
                code = format_args!("{:#x}", reading.code),
                command = reading.command_bits,
                "ir decoded"
            );
        }
        self.publish_reading(SensorReading::Pulse(reading));
    }

    fn poll_level(&mut self) {
        let Some(sensor) = self.level.as_mut() else {
            return;
        };
        let reading = sensor.poll();
        self.publish_reading(SensorReading::Level(reading));
    }

    fn poll_tag(&mut self) {
        let Some(sensor) = self.tag.as_mut() else {
            return;
        };
        let reading = sensor.poll(self.tag_timeout);
        if !self.tag_guard.admit(reading.is_some()) {
            return;
        }
        if let Some(reading) = reading {
            debug!(uid = %reading.uid, tag_type = %reading.tag_type, "tag captured");
            self.publish_reading(SensorReading::Tag(reading));
        }
    }

    fn publish_reading(&mut self, reading: SensorReading) {
        let kind = reading.kind();
        let Some(topic) = self.topics.sensor(kind) else {
            return;
        };
        let payload = match reading.encode() {
            Ok(p) => p,
            Err(e) => {
                error!(sensor = %kind, "telemetry encode failed: {e}");
                return;
            }
        };
        if let Err(e) = self.link.publish(topic, payload, TELEMETRY_QOS, false) {
            error!(%topic, "telemetry publish failed: {e}");
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
