//! Recording test doubles for every port.
//!
//! All doubles share one journal so tests can assert on the exact order of
//! sensor polls, actuator writes and link requests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use rumqttc::QoS;
use serde_json::Value;

use crate::config::FeatureFlags;
use crate::controller::Controller;
use crate::payload::{LevelReading, PulseReading, TagReading};
use crate::ports::{
    Devices, DigitalOutput, LevelSensor, Link, LinkError, PulseSensor, StatusDisplay, TagSensor,
};
use crate::state::Rgb;

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect,
    Subscribe {
        topic: String,
        qos: QoS,
    },
    Publish {
        topic: String,
        payload: Value,
        qos: QoS,
        retain: bool,
    },
    Output(bool),
    Display {
        color: Rgb,
        text: String,
    },
    PulsePoll,
    Rearm,
    LevelPoll,
    TagPoll(Duration),
}

#[derive(Default)]
struct Shared {
    calls: Vec<Call>,
    fail_publish: bool,
    pulse: VecDeque<Option<PulseReading>>,
    pulse_armed: bool,
    level: VecDeque<u16>,
    tag: VecDeque<Option<TagReading>>,
}

// ── Harness ───────────────────────────────────────────────────

/// Builds a controller wired to recording doubles.
pub struct Harness {
    shared: Rc<RefCell<Shared>>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        let shared = Shared {
            pulse_armed: true,
            ..Shared::default()
        };
        Self {
            shared: Rc::new(RefCell::new(shared)),
        }
    }

    /// Everything on except the tag reader and verbose logging.
    pub fn flags() -> FeatureFlags {
        FeatureFlags {
            pulse: true,
            tag: false,
            level: true,
            display: true,
            digital_output: true,
            verbose: false,
        }
    }

    pub fn devices(&self) -> Devices {
        Devices {
            pulse: Some(Box::new(MockPulse(self.shared.clone()))),
            level: Some(Box::new(MockLevel(self.shared.clone()))),
            tag: Some(Box::new(MockTag(self.shared.clone()))),
            output: Some(Box::new(MockOutput(self.shared.clone()))),
            display: Some(Box::new(MockDisplay(self.shared.clone()))),
        }
    }

    pub fn link(&self) -> MockLink {
        MockLink(self.shared.clone())
    }

    pub fn controller(&self) -> Controller<MockLink> {
        self.controller_with(Self::flags())
    }

    pub fn controller_with(&self, flags: FeatureFlags) -> Controller<MockLink> {
        Controller::new(
            "node-1",
            flags,
            Duration::from_millis(10),
            self.devices(),
            self.link(),
        )
        .unwrap()
    }

    // -- Scripting ------------------------------------------------------------

    pub fn pulse_script(&self, script: &[Option<PulseReading>]) {
        self.shared.borrow_mut().pulse = script.iter().cloned().collect();
    }

    pub fn level_values(&self, values: &[u16]) {
        self.shared.borrow_mut().level = values.iter().copied().collect();
    }

    pub fn tag_script(&self, script: &[Option<TagReading>]) {
        self.shared.borrow_mut().tag = script.iter().cloned().collect();
    }

    pub fn fail_publish(&self, fail: bool) {
        self.shared.borrow_mut().fail_publish = fail;
    }

    // -- Inspection -----------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.shared.borrow().calls.clone()
    }

    pub fn clear(&self) {
        self.shared.borrow_mut().calls.clear();
    }

    /// Payloads published to `topic`, in order.
    pub fn publishes_to(&self, topic: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Publish { topic: t, payload, .. } if t == topic => Some(payload),
                _ => None,
            })
            .collect()
    }

    fn record(shared: &Rc<RefCell<Shared>>, call: Call) {
        shared.borrow_mut().calls.push(call);
    }
}

// ── Sensors ───────────────────────────────────────────────────

/// Latches after each decode; a signal arriving while latched is lost.
struct MockPulse(Rc<RefCell<Shared>>);

impl PulseSensor for MockPulse {
    fn poll(&mut self) -> Option<PulseReading> {
        Harness::record(&self.0, Call::PulsePoll);
        let mut s = self.0.borrow_mut();
        let next = s.pulse.pop_front().flatten()?;
        if !s.pulse_armed {
            return None;
        }
        s.pulse_armed = false;
        Some(next)
    }

    fn rearm(&mut self) {
        Harness::record(&self.0, Call::Rearm);
        self.0.borrow_mut().pulse_armed = true;
    }
}

/// Replays scripted values, then repeats zero.
struct MockLevel(Rc<RefCell<Shared>>);

impl LevelSensor for MockLevel {
    fn poll(&mut self) -> LevelReading {
        Harness::record(&self.0, Call::LevelPoll);
        let value = self.0.borrow_mut().level.pop_front().unwrap_or(0);
        LevelReading { value }
    }
}

/// Replays the script, then reports absence.
struct MockTag(Rc<RefCell<Shared>>);

impl TagSensor for MockTag {
    fn poll(&mut self, timeout: Duration) -> Option<TagReading> {
        Harness::record(&self.0, Call::TagPoll(timeout));
        self.0.borrow_mut().tag.pop_front().flatten()
    }
}

// ── Actuators ─────────────────────────────────────────────────

struct MockOutput(Rc<RefCell<Shared>>);

impl DigitalOutput for MockOutput {
    fn set(&mut self, high: bool) {
        Harness::record(&self.0, Call::Output(high));
    }
}

struct MockDisplay(Rc<RefCell<Shared>>);

impl StatusDisplay for MockDisplay {
    fn show(&mut self, color: Rgb, text: &str) {
        Harness::record(
            &self.0,
            Call::Display {
                color,
                text: text.to_string(),
            },
        );
    }
}

// ── Link ──────────────────────────────────────────────────────

pub struct MockLink(Rc<RefCell<Shared>>);

impl Link for MockLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        Harness::record(&self.0, Call::Connect);
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), LinkError> {
        Harness::record(
            &self.0,
            Call::Subscribe {
                topic: topic.to_string(),
                qos,
            },
        );
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), LinkError> {
        if self.0.borrow().fail_publish {
            return Err(LinkError::Closed);
        }
        let payload = serde_json::from_slice(&payload).unwrap_or(Value::Null);
        Harness::record(
            &self.0,
            Call::Publish {
                topic: topic.to_string(),
                payload,
                qos,
                retain,
            },
        );
        Ok(())
    }
}
