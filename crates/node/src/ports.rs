//! Narrow interfaces between the controller and its collaborators.
//!
//! ```text
//!   driver ──▶ port trait ──▶ Controller
//! ```
//!
//! Sensor drivers, actuators and the messaging link implement these traits;
//! the controller never touches hardware or the broker directly.

use std::time::Duration;

use rumqttc::QoS;
use thiserror::Error;

use crate::payload::{LevelReading, PulseReading, TagReading};
use crate::state::Rgb;

// ───────────────────────────────────────────────────────────────
// Sensors
// ───────────────────────────────────────────────────────────────

/// IR pulse decoder. Latches after a decode until rearmed.
pub trait PulseSensor {
    /// `None` when no signal was captured since the last call.
    fn poll(&mut self) -> Option<PulseReading>;

    /// Release the latch so the next signal can be captured.
    fn rearm(&mut self);
}

/// Analog level reader. Always yields a value.
pub trait LevelSensor {
    fn poll(&mut self) -> LevelReading;
}

/// Proximity tag reader.
pub trait TagSensor {
    /// `Some` while a tag is in the field, `None` when absent.
    /// Must return within `timeout`.
    fn poll(&mut self, timeout: Duration) -> Option<TagReading>;
}

// ───────────────────────────────────────────────────────────────
// Actuators
// ───────────────────────────────────────────────────────────────

pub trait DigitalOutput {
    fn set(&mut self, high: bool);
}

/// Two-colour backlit text display.
pub trait StatusDisplay {
    /// Set the backlight, clear, and print `text` on the first line.
    fn show(&mut self, color: Rgb, text: &str);
}

// ───────────────────────────────────────────────────────────────
// Messaging
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("mqtt request rejected: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("messaging link closed")]
    Closed,
}

/// Publish/subscribe session. Calls enqueue requests and never block;
/// outcomes arrive later as [`NodeEvent`](crate::events::NodeEvent)s.
pub trait Link {
    /// Ask for the messaging session to be (re)established.
    fn connect(&mut self) -> Result<(), LinkError>;

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), LinkError>;

    fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Device bundle
// ───────────────────────────────────────────────────────────────

/// The drivers handed to the controller. A slot is `None` when the build has
/// no driver for it or the feature is off.
#[derive(Default)]
pub struct Devices {
    pub pulse: Option<Box<dyn PulseSensor>>,
    pub level: Option<Box<dyn LevelSensor>>,
    pub tag: Option<Box<dyn TagSensor>>,
    pub output: Option<Box<dyn DigitalOutput>>,
    pub display: Option<Box<dyn StatusDisplay>>,
}
