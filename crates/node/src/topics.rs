//! MQTT address set derived from the node identity.
//!
//! ```text
//! node/<id>/set           command input (subscribed, QoS 2)
//! node/<id>/state         retained state output
//! node/<id>/sensor/ir     pulse telemetry
//! node/<id>/sensor/sound  level telemetry
//! node/<id>/sensor/nfc    tag telemetry
//! ```

use std::fmt;

use crate::config::FeatureFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Pulse,
    Level,
    Tag,
}

impl SensorKind {
    /// Last topic segment for this category.
    pub fn segment(self) -> &'static str {
        match self {
            Self::Pulse => "ir",
            Self::Level => "sound",
            Self::Tag => "nfc",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

#[derive(Debug, Clone)]
pub struct Topics {
    pub command: String,
    pub state: String,
    pub pulse: Option<String>,
    pub level: Option<String>,
    pub tag: Option<String>,
}

impl Topics {
    /// Build the address set. Sensor topics exist only for enabled categories.
    pub fn new(node_id: &str, flags: &FeatureFlags) -> Self {
        let sensor = |on: bool, kind: SensorKind| {
            on.then(|| format!("node/{node_id}/sensor/{}", kind.segment()))
        };

        Self {
            command: format!("node/{node_id}/set"),
            state: format!("node/{node_id}/state"),
            pulse: sensor(flags.pulse, SensorKind::Pulse),
            level: sensor(flags.level, SensorKind::Level),
            tag: sensor(flags.tag, SensorKind::Tag),
        }
    }

    pub fn sensor(&self, kind: SensorKind) -> Option<&str> {
        match kind {
            SensorKind::Pulse => self.pulse.as_deref(),
            SensorKind::Level => self.level.as_deref(),
            SensorKind::Tag => self.tag.as_deref(),
        }
    }

    /// Exact, case-sensitive match against the command input address.
    pub fn is_command(&self, topic: &str) -> bool {
        topic == self.command
    }
}

// ===========================================================================
// Tests
// ===========================================================================
