use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::NodeState;
use crate::topics::SensorKind;

// ---------------------------------------------------------------------------
// Inbound command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Disable,
    Enable,
    Toggle,
}

impl TryFrom<i64> for Action {
    type Error = CommandError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Disable),
            1 => Ok(Self::Enable),
            2 => Ok(Self::Toggle),
            other => Err(CommandError::UnknownAction(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub target: String,
    pub action: Action,
}

#[derive(Debug, Error)]
pub enum CommandError {
    /// Payload is not `{"node": <string>, "command": <integer>}`.
    #[error("malformed command payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Well-formed payload carrying an action outside 0..=2.
    #[error("unsupported command value {0}")]
    UnknownAction(i64),
}

#[derive(Debug, Deserialize)]
struct CommandMsg {
    node: String,
    command: i64,
}

/// Decode `{"node": "...", "command": 0|1|2}`. Unknown fields are ignored.
pub fn decode_command(payload: &[u8]) -> Result<Command, CommandError> {
    let msg: CommandMsg = serde_json::from_slice(payload)?;
    Ok(Command {
        target: msg.node,
        action: Action::try_from(msg.command)?,
    })
}

// ---------------------------------------------------------------------------
// Outbound state
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct StateMsg<'a> {
    state: u8,
    node: &'a str,
}

pub fn encode_state(state: NodeState, node_id: &str) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&StateMsg {
        state: state.as_wire(),
        node: node_id,
    })
}

// ---------------------------------------------------------------------------
// Sensor readings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PulseReading {
    pub code: u32,
    #[serde(rename = "command")]
    pub command_bits: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelReading {
    pub value: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagReading {
    pub uid: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

impl TagReading {
    pub fn new(uid: &[u8], tag_type: impl Into<String>) -> Self {
        Self {
            uid: format_uid(uid),
            tag_type: tag_type.into(),
        }
    }
}

/// One reading of any category. Lives for a single tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SensorReading {
    Pulse(PulseReading),
    Level(LevelReading),
    Tag(TagReading),
}

impl SensorReading {
    pub fn kind(&self) -> SensorKind {
        match self {
            Self::Pulse(_) => SensorKind::Pulse,
            Self::Level(_) => SensorKind::Level,
            Self::Tag(_) => SensorKind::Tag,
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Render a tag UID as upper-case hex pairs joined by colons.
pub fn format_uid(uid: &[u8]) -> String {
    uid.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

// ===========================================================================
// Tests
// ===========================================================================
