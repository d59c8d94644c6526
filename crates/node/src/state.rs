//! Binary node state and the actuator indications derived from it.

use std::fmt;

use crate::payload::Action;

// ---------------------------------------------------------------------------
// Node state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    Disabled,
    Enabled,
}

impl NodeState {
    /// State after applying `action` to `self`.
    pub fn apply(self, action: Action) -> Self {
        match action {
            Action::Disable => Self::Disabled,
            Action::Enable => Self::Enabled,
            Action::Toggle => self.complement(),
        }
    }

    pub fn complement(self) -> Self {
        match self {
            Self::Disabled => Self::Enabled,
            Self::Enabled => Self::Disabled,
        }
    }

    /// Integer used on the wire (`0` disabled, `1` enabled).
    pub fn as_wire(self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
        }
    }

    /// Level of the digital output line.
    pub fn output_level(self) -> bool {
        self == Self::Enabled
    }

    /// Backlight colour shown on the display.
    pub fn color(self) -> Rgb {
        match self {
            Self::Disabled => Rgb::RED,
            Self::Enabled => Rgb::GREEN,
        }
    }

    /// Status label printed on the display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Disabled => "DISABLED",
            Self::Enabled => "ENABLED",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Enabled => write!(f, "enabled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Display colour
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
    pub const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };
}

// ===========================================================================
// Tests
// ===========================================================================
