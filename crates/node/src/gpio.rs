//! Status output line. The `gpio` feature drives a real pin through rppal;
//! without it, a mock records the level and logs changes.

use anyhow::Result;

#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, OutputPin};

use crate::ports::DigitalOutput;

// ---------------------------------------------------------------------------
// Real output pin (Raspberry Pi)
// ---------------------------------------------------------------------------
#[cfg(feature = "gpio")]
pub(crate) struct StatusLine {
    pin: OutputPin,
}

#[cfg(feature = "gpio")]
impl StatusLine {
    pub(crate) fn new(bcm_pin: u8) -> Result<Self> {
        let mut pin = Gpio::new()?.get(bcm_pin)?.into_output();
        pin.set_low();
        tracing::info!(pin = bcm_pin, "status output initialised");
        Ok(Self { pin })
    }
}

#[cfg(feature = "gpio")]
impl DigitalOutput for StatusLine {
    fn set(&mut self, high: bool) {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

// ---------------------------------------------------------------------------
// Mock output (development, no hardware)
// ---------------------------------------------------------------------------
#[cfg(not(feature = "gpio"))]
pub(crate) struct StatusLine {
    pin: u8,
    pub(super) high: bool,
}

#[cfg(not(feature = "gpio"))]
impl StatusLine {
    pub(crate) fn new(bcm_pin: u8) -> Result<Self> {
        tracing::info!(pin = bcm_pin, "[mock-gpio] status output registered (not wired)");
        Ok(Self {
            pin: bcm_pin,
            high: false,
        })
    }
}

#[cfg(not(feature = "gpio"))]
impl DigitalOutput for StatusLine {
    fn set(&mut self, high: bool) {
        self.high = high;
        tracing::debug!(
            pin = self.pin,
            "[mock-gpio] output {}",
            if high { "HIGH" } else { "LOW" }
        );
    }
}

// ===========================================================================
// Tests
// ===========================================================================
