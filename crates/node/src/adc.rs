//! ADS1115 level reader over I2C (sound sensor on one single-ended input).
//!
//! Single-shot conversions at PGA ±4.096 V and 860 SPS, so one poll costs a
//! little over a millisecond of the tick.

use rppal::i2c::I2c;
use std::{thread, time::Duration};

use crate::payload::LevelReading;
use crate::ports::LevelSensor;

// ── Registers ───────────────────────────────────────────────────────────────

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

// ── Config register ─────────────────────────────────────────────────────────
//
//   [15]    OS        1 = start single-shot conversion
//   [14:12] MUX       input selection
//   [11:9]  PGA       gain
//   [8]     MODE      1 = single-shot
//   [7:5]   DR        data rate
//   [1:0]   COMP_QUE  11 = comparator off

/// OS=1, PGA=001 (±4.096 V), MODE=1, DR=111 (860 SPS), COMP_QUE=11.
const CONFIG_BASE: u16 = 0b1_000_001_1_111_0_0_0_11;

const MUX_SHIFT: u8 = 12;
/// AINx vs GND.
const MUX_SINGLE_ENDED: [u16; 4] = [0b100, 0b101, 0b110, 0b111];

/// One conversion at 860 SPS takes ~1.2 ms.
const CONVERSION_WAIT: Duration = Duration::from_micros(1300);

/// Read back: conversion finished.
const OS_READY_BIT: u16 = 1 << 15;

fn config_for_channel(channel: usize) -> u16 {
    CONFIG_BASE | (MUX_SINGLE_ENDED[channel] << MUX_SHIFT)
}

pub struct Ads1115Level {
    i2c: I2c,
    channel: usize,
    /// Returned when a conversion fails, so a poll always yields a value.
    last: u16,
}

impl Ads1115Level {
    pub fn new(addr: u16, channel: u8) -> anyhow::Result<Self> {
        let channel = usize::from(channel);
        anyhow::ensure!(
            channel < MUX_SINGLE_ENDED.len(),
            "ADS1115 channel {channel} out of range (0-3)"
        );

        let mut i2c = I2c::new()?;
        i2c.set_slave_address(addr)?;

        tracing::info!(
            addr = format_args!("0x{addr:02x}"),
            channel,
            "ads1115 level reader initialised"
        );

        Ok(Self {
            i2c,
            channel,
            last: 0,
        })
    }

    fn convert(&mut self) -> anyhow::Result<i16> {
        let config = config_for_channel(self.channel);
        self.i2c.block_write(REG_CONFIG, &config.to_be_bytes())?;
        thread::sleep(CONVERSION_WAIT);

        for _ in 0..3 {
            let mut buf = [0u8; 2];
            self.i2c.block_read(REG_CONFIG, &mut buf)?;
            if u16::from_be_bytes(buf) & OS_READY_BIT != 0 {
                break;
            }
            thread::sleep(Duration::from_micros(300));
        }

        let mut buf = [0u8; 2];
        self.i2c.block_read(REG_CONVERSION, &mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }
}

/// Single-ended results are non-negative; clamp against bus corruption.
fn to_level(raw: i16) -> u16 {
    raw.max(0) as u16
}

impl LevelSensor for Ads1115Level {
    fn poll(&mut self) -> LevelReading {
        match self.convert() {
            Ok(raw) => self.last = to_level(raw),
            Err(e) => {
                tracing::error!(channel = self.channel, "adc read failed: {e}");
            }
        }
        LevelReading { value: self.last }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_register_per_channel() {
        assert_eq!(config_for_channel(0), 0xC3E3);
        assert_eq!(config_for_channel(1), 0xD3E3);
        assert_eq!(config_for_channel(2), 0xE3E3);
        assert_eq!(config_for_channel(3), 0xF3E3);
    }

    #[test]
    fn config_base_fields() {
        assert_eq!((CONFIG_BASE >> 15) & 1, 1, "OS starts conversion");
        assert_eq!((CONFIG_BASE >> 9) & 0b111, 0b001, "PGA ±4.096 V");
        assert_eq!((CONFIG_BASE >> 8) & 1, 1, "single-shot");
        assert_eq!((CONFIG_BASE >> 5) & 0b111, 0b111, "860 SPS");
        assert_eq!(CONFIG_BASE & 0b11, 0b11, "comparator off");
    }

    #[test]
    fn negative_raw_clamped() {
        assert_eq!(to_level(-5), 0);
        assert_eq!(to_level(0), 0);
        assert_eq!(to_level(i16::MAX), 32767);
    }
}
