//! 16x2 RGB backlight LCD. The `lcd` feature drives a Grove RGB LCD over
//! I2C (HD44780-style text controller at 0x3E, PCA9633 backlight at 0x62);
//! without it, a mock keeps the last frame and logs it.

use anyhow::Result;

use crate::ports::StatusDisplay;
use crate::state::Rgb;

const COLUMNS: usize = 16;

/// Bytes for one display line: ASCII only, cut to the panel width.
fn line_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' })
        .take(COLUMNS)
        .collect()
}

// ---------------------------------------------------------------------------
// Grove RGB LCD (Raspberry Pi I2C)
// ---------------------------------------------------------------------------
#[cfg(feature = "lcd")]
mod grove {
    use super::*;
    use rppal::i2c::I2c;
    use std::{thread, time::Duration};

    const TEXT_ADDR: u16 = 0x3E;
    const RGB_ADDR: u16 = 0x62;

    // Text controller control bytes.
    const CMD: u8 = 0x80;
    const DATA: u8 = 0x40;

    const CLEAR: u8 = 0x01;
    const ENTRY_LEFT: u8 = 0x06;
    const DISPLAY_ON: u8 = 0x0C;
    const FUNCTION_2LINE: u8 = 0x28;
    const SET_DDRAM: u8 = 0x80;

    // Backlight registers.
    const REG_MODE1: u8 = 0x00;
    const REG_MODE2: u8 = 0x01;
    const REG_BLUE: u8 = 0x02;
    const REG_GREEN: u8 = 0x03;
    const REG_RED: u8 = 0x04;
    const REG_LEDOUT: u8 = 0x08;

    pub(crate) struct Lcd {
        i2c: I2c,
    }

    impl Lcd {
        pub(crate) fn new(bus: u8) -> Result<Self> {
            let mut lcd = Self {
                i2c: I2c::with_bus(bus)?,
            };

            thread::sleep(Duration::from_millis(50));
            for _ in 0..3 {
                lcd.command(FUNCTION_2LINE)?;
                thread::sleep(Duration::from_millis(5));
            }
            lcd.command(DISPLAY_ON)?;
            lcd.clear()?;
            lcd.command(ENTRY_LEFT)?;

            lcd.backlight_reg(REG_MODE1, 0x00)?;
            lcd.backlight_reg(REG_LEDOUT, 0xFF)?;
            lcd.backlight_reg(REG_MODE2, 0x20)?;

            tracing::info!(bus, "grove rgb lcd initialised");
            Ok(lcd)
        }

        fn command(&mut self, cmd: u8) -> Result<()> {
            self.i2c.set_slave_address(TEXT_ADDR)?;
            self.i2c.write(&[CMD, cmd])?;
            Ok(())
        }

        fn clear(&mut self) -> Result<()> {
            self.command(CLEAR)?;
            thread::sleep(Duration::from_millis(2));
            Ok(())
        }

        fn backlight_reg(&mut self, reg: u8, value: u8) -> Result<()> {
            self.i2c.set_slave_address(RGB_ADDR)?;
            self.i2c.write(&[reg, value])?;
            Ok(())
        }

        fn render(&mut self, color: Rgb, text: &str) -> Result<()> {
            self.backlight_reg(REG_RED, color.r)?;
            self.backlight_reg(REG_GREEN, color.g)?;
            self.backlight_reg(REG_BLUE, color.b)?;

            self.clear()?;
            self.command(SET_DDRAM)?;
            self.i2c.set_slave_address(TEXT_ADDR)?;
            for b in line_bytes(text) {
                self.i2c.write(&[DATA, b])?;
            }
            Ok(())
        }
    }

    impl StatusDisplay for Lcd {
        fn show(&mut self, color: Rgb, text: &str) {
            if let Err(e) = self.render(color, text) {
                tracing::error!("lcd update failed: {e}");
            }
        }
    }
}

#[cfg(feature = "lcd")]
pub(crate) use grove::Lcd;

// ---------------------------------------------------------------------------
// Mock display (development, no hardware)
// ---------------------------------------------------------------------------
#[cfg(not(feature = "lcd"))]
pub(crate) struct Lcd {
    pub(super) frame: Option<(Rgb, String)>,
}

#[cfg(not(feature = "lcd"))]
impl Lcd {
    pub(crate) fn new(bus: u8) -> Result<Self> {
        tracing::info!(bus, "[mock-lcd] display registered (not wired)");
        Ok(Self { frame: None })
    }
}

#[cfg(not(feature = "lcd"))]
impl StatusDisplay for Lcd {
    fn show(&mut self, color: Rgb, text: &str) {
        let line = String::from_utf8_lossy(&line_bytes(text)).into_owned();
        tracing::debug!(
            r = color.r,
            g = color.g,
            b = color.b,
            "[mock-lcd] {line}"
        );
        self.frame = Some((color, line));
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_fits_panel() {
        assert_eq!(line_bytes("ENABLED"), b"ENABLED".to_vec());
        assert_eq!(line_bytes("0123456789ABCDEFGHIJ").len(), COLUMNS);
    }

    #[test]
    fn line_replaces_non_ascii() {
        assert_eq!(line_bytes("a\u{e9}\n"), b"a??".to_vec());
    }

    #[cfg(not(feature = "lcd"))]
    #[test]
    fn mock_keeps_last_frame() {
        let mut lcd = Lcd::new(1).unwrap();
        assert!(lcd.frame.is_none());
        lcd.show(Rgb::GREEN, "ENABLED");
        lcd.show(Rgb::RED, "DISABLED");
        assert_eq!(lcd.frame, Some((Rgb::RED, "DISABLED".to_string())));
    }
}
