//! Assemble the driver set for this build from the enabled features.
//!
//! | Feature          | Driver                                   |
//! |------------------|------------------------------------------|
//! | pulse, tag       | simulated (`sim` build feature)          |
//! | level            | ADS1115 (`adc`), else simulated          |
//! | digital_output   | GPIO pin (`gpio`), else logging mock     |
//! | display          | Grove RGB LCD (`lcd`), else logging mock |
//!
//! Hardware builds with `verbose` on also log an I2C bus scan.
//!
//! Slots left empty for an enabled feature make controller construction
//! fail, so a misbuilt binary stops at startup.

use anyhow::Result;

use crate::config::NodeConfig;
use crate::gpio::StatusLine;
use crate::lcd::Lcd;
use crate::ports::Devices;

pub fn build(cfg: &NodeConfig) -> Result<Devices> {
    let flags = &cfg.features;
    let hw = &cfg.hardware;
    let mut devices = Devices::default();

    #[cfg(feature = "sim")]
    {
        use crate::sim::{Profile, SimLevel, SimPulse, SimTag};

        let profile = Profile::from_str_lossy(&hw.sim_profile);
        tracing::info!(%profile, "simulated sensors available");
        if flags.pulse {
            devices.pulse = Some(Box::new(SimPulse::new(profile)));
        }
        if flags.tag {
            devices.tag = Some(Box::new(SimTag::new(profile)));
        }
        if flags.level {
            devices.level = Some(Box::new(SimLevel::new(profile)));
        }
    }

    #[cfg(any(feature = "lcd", feature = "adc"))]
    {
        if flags.verbose {
            if let Err(e) = crate::i2cscan::log_bus(hw.lcd_bus) {
                tracing::warn!(bus = hw.lcd_bus, "i2c scan failed: {e}");
            }
        }
    }

    #[cfg(feature = "adc")]
    {
        if flags.level {
            let adc = crate::adc::Ads1115Level::new(hw.adc_address, hw.adc_channel)?;
            devices.level = Some(Box::new(adc));
        }
    }

    if flags.digital_output {
        devices.output = Some(Box::new(StatusLine::new(hw.output_pin)?));
    }
    if flags.display {
        devices.display = Some(Box::new(Lcd::new(hw.lcd_bus)?));
    }

    Ok(devices)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(all(test, feature = "sim", not(any(feature = "adc", feature = "gpio", feature = "lcd"))))]
mod tests {
    use super::*;
    use crate::config::FeatureFlags;

    #[test]
    fn default_build_fills_enabled_slots() {
        let cfg = NodeConfig::default();
        let d = build(&cfg).unwrap();
        assert!(d.pulse.is_some());
        assert!(d.level.is_some());
        assert!(d.output.is_some());
        assert!(d.display.is_some());
        assert!(d.tag.is_none(), "tag reader is off by default");
    }

    #[test]
    fn disabled_features_get_no_driver() {
        let mut cfg = NodeConfig::default();
        cfg.features = FeatureFlags::parse_list("tag").unwrap();
        let d = build(&cfg).unwrap();
        assert!(d.tag.is_some());
        assert!(d.pulse.is_none());
        assert!(d.level.is_none());
        assert!(d.output.is_none());
        assert!(d.display.is_none());
    }
}
