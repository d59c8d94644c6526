//! I2C bus scan logged at startup on hardware builds with `verbose` on.

use std::ops::Range;

/// Non-reserved 7-bit addresses.
const ADDRESSES: Range<u16> = 0x08..0x78;

/// Addresses for which `ack` reports a responding device, in bus order.
pub fn scan<F>(mut ack: F) -> Vec<u16>
where
    F: FnMut(u16) -> bool,
{
    ADDRESSES.filter(|addr| ack(*addr)).collect()
}

/// Scan `bus` and log every responding address.
#[cfg(any(feature = "lcd", feature = "adc"))]
pub fn log_bus(bus: u8) -> anyhow::Result<()> {
    use rppal::i2c::I2c;

    let mut i2c = I2c::with_bus(bus)?;
    tracing::info!(bus, "scanning i2c bus");

    let found = scan(|addr| {
        let mut probe = [0u8; 1];
        i2c.set_slave_address(addr).is_ok() && i2c.read(&mut probe).is_ok()
    });
    for addr in &found {
        tracing::info!(bus, address = format_args!("0x{addr:02x}"), "i2c device found");
    }
    tracing::info!(bus, count = found.len(), "i2c scan done");
    Ok(())
}
