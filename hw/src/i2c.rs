//! Single-register I2C GPIO expander transport.

use crate::{HwError, HwResult};
use rppal::i2c::I2c;
use std::fmt::{Debug, Formatter};

/// Write-only transport to a PCF8574-class GPIO expander: one 8-bit output
/// register at a fixed 7-bit address.
///
/// One outstanding operation at a time; a rejected write (NACK or bus fault)
/// propagates to the caller. No retries at this layer, and no read capability
/// (the expander's register is never read back).
pub trait ExpanderBus: Debug {
    /// Writes one byte to the expander's output register.
    fn write(&mut self, byte: u8) -> HwResult<()>;
}

/// [ExpanderBus] backed by the Raspberry Pi's I2C peripheral.
pub struct RppalExpanderBus {
    i2c: I2c,
    address: u8,
}

impl RppalExpanderBus {
    /// Opens `/dev/i2c-<bus>` and binds it to the expander at `address`.
    pub fn new(bus: u8, address: u8) -> HwResult<Self> {
        let mut i2c = I2c::with_bus(bus).map_err(|e| HwError::Transport(e.to_string()))?;
        i2c.set_slave_address(address as u16)
            .map_err(|e| HwError::Transport(e.to_string()))?;
        Ok(RppalExpanderBus { i2c, address })
    }
}

impl Debug for RppalExpanderBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RppalExpanderBus(0x{:02X})", self.address)
    }
}

impl ExpanderBus for RppalExpanderBus {
    fn write(&mut self, byte: u8) -> HwResult<()> {
        self.i2c
            .smbus_send_byte(byte)
            .map_err(|e| HwError::Transport(e.to_string()))
    }
}
