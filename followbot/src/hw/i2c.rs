// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Inter-Integrated Circuit (I2C) register access layer.
//!
//! - `RegisterBus` binds any `embedded_hal` I2C bus to one 7-bit device address.
//! - A register write is a single two-byte transaction: `[reg, value]`.
//! - A register read sends the register address and reads one byte back in one write-read
//!   transaction.
//!
//! Every call blocks until the transaction completes or fails. Nothing is queued or pipelined.

use embedded_hal::i2c::{I2c, SevenBitAddress};

/// I2C general-call address. Every device on the bus acknowledges writes sent here.
pub const GENERAL_CALL_ADDRESS: SevenBitAddress = 0x00;

/// Wrapper around an I2C bus addressing a single register-mapped device.
pub struct RegisterBus<I2C> {
    i2c: I2C,
    address: SevenBitAddress,
}

impl<I2C: I2c> RegisterBus<I2C> {
    pub fn new(i2c: I2C, address: SevenBitAddress) -> Self {
        Self { i2c, address }
    }

    /// Device address used for register access.
    #[inline]
    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    /// Write one register.
    #[inline]
    pub fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[reg, value])
    }

    /// Read one register.
    pub fn read_reg(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut buf = [0u8];
        self.i2c.write_read(self.address, &[reg], &mut buf)?;
        Ok(buf[0])
    }

    /// Broadcast raw bytes to the general-call address.
    #[inline]
    pub fn general_call(&mut self, bytes: &[u8]) -> Result<(), I2C::Error> {
        self.i2c.write(GENERAL_CALL_ADDRESS, bytes)
    }

    pub fn free(self) -> I2C {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::mock::{MockI2c, Transaction};

    #[test]
    fn register_write_is_one_two_byte_transaction() {
        let bus = MockI2c::new();
        let mut dev = RegisterBus::new(bus.clone(), 0x40);

        dev.write_reg(0x01, 0x04).unwrap();

        assert_eq!(
            bus.transactions(),
            vec![Transaction::Write {
                address: 0x40,
                bytes: vec![0x01, 0x04]
            }]
        );
    }

    #[test]
    fn register_read_sends_address_then_reads_one_byte() {
        let bus = MockI2c::new();
        bus.set_register(0x00, 0x11);
        let mut dev = RegisterBus::new(bus.clone(), 0x40);

        assert_eq!(dev.read_reg(0x00).unwrap(), 0x11);
        assert_eq!(
            bus.transactions(),
            vec![
                Transaction::Write {
                    address: 0x40,
                    bytes: vec![0x00]
                },
                Transaction::Read {
                    address: 0x40,
                    len: 1
                },
            ]
        );
    }

    #[test]
    fn general_call_goes_to_address_zero() {
        let bus = MockI2c::new();
        let mut dev = RegisterBus::new(bus.clone(), 0x40);

        dev.general_call(&[0x06]).unwrap();

        assert_eq!(bus.writes_to(GENERAL_CALL_ADDRESS), vec![vec![0x06]]);
        assert!(bus.writes_to(0x40).is_empty());
    }
}
