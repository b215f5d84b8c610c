// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Recording `embedded_hal` doubles shared by the unit tests.

use core::convert::Infallible;
use std::sync::{Arc, Mutex};

use embedded_hal::{delay::DelayNs, digital, i2c};

/// One bus operation as seen by the mock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, len: usize },
}

struct BusState {
    log: Vec<Transaction>,
    registers: [u8; 256],
    pointer: u8,
    fail: Option<i2c::ErrorKind>,
    rejected: Vec<u8>,
}

/// I2C bus that records every operation and emulates a flat register file.
///
/// Writes `[reg, value, ..]` to a non-zero address store `value` at `reg`; a lone `[reg]` only
/// moves the register pointer that the next read returns from.
#[derive(Clone)]
pub struct MockI2c {
    state: Arc<Mutex<BusState>>,
}

impl MockI2c {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                log: Vec::new(),
                registers: [0; 256],
                pointer: 0,
                fail: None,
                rejected: Vec::new(),
            })),
        }
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().log.clear();
    }

    /// Raw byte payloads written to `address`, in order.
    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.transactions()
            .into_iter()
            .filter_map(|t| match t {
                Transaction::Write { address: a, bytes } if a == address => Some(bytes),
                _ => None,
            })
            .collect()
    }

    /// `(reg, value)` pairs from two-byte register writes to `address`.
    pub fn register_writes(&self, address: u8) -> Vec<(u8, u8)> {
        self.writes_to(address)
            .into_iter()
            .filter(|bytes| bytes.len() == 2)
            .map(|bytes| (bytes[0], bytes[1]))
            .collect()
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.state.lock().unwrap().registers[reg as usize]
    }

    pub fn set_register(&self, reg: u8, value: u8) {
        self.state.lock().unwrap().registers[reg as usize] = value;
    }

    /// Make every following transaction fail with `kind` (or succeed again with `None`).
    pub fn fail_with(&self, kind: Option<i2c::ErrorKind>) {
        self.state.lock().unwrap().fail = kind;
    }

    /// NACK every transaction addressed to `address`.
    pub fn reject_address(&self, address: u8) {
        self.state.lock().unwrap().rejected.push(address);
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = i2c::ErrorKind;
}

impl i2c::I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(kind) = state.fail {
            return Err(kind);
        }
        if state.rejected.contains(&address) {
            return Err(i2c::ErrorKind::NoAcknowledge(
                i2c::NoAcknowledgeSource::Address,
            ));
        }

        for op in operations.iter_mut() {
            match op {
                i2c::Operation::Write(bytes) => {
                    state.log.push(Transaction::Write {
                        address,
                        bytes: bytes.to_vec(),
                    });
                    if address != 0 {
                        if let Some((&reg, rest)) = bytes.split_first() {
                            state.pointer = reg;
                            if let Some(&value) = rest.first() {
                                state.registers[reg as usize] = value;
                            }
                        }
                    }
                }
                i2c::Operation::Read(buf) => {
                    state.log.push(Transaction::Read {
                        address,
                        len: buf.len(),
                    });
                    let value = state.registers[state.pointer as usize];
                    for b in buf.iter_mut() {
                        *b = value;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Output pin that remembers the last level it was driven to.
#[derive(Clone, Default)]
pub struct MockPin {
    level: Arc<Mutex<Option<bool>>>,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last driven level, `None` if the pin was never written.
    pub fn is_high(&self) -> Option<bool> {
        *self.level.lock().unwrap()
    }
}

impl digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        *self.level.lock().unwrap() = Some(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        *self.level.lock().unwrap() = Some(true);
        Ok(())
    }
}

pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
