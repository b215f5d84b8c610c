// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! NXP PCA9685 16-channel, 12-bit PWM controller over I2C.
//!
//! This module handles the register map, the power-on sequence and duty-cycle writes. Every channel
//! turns on at counter value 0 and turns off at the computed on-time, so outputs are
//! leading-edge aligned with a resolution of 1/4096.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c, SevenBitAddress};
use tracing::{debug, info, trace, warn};

use crate::hw::RegisterBus;

/// Address with all A0..A5 straps pulled low.
pub const DEFAULT_ADDRESS: SevenBitAddress = 0x40;

/// Number of PWM outputs.
pub const CHANNEL_COUNT: u8 = 16;

/// Largest 12-bit counter value.
pub const COUNTER_MAX: u16 = 4095;

/// Internal oscillator frequency.
pub const OSCILLATOR_HZ: f32 = 25_000_000.0;

/// Legal PRE_SCALE range. The chip ignores writes below 3.
pub const PRESCALE_MIN: u8 = 3;
pub const PRESCALE_MAX: u8 = 255;

/// Software reset command, sent to the general-call address.
const SWRST: u8 = 0x06;

// Register addresses
pub mod reg {
    pub const MODE1: u8 = 0x00;
    pub const MODE2: u8 = 0x01;
    pub const SUBADR1: u8 = 0x02;
    pub const SUBADR2: u8 = 0x03;
    pub const SUBADR3: u8 = 0x04;
    pub const ALLCALLADR: u8 = 0x05;
    pub const LED0_ON_L: u8 = 0x06;
    pub const LED0_ON_H: u8 = 0x07;
    pub const LED0_OFF_L: u8 = 0x08;
    pub const LED0_OFF_H: u8 = 0x09;
    pub const ALL_LED_ON_L: u8 = 0xFA;
    pub const ALL_LED_ON_H: u8 = 0xFB;
    pub const ALL_LED_OFF_L: u8 = 0xFC;
    pub const ALL_LED_OFF_H: u8 = 0xFD;
    pub const PRE_SCALE: u8 = 0xFE;
}

/// MODE1 bits.
pub mod mode1 {
    pub const RESTART: u8 = 1 << 7;
    pub const AI: u8 = 1 << 5;
    pub const SLEEP: u8 = 1 << 4;
    pub const ALLCALL: u8 = 1 << 0;
}

/// MODE2 bits.
pub mod mode2 {
    pub const INVRT: u8 = 1 << 4;
    pub const OUTDRV: u8 = 1 << 2;
}

/// Error type for `Pca9685` operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The chip could not be reached during `init`: no controller, no ACK, or the address is held
    /// by someone else.
    BusUnavailable(ErrorKind),
    /// A register transaction failed after bring-up.
    Bus(ErrorKind),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BusUnavailable(kind) => write!(f, "PCA9685 bus unavailable: {kind}"),
            Error::Bus(kind) => write!(f, "PCA9685 bus transaction failed: {kind}"),
        }
    }
}

impl std::error::Error for Error {}

#[inline]
fn bus_error<E: embedded_hal::i2c::Error>(e: E) -> Error {
    Error::Bus(e.kind())
}

/// Convert a duty cycle into a channel's off-time count.
///
/// `duty` is clamped to [0, 1]; NaN counts as 0.
#[inline]
pub fn on_time_for(duty: f32) -> u16 {
    let duty = if duty.is_nan() {
        0.0
    } else {
        duty.clamp(0.0, 1.0)
    };
    (duty * COUNTER_MAX as f32).round() as u16
}

/// PRE_SCALE value for an output frequency, clamped to the legal range.
pub fn prescale_for(hz: f32) -> u8 {
    let estimate = OSCILLATOR_HZ / (4096.0 * hz) - 1.0;
    if estimate.is_nan() {
        return PRESCALE_MAX;
    }
    estimate
        .round()
        .clamp(PRESCALE_MIN as f32, PRESCALE_MAX as f32) as u8
}

/// Output frequency actually produced by a PRE_SCALE value.
#[inline]
pub fn frequency_for(prescale: u8) -> f32 {
    OSCILLATOR_HZ / ((prescale as f32 + 1.0) * 4096.0)
}

/// PCA9685 driver owning its I2C bus.
pub struct Pca9685<I2C> {
    bus: RegisterBus<I2C>,
}

impl<I2C: I2c> Pca9685<I2C> {
    pub fn new(i2c: I2C, address: SevenBitAddress) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
        }
    }

    #[inline]
    pub fn address(&self) -> SevenBitAddress {
        self.bus.address()
    }

    /// Reset the chip and bring it to a known running state with every output off.
    ///
    /// Sequence: general-call software reset, totem-pole outputs, All-Call enabled, all channels
    /// zeroed, then the oscillator is woken. The reset is best effort; any failure talking to the
    /// chip itself is reported as [`Error::BusUnavailable`].
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        info!(address = self.address(), "initializing PCA9685");

        self.power_on(delay).map_err(|e| match e {
            Error::Bus(kind) => Error::BusUnavailable(kind),
            other => other,
        })?;

        info!("PCA9685 initialization complete");
        Ok(())
    }

    fn power_on<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        debug!("performing PCA9685 software reset");
        // Some hosts refuse the reserved general-call address; the chip is still usable
        if let Err(e) = self.bus.general_call(&[SWRST]) {
            warn!(error = ?e.kind(), "general-call software reset not delivered");
        }
        delay.delay_ms(1);

        // Output drive is totem-pole, not open drain
        self.write_reg(reg::MODE2, mode2::OUTDRV)?;
        // Acknowledge All-Call transfers
        self.write_reg(reg::MODE1, mode1::ALLCALL)?;

        self.set_all_channels_duty_cycle(0.0)?;
        delay.delay_ms(1);

        // Oscillator on
        let mode = self.read_reg(reg::MODE1)? & !mode1::SLEEP;
        self.write_reg(reg::MODE1, mode)?;
        delay.delay_ms(1);

        Ok(())
    }

    /// Set the PWM output frequency. Returns the frequency the chip actually produces.
    ///
    /// The oscillator must be asleep while PRE_SCALE is written, so every output is briefly
    /// undefined during the change.
    pub fn set_frequency<D: DelayNs>(&mut self, hz: f32, delay: &mut D) -> Result<f32, Error> {
        let estimate = OSCILLATOR_HZ / (4096.0 * hz) - 1.0;
        let prescale = prescale_for(hz);
        if !(estimate.round() >= PRESCALE_MIN as f32 && estimate.round() <= PRESCALE_MAX as f32) {
            warn!(hz, prescale, "requested PWM frequency out of range, clamping");
        }

        let effective = frequency_for(prescale);
        debug!(hz, estimate, prescale, effective, "setting PWM frequency");

        let old = self.read_reg(reg::MODE1)?;
        // Sleep and keep RESTART clear while the prescaler changes
        self.write_reg(reg::MODE1, (old & !mode1::RESTART) | mode1::SLEEP)?;
        self.write_reg(reg::PRE_SCALE, prescale)?;
        self.write_reg(reg::MODE1, old)?;
        delay.delay_us(500);
        self.write_reg(reg::MODE1, old | mode1::RESTART)?;

        Ok(effective)
    }

    /// Set one channel's duty cycle.
    ///
    /// `duty` is clamped to [0, 1]. A channel outside [0, 15] is ignored with a warning.
    pub fn set_channel_duty_cycle(&mut self, channel: u8, duty: f32) -> Result<(), Error> {
        if channel >= CHANNEL_COUNT {
            warn!(channel, "channel must be in the range [0,15]");
            return Ok(());
        }

        let on_time = on_time_for(duty);
        self.write_on_off(reg::LED0_ON_L + 4 * channel, on_time)?;

        trace!(channel, duty, on_time, "channel duty set");
        Ok(())
    }

    /// Set every channel's duty cycle through the ALL_LED register block.
    pub fn set_all_channels_duty_cycle(&mut self, duty: f32) -> Result<(), Error> {
        let on_time = on_time_for(duty);
        self.write_on_off(reg::ALL_LED_ON_L, on_time)?;

        trace!(duty, on_time, "all channels duty set");
        Ok(())
    }

    /// Write an ON/OFF register block: on at count 0, off at `off`.
    fn write_on_off(&mut self, base: u8, off: u16) -> Result<(), Error> {
        self.write_reg(base, 0)?;
        self.write_reg(base + 1, 0)?;
        self.write_reg(base + 2, (off & 0xFF) as u8)?;
        self.write_reg(base + 3, (off >> 8) as u8)
    }

    #[inline]
    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        self.bus.write_reg(reg, value).map_err(bus_error)
    }

    #[inline]
    fn read_reg(&mut self, reg: u8) -> Result<u8, Error> {
        self.bus.read_reg(reg).map_err(bus_error)
    }

    /// Release the I2C bus.
    pub fn free(self) -> I2C {
        self.bus.free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::i2c::GENERAL_CALL_ADDRESS;
    use crate::hw::mock::{MockI2c, NoopDelay};

    fn driver() -> (MockI2c, Pca9685<MockI2c>) {
        let bus = MockI2c::new();
        (bus.clone(), Pca9685::new(bus, DEFAULT_ADDRESS))
    }

    #[test]
    fn channel_duty_writes_four_registers_at_channel_offset() {
        let (bus, mut pwm) = driver();

        pwm.set_channel_duty_cycle(3, 0.5).unwrap();

        // round(0.5 * 4095) = 2048 = 0x0800
        assert_eq!(
            bus.register_writes(DEFAULT_ADDRESS),
            vec![(0x12, 0x00), (0x13, 0x00), (0x14, 0x00), (0x15, 0x08)]
        );
    }

    #[test]
    fn duty_is_clamped_to_unit_range() {
        let (bus, mut pwm) = driver();

        pwm.set_channel_duty_cycle(0, 1.7).unwrap();
        pwm.set_channel_duty_cycle(15, -0.25).unwrap();

        assert_eq!(
            bus.register_writes(DEFAULT_ADDRESS),
            vec![
                (0x06, 0x00),
                (0x07, 0x00),
                (0x08, 0xFF),
                (0x09, 0x0F),
                (0x42, 0x00),
                (0x43, 0x00),
                (0x44, 0x00),
                (0x45, 0x00),
            ]
        );
    }

    #[test]
    fn on_time_rounds_to_nearest_count() {
        assert_eq!(on_time_for(0.0), 0);
        assert_eq!(on_time_for(1.0), 4095);
        assert_eq!(on_time_for(0.25), 1024); // 1023.75
        assert_eq!(on_time_for(0.1), 410); // 409.5
        assert_eq!(on_time_for(f32::NAN), 0);
        assert_eq!(on_time_for(on_time_for(2.0) as f32 / 4095.0), 4095);
    }

    #[test]
    fn out_of_range_channel_is_ignored() {
        let (bus, mut pwm) = driver();

        assert_eq!(pwm.set_channel_duty_cycle(16, 0.5), Ok(()));
        assert!(bus.transactions().is_empty());
    }

    #[test]
    fn all_channels_use_broadcast_block() {
        let (bus, mut pwm) = driver();

        pwm.set_all_channels_duty_cycle(1.0).unwrap();

        assert_eq!(
            bus.register_writes(DEFAULT_ADDRESS),
            vec![(0xFA, 0x00), (0xFB, 0x00), (0xFC, 0xFF), (0xFD, 0x0F)]
        );
    }

    #[test]
    fn init_resets_configures_zeroes_and_wakes() {
        let (bus, mut pwm) = driver();
        // Power-on MODE1: oscillator asleep
        bus.set_register(reg::MODE1, mode1::SLEEP | mode1::ALLCALL);

        pwm.init(&mut NoopDelay).unwrap();

        assert_eq!(bus.writes_to(GENERAL_CALL_ADDRESS), vec![vec![SWRST]]);
        assert_eq!(
            bus.register_writes(DEFAULT_ADDRESS),
            vec![
                (reg::MODE2, mode2::OUTDRV),
                (reg::MODE1, mode1::ALLCALL),
                (reg::ALL_LED_ON_L, 0),
                (reg::ALL_LED_ON_H, 0),
                (reg::ALL_LED_OFF_L, 0),
                (reg::ALL_LED_OFF_H, 0),
                (reg::MODE1, mode1::ALLCALL),
            ]
        );
        assert_eq!(bus.register(reg::MODE1) & mode1::SLEEP, 0);
    }

    #[test]
    fn init_without_ack_is_bus_unavailable() {
        let (bus, mut pwm) = driver();
        bus.fail_with(Some(ErrorKind::NoAcknowledge(
            embedded_hal::i2c::NoAcknowledgeSource::Address,
        )));

        let err = pwm.init(&mut NoopDelay).unwrap_err();

        assert!(matches!(err, Error::BusUnavailable(_)));
    }

    #[test]
    fn rejected_general_call_does_not_fail_init() {
        let (bus, mut pwm) = driver();
        bus.reject_address(GENERAL_CALL_ADDRESS);

        pwm.init(&mut NoopDelay).unwrap();

        assert!(bus.writes_to(GENERAL_CALL_ADDRESS).is_empty());
        assert_eq!(
            bus.register_writes(DEFAULT_ADDRESS)[..2],
            [(reg::MODE2, mode2::OUTDRV), (reg::MODE1, mode1::ALLCALL)]
        );
    }

    #[test]
    fn steady_state_failure_is_bus_error() {
        let (bus, mut pwm) = driver();
        bus.fail_with(Some(ErrorKind::Other));

        assert_eq!(
            pwm.set_channel_duty_cycle(0, 0.5),
            Err(Error::Bus(ErrorKind::Other))
        );
    }

    #[test]
    fn prescale_matches_datasheet_formula() {
        assert_eq!(prescale_for(200.0), 30); // power-on default 0x1E
        assert_eq!(prescale_for(50.0), 121);
        assert_eq!(prescale_for(1526.0), 3);
        assert_eq!(prescale_for(5000.0), PRESCALE_MIN);
        assert_eq!(prescale_for(10.0), PRESCALE_MAX);
        assert!((frequency_for(121) - 50.03).abs() < 0.01);
    }

    #[test]
    fn set_frequency_sleeps_writes_prescale_and_restarts() {
        let (bus, mut pwm) = driver();
        bus.set_register(reg::MODE1, mode1::ALLCALL);

        let effective = pwm.set_frequency(50.0, &mut NoopDelay).unwrap();

        assert!((effective - 50.03).abs() < 0.01);
        assert_eq!(
            bus.register_writes(DEFAULT_ADDRESS),
            vec![
                (reg::MODE1, mode1::ALLCALL | mode1::SLEEP),
                (reg::PRE_SCALE, 121),
                (reg::MODE1, mode1::ALLCALL),
                (reg::MODE1, mode1::ALLCALL | mode1::RESTART),
            ]
        );
    }

    #[test]
    fn free_returns_the_bus() {
        let (bus, pwm) = driver();
        let mut released = pwm.free();

        embedded_hal::i2c::I2c::write(&mut released, 0x10, &[1]).unwrap();

        assert_eq!(bus.writes_to(0x10), vec![vec![1]]);
    }
}
