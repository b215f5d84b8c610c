// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Differential-drive wheel pair on a PCA9685 motor shield.
//!
//! Each wheel is driven by one GPIO direction line and one PWM channel on the shared PCA9685.
//! Direction low means forward unless the wheel is wired inverted. The last command issued to each
//! wheel is remembered so the control loop can ramp it down smoothly.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, ErrorKind, OutputPin};
use embedded_hal::i2c::I2c;
use tracing::{debug, info, trace, warn};

use crate::drivers::pca9685::{self, Pca9685};
use crate::hw::pins::{BoardConfig, WheelPins};

/// Buzzer duty cycle while sounding.
const BUZZER_DUTY: f32 = 0.5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];
}

/// Logical drive direction of a wheel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Last command issued to a wheel.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct WheelState {
    pub direction: Direction,
    /// Fraction of full power in [0, 1].
    pub power: f32,
}

/// Something that can drive the two wheels of a differential-drive base.
pub trait Drive {
    type Error: fmt::Debug;

    /// Command one wheel. `power` is clamped to [0, 1].
    fn set_wheel_power(
        &mut self,
        side: Side,
        direction: Direction,
        power: f32,
    ) -> Result<(), Self::Error>;

    /// Last command issued to `side`.
    fn wheel(&self, side: Side) -> WheelState;

    fn stop(&mut self, side: Side) -> Result<(), Self::Error> {
        self.set_wheel_power(side, Direction::Forward, 0.0)
    }

    #[inline]
    fn power(&self, side: Side) -> f32 {
        self.wheel(side).power
    }

    #[inline]
    fn direction(&self, side: Side) -> Direction {
        self.wheel(side).direction
    }

    /// Sound or silence the buzzer, if the base has one.
    fn set_buzzer(&mut self, _on: bool) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Part that failed to come up during [`WheelMotors::init`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Hardware {
    PwmDriver(pca9685::Error),
    DirectionPin(Side, ErrorKind),
}

/// Error type for `WheelMotors` operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Bring-up failed.
    HardwareUnavailable(Hardware),
    /// Direction line write failed.
    Pin(Side, ErrorKind),
    /// PWM write failed.
    Pwm(pca9685::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::HardwareUnavailable(Hardware::PwmDriver(e)) => {
                write!(f, "motor shield unavailable: {e}")
            }
            Error::HardwareUnavailable(Hardware::DirectionPin(side, kind)) => {
                write!(f, "motor shield unavailable: {side:?} direction pin: {kind}")
            }
            Error::Pin(side, kind) => write!(f, "{side:?} direction pin write failed: {kind}"),
            Error::Pwm(e) => write!(f, "wheel PWM write failed: {e}"),
        }
    }
}

impl std::error::Error for Error {}

/// Two wheels sharing one PCA9685.
pub struct WheelMotors<I2C, PIN> {
    pwm: Pca9685<I2C>,
    left_dir: PIN,
    right_dir: PIN,
    board: BoardConfig,
    left: WheelState,
    right: WheelState,
}

impl<I2C, PIN> WheelMotors<I2C, PIN>
where
    I2C: I2c,
    PIN: OutputPin,
{
    /// Assemble the shield from an (uninitialised) PWM driver and the two direction outputs.
    pub fn new(pwm: Pca9685<I2C>, left_dir: PIN, right_dir: PIN, board: &BoardConfig) -> Self {
        Self {
            pwm,
            left_dir,
            right_dir,
            board: board.clone(),
            left: WheelState::default(),
            right: WheelState::default(),
        }
    }

    /// Bring up the PWM driver and leave both wheels stopped, pointing forward.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        info!(
            left = ?self.board.left,
            right = ?self.board.right,
            pwm_address = self.board.pwm_address,
            "initializing wheel motors"
        );

        let unavailable = |e| Error::HardwareUnavailable(Hardware::PwmDriver(e));

        self.pwm.init(delay).map_err(unavailable)?;

        if let Some(hz) = self.board.pwm_frequency_hz {
            let effective = self.pwm.set_frequency(hz, delay).map_err(unavailable)?;
            info!(requested = hz, effective, "PWM frequency set");
        }

        for side in Side::BOTH {
            self.write_direction(side, Direction::Forward)
                .map_err(|e| match e {
                    Error::Pin(side, kind) => {
                        Error::HardwareUnavailable(Hardware::DirectionPin(side, kind))
                    }
                    other => other,
                })?;
        }

        self.pwm
            .set_all_channels_duty_cycle(0.0)
            .map_err(unavailable)?;
        self.left = WheelState::default();
        self.right = WheelState::default();

        info!("wheel motors ready");
        Ok(())
    }

    /// Command one wheel.
    ///
    /// The command is recorded before it reaches the hardware, so `wheel()` reports what was last
    /// asked for even if the bus write failed.
    pub fn set_wheel_power(
        &mut self,
        side: Side,
        direction: Direction,
        power: f32,
    ) -> Result<(), Error> {
        let power = if power.is_nan() {
            0.0
        } else {
            power.clamp(0.0, 1.0)
        };

        trace!(?side, ?direction, percent = power * 100.0, "wheel command");

        *self.state_mut(side) = WheelState { direction, power };

        self.write_direction(side, direction)?;
        let channel = self.pins(side).pwm_channel;
        self.pwm
            .set_channel_duty_cycle(channel, power)
            .map_err(Error::Pwm)
    }

    /// Stop one wheel (forward, zero power).
    pub fn stop(&mut self, side: Side) -> Result<(), Error> {
        debug!(?side, "wheel stop");
        self.set_wheel_power(side, Direction::Forward, 0.0)
    }

    /// Stop both wheels. Both are attempted even if the first fails.
    pub fn stop_all(&mut self) -> Result<(), Error> {
        let left = self.stop(Side::Left);
        let right = self.stop(Side::Right);
        left.and(right)
    }

    #[inline]
    pub fn wheel(&self, side: Side) -> WheelState {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    #[inline]
    pub fn power(&self, side: Side) -> f32 {
        self.wheel(side).power
    }

    #[inline]
    pub fn direction(&self, side: Side) -> Direction {
        self.wheel(side).direction
    }

    /// Drive the buzzer channel at half duty, or silence it.
    pub fn set_buzzer(&mut self, on: bool) -> Result<(), Error> {
        let Some(channel) = self.board.buzzer_channel else {
            warn!("no buzzer channel configured");
            return Ok(());
        };

        debug!(on, "buzzer");
        let duty = if on { BUZZER_DUTY } else { 0.0 };
        self.pwm
            .set_channel_duty_cycle(channel, duty)
            .map_err(Error::Pwm)
    }

    /// Stop both wheels, then hand back the bus and both direction pins.
    ///
    /// A failure to stop is logged; the resources are released regardless.
    pub fn free(mut self) -> (I2C, PIN, PIN) {
        if let Err(e) = self.stop_all() {
            warn!(error = %e, "failed to stop wheels before release");
        }
        info!("releasing wheel motors");
        (self.pwm.free(), self.left_dir, self.right_dir)
    }

    fn write_direction(&mut self, side: Side, direction: Direction) -> Result<(), Error> {
        let high = (direction == Direction::Backward) != self.pins(side).inverted;
        let pin = match side {
            Side::Left => &mut self.left_dir,
            Side::Right => &mut self.right_dir,
        };

        let result = if high { pin.set_high() } else { pin.set_low() };
        result.map_err(|e| Error::Pin(side, e.kind()))
    }

    #[inline]
    fn pins(&self, side: Side) -> WheelPins {
        match side {
            Side::Left => self.board.left,
            Side::Right => self.board.right,
        }
    }

    #[inline]
    fn state_mut(&mut self, side: Side) -> &mut WheelState {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

impl<I2C, PIN> Drive for WheelMotors<I2C, PIN>
where
    I2C: I2c,
    PIN: OutputPin,
{
    type Error = Error;

    fn set_wheel_power(
        &mut self,
        side: Side,
        direction: Direction,
        power: f32,
    ) -> Result<(), Error> {
        WheelMotors::set_wheel_power(self, side, direction, power)
    }

    fn wheel(&self, side: Side) -> WheelState {
        WheelMotors::wheel(self, side)
    }

    fn stop(&mut self, side: Side) -> Result<(), Error> {
        WheelMotors::stop(self, side)
    }

    fn set_buzzer(&mut self, on: bool) -> Result<(), Error> {
        WheelMotors::set_buzzer(self, on)
    }
}
