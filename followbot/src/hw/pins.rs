// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Pin and channel assignments for the motor shield.
//!
//! The defaults match the shield wiring on the robot: the PCA9685 sits at 0x40 on I2C bus 1, the
//! left wheel takes GPIO 5 for direction and PWM channel 1, the right wheel GPIO 4 and channel 0,
//! and the buzzer hangs off channel 2.
//!
//! Override any of these from the `[board]` table of the configuration file:
//!
//! ```toml
//! [board]
//! pwm_address = 0x41
//! left = { direction_pin = 17, pwm_channel = 4, inverted = true }
//! ```

use serde::Deserialize;

/// Wiring of a single wheel.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq)]
pub struct WheelPins {
    /// BCM GPIO number of the direction line.
    pub direction_pin: u8,
    /// PCA9685 channel driving the wheel's enable/PWM input.
    pub pwm_channel: u8,
    /// Swap the direction levels (forward = high) for a motor wired the other way round.
    #[serde(default)]
    pub inverted: bool,
}

/// Everything the motor shield needs to know about the board.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BoardConfig {
    pub i2c_bus: u8,
    pub pwm_address: u8,
    /// PWM output frequency. `None` keeps the chip's power-on prescaler (~200 Hz).
    pub pwm_frequency_hz: Option<f32>,
    pub left: WheelPins,
    pub right: WheelPins,
    pub buzzer_channel: Option<u8>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            pwm_address: 0x40,
            pwm_frequency_hz: None,
            left: WheelPins {
                direction_pin: 5,
                pwm_channel: 1,
                inverted: false,
            },
            right: WheelPins {
                direction_pin: 4,
                pwm_channel: 0,
                inverted: false,
            },
            buzzer_channel: Some(2),
        }
    }
}
