// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Integer PD controller for one axis of the pan/tilt mount.
//!
//! The controller integrates a velocity into a bounded position estimate. Gains are fixed-point
//! with 10 fractional bits, so a gain of 1024 is unity.

use crate::config::Gains;

/// Lowest mount position.
pub const MIN_POS: i32 = 0;
/// Highest mount position.
pub const MAX_POS: i32 = 1000;
/// Mount midpoint.
pub const CENTER_POS: i32 = (MIN_POS + MAX_POS) / 2;

/// Fractional bits in the gains.
const GAIN_SHIFT: u32 = 10;

/// PD servo state for one axis.
#[derive(Clone, Debug, PartialEq)]
pub struct ServoLoop {
    position: i32,
    /// `None` until the first update.
    prev_error: Option<i32>,
    kp: i32,
    kd: i32,
}

impl ServoLoop {
    /// Create a controller at the centre position.
    pub fn new(kp: i32, kd: i32) -> Self {
        Self {
            position: CENTER_POS,
            prev_error: None,
            kp,
            kd,
        }
    }

    pub fn from_gains(gains: Gains) -> Self {
        Self::new(gains.kp, gains.kd)
    }

    /// Feed one error sample and return the new position.
    ///
    /// The first sample only primes the derivative term. Afterwards the position moves by
    /// `(error·Kp + Δerror·Kd) >> 10` and is clamped to [`MIN_POS`, `MAX_POS`].
    pub fn update(&mut self, error: i32) -> i32 {
        if let Some(prev) = self.prev_error {
            let error_w = i64::from(error);
            let delta = error_w - i64::from(prev);
            let velocity = error_w
                .saturating_mul(i64::from(self.kp))
                .saturating_add(delta.saturating_mul(i64::from(self.kd)))
                >> GAIN_SHIFT;

            let position = (i64::from(self.position) + velocity)
                .clamp(i64::from(MIN_POS), i64::from(MAX_POS));
            self.position = position as i32;
        }

        self.prev_error = Some(error);
        self.position
    }

    #[inline]
    pub fn position(&self) -> i32 {
        self.position
    }

    #[inline]
    pub fn previous_error(&self) -> Option<i32> {
        self.prev_error
    }
}
