// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Hardware Access
//!
//! Thin wrappers over the `embedded_hal` bus traits plus the board's pin map. Concrete buses and
//! pins come from `rppal` on the robot and from recording doubles in the unit tests.

pub mod i2c;
pub mod pins;

#[cfg(test)]
pub(crate) mod mock;

pub use i2c::RegisterBus;
pub use pins::{BoardConfig, WheelPins};
