// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Actuator Abstractions
//!
//! This module contains motor-level wrappers that sit above device-level drivers in `drivers`.
//!
//! ## Modules
//!
//! - [`wheels`] - Differential-drive wheel pair built on `Pca9685` plus two GPIO direction lines.
//!
//! The [`Drive`] trait is the seam between the control loop and the wheels, so the loop can run
//! against anything that accepts per-wheel direction and power commands.

pub mod wheels;

pub use wheels::{Direction, Drive, Error, Hardware, Side, WheelMotors, WheelState};
