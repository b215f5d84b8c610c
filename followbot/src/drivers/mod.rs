// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Device-Specific Drivers
//!
//! This module contains device-specific drivers that sit above the raw `hw/` layer and below the
//! motor and control logic.
//!
//! ## Existing drivers
//!
//! - [`pca9685`] – NXP PCA9685 16-channel 12-bit I2C PWM controller

pub mod pca9685;

pub use pca9685::Pca9685;
