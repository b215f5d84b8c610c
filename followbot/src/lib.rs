// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Followbot
//!
//! This crate contains the control stack for a small differential-drive robot that follows a
//! coloured object. A block-detecting camera on a pan/tilt mount reports targets, two PD loops keep
//! the mount pointed at the chosen one, and the mount angle and target size steer the wheels
//! through a PCA9685 motor shield. Written in Rust, targeting a Raspberry Pi.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`hw`] | I2C register access and the board's pin map |
//! | [`drivers`] | Device-level drivers (PCA9685) |
//! | [`motors`] | Wheel pair on the motor shield and the `Drive` trait |
//! | [`control`] | PD servo loop, following policy and the tracking loop thread |
//! | [`vision`] | Vision sensor interface and the text block feed |
//! | [`config`] | TOML configuration |
//!
//! ## Getting Started
//!
//! Build docs:
//!
//! ```bash
//! cargo doc --no-deps --open
//! ```
//!
//! Follow blocks piped in on stdin:
//!
//! ```bash
//! RUST_LOG=followbot=debug block-source | cargo run --release --bin followbot -- -c followbot.toml
//! ```
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//!
//! © 2025–2026 Christopher Liu

pub mod config;
pub mod control;
pub mod drivers;
pub mod hw;
pub mod motors;
pub mod vision;
