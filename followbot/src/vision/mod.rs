// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Vision Sensor Interface
//!
//! A vision sensor reports colour-signature blocks each frame and carries a pan/tilt mount plus an
//! indicator LED. The tracking loop only sees the [`VisionSensor`] trait.
//!
//! ## Modules
//!
//! - [`channel`] - `VisionSensor` fed with frames over an `mpsc` channel.
//! - [`parser`] - Line-oriented text decoder for block frames.

use core::fmt;
use std::time::Duration;

pub mod channel;
pub mod parser;

pub use channel::{feed_frames, ChannelSensor, Disconnected};
pub use parser::{FrameParser, ParseError};

/// One detected object: bounding box centre and size in sensor pixels, plus its colour signature.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectedBlock {
    pub signature: u16,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl DetectedBlock {
    #[inline]
    pub fn area(&self) -> u32 {
        u32::from(self.width) * u32::from(self.height)
    }
}

/// Block-detecting camera with a pan/tilt mount.
pub trait VisionSensor {
    type Error: fmt::Debug;

    /// Return the blocks of the newest frame, or an empty list if none arrived within `timeout`.
    fn poll(&mut self, timeout: Duration) -> Result<Vec<DetectedBlock>, Self::Error>;

    fn set_indicator_color(&mut self, r: u8, g: u8, b: u8) -> Result<(), Self::Error>;

    /// Move the mount. Both positions are in [0, 1000].
    fn set_mount_position(&mut self, pan: u16, tilt: u16) -> Result<(), Self::Error>;

    /// Release the sensor.
    fn close(&mut self) {}
}
