// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Control Algorithms
//!
//! This module provides the closed-loop pieces of the follower: pan/tilt servoing, target
//! selection, wheel-speed mixing and the polling loop that ties them to the hardware.
//!
//! ## Modules
//!
//! - [`servo_loop`] - Integer PD controller for one mount axis.
//! - [`follower`] - Target selection, running size estimate and wheel-speed computation.
//! - [`tracking`] - Polling loop, its worker thread and the shutdown handle.

pub mod follower;
pub mod servo_loop;
pub mod tracking;

pub use follower::{Aim, DriveCommand, Follower, RunningSize, WheelCommand};
pub use servo_loop::ServoLoop;
pub use tracking::{
    Command, Released, ShutdownError, TrackingController, TrackingHandle, TrackingState,
};
