// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Target selection and following policy.
//!
//! [`Follower`] turns each frame of detected blocks into a mount aim and, while a target is locked,
//! a pair of wheel commands. It has no I/O of its own; [`TrackingController`] owns one and applies
//! its outputs to the sensor and the wheels.
//!
//! [`TrackingController`]: crate::control::TrackingController

use tracing::trace;

use crate::config::TrackingConfig;
use crate::control::servo_loop::{ServoLoop, CENTER_POS};
use crate::motors::{Direction, WheelState};
use crate::vision::DetectedBlock;

/// Fastest wheel speed, in loop units.
pub const MAX_SPEED: i32 = 400;
/// Slowest forward speed. Negative values back away from a target that is too close.
pub const MIN_FORWARD_SPEED: i32 = -100;

/// Exponentially decayed sum of target areas.
///
/// Each update computes `size += area; size -= size >> 3`. For a constant area `A` the accumulated
/// sum `size + A` settles at `8·A`, leaving the stored estimate at `7·A`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RunningSize {
    size: i64,
}

impl RunningSize {
    pub fn new(seed: i64) -> Self {
        Self { size: seed }
    }

    pub fn update(&mut self, area: u32) -> i64 {
        self.size += i64::from(area);
        self.size -= self.size >> 3;
        self.size
    }

    #[inline]
    pub fn value(&self) -> i64 {
        self.size
    }
}

/// Left and right wheel speeds in [-400, 400] for a steering error and size estimate.
///
/// The target's apparent size sets the forward speed; the steering error adds a differential
/// that grows with it.
pub fn wheel_speeds(follow_error: i32, size: i64) -> (i32, i32) {
    let forward = (i64::from(MAX_SPEED) - size / 256)
        .clamp(i64::from(MIN_FORWARD_SPEED), i64::from(MAX_SPEED));

    let follow_error = i64::from(follow_error);
    let differential = (follow_error + follow_error * forward) >> 8;

    let limit = i64::from(MAX_SPEED);
    let left = (forward + differential).clamp(-limit, limit);
    let right = (forward - differential).clamp(-limit, limit);

    (left as i32, right as i32)
}

/// Direction and power for one wheel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WheelCommand {
    pub direction: Direction,
    pub power: f32,
}

impl WheelCommand {
    /// Map a signed speed onto direction and a power fraction of `divisor`.
    pub fn from_speed(speed: i32, divisor: f32) -> Self {
        let direction = if speed >= 0 {
            Direction::Forward
        } else {
            Direction::Backward
        };

        let power = speed.unsigned_abs() as f32 / divisor;
        let power = if power.is_nan() {
            0.0
        } else {
            power.clamp(0.0, 1.0)
        };

        Self { direction, power }
    }
}

/// Output of one following step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DriveCommand {
    pub left: WheelCommand,
    pub right: WheelCommand,
    pub left_speed: i32,
    pub right_speed: i32,
}

/// Pan/tilt mount positions, each in [0, 1000].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Aim {
    pub pan: u16,
    pub tilt: u16,
}

/// Wheel state after one decay step: same direction, power reduced by `step` toward zero.
pub fn decayed(state: WheelState, step: f32) -> WheelState {
    WheelState {
        direction: state.direction,
        power: (state.power - step).clamp(0.0, 1.0),
    }
}

pub struct Follower {
    pan: ServoLoop,
    tilt: ServoLoop,
    target: Option<DetectedBlock>,
    size: RunningSize,
    x_center: i32,
    y_center: i32,
    power_divisor: f32,
}

impl Follower {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            pan: ServoLoop::from_gains(config.pan_gains),
            tilt: ServoLoop::from_gains(config.tilt_gains),
            target: None,
            size: RunningSize::new(config.initial_size),
            x_center: config.x_center,
            y_center: config.y_center,
            power_divisor: config.power_divisor,
        }
    }

    /// Pick the block to follow from one frame.
    ///
    /// While a target is locked only blocks with its signature qualify. The largest area wins; the
    /// earlier block wins a tie and a zero-area block is never picked.
    pub fn select(&self, blocks: &[DetectedBlock]) -> Option<DetectedBlock> {
        let signature = self.target.map(|t| t.signature);

        let mut best = None;
        let mut max_area = 0;
        for block in blocks {
            if signature.is_some_and(|s| s != block.signature) {
                continue;
            }
            let area = block.area();
            if area > max_area {
                best = Some(*block);
                max_area = area;
            }
        }
        best
    }

    /// Process one frame: select a block and steer the mount toward it.
    ///
    /// An empty frame drops the target. A frame with no qualifying block keeps the current target
    /// and returns `None`.
    pub fn track(&mut self, blocks: &[DetectedBlock]) -> Option<(DetectedBlock, Aim)> {
        if blocks.is_empty() {
            self.target = None;
            return None;
        }

        let block = self.select(blocks)?;

        let pan_error = self.x_center - i32::from(block.x);
        let tilt_error = i32::from(block.y) - self.y_center;
        let pan = self.pan.update(pan_error);
        let tilt = self.tilt.update(tilt_error);
        self.target = Some(block);

        trace!(pan_error, tilt_error, pan, tilt, "mount update");

        // Positions are clamped to [0, 1000]
        Some((
            block,
            Aim {
                pan: pan as u16,
                tilt: tilt as u16,
            },
        ))
    }

    /// Wheel commands that chase `block`, given the mount has just been aimed at it.
    pub fn follow(&mut self, block: &DetectedBlock) -> DriveCommand {
        let size = self.size.update(block.area());
        let follow_error = CENTER_POS - self.pan.position();
        let (left_speed, right_speed) = wheel_speeds(follow_error, size);

        trace!(size, follow_error, left_speed, right_speed, "follow");

        DriveCommand {
            left: WheelCommand::from_speed(left_speed, self.power_divisor),
            right: WheelCommand::from_speed(right_speed, self.power_divisor),
            left_speed,
            right_speed,
        }
    }

    #[inline]
    pub fn target(&self) -> Option<DetectedBlock> {
        self.target
    }

    #[inline]
    pub fn pan(&self) -> &ServoLoop {
        &self.pan
    }

    #[inline]
    pub fn tilt(&self) -> &ServoLoop {
        &self.tilt
    }

    #[inline]
    pub fn size(&self) -> i64 {
        self.size.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(signature: u16, width: u16, height: u16) -> DetectedBlock {
        DetectedBlock {
            signature,
            x: 160,
            y: 100,
            width,
            height,
        }
    }

    fn follower() -> Follower {
        Follower::new(&TrackingConfig::default())
    }

    #[test]
    fn largest_block_wins_without_a_target() {
        let f = follower();
        let blocks = [block(1, 5, 10), block(2, 10, 20), block(3, 2, 2)];

        assert_eq!(f.select(&blocks), Some(blocks[1]));
    }

    #[test]
    fn locked_signature_is_sticky() {
        let mut f = follower();
        f.track(&[block(1, 5, 5)]).unwrap();

        let blocks = [block(1, 5, 10), block(2, 10, 20)];
        assert_eq!(f.select(&blocks), Some(blocks[0]));
    }

    #[test]
    fn first_block_wins_ties_and_zero_area_is_never_selected() {
        let f = follower();

        let tie = [
            DetectedBlock {
                x: 10,
                ..block(1, 4, 4)
            },
            DetectedBlock {
                x: 20,
                ..block(2, 4, 4)
            },
        ];
        assert_eq!(f.select(&tie).map(|b| b.x), Some(10));
        assert_eq!(f.select(&[block(1, 0, 10), block(2, 10, 0)]), None);
    }

    #[test]
    fn empty_frame_clears_target() {
        let mut f = follower();
        f.track(&[block(1, 5, 5)]).unwrap();

        assert_eq!(f.track(&[]), None);
        assert_eq!(f.target(), None);

        // Any signature is eligible again
        assert_eq!(f.track(&[block(2, 3, 3)]).map(|(b, _)| b.signature), Some(2));
    }

    #[test]
    fn frame_without_matching_signature_keeps_target() {
        let mut f = follower();
        f.track(&[block(1, 5, 5)]).unwrap();
        let pan_before = f.pan().clone();

        assert_eq!(f.track(&[block(2, 50, 50)]), None);
        assert_eq!(f.target().map(|b| b.signature), Some(1));
        assert_eq!(f.pan(), &pan_before);
    }

    #[test]
    fn mount_follows_block_offset() {
        let mut f = follower();
        let left_of_centre = DetectedBlock {
            x: 0,
            y: 100,
            ..block(1, 10, 10)
        };

        let (_, aim) = f.track(&[left_of_centre]).unwrap();
        assert_eq!(aim, Aim { pan: 500, tilt: 500 });

        let (_, aim) = f.track(&[left_of_centre]).unwrap();
        // (160·200) >> 10 = 31
        assert_eq!(aim, Aim { pan: 531, tilt: 500 });
    }

    #[test]
    fn reacquisition_keeps_controller_memory() {
        let mut f = follower();
        let off_centre = DetectedBlock {
            x: 100,
            ..block(1, 10, 10)
        };
        f.track(&[off_centre]).unwrap();

        f.track(&[]);
        assert_eq!(f.pan().previous_error(), Some(60));

        let (_, aim) = f.track(&[off_centre]).unwrap();
        // Derivative is zero; proportional (60·200) >> 10 = 11
        assert_eq!(aim.pan, 511);
    }

    #[test]
    fn running_size_converges_geometrically() {
        let mut size = RunningSize::new(400);

        // 400 + 100 = 500, 500 − 62 = 438
        assert_eq!(size.update(100), 438);
        assert_eq!(size.update(100), 471);

        let mut last = 471;
        for _ in 0..100 {
            let next = size.update(100);
            assert!(next >= last);
            last = next;
        }
        // Accumulated sum before the decay sits at 8·A
        assert_eq!(last, 700);
        assert_eq!(last + 100, 800);
    }

    #[test]
    fn centred_target_drives_straight_ahead() {
        assert_eq!(wheel_speeds(0, 400), (399, 399));
        assert_eq!(wheel_speeds(0, 0), (400, 400));
    }

    #[test]
    fn large_target_backs_away() {
        let (left, right) = wheel_speeds(0, 1_000_000);
        assert_eq!((left, right), (-100, -100));

        let cmd = WheelCommand::from_speed(left, 400.0);
        assert_eq!(cmd.direction, Direction::Backward);
        assert_eq!(cmd.power, 0.25);
    }

    #[test]
    fn steering_error_splits_wheel_speeds() {
        // (100 + 100·400) >> 8 = 156
        assert_eq!(wheel_speeds(100, 0), (400, 244));
        // (−100 − 100·400) >> 8 = −157
        assert_eq!(wheel_speeds(-100, 0), (243, 400));
    }

    #[test]
    fn power_is_speed_over_divisor() {
        let cmd = WheelCommand::from_speed(200, 400.0);
        assert_eq!(cmd.direction, Direction::Forward);
        assert_eq!(cmd.power, 0.5);

        assert_eq!(WheelCommand::from_speed(400, 500.0).power, 0.8);
        assert_eq!(WheelCommand::from_speed(-400, 100.0).power, 1.0);
    }

    #[test]
    fn follow_uses_pan_position_and_size() {
        let mut f = follower();
        let b = block(1, 10, 10);
        f.track(&[b]).unwrap();

        let cmd = f.follow(&b);

        // size: 400 + 100 − 62 = 438; forward 400 − 1 = 399; pan centred
        assert_eq!(f.size(), 438);
        assert_eq!((cmd.left_speed, cmd.right_speed), (399, 399));
        assert_eq!(cmd.left.direction, Direction::Forward);
        assert_eq!(cmd.left.power, 399.0 / 400.0);
    }

    #[test]
    fn decay_preserves_direction_and_stops_at_zero() {
        let state = WheelState {
            direction: Direction::Backward,
            power: 0.08,
        };

        let once = decayed(state, 0.05);
        assert_eq!(once.direction, Direction::Backward);
        assert!((once.power - 0.03).abs() < 1e-6);

        let twice = decayed(once, 0.05);
        assert_eq!(twice.power, 0.0);
        assert_eq!(twice.direction, Direction::Backward);
    }
}
