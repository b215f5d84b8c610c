// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Closed-loop object tracking and following.
//!
//! [`TrackingController`] owns the vision sensor, the wheels and the [`Follower`] policy, and
//! provides a periodic `step()` that polls one frame and applies the result. [`run`] moves the
//! controller onto its own thread and hands back a [`TrackingHandle`] for commands and shutdown.
//!
//! Typical usage pattern:
//!
//! ```no_run
//! # use std::time::Duration;
//! # use followbot::config::TrackingConfig;
//! # use followbot::control::{Command, TrackingController};
//! # fn demo<S, D>(sensor: S, drive: D) -> std::io::Result<()>
//! # where
//! #     S: followbot::vision::VisionSensor + Send + 'static,
//! #     D: followbot::motors::Drive + Send + 'static,
//! # {
//! let handle = TrackingController::new(sensor, drive, TrackingConfig::default()).run()?;
//!
//! handle.send(Command::Beep(Duration::from_millis(200)));
//!
//! match handle.shutdown(Duration::from_secs(3)) {
//!     Ok(_released) => {}
//!     Err(e) => eprintln!("{e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`run`]: TrackingController::run

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::config::TrackingConfig;
use crate::control::follower::{decayed, DriveCommand, Follower};
use crate::control::servo_loop::CENTER_POS;
use crate::motors::{Drive, Side};
use crate::vision::{DetectedBlock, VisionSensor};

/// Indicator colour while the loop runs.
const RUNNING_COLOR: (u8, u8, u8) = (0, 0, 255);

/// Whether a target is currently locked.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackingState {
    Searching,
    Tracking,
}

/// Requests accepted by a running loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sound the buzzer for this long.
    Beep(Duration),
    /// Stop the wheels and stop issuing wheel commands. The mount keeps tracking.
    Hold,
    /// Resume following after `Hold`.
    Release,
}

/// Resources handed back when the loop stops.
pub struct Released<S, D> {
    pub sensor: S,
    pub drive: D,
}

struct FrameStats {
    frames: u64,
    window_start: Instant,
    window_frames: u64,
}

impl FrameStats {
    fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
            window_frames: 0,
        }
    }
}

pub struct TrackingController<S, D> {
    sensor: S,
    drive: D,
    follower: Follower,
    config: TrackingConfig,

    state: TrackingState,
    /// Time of the last frame that produced a wheel command.
    last_update: Instant,
    held: bool,
    buzzer_until: Option<Instant>,
    poll_failing: bool,
    stats: FrameStats,
}

impl<S, D> TrackingController<S, D>
where
    S: VisionSensor,
    D: Drive,
{
    pub fn new(sensor: S, drive: D, config: TrackingConfig) -> Self {
        let now = Instant::now();
        Self {
            sensor,
            drive,
            follower: Follower::new(&config),
            config,
            state: TrackingState::Searching,
            last_update: now,
            held: false,
            buzzer_until: None,
            poll_failing: false,
            stats: FrameStats::new(now),
        }
    }

    #[inline]
    pub fn state(&self) -> TrackingState {
        self.state
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.held
    }

    #[inline]
    pub fn follower(&self) -> &Follower {
        &self.follower
    }

    #[inline]
    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    #[inline]
    pub fn drive(&self) -> &D {
        &self.drive
    }

    /// Total frames received so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.stats.frames
    }

    /// Light the indicator and centre the mount. Starts the frame clock at `now`.
    pub fn start(&mut self, now: Instant) {
        info!(config = ?self.config, "tracking loop starting");

        let (r, g, b) = RUNNING_COLOR;
        if let Err(e) = self.sensor.set_indicator_color(r, g, b) {
            warn!(error = ?e, "failed to set indicator colour");
        }

        let centre = CENTER_POS as u16;
        if let Err(e) = self.sensor.set_mount_position(centre, centre) {
            warn!(error = ?e, "failed to centre mount");
        }

        self.last_update = now;
        self.stats = FrameStats::new(now);
    }

    /// Time left before the next poll is due, or `None` if it is due now.
    pub fn frame_wait(&self, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.last_update);
        let interval = self.config.min_frame_interval();
        (elapsed < interval).then(|| interval - elapsed)
    }

    /// Run one poll cycle.
    pub fn step(&mut self, now: Instant) -> TrackingState {
        let updated = match self.poll() {
            Some(blocks) => {
                self.stats.frames += 1;
                self.stats.window_frames += 1;
                self.process(&blocks, now)
            }
            None => false,
        };

        if !updated {
            self.decay_if_stale(now);
        }

        self.log_stats(now);
        self.state
    }

    /// Apply one command.
    pub fn handle(&mut self, command: Command, now: Instant) {
        match command {
            Command::Beep(duration) => {
                debug!(?duration, "beep");
                if let Err(e) = self.drive.set_buzzer(true) {
                    warn!(error = ?e, "failed to sound buzzer");
                }
                self.buzzer_until = Some(now + duration);
            }
            Command::Hold => {
                info!("holding wheels");
                self.held = true;
                self.stop_wheels();
            }
            Command::Release => {
                info!("releasing wheels");
                self.held = false;
            }
        }
    }

    /// Silence the buzzer once its time is up.
    pub fn service_buzzer(&mut self, now: Instant) {
        match self.buzzer_until {
            Some(until) if now >= until => {
                self.buzzer_until = None;
                if let Err(e) = self.drive.set_buzzer(false) {
                    warn!(error = ?e, "failed to silence buzzer");
                }
            }
            _ => {}
        }
    }

    /// Stop the wheels, turn off the indicator and release the sensor.
    pub fn finish(mut self) -> Released<S, D> {
        info!(frames = self.stats.frames, "tracking loop stopped");

        self.stop_wheels();
        if self.buzzer_until.take().is_some() {
            if let Err(e) = self.drive.set_buzzer(false) {
                warn!(error = ?e, "failed to silence buzzer");
            }
        }
        if let Err(e) = self.sensor.set_indicator_color(0, 0, 0) {
            warn!(error = ?e, "failed to clear indicator");
        }
        self.sensor.close();

        Released {
            sensor: self.sensor,
            drive: self.drive,
        }
    }

    fn poll(&mut self) -> Option<Vec<DetectedBlock>> {
        match self.sensor.poll(self.config.poll_timeout()) {
            Ok(blocks) => {
                if self.poll_failing {
                    info!("sensor poll recovered");
                    self.poll_failing = false;
                }
                Some(blocks)
            }
            Err(e) => {
                if self.poll_failing {
                    trace!(error = ?e, "sensor poll failed");
                } else {
                    warn!(error = ?e, "sensor poll failed");
                    self.poll_failing = true;
                }
                None
            }
        }
    }

    /// Returns `true` if the frame produced a tracking update.
    fn process(&mut self, blocks: &[DetectedBlock], now: Instant) -> bool {
        let Some((block, aim)) = self.follower.track(blocks) else {
            if self.follower.target().is_none() {
                self.set_state(TrackingState::Searching, None);
            }
            return false;
        };

        self.set_state(TrackingState::Tracking, Some(&block));

        if let Err(e) = self.sensor.set_mount_position(aim.pan, aim.tilt) {
            warn!(error = ?e, "failed to move mount");
        }

        let command = self.follower.follow(&block);
        if !self.held {
            self.apply(&command);
        }

        self.last_update = now;
        true
    }

    fn apply(&mut self, command: &DriveCommand) {
        for (side, wheel) in [(Side::Left, command.left), (Side::Right, command.right)] {
            if let Err(e) = self
                .drive
                .set_wheel_power(side, wheel.direction, wheel.power)
            {
                warn!(?side, error = ?e, "wheel command failed");
            }
        }
    }

    fn decay_if_stale(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_update) <= self.config.stale_after() {
            return;
        }

        for side in Side::BOTH {
            let current = self.drive.wheel(side);
            if current.power <= 0.0 {
                continue;
            }

            let next = decayed(current, self.config.decay_step);
            trace!(?side, from = current.power, to = next.power, "wheel decay");
            if let Err(e) = self.drive.set_wheel_power(side, next.direction, next.power) {
                warn!(?side, error = ?e, "wheel decay failed");
            }
        }
    }

    fn stop_wheels(&mut self) {
        for side in Side::BOTH {
            if let Err(e) = self.drive.stop(side) {
                warn!(?side, error = ?e, "failed to stop wheel");
            }
        }
    }

    fn set_state(&mut self, state: TrackingState, block: Option<&DetectedBlock>) {
        if self.state == state {
            return;
        }
        self.state = state;

        match (state, block) {
            (TrackingState::Tracking, Some(b)) => {
                info!(signature = b.signature, x = b.x, y = b.y, "target acquired")
            }
            _ => info!("target lost"),
        }
    }

    fn log_stats(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.stats.window_start);
        if elapsed < self.config.stats_interval() {
            return;
        }

        let fps = self.stats.window_frames as f32 / elapsed.as_secs_f32();
        let frame_ms = if fps > 0.0 { 1000.0 / fps } else { 0.0 };
        info!(frames = self.stats.frames, fps, frame_ms, "frame rate");

        self.stats.window_start = now;
        self.stats.window_frames = 0;
    }
}

impl<S, D> TrackingController<S, D>
where
    S: VisionSensor + Send + 'static,
    D: Drive + Send + 'static,
{
    /// Move the loop onto a dedicated thread.
    pub fn run(self) -> std::io::Result<TrackingHandle<S, D>> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (command_tx, command_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::sync_channel(1);

        let flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("tracking".into())
            .spawn(move || {
                let released = self.run_loop(&flag, &command_rx);
                // Caller may have given up waiting
                let _ = done_tx.send(released);
            })?;

        Ok(TrackingHandle {
            shutdown,
            commands: command_tx,
            done: done_rx,
            thread: Some(thread),
        })
    }

    fn run_loop(mut self, shutdown: &AtomicBool, commands: &Receiver<Command>) -> Released<S, D> {
        self.start(Instant::now());

        while !shutdown.load(Ordering::Acquire) {
            let now = Instant::now();

            while let Ok(command) = commands.try_recv() {
                self.handle(command, now);
            }
            self.service_buzzer(now);

            match self.frame_wait(now) {
                Some(wait) => thread::sleep(wait),
                None => {
                    self.step(now);
                }
            }
        }

        self.finish()
    }
}

/// Control handle for a loop started with [`TrackingController::run`].
///
/// Dropping the handle asks the loop to stop but does not wait for it.
pub struct TrackingHandle<S, D> {
    shutdown: Arc<AtomicBool>,
    commands: Sender<Command>,
    done: Receiver<Released<S, D>>,
    thread: Option<JoinHandle<()>>,
}

impl<S, D> TrackingHandle<S, D> {
    /// Queue a command. Returns `false` if the loop has already exited.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Raise the shutdown flag without waiting.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Stop the loop and wait up to `timeout` for it to hand back its resources.
    ///
    /// On timeout the handle comes back inside the error so the caller can wait again or give up.
    pub fn shutdown(mut self, timeout: Duration) -> Result<Released<S, D>, ShutdownError<S, D>> {
        info!(?timeout, "shutting down tracking loop");
        self.request_shutdown();

        match self.done.recv_timeout(timeout) {
            Ok(released) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                Ok(released)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "tracking loop did not stop in time");
                Err(ShutdownError::TimedOut(self))
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                error!("tracking loop panicked");
                Err(ShutdownError::Panicked)
            }
        }
    }
}

impl<S, D> Drop for TrackingHandle<S, D> {
    fn drop(&mut self) {
        self.request_shutdown();
    }
}

/// Error type for [`TrackingHandle::shutdown`].
pub enum ShutdownError<S, D> {
    /// The loop is still running. Holds the handle for another attempt.
    TimedOut(TrackingHandle<S, D>),
    /// The loop thread died; the sensor and wheels went with it.
    Panicked,
}

impl<S, D> fmt::Debug for ShutdownError<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownError::TimedOut(_) => f.write_str("TimedOut(..)"),
            ShutdownError::Panicked => f.write_str("Panicked"),
        }
    }
}

impl<S, D> fmt::Display for ShutdownError<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownError::TimedOut(_) => f.write_str("tracking loop did not stop in time"),
            ShutdownError::Panicked => f.write_str("tracking loop panicked"),
        }
    }
}
