// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! `VisionSensor` backed by an in-process frame channel.
//!
//! A producer thread pushes whole frames into the sending half; the tracking loop polls the
//! receiving half. Each poll returns only the newest queued frame, so a slow consumer never falls
//! behind the feed. A poll that sees no new frame within its timeout reports nothing in view.

use core::fmt;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::vision::{DetectedBlock, FrameParser, VisionSensor};

/// Every sender has been dropped; no more frames will arrive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Disconnected;

impl fmt::Display for Disconnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("block feed disconnected")
    }
}

impl std::error::Error for Disconnected {}

pub struct ChannelSensor {
    frames: Receiver<Vec<DetectedBlock>>,
    mount: Option<(u16, u16)>,
    indicator: (u8, u8, u8),
    closed: bool,
}

impl ChannelSensor {
    /// Create a sensor and the sender that feeds it.
    pub fn channel() -> (Sender<Vec<DetectedBlock>>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }

    pub fn new(frames: Receiver<Vec<DetectedBlock>>) -> Self {
        Self {
            frames,
            mount: None,
            indicator: (0, 0, 0),
            closed: false,
        }
    }

    /// Last commanded mount position, if any.
    #[inline]
    pub fn mount_position(&self) -> Option<(u16, u16)> {
        self.mount
    }

    #[inline]
    pub fn indicator_color(&self) -> (u8, u8, u8) {
        self.indicator
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl VisionSensor for ChannelSensor {
    type Error = Disconnected;

    fn poll(&mut self, timeout: Duration) -> Result<Vec<DetectedBlock>, Disconnected> {
        let mut latest = match self.frames.recv_timeout(timeout) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => {
                // Hold the caller to its poll cadence
                thread::sleep(timeout);
                return Err(Disconnected);
            }
        };

        // Skip to the newest queued frame
        let mut skipped = 0usize;
        while let Ok(frame) = self.frames.try_recv() {
            latest = frame;
            skipped += 1;
        }
        if skipped > 0 {
            debug!(skipped, "dropped stale frames");
        }

        Ok(latest)
    }

    fn set_indicator_color(&mut self, r: u8, g: u8, b: u8) -> Result<(), Disconnected> {
        debug!(r, g, b, "indicator colour");
        self.indicator = (r, g, b);
        Ok(())
    }

    fn set_mount_position(&mut self, pan: u16, tilt: u16) -> Result<(), Disconnected> {
        self.mount = Some((pan, tilt));
        Ok(())
    }

    fn close(&mut self) {
        debug!("closing channel sensor");
        self.closed = true;
    }
}

/// Decode text frames from `reader` and send them to `frames` until end of input.
///
/// Malformed lines are logged and skipped. Stops early if the receiving side is gone. Returns the
/// number of frames sent.
pub fn feed_frames<R: BufRead>(
    reader: R,
    frames: &Sender<Vec<DetectedBlock>>,
) -> std::io::Result<usize> {
    let mut parser = FrameParser::new();
    let mut sent = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        match parser.push_line(&line) {
            Ok(Some(frame)) => {
                if frames.send(frame).is_err() {
                    info!(sent, "block feed receiver closed");
                    return Ok(sent);
                }
                sent += 1;
            }
            Ok(None) => {}
            Err(e) => warn!(line = index + 1, error = %e, "skipping block line"),
        }
    }

    if let Some(frame) = parser.finish() {
        if frames.send(frame).is_ok() {
            sent += 1;
        }
    }

    info!(sent, "block feed ended");
    Ok(sent)
}
