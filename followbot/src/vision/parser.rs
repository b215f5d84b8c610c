// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Text decoder for block frames.
//!
//! One block per line as five whitespace-separated integers, `signature x y width height`. A blank
//! line ends the frame (a blank line on its own is a frame with nothing in view). Lines starting
//! with `#` are ignored.
//!
//! ```text
//! # sig  x   y   w   h
//! 1     150  90  40  30
//! 2      20  50  10  10
//!
//! ```

use core::fmt;

use crate::vision::DetectedBlock;

const FIELD_COUNT: usize = 5;

/// Error for a malformed block line. The line is dropped; the frame being built is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Line had this many fields instead of five.
    FieldCount(usize),
    /// Field is not an integer in [0, 65535].
    InvalidNumber(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::FieldCount(n) => {
                write!(f, "expected {FIELD_COUNT} fields per block, found {n}")
            }
            ParseError::InvalidNumber(field) => write!(f, "invalid block field `{field}`"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Default)]
pub struct FrameParser {
    pending: Vec<DetectedBlock>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one input line. Returns `Some(frame)` when the line completes a frame.
    pub fn push_line(&mut self, line: &str) -> Result<Option<Vec<DetectedBlock>>, ParseError> {
        let line = line.trim();

        if line.is_empty() {
            return Ok(Some(core::mem::take(&mut self.pending)));
        }
        if line.starts_with('#') {
            return Ok(None);
        }

        let block = parse_block(line)?;
        self.pending.push(block);
        Ok(None)
    }

    /// Flush a frame left unterminated at end of input.
    pub fn finish(&mut self) -> Option<Vec<DetectedBlock>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(core::mem::take(&mut self.pending))
        }
    }
}

fn parse_block(line: &str) -> Result<DetectedBlock, ParseError> {
    let mut fields = [0u16; FIELD_COUNT];
    let mut count = 0;

    for token in line.split_whitespace() {
        if count < FIELD_COUNT {
            fields[count] = token
                .parse()
                .map_err(|_| ParseError::InvalidNumber(token.to_owned()))?;
        }
        count += 1;
    }

    if count != FIELD_COUNT {
        return Err(ParseError::FieldCount(count));
    }

    let [signature, x, y, width, height] = fields;
    Ok(DetectedBlock {
        signature,
        x,
        y,
        width,
        height,
    })
}
