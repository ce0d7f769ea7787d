//! Frames: one engine tick worth of tokens.

use crate::stats::FrameStats;
use crate::token::Token;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tokens between two frame markers.
///
/// Frame markers themselves are never part of `tokens`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    /// Capture-relative start time in seconds.
    pub start_time: f32,
    /// Capture-relative end time in seconds.
    pub end_time: f32,
    /// Frame duration in seconds.
    pub delta_time: f32,
    pub tokens: Vec<Token>,
    /// Unfiltered counters for this frame.
    pub stats: FrameStats,
}

impl Frame {
    /// Creates a frame ending at `end_time` and lasting `delta_time`.
    pub fn new(tokens: Vec<Token>, end_time: f32, delta_time: f32, stats: FrameStats) -> Self {
        Self {
            start_time: end_time - delta_time,
            end_time,
            delta_time,
            tokens,
            stats,
        }
    }

    /// Number of tokens in the frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the frame holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterates the frame's tokens.
    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }
}
