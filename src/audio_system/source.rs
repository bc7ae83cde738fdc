//! Sample streaming primitives
//!
//! Everything the mixer renders is a [`Streamer`]. Decoded sources and buffer
//! views additionally know their length and position and can seek.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// One stereo frame, `[left, right]`, nominally in [-1.0, 1.0]
pub type Frame = [f32; 2];

/// Silent frame
pub const SILENCE: Frame = [0.0, 0.0];

/// Sample rate in frames per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleRate(pub u32);

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

/// A pull-based producer of stereo frames.
pub trait Streamer: Send {
    /// Fills `frames` from the front and returns how many were written.
    ///
    /// The flag is `false` once the streamer is drained or failed; in that
    /// case nothing was written and the mixer drops the streamer.
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool);
}

/// A finite streamer with a cursor.
pub trait SeekableStreamer: Streamer {
    /// Total length in frames
    fn len(&self) -> usize;

    /// Current cursor in frames
    fn position(&self) -> usize;

    /// Move the cursor. Positions past `len()` are rejected.
    fn seek(&mut self, position: usize) -> Result<(), StreamError>;

    /// Error that stopped the stream early, if any
    fn err(&self) -> Option<&StreamError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A seekable source that holds a resource until closed.
pub trait DecodedStream: SeekableStreamer {
    fn close(&mut self) -> Result<(), StreamError>;
}

/// How a stream reads its samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Decoded on demand from a file or byte source
    Sequential,

    /// Fully decoded into memory, supports range playback
    Buffered,
}

impl StreamMode {
    pub fn from_buffered(buffered: bool) -> Self {
        if buffered {
            StreamMode::Buffered
        } else {
            StreamMode::Sequential
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, StreamMode::Buffered)
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamMode::Sequential => write!(f, "sequential"),
            StreamMode::Buffered => write!(f, "buffered"),
        }
    }
}
