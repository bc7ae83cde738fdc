//! Pause control

use crate::audio_system::source::{Frame, SILENCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pause {
    paused: bool,
}

impl Pause {
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Fill `frames` with silence when paused. Returns whether it did.
    pub fn silence(&self, frames: &mut [Frame]) -> bool {
        if self.paused {
            frames.fill(SILENCE);
        }
        self.paused
    }
}
