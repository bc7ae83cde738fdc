//! Stereo balance effect
//!
//! -1 is hard left, 0 is centre, 1 is hard right. Values are not clamped;
//! the attenuation of each side is capped at unity.

use crate::audio_system::source::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pan {
    value: f32,
}

impl Pan {
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set(&mut self, value: f32) {
        self.value = value;
    }

    /// Per-channel multipliers, `[left, right]`
    pub fn factors(&self) -> [f32; 2] {
        [(1.0 - self.value).min(1.0), (1.0 + self.value).min(1.0)]
    }

    pub fn apply(&self, frames: &mut [Frame]) {
        if self.value == 0.0 {
            return;
        }
        let [left, right] = self.factors();
        for frame in frames {
            frame[0] *= left;
            frame[1] *= right;
        }
    }
}
