//! Gain effect
//!
//! The stored value is an offset from unity: samples are scaled by
//! `1 + gain`, so 0 leaves the signal untouched and -1 silences it.

use crate::audio_system::source::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Gain {
    value: f32,
}

impl Gain {
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set(&mut self, value: f32) {
        self.value = value;
    }

    /// Amplitude multiplier applied to every sample
    pub fn factor(&self) -> f32 {
        1.0 + self.value
    }

    pub fn is_unity(&self) -> bool {
        self.value == 0.0
    }

    pub fn apply(&self, frames: &mut [Frame]) {
        if self.is_unity() {
            return;
        }
        let factor = self.factor();
        for frame in frames {
            frame[0] *= factor;
            frame[1] *= factor;
        }
    }
}
