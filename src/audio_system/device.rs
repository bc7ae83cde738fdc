//! Playback device
//!
//! A [`Device`] mixes every submitted [`Streamer`] into one stereo output.
//! Its lock is held for a whole render cycle, so anything mutating a playing
//! stream under the same lock never races a render.

use parking_lot::{Mutex, MutexGuard};

use super::source::{Frame, SampleRate, Streamer, SILENCE};

/// Proof that the device lock is held
pub type DeviceGuard<'a> = MutexGuard<'a, ()>;

/// Shared mixing output
pub trait Device: Send + Sync {
    /// Output rate in frames per second
    fn sample_rate(&self) -> SampleRate;

    /// Take the device lock. Blocks while a render cycle is in progress.
    fn lock(&self) -> DeviceGuard<'_>;

    /// Add a streamer to the mix. It is dropped once it reports end of data.
    fn play(&self, streamer: Box<dyn Streamer>);

    /// Number of streamers currently mixed
    fn playing(&self) -> usize;

    /// Stop producing output. No-op for devices without a backend.
    fn shutdown(&self) {}
}

struct MixState {
    streamers: Vec<Box<dyn Streamer>>,
    scratch: Vec<Frame>,
}

/// In-process mixer, rendered on demand.
///
/// Used directly for offline rendering and tests, and as the sample source
/// behind the speaker output.
pub struct Mixer {
    sample_rate: SampleRate,
    cycle: Mutex<()>,
    state: Mutex<MixState>,
}

impl Mixer {
    pub fn new(sample_rate: SampleRate) -> Self {
        Self {
            sample_rate,
            cycle: Mutex::new(()),
            state: Mutex::new(MixState {
                streamers: Vec::new(),
                scratch: Vec::new(),
            }),
        }
    }

    /// Render the next `out.len()` frames, summing every active streamer.
    ///
    /// Streamers that report end of data are removed after this cycle.
    pub fn render(&self, out: &mut [Frame]) {
        out.fill(SILENCE);

        let _cycle = self.cycle.lock();
        let mut state = self.state.lock();
        let MixState { streamers, scratch } = &mut *state;
        if scratch.len() < out.len() {
            scratch.resize(out.len(), SILENCE);
        }

        let before = streamers.len();
        streamers.retain_mut(|streamer| {
            let mut filled = 0;
            while filled < out.len() {
                let chunk = &mut scratch[..out.len() - filled];
                let (n, ok) = streamer.stream(chunk);
                for (dst, src) in out[filled..filled + n].iter_mut().zip(&chunk[..n]) {
                    dst[0] += src[0];
                    dst[1] += src[1];
                }
                filled += n;
                if !ok {
                    return false;
                }
                if n == 0 {
                    break;
                }
            }
            true
        });

        let finished = before - streamers.len();
        if finished > 0 {
            tracing::debug!("{} streamer(s) finished, {} still mixing", finished, streamers.len());
        }
    }
}

impl Device for Mixer {
    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn lock(&self) -> DeviceGuard<'_> {
        self.cycle.lock()
    }

    fn play(&self, streamer: Box<dyn Streamer>) {
        self.state.lock().streamers.push(streamer);
    }

    fn playing(&self) -> usize {
        self.state.lock().streamers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Countdown {
        remaining: usize,
        value: f32,
    }

    impl Streamer for Countdown {
        fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
            if self.remaining == 0 {
                return (0, false);
            }
            let n = self.remaining.min(frames.len());
            frames[..n].fill([self.value, self.value]);
            self.remaining -= n;
            (n, true)
        }
    }

    #[test]
    fn test_empty_mixer_renders_silence() {
        let mixer = Mixer::new(SampleRate(8000));
        let mut out = [[1.0, 1.0]; 8];
        mixer.render(&mut out);
        assert_eq!(out, [SILENCE; 8]);
    }

    #[test]
    fn test_streamers_are_summed() {
        let mixer = Mixer::new(SampleRate(8000));
        mixer.play(Box::new(Countdown { remaining: 100, value: 0.25 }));
        mixer.play(Box::new(Countdown { remaining: 100, value: 0.5 }));
        assert_eq!(mixer.playing(), 2);

        let mut out = [SILENCE; 4];
        mixer.render(&mut out);
        assert_eq!(out, [[0.75, 0.75]; 4]);
    }

    #[test]
    fn test_drained_streamer_is_dropped() {
        let mixer = Mixer::new(SampleRate(8000));
        mixer.play(Box::new(Countdown { remaining: 6, value: 1.0 }));

        let mut out = [SILENCE; 4];
        mixer.render(&mut out);
        assert_eq!(mixer.playing(), 1);

        mixer.render(&mut out);
        assert_eq!(&out[..2], &[[1.0, 1.0]; 2]);
        assert_eq!(&out[2..], &[SILENCE; 2]);
        assert_eq!(mixer.playing(), 0);
    }

    #[test]
    fn test_lock_blocks_render() {
        use std::sync::Arc;
        use std::thread;
        use std::time::Duration;

        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let guard = mixer.lock();

        let renderer = {
            let mixer = Arc::clone(&mixer);
            thread::spawn(move || {
                let mut out = [SILENCE; 4];
                mixer.render(&mut out);
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!renderer.is_finished());
        drop(guard);
        renderer.join().unwrap();
    }
}
