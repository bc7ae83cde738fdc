//! Speaker output
//!
//! Runs a [`Mixer`] on the default rodio output. The rodio stream is not
//! `Send`, so a dedicated thread owns it for the lifetime of the speaker.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use rodio::{OutputStream, Source};

use super::device::{Device, DeviceGuard, Mixer};
use super::source::{Frame, SampleRate, Streamer, SILENCE};
use crate::error::StreamError;

/// Pulls rendered blocks from the mixer and yields interleaved samples
struct MixerSource {
    mixer: Arc<Mixer>,
    block: Vec<Frame>,
    cursor: usize,
}

impl MixerSource {
    fn new(mixer: Arc<Mixer>, buffer_size: usize) -> Self {
        Self {
            mixer,
            block: vec![SILENCE; buffer_size.max(1)],
            // Start exhausted so the first pull renders
            cursor: buffer_size.max(1) * 2,
        }
    }
}

impl Iterator for MixerSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.cursor >= self.block.len() * 2 {
            self.mixer.render(&mut self.block);
            self.cursor = 0;
        }
        let sample = self.block[self.cursor / 2][self.cursor % 2];
        self.cursor += 1;
        Some(sample)
    }
}

impl Source for MixerSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate().0
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Handle to the running output thread
struct Worker {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// The system speaker as a [`Device`]
pub struct Speaker {
    mixer: Arc<Mixer>,
    worker: Mutex<Option<Worker>>,
}

impl Speaker {
    /// Open the default output device and start mixing.
    ///
    /// `buffer_size` is the number of frames rendered per mixer cycle; it
    /// trades latency for lock contention with control calls.
    pub fn init(sample_rate: SampleRate, buffer_size: usize) -> Result<Self, StreamError> {
        if sample_rate.0 == 0 {
            return Err(StreamError::InvalidArgument(
                "sample rate must be positive".to_string(),
            ));
        }

        let mixer = Arc::new(Mixer::new(sample_rate));
        let (ready_tx, ready_rx) = bounded::<Result<(), StreamError>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let source_mixer = Arc::clone(&mixer);
        let thread = thread::Builder::new()
            .name("warble-output".to_string())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(StreamError::Device(e.to_string())));
                        return;
                    }
                };

                let source = MixerSource::new(source_mixer, buffer_size);
                if let Err(e) = handle.play_raw(source) {
                    let _ = ready_tx.send(Err(StreamError::Device(e.to_string())));
                    return;
                }

                let _ = ready_tx.send(Ok(()));
                // Either a stop request or the speaker being dropped ends playback
                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!("Output thread stopped");
            })?;

        let started = ready_rx
            .recv()
            .map_err(|_| StreamError::Device("output thread exited during startup".to_string()))
            .and_then(|result| result);

        if let Err(e) = started {
            let _ = thread.join();
            return Err(e);
        }

        tracing::info!(
            "Speaker initialized at {} with {} frame buffer",
            sample_rate,
            buffer_size
        );

        Ok(Self {
            mixer,
            worker: Mutex::new(Some(Worker {
                stop: stop_tx,
                thread,
            })),
        })
    }
}

impl Device for Speaker {
    fn sample_rate(&self) -> SampleRate {
        self.mixer.sample_rate()
    }

    fn lock(&self) -> DeviceGuard<'_> {
        self.mixer.lock()
    }

    fn play(&self, streamer: Box<dyn Streamer>) {
        self.mixer.play(streamer);
    }

    fn playing(&self) -> usize {
        self.mixer.playing()
    }

    /// Stop the output thread. Safe to call more than once.
    fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        let _ = worker.stop.send(());
        if worker.thread.join().is_err() {
            tracing::error!("Output thread panicked");
        }
        tracing::info!("Speaker shut down");
    }
}

impl Drop for Speaker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
