//! In-memory sample buffers
//!
//! A [`Buffer`] holds a fully decoded stream. [`BufferView`] reads a range of
//! it, and [`NopCloser`] lets a view stand in for a decoded source without
//! ever releasing the shared buffer.

use std::sync::Arc;

use super::source::{DecodedStream, Frame, SampleRate, SeekableStreamer, Streamer};
use crate::error::StreamError;

/// Frames read per pull while materializing a buffer
const FILL_CHUNK_FRAMES: usize = 4096;

/// Fully materialized stereo audio
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    sample_rate: SampleRate,
    frames: Vec<Frame>,
}

impl Buffer {
    pub fn new(sample_rate: SampleRate, frames: Vec<Frame>) -> Self {
        Self {
            sample_rate,
            frames,
        }
    }

    /// Drain `source` from its current position into memory.
    ///
    /// Fails with the source's own error if it stopped early.
    pub fn from_source<S>(sample_rate: SampleRate, source: &mut S) -> Result<Self, StreamError>
    where
        S: SeekableStreamer + ?Sized,
    {
        let remaining = source.len().saturating_sub(source.position());
        let mut frames = Vec::with_capacity(remaining);
        let mut chunk = vec![[0.0; 2]; FILL_CHUNK_FRAMES];

        loop {
            let (n, ok) = source.stream(&mut chunk);
            frames.extend_from_slice(&chunk[..n]);
            if !ok {
                break;
            }
        }

        if let Some(err) = source.err() {
            return Err(StreamError::Decode(format!(
                "source failed after {} frames: {}",
                frames.len(),
                err
            )));
        }

        tracing::debug!(
            "Materialized {} frames at {} into memory",
            frames.len(),
            sample_rate
        );
        Ok(Self::new(sample_rate, frames))
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

/// Seekable window `[start, end)` over a shared [`Buffer`]
#[derive(Debug, Clone)]
pub struct BufferView {
    buffer: Arc<Buffer>,
    start: usize,
    end: usize,
    position: usize,
}

impl BufferView {
    /// View of `buffer[from..to]`, cursor at `from`
    pub fn new(buffer: Arc<Buffer>, from: usize, to: usize) -> Result<Self, StreamError> {
        if from > to || to > buffer.len() {
            return Err(StreamError::InvalidArgument(format!(
                "range {}..{} is outside buffer of {} frames",
                from,
                to,
                buffer.len()
            )));
        }

        Ok(Self {
            buffer,
            start: from,
            end: to,
            position: 0,
        })
    }

    /// View spanning the whole buffer
    pub fn full(buffer: Arc<Buffer>) -> Self {
        let end = buffer.len();
        Self {
            buffer,
            start: 0,
            end,
            position: 0,
        }
    }
}

impl Streamer for BufferView {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        let remaining = self.len() - self.position;
        if remaining == 0 {
            return (0, false);
        }

        let n = remaining.min(frames.len());
        let from = self.start + self.position;
        frames[..n].copy_from_slice(&self.buffer.frames()[from..from + n]);
        self.position += n;
        (n, true)
    }
}

impl SeekableStreamer for BufferView {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn position(&self) -> usize {
        self.position
    }

    fn seek(&mut self, position: usize) -> Result<(), StreamError> {
        if position > self.len() {
            return Err(StreamError::InvalidArgument(format!(
                "seek position {} out of range 0..={}",
                position,
                self.len()
            )));
        }
        self.position = position;
        Ok(())
    }

    fn err(&self) -> Option<&StreamError> {
        None
    }
}

/// Adapter whose `close` never releases anything.
///
/// The buffer behind a view belongs to the stream that created it, so closing
/// the adapter must leave it intact for range players still reading it.
#[derive(Debug, Clone)]
pub struct NopCloser<S> {
    inner: S,
}

impl<S: SeekableStreamer> NopCloser<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: SeekableStreamer> Streamer for NopCloser<S> {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        self.inner.stream(frames)
    }
}

impl<S: SeekableStreamer> SeekableStreamer for NopCloser<S> {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn position(&self) -> usize {
        self.inner.position()
    }

    fn seek(&mut self, position: usize) -> Result<(), StreamError> {
        self.inner.seek(position)
    }

    fn err(&self) -> Option<&StreamError> {
        self.inner.err()
    }
}

impl<S: SeekableStreamer> DecodedStream for NopCloser<S> {
    fn close(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}
