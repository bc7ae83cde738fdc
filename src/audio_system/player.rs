//! Playable streams
//!
//! A [`Stream`] owns one effects chain and the device it plays on. Every
//! mutation takes the device lock first, then the chain lock.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::buffer::{Buffer, BufferView};
use super::device::Device;
use super::effects::{EffectsChain, RangePlayer, SourceKind};
use super::handle::StreamId;
use super::source::{DecodedStream, Frame, SampleRate, StreamMode, Streamer};
use crate::error::StreamError;

/// Device-side handle onto a shared chain
struct ChainStreamer(Arc<Mutex<EffectsChain>>);

impl Streamer for ChainStreamer {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        self.0.lock().stream(frames)
    }
}

/// Point-in-time view of a stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub id: String,
    pub name: String,
    pub position: usize,
    pub length: usize,
    pub sample_rate: u32,
    pub buffered: bool,
    pub pan: f32,
    pub gain: f32,
    pub paused: bool,
    /// Error that stopped the source early; cleared by a seek
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A named, controllable audio stream
pub struct Stream {
    id: StreamId,
    name: String,
    sample_rate: SampleRate,
    buffer: Option<Arc<Buffer>>,
    chain: Arc<Mutex<EffectsChain>>,
    device: Arc<dyn Device>,
}

impl Stream {
    /// Sequential stream reading straight from a decoded source
    pub fn new(
        device: Arc<dyn Device>,
        source: Box<dyn DecodedStream>,
        sample_rate: SampleRate,
        name: impl Into<String>,
    ) -> Self {
        Self::with_source(device, SourceKind::Sequential(source), None, sample_rate, name.into())
    }

    /// Random-access stream over a shared in-memory buffer
    pub fn new_buffered(device: Arc<dyn Device>, buffer: Arc<Buffer>, name: impl Into<String>) -> Self {
        let sample_rate = buffer.sample_rate();
        let source = SourceKind::buffered(Arc::clone(&buffer));
        Self::with_source(device, source, Some(buffer), sample_rate, name.into())
    }

    fn with_source(
        device: Arc<dyn Device>,
        source: SourceKind,
        buffer: Option<Arc<Buffer>>,
        sample_rate: SampleRate,
        name: String,
    ) -> Self {
        let id = StreamId::new();
        tracing::debug!(
            "Created {} stream {} ({:?}) at {}",
            source.mode(),
            id,
            name,
            sample_rate
        );

        Self {
            id,
            name,
            sample_rate,
            buffer,
            chain: Arc::new(Mutex::new(EffectsChain::new(source))),
            device,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Replace the handle before the stream is published
    pub(crate) fn reassign_id(&mut self) {
        self.id = StreamId::new();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn mode(&self) -> StreamMode {
        StreamMode::from_buffered(self.buffer.is_some())
    }

    pub fn is_buffered(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn len(&self) -> usize {
        self.chain.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> usize {
        self.chain.lock().position()
    }

    /// Start playing from the current position.
    ///
    /// A stream sitting at its end is rewound first, so replaying a finished
    /// stream starts over. A source stopped by an error fails with that error
    /// until it is seeked.
    pub fn play(&self) -> Result<(), StreamError> {
        let _device = self.device.lock();
        {
            let mut chain = self.chain.lock();
            if chain.is_closed() {
                return Err(StreamError::Closed);
            }
            if let Some(e) = chain.err() {
                tracing::warn!(
                    "Refusing to play stream {} stopped at frame {}: {}",
                    self.id,
                    chain.position(),
                    e
                );
                return Err(e.duplicate());
            }
            if chain.position() == chain.len() {
                chain.seek(0)?;
            }
        }
        self.device.play(Box::new(ChainStreamer(Arc::clone(&self.chain))));

        tracing::info!("Playing stream {} ({:?})", self.id, self.name);
        Ok(())
    }

    /// Play `[from, to)` of the buffer once, alongside the stream itself.
    ///
    /// Only buffered streams support this. Pan and gain are taken as they are
    /// now; the stream's own position is left alone.
    pub fn play_range(&self, from: usize, to: usize) -> Result<(), StreamError> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| StreamError::InvalidMode("this stream is not a buffer".to_string()))?;
        let view = BufferView::new(Arc::clone(buffer), from, to)?;

        let _device = self.device.lock();
        let player = {
            let chain = self.chain.lock();
            if chain.is_closed() {
                return Err(StreamError::Closed);
            }
            RangePlayer::new(view, chain.pan(), chain.gain())
        };
        self.device.play(Box::new(player));

        tracing::info!(
            "Playing frames {}..{} of stream {} ({:?})",
            from,
            to,
            self.id,
            self.name
        );
        Ok(())
    }

    pub fn set_pan(&self, pan: f32) -> Result<(), StreamError> {
        if !pan.is_finite() {
            return Err(StreamError::InvalidArgument(format!("pan must be finite, got {pan}")));
        }
        let _device = self.device.lock();
        self.chain.lock().set_pan(pan);
        tracing::debug!("Stream {} pan set to {}", self.id, pan);
        Ok(())
    }

    pub fn set_gain(&self, gain: f32) -> Result<(), StreamError> {
        if !gain.is_finite() {
            return Err(StreamError::InvalidArgument(format!("gain must be finite, got {gain}")));
        }
        let _device = self.device.lock();
        self.chain.lock().set_gain(gain);
        tracing::debug!("Stream {} gain set to {}", self.id, gain);
        Ok(())
    }

    /// Pause or resume. A paused stream renders silence and keeps its position.
    pub fn set_paused(&self, paused: bool) {
        let _device = self.device.lock();
        self.chain.lock().set_paused(paused);
        tracing::debug!("Stream {} paused={}", self.id, paused);
    }

    pub fn seek(&self, position: usize) -> Result<(), StreamError> {
        let _device = self.device.lock();
        self.chain.lock().seek(position)?;
        tracing::debug!("Stream {} seeked to frame {}", self.id, position);
        Ok(())
    }

    pub fn info(&self) -> StreamInfo {
        let chain = self.chain.lock();
        StreamInfo {
            id: self.id.to_string(),
            name: self.name.clone(),
            position: chain.position(),
            length: chain.len(),
            sample_rate: self.sample_rate.0,
            buffered: self.is_buffered(),
            pan: chain.pan().value(),
            gain: chain.gain().value(),
            paused: chain.is_paused(),
            error: chain.err().map(|e| e.to_string()),
        }
    }

    /// Release the source. A playing stream stops on the next render.
    pub fn close(&self) -> Result<(), StreamError> {
        let _device = self.device.lock();
        self.chain.lock().close()?;
        tracing::debug!("Closed source of stream {}", self.id);
        Ok(())
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("sample_rate", &self.sample_rate)
            .field("mode", &self.mode())
            .finish()
    }
}
