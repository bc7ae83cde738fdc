//! Effects chain
//!
//! Wraps a decoded source with pause, gain and pan so those can change while
//! the stream plays, without touching the source's length or seek behaviour.
//!
//! ```text
//! EffectsChain
//!   └── Pause ── Gain ── Pan ── SourceKind
//!                               ├── Sequential(decoded source)
//!                               └── Buffered(shared buffer, full view)
//! ```

pub mod gain;
pub mod pan;
pub mod pause;

use std::sync::Arc;

pub use gain::Gain;
pub use pan::Pan;
pub use pause::Pause;

use super::buffer::{Buffer, BufferView, NopCloser};
use super::source::{DecodedStream, Frame, StreamMode, Streamer};
use crate::error::StreamError;

/// The source a chain reads from
pub enum SourceKind {
    Sequential(Box<dyn DecodedStream>),
    Buffered {
        buffer: Arc<Buffer>,
        view: NopCloser<BufferView>,
    },
}

impl SourceKind {
    pub fn buffered(buffer: Arc<Buffer>) -> Self {
        let view = NopCloser::new(BufferView::full(Arc::clone(&buffer)));
        SourceKind::Buffered { buffer, view }
    }

    pub fn mode(&self) -> StreamMode {
        match self {
            SourceKind::Sequential(_) => StreamMode::Sequential,
            SourceKind::Buffered { .. } => StreamMode::Buffered,
        }
    }

    fn source(&self) -> &dyn DecodedStream {
        match self {
            SourceKind::Sequential(source) => source.as_ref(),
            SourceKind::Buffered { view, .. } => view,
        }
    }

    fn source_mut(&mut self) -> &mut dyn DecodedStream {
        match self {
            SourceKind::Sequential(source) => source.as_mut(),
            SourceKind::Buffered { view, .. } => view,
        }
    }
}

/// Live pause/gain/pan state around one source
pub struct EffectsChain {
    source: SourceKind,
    pan: Pan,
    gain: Gain,
    pause: Pause,
    closed: bool,
}

impl EffectsChain {
    /// Unity gain, centred, playing
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            pan: Pan::default(),
            gain: Gain::default(),
            pause: Pause::default(),
            closed: false,
        }
    }

    pub fn mode(&self) -> StreamMode {
        self.source.mode()
    }

    /// Buffer length when buffered, else the source's own length
    pub fn len(&self) -> usize {
        match &self.source {
            SourceKind::Buffered { buffer, .. } => buffer.len(),
            SourceKind::Sequential(source) => source.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> usize {
        self.source.source().position()
    }

    pub fn seek(&mut self, position: usize) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        self.source.source_mut().seek(position)
    }

    pub fn err(&self) -> Option<&StreamError> {
        self.source.source().err()
    }

    pub fn pan(&self) -> Pan {
        self.pan
    }

    pub fn set_pan(&mut self, value: f32) {
        self.pan.set(value);
    }

    pub fn gain(&self) -> Gain {
        self.gain
    }

    pub fn set_gain(&mut self, value: f32) {
        self.gain.set(value);
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.pause.set(paused);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the underlying source. Idempotent; a failed close can be retried.
    pub fn close(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Ok(());
        }
        self.source.source_mut().close()?;
        self.closed = true;
        Ok(())
    }
}

impl Streamer for EffectsChain {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        if self.closed {
            return (0, false);
        }
        if self.pause.silence(frames) {
            return (frames.len(), true);
        }

        let (n, ok) = self.source.source_mut().stream(frames);
        self.gain.apply(&mut frames[..n]);
        self.pan.apply(&mut frames[..n]);
        (n, ok)
    }
}

/// One-shot player for a range of a shared buffer.
///
/// Pan and gain are copied when the player is built and never follow later
/// changes to the stream that spawned it.
pub struct RangePlayer {
    view: BufferView,
    pan: Pan,
    gain: Gain,
}

impl RangePlayer {
    pub fn new(view: BufferView, pan: Pan, gain: Gain) -> Self {
        Self { view, pan, gain }
    }
}

impl Streamer for RangePlayer {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        let (n, ok) = self.view.stream(frames);
        self.gain.apply(&mut frames[..n]);
        self.pan.apply(&mut frames[..n]);
        (n, ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::source::{SampleRate, SILENCE};

    fn constant(len: usize, value: f32) -> Arc<Buffer> {
        Arc::new(Buffer::new(SampleRate(8000), vec![[value, value]; len]))
    }

    #[test]
    fn test_chain_defaults() {
        let chain = EffectsChain::new(SourceKind::buffered(constant(16, 1.0)));
        assert_eq!(chain.pan().value(), 0.0);
        assert!(chain.gain().is_unity());
        assert!(!chain.is_paused());
        assert_eq!(chain.mode(), StreamMode::Buffered);
        assert_eq!(chain.len(), 16);
        assert_eq!(chain.position(), 0);
    }

    #[test]
    fn test_chain_applies_gain_and_pan() {
        let mut chain = EffectsChain::new(SourceKind::buffered(constant(16, 0.5)));
        chain.set_gain(1.0);
        chain.set_pan(-1.0);

        let mut frames = [SILENCE; 4];
        assert_eq!(chain.stream(&mut frames), (4, true));
        assert_eq!(frames, [[1.0, 0.0]; 4]);
    }

    #[test]
    fn test_paused_chain_consumes_nothing() {
        let mut chain = EffectsChain::new(SourceKind::buffered(constant(16, 1.0)));
        chain.set_paused(true);

        let mut frames = [[9.0, 9.0]; 4];
        assert_eq!(chain.stream(&mut frames), (4, true));
        assert_eq!(frames, [SILENCE; 4]);
        assert_eq!(chain.position(), 0);

        chain.set_paused(false);
        chain.stream(&mut frames);
        assert_eq!(chain.position(), 4);
    }

    #[test]
    fn test_closed_chain_reports_end() {
        let mut chain = EffectsChain::new(SourceKind::buffered(constant(16, 1.0)));
        chain.close().unwrap();
        assert!(chain.is_closed());

        let mut frames = [SILENCE; 4];
        assert_eq!(chain.stream(&mut frames), (0, false));
        assert_eq!(chain.seek(0).unwrap_err().kind(), "closed");
        // Closing twice is fine
        chain.close().unwrap();
    }

    #[test]
    fn test_range_player_uses_snapshot() {
        let buffer = constant(16, 1.0);
        let view = BufferView::new(Arc::clone(&buffer), 4, 8).unwrap();
        let mut player = RangePlayer::new(view, Pan::new(1.0), Gain::new(-0.5));

        let mut frames = [SILENCE; 8];
        assert_eq!(player.stream(&mut frames), (4, true));
        assert_eq!(&frames[..4], &[[0.0, 0.5]; 4]);
        assert_eq!(player.stream(&mut frames), (0, false));
    }
}
