//! Audio system module
//!
//! Keeps any number of decoded streams open at once and plays them through
//! one shared device:
//! - Sequential streams decode on demand from a file or byte source
//! - Buffered streams decode fully into memory and can play sub-ranges
//! - Every stream carries live pan, gain and pause controls
//!
//! ## Architecture
//!
//! ```text
//! StreamRegistry
//!   ├── Stream (id, name) ─┐
//!   ├── Stream (id, name) ─┤ Mixed by one Device
//!   └── Stream (id, name) ─┘ (Mixer, or Speaker on rodio)
//!
//! Each Stream has:
//!   └── EffectsChain
//!       ├── Pause
//!       ├── Gain
//!       ├── Pan
//!       └── SourceKind
//!           ├── Sequential(decoded source)
//!           └── Buffered(Arc<Buffer> behind a NopCloser<BufferView>)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warble::audio_system::{Mixer, SampleRate, Stream, StreamRegistry};
//!
//! let mixer = Arc::new(Mixer::new(SampleRate(44100)));
//! let registry = StreamRegistry::new();
//!
//! let id = registry.register(Stream::new_buffered(mixer.clone(), buffer, "kick"));
//! let stream = registry.lookup(id)?;
//! stream.set_pan(-0.5)?;
//! stream.play()?;
//!
//! // A range of the same buffer can play alongside the stream itself
//! stream.play_range(0, 22050)?;
//! ```

pub mod buffer;
pub mod device;
pub mod effects;
pub mod handle;
pub mod manager;
pub mod output;
pub mod player;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use buffer::{Buffer, BufferView, NopCloser};
pub use device::{Device, DeviceGuard, Mixer};
pub use effects::{EffectsChain, Gain, Pan, Pause, RangePlayer, SourceKind};
pub use handle::StreamId;
pub use manager::{StreamRegistry, StreamSummary};
pub use output::Speaker;
pub use player::{Stream, StreamInfo};
pub use source::{DecodedStream, Frame, SampleRate, SeekableStreamer, StreamMode, Streamer, SILENCE};
