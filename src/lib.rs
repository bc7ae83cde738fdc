//! Concurrent audio stream control: decode, register, mix and steer many
//! streams through one playback device.

pub mod audio_system;
pub mod config;
pub mod decoder;
pub mod error;
pub mod messaging;

pub use audio_system::{Device, Mixer, Speaker, Stream, StreamId, StreamRegistry};
pub use error::{AppResult, ConfigError, StreamError};
pub use messaging::CommandExecutor;
