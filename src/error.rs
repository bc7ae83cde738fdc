use thiserror::Error;

use crate::audio_system::StreamId;

/// Errors surfaced by the stream registry, the effects chain and the decoders.
///
/// Every variant is returned to the caller of the control surface; nothing in
/// the core logs and swallows these.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream does not exist: {0}")]
    NotFound(StreamId),

    #[error("Unsupported stream format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid stream mode: {0}")]
    InvalidMode(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Stream is closed")]
    Closed,

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Operation not implemented: {0}")]
    NotImplemented(String),

    #[error("Playback device error: {0}")]
    Device(String),
}

impl StreamError {
    /// Stable identifier for the error kind, used in control surface replies
    pub fn kind(&self) -> &'static str {
        match self {
            StreamError::NotFound(_) => "notFound",
            StreamError::UnsupportedFormat(_) => "unsupportedFormat",
            StreamError::InvalidMode(_) => "invalidMode",
            StreamError::InvalidArgument(_) => "invalidArgument",
            StreamError::Closed => "closed",
            StreamError::Io(_) => "ioFailure",
            StreamError::Decode(_) => "decodeFailure",
            StreamError::NotImplemented(_) => "notImplemented",
            StreamError::Device(_) => "deviceFailure",
        }
    }

    /// Owned copy of an error a source is still holding.
    ///
    /// I/O errors keep their kind and message but lose their inner source.
    pub fn duplicate(&self) -> StreamError {
        match self {
            StreamError::NotFound(id) => StreamError::NotFound(*id),
            StreamError::UnsupportedFormat(s) => StreamError::UnsupportedFormat(s.clone()),
            StreamError::InvalidMode(s) => StreamError::InvalidMode(s.clone()),
            StreamError::InvalidArgument(s) => StreamError::InvalidArgument(s.clone()),
            StreamError::Closed => StreamError::Closed,
            StreamError::Io(e) => StreamError::Io(std::io::Error::new(e.kind(), e.to_string())),
            StreamError::Decode(s) => StreamError::Decode(s.clone()),
            StreamError::NotImplemented(s) => StreamError::NotImplemented(s.clone()),
            StreamError::Device(s) => StreamError::Device(s.clone()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
