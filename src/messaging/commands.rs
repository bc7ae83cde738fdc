//! Control requests and replies
//!
//! Every control operation is one [`Request`] variant with a strict payload.
//! Shape checks happen once, when the request is parsed; execution never
//! sees an untyped argument.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio_system::{StreamId, StreamInfo, StreamSummary};
use crate::error::StreamError;

/// Method names accepted by [`Request::parse`]
pub const METHODS: [&str; 11] = [
    "wrapFile",
    "wrapBuffer",
    "closeStream",
    "seekStream",
    "playStream",
    "playBuffered",
    "panStream",
    "gainStream",
    "pauseStream",
    "streamInfo",
    "listStreams",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct WrapFile {
    pub file: String,
    pub name: String,
    #[serde(default)]
    pub buffered: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct WrapBuffer {
    /// Encoded file contents
    pub buffer: Vec<u8>,
    /// Declared format, e.g. `"wav"` or `".mp3"`
    pub format: String,
    pub name: String,
    #[serde(default)]
    pub buffered: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamRef {
    pub id: StreamId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeekStream {
    pub id: StreamId,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayBuffered {
    pub id: StreamId,
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanStream {
    pub id: StreamId,
    pub pan: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GainStream {
    pub id: StreamId,
    pub gain: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PauseStream {
    pub id: StreamId,
    pub paused: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListStreams {}

/// A validated control request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum Request {
    WrapFile(WrapFile),
    WrapBuffer(WrapBuffer),
    CloseStream(StreamRef),
    SeekStream(SeekStream),
    PlayStream(StreamRef),
    PlayBuffered(PlayBuffered),
    PanStream(PanStream),
    GainStream(GainStream),
    PauseStream(PauseStream),
    StreamInfo(StreamRef),
    ListStreams(ListStreams),
}

impl Request {
    /// Validate `args` against the payload of `method`.
    ///
    /// Unknown methods are `NotImplemented`; any shape mismatch is
    /// `InvalidArgument`. Missing or null args count as `{}`.
    pub fn parse(method: &str, args: Value) -> Result<Self, StreamError> {
        if !METHODS.contains(&method) {
            return Err(StreamError::NotImplemented(method.to_string()));
        }

        let args = match args {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let envelope = serde_json::json!({ "method": method, "args": args });

        serde_json::from_value(envelope)
            .map_err(|e| StreamError::InvalidArgument(format!("{method}: {e}")))
    }

    pub fn method(&self) -> &'static str {
        match self {
            Request::WrapFile(_) => "wrapFile",
            Request::WrapBuffer(_) => "wrapBuffer",
            Request::CloseStream(_) => "closeStream",
            Request::SeekStream(_) => "seekStream",
            Request::PlayStream(_) => "playStream",
            Request::PlayBuffered(_) => "playBuffered",
            Request::PanStream(_) => "panStream",
            Request::GainStream(_) => "gainStream",
            Request::PauseStream(_) => "pauseStream",
            Request::StreamInfo(_) => "streamInfo",
            Request::ListStreams(_) => "listStreams",
        }
    }

    /// Get a human-readable description of the request
    pub fn description(&self) -> String {
        match self {
            Request::WrapFile(args) => format!("Wrap file {} as {:?}", args.file, args.name),
            Request::WrapBuffer(args) => format!(
                "Wrap {} byte {} buffer as {:?}",
                args.buffer.len(),
                args.format,
                args.name
            ),
            Request::CloseStream(args) => format!("Close stream {}", args.id),
            Request::SeekStream(args) => format!("Seek stream {} to {}", args.id, args.position),
            Request::PlayStream(args) => format!("Play stream {}", args.id),
            Request::PlayBuffered(args) => {
                format!("Play frames {}..{} of stream {}", args.from, args.to, args.id)
            }
            Request::PanStream(args) => format!("Pan stream {} to {}", args.id, args.pan),
            Request::GainStream(args) => format!("Set gain of stream {} to {}", args.id, args.gain),
            Request::PauseStream(args) => format!("Set stream {} paused={}", args.id, args.paused),
            Request::StreamInfo(args) => format!("Describe stream {}", args.id),
            Request::ListStreams(_) => "List streams".to_string(),
        }
    }
}

/// Successful result of a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Info(StreamInfo),
    List(Vec<StreamSummary>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyError {
    pub kind: String,
    pub message: String,
}

/// Wire form of a request outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
}

impl Reply {
    pub fn error(err: &StreamError) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ReplyError {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

impl From<Result<Response, StreamError>> for Reply {
    fn from(result: Result<Response, StreamError>) -> Self {
        match result {
            Ok(response) => Self {
                ok: true,
                result: Some(response),
                error: None,
            },
            Err(err) => Self::error(&err),
        }
    }
}
