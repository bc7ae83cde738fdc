//! Stream lifecycle events
//!
//! Events report things that already happened and go to every subscriber.

use std::time::Instant;

use crate::audio_system::StreamId;

#[derive(Debug, Clone)]
pub enum Event {
    /// A stream was decoded and registered
    StreamOpened {
        id: StreamId,
        name: String,
        buffered: bool,
        timestamp: Instant,
    },

    /// A stream was closed and its handle dropped
    StreamClosed { id: StreamId, timestamp: Instant },

    /// A stream was handed to the device
    PlaybackStarted { id: StreamId, position: usize },

    /// A one-shot range of a buffered stream was handed to the device
    RangePlaybackStarted { id: StreamId, from: usize, to: usize },

    /// The executor closed every stream and stopped the device
    Shutdown,
}

impl Event {
    /// Handle of the stream the event concerns, if any
    pub fn stream_id(&self) -> Option<StreamId> {
        match self {
            Event::StreamOpened { id, .. }
            | Event::StreamClosed { id, .. }
            | Event::PlaybackStarted { id, .. }
            | Event::RangePlaybackStarted { id, .. } => Some(*id),
            Event::Shutdown => None,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Event::StreamOpened { id, name, buffered, .. } => {
                let mode = if *buffered { "buffered" } else { "sequential" };
                format!("Opened {mode} stream {id} ({name:?})")
            }
            Event::StreamClosed { id, .. } => format!("Closed stream {id}"),
            Event::PlaybackStarted { id, position } => {
                format!("Playing stream {id} from frame {position}")
            }
            Event::RangePlaybackStarted { id, from, to } => {
                format!("Playing frames {from}..{to} of stream {id}")
            }
            Event::Shutdown => "Shutting down".to_string(),
        }
    }
}
