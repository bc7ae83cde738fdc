//! Stream registry
//!
//! Maps handles to open streams. The map lock is never held while a stream
//! decodes or closes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::handle::StreamId;
use super::player::Stream;
use crate::error::StreamError;

/// Handle and name of an open stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub id: String,
    pub name: String,
}

/// All open streams, keyed by handle
#[derive(Default)]
pub struct StreamRegistry {
    streams: Arc<Mutex<HashMap<StreamId, Arc<Stream>>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a stream and return its handle.
    ///
    /// A handle already in use is replaced with a fresh one before insertion.
    pub fn register(&self, mut stream: Stream) -> StreamId {
        let mut streams = self.streams.lock();
        while streams.contains_key(&stream.id()) {
            tracing::warn!("Stream id {} already registered, drawing another", stream.id());
            stream.reassign_id();
        }

        let id = stream.id();
        tracing::info!("Registered stream {} ({:?})", id, stream.name());
        streams.insert(id, Arc::new(stream));
        id
    }

    pub fn lookup(&self, id: StreamId) -> Result<Arc<Stream>, StreamError> {
        self.streams
            .lock()
            .get(&id)
            .cloned()
            .ok_or(StreamError::NotFound(id))
    }

    /// Close a stream and drop its handle.
    ///
    /// If closing fails the stream stays registered and the error is returned.
    pub fn remove(&self, id: StreamId) -> Result<(), StreamError> {
        let stream = self.lookup(id)?;
        stream.close()?;

        if self.streams.lock().remove(&id).is_none() {
            // Lost a race with another remove of the same handle
            return Err(StreamError::NotFound(id));
        }
        tracing::info!("Removed stream {} ({:?})", id, stream.name());
        Ok(())
    }

    /// Snapshot of open streams, ordered by name then handle
    pub fn list(&self) -> Vec<StreamSummary> {
        let mut entries: Vec<(String, StreamId)> = self
            .streams
            .lock()
            .values()
            .map(|s| (s.name().to_string(), s.id()))
            .collect();
        entries.sort();

        entries
            .into_iter()
            .map(|(name, id)| StreamSummary {
                id: id.to_string(),
                name,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.lock().is_empty()
    }

    /// Close and remove every stream.
    ///
    /// Streams that fail to close stay registered; the first failure is
    /// returned after all others have been attempted.
    pub fn close_all(&self) -> Result<(), StreamError> {
        let ids: Vec<StreamId> = self.streams.lock().keys().copied().collect();
        let mut first_error = None;

        for id in ids {
            match self.remove(id) {
                Ok(()) | Err(StreamError::NotFound(_)) => {}
                Err(e) => {
                    tracing::error!("Failed to close stream {}: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        tracing::debug!("Closed all streams, {} left", self.len());
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::buffer::Buffer;
    use crate::audio_system::device::Mixer;
    use crate::audio_system::source::SampleRate;
    use crate::audio_system::test_support::ScriptedSource;

    fn stream(mixer: &Arc<Mixer>, name: &str) -> Stream {
        let buffer = Arc::new(Buffer::new(SampleRate(8000), vec![[0.0, 0.0]; 16]));
        Stream::new_buffered(mixer.clone(), buffer, name)
    }

    #[test]
    fn test_register_and_lookup() {
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let registry = StreamRegistry::new();
        assert!(registry.is_empty());

        let id = registry.register(stream(&mixer, "a"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(id).unwrap().name(), "a");
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = StreamRegistry::new();
        let id = StreamId::new();
        let err = registry.lookup(id).unwrap_err();
        assert_eq!(err.kind(), "notFound");
    }

    #[test]
    fn test_remove_unknown_leaves_registry() {
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let registry = StreamRegistry::new();
        registry.register(stream(&mixer, "a"));

        assert!(registry.remove(StreamId::new()).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_then_lookup_fails() {
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let registry = StreamRegistry::new();
        let id = registry.register(stream(&mixer, "a"));

        registry.remove(id).unwrap();
        assert!(registry.lookup(id).is_err());
        assert_eq!(registry.remove(id).unwrap_err().kind(), "notFound");
    }

    #[test]
    fn test_failed_close_keeps_stream_registered() {
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let registry = StreamRegistry::new();
        let source = ScriptedSource::new(100).failing_close();
        let id = registry.register(Stream::new(mixer.clone(), Box::new(source), SampleRate(8000), "stuck"));
        registry.register(stream(&mixer, "a"));

        assert_eq!(registry.remove(id).unwrap_err().kind(), "ioFailure");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(id).unwrap().name(), "stuck");

        // close_all reports the failure but still removes the rest
        assert_eq!(registry.close_all().unwrap_err().kind(), "ioFailure");
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(id).is_ok());
    }

    #[test]
    fn test_list_sorted_by_name() {
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let registry = StreamRegistry::new();
        let b = registry.register(stream(&mixer, "b"));
        let a = registry.register(stream(&mixer, "a"));

        let list = registry.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], StreamSummary { id: a.to_string(), name: "a".to_string() });
        assert_eq!(list[1], StreamSummary { id: b.to_string(), name: "b".to_string() });
    }

    #[test]
    fn test_close_all() {
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let registry = StreamRegistry::new();
        for name in ["a", "b", "c"] {
            registry.register(stream(&mixer, name));
        }

        registry.close_all().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handles_stay_unique() {
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let registry = StreamRegistry::new();
        let ids: std::collections::HashSet<StreamId> = (0..50)
            .map(|i| registry.register(stream(&mixer, &format!("s{i}"))))
            .collect();
        assert_eq!(ids.len(), 50);
    }
}
