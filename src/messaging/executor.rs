//! Request executor
//!
//! Runs validated requests against the stream registry and publishes a
//! lifecycle event for each change.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use super::bus::EventBus;
use super::commands::{Reply, Request, Response};
use super::events::Event;
use crate::audio_system::{Buffer, Device, Stream, StreamRegistry};
use crate::decoder::{Decoded, DecoderTable, Format};
use crate::error::StreamError;

/// Executes requests against one device and one registry
pub struct CommandExecutor {
    device: Arc<dyn Device>,
    registry: StreamRegistry,
    decoders: DecoderTable,
    event_bus: EventBus,
    default_buffered: bool,
}

impl CommandExecutor {
    pub fn new(device: Arc<dyn Device>, event_bus: EventBus) -> Self {
        Self {
            device,
            registry: StreamRegistry::new(),
            decoders: DecoderTable::default(),
            event_bus,
            default_buffered: false,
        }
    }

    /// Mode used by wrap requests that do not say
    pub fn with_default_buffered(mut self, buffered: bool) -> Self {
        self.default_buffered = buffered;
        self
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Parse and execute one untyped request, folding errors into the reply
    pub fn dispatch(&self, method: &str, args: Value) -> Reply {
        let result = Request::parse(method, args).and_then(|request| self.execute(request));
        if let Err(e) = &result {
            tracing::debug!("{} failed: {}", method, e);
        }
        Reply::from(result)
    }

    pub fn execute(&self, request: Request) -> Result<Response, StreamError> {
        tracing::debug!("Executing request: {}", request.description());

        match request {
            Request::WrapFile(args) => {
                let decoded = self.decoders.decode_file(Path::new(&args.file))?;
                self.wrap(decoded, args.name, args.buffered)
            }
            Request::WrapBuffer(args) => {
                let format: Format = args.format.parse()?;
                let decoded = self.decoders.decode_bytes(format, args.buffer)?;
                self.wrap(decoded, args.name, args.buffered)
            }
            Request::CloseStream(args) => {
                let info = self.registry.lookup(args.id)?.info();
                self.registry.remove(args.id)?;
                self.event_bus.publish(Event::StreamClosed {
                    id: args.id,
                    timestamp: Instant::now(),
                });
                Ok(Response::Info(info))
            }
            Request::SeekStream(args) => {
                let stream = self.registry.lookup(args.id)?;
                stream.seek(args.position)?;
                Ok(Response::Info(stream.info()))
            }
            Request::PlayStream(args) => {
                let stream = self.registry.lookup(args.id)?;
                stream.play()?;
                let info = stream.info();
                self.event_bus.publish(Event::PlaybackStarted {
                    id: args.id,
                    position: info.position,
                });
                Ok(Response::Info(info))
            }
            Request::PlayBuffered(args) => {
                let stream = self.registry.lookup(args.id)?;
                stream.play_range(args.from, args.to)?;
                self.event_bus.publish(Event::RangePlaybackStarted {
                    id: args.id,
                    from: args.from,
                    to: args.to,
                });
                Ok(Response::Info(stream.info()))
            }
            Request::PanStream(args) => {
                let stream = self.registry.lookup(args.id)?;
                stream.set_pan(args.pan)?;
                Ok(Response::Info(stream.info()))
            }
            Request::GainStream(args) => {
                let stream = self.registry.lookup(args.id)?;
                stream.set_gain(args.gain)?;
                Ok(Response::Info(stream.info()))
            }
            Request::PauseStream(args) => {
                let stream = self.registry.lookup(args.id)?;
                stream.set_paused(args.paused);
                Ok(Response::Info(stream.info()))
            }
            Request::StreamInfo(args) => Ok(Response::Info(self.registry.lookup(args.id)?.info())),
            Request::ListStreams(_) => Ok(Response::List(self.registry.list())),
        }
    }

    /// Build a stream around a decoded source and register it
    fn wrap(
        &self,
        decoded: Decoded,
        name: String,
        buffered: Option<bool>,
    ) -> Result<Response, StreamError> {
        let Decoded {
            mut stream,
            sample_rate,
            format,
        } = decoded;
        let buffered = buffered.unwrap_or(self.default_buffered);

        let stream = if buffered {
            let buffer = Buffer::from_source(sample_rate, &mut *stream);
            // The source is spent either way
            stream.close()?;
            Stream::new_buffered(Arc::clone(&self.device), Arc::new(buffer?), name)
        } else {
            Stream::new(Arc::clone(&self.device), stream, sample_rate, name)
        };

        let id = self.registry.register(stream);
        let stream = self.registry.lookup(id)?;
        tracing::info!(
            "Opened {} stream {} ({:?}, {}, {} frames)",
            stream.mode(),
            id,
            stream.name(),
            format,
            stream.len()
        );

        self.event_bus.publish(Event::StreamOpened {
            id,
            name: stream.name().to_string(),
            buffered,
            timestamp: Instant::now(),
        });
        Ok(Response::Info(stream.info()))
    }

    /// Close every stream, then stop the device.
    ///
    /// The device is stopped even if some streams fail to close.
    pub fn shutdown(&self) -> Result<(), StreamError> {
        tracing::info!("Shutting down with {} open stream(s)", self.registry.len());
        let closed = self.registry.close_all();
        self.device.shutdown();
        self.event_bus.publish(Event::Shutdown);
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::test_support::ScriptedSource;
    use crate::audio_system::{Mixer, SampleRate, StreamInfo};
    use serde_json::json;
    use std::io::Cursor;

    fn wav_bytes(rate: u32, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
            for i in 0..frames {
                let sample = (i % 100) as i16 * 100;
                writer.write_sample(sample).unwrap();
                writer.write_sample(-sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        bytes
    }

    fn executor() -> (CommandExecutor, Arc<Mixer>) {
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let executor = CommandExecutor::new(mixer.clone(), EventBus::new());
        (executor, mixer)
    }

    fn expect_info(reply: Reply) -> StreamInfo {
        match reply.result {
            Some(Response::Info(info)) => info,
            other => panic!("expected info, got {other:?} ({:?})", reply.error),
        }
    }

    fn wrap(executor: &CommandExecutor, name: &str, buffered: bool) -> StreamInfo {
        expect_info(executor.dispatch(
            "wrapBuffer",
            json!({
                "buffer": wav_bytes(8000, 4000),
                "format": "wav",
                "name": name,
                "buffered": buffered,
            }),
        ))
    }

    #[test]
    fn test_wrap_buffer_reports_info() {
        let (executor, _) = executor();
        let info = wrap(&executor, "clip", false);

        assert_eq!(info.name, "clip");
        assert_eq!(info.position, 0);
        assert_eq!(info.length, 4000);
        assert_eq!(info.sample_rate, 8000);
        assert!(!info.buffered);
        assert_eq!(executor.registry().len(), 1);
    }

    #[test]
    fn test_wrap_buffered() {
        let (executor, _) = executor();
        let info = wrap(&executor, "clip", true);
        assert!(info.buffered);
        assert_eq!(info.length, 4000);
    }

    #[test]
    fn test_default_buffered_applies() {
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let executor = CommandExecutor::new(mixer, EventBus::new()).with_default_buffered(true);

        let reply = executor.dispatch(
            "wrapBuffer",
            json!({ "buffer": wav_bytes(8000, 100), "format": ".wav", "name": "x" }),
        );
        assert!(expect_info(reply).buffered);
    }

    #[test]
    fn test_unsupported_format_leaves_registry() {
        let (executor, _) = executor();
        let reply = executor.dispatch("wrapBuffer", json!({ "buffer": [], "format": "xyz", "name": "x" }));
        assert!(!reply.ok);
        assert_eq!(reply.error.unwrap().kind, "unsupportedFormat");
        assert!(executor.registry().is_empty());
    }

    #[test]
    fn test_controls_round_trip() {
        let (executor, mixer) = executor();
        let id = wrap(&executor, "clip", true).id;

        let info = expect_info(executor.dispatch("panStream", json!({ "id": id, "pan": -0.5 })));
        assert_eq!(info.pan, -0.5);

        let info = expect_info(executor.dispatch("gainStream", json!({ "id": id, "gain": 0.25 })));
        assert_eq!(info.gain, 0.25);

        let info = expect_info(executor.dispatch("seekStream", json!({ "id": id, "position": 1000 })));
        assert_eq!(info.position, 1000);

        let info = expect_info(executor.dispatch("pauseStream", json!({ "id": id, "paused": true })));
        assert!(info.paused);

        executor.dispatch("playStream", json!({ "id": id }));
        assert_eq!(mixer.playing(), 1);
    }

    #[test]
    fn test_play_buffered_on_sequential() {
        let (executor, mixer) = executor();
        let id = wrap(&executor, "clip", false).id;

        let reply = executor.dispatch("playBuffered", json!({ "id": id, "from": 0, "to": 10 }));
        assert_eq!(reply.error.unwrap().kind, "invalidMode");
        assert_eq!(mixer.playing(), 0);
    }

    #[test]
    fn test_close_publishes_and_removes() {
        let bus = EventBus::new();
        let (rx, _) = bus.subscribe();
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let executor = CommandExecutor::new(mixer, bus);

        let id = wrap(&executor, "clip", false).id;
        let closed = expect_info(executor.dispatch("closeStream", json!({ "id": id })));
        assert_eq!(closed.id, id);
        assert!(executor.registry().is_empty());

        assert!(matches!(rx.try_recv().unwrap(), Event::StreamOpened { .. }));
        assert!(matches!(rx.try_recv().unwrap(), Event::StreamClosed { .. }));

        let reply = executor.dispatch("streamInfo", json!({ "id": id }));
        assert_eq!(reply.error.unwrap().kind, "notFound");
    }

    /// Register a sequential stream over `source`, bypassing the decoders
    fn register(executor: &CommandExecutor, mixer: &Arc<Mixer>, source: ScriptedSource) -> String {
        let stream = Stream::new(mixer.clone(), Box::new(source), SampleRate(8000), "scripted");
        executor.registry().register(stream).to_string()
    }

    #[test]
    fn test_failed_close_reports_and_keeps_stream() {
        let bus = EventBus::new();
        let (rx, _) = bus.subscribe();
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let executor = CommandExecutor::new(mixer.clone(), bus);
        let id = register(&executor, &mixer, ScriptedSource::new(100).failing_close());

        let reply = executor.dispatch("closeStream", json!({ "id": id }));
        assert_eq!(reply.error.unwrap().kind, "ioFailure");
        assert_eq!(executor.registry().len(), 1);
        assert!(rx.try_recv().is_err());

        let info = expect_info(executor.dispatch("streamInfo", json!({ "id": id })));
        assert_eq!(info.name, "scripted");
    }

    #[test]
    fn test_play_after_source_error_fails() {
        let (executor, mixer) = executor();
        let id = register(&executor, &mixer, ScriptedSource::new(100).failing_at(10));

        expect_info(executor.dispatch("playStream", json!({ "id": id })));
        let mut out = [crate::audio_system::SILENCE; 64];
        mixer.render(&mut out);

        let info = expect_info(executor.dispatch("streamInfo", json!({ "id": id })));
        assert_eq!(info.position, 10);
        assert!(info.error.is_some());

        let reply = executor.dispatch("playStream", json!({ "id": id }));
        assert_eq!(reply.error.unwrap().kind, "decodeFailure");
        assert_eq!(mixer.playing(), 0);
    }

    #[test]
    fn test_list_streams() {
        let (executor, _) = executor();
        wrap(&executor, "b", false);
        wrap(&executor, "a", true);

        match executor.dispatch("listStreams", Value::Null).result {
            Some(Response::List(list)) => {
                let names: Vec<&str> = list.iter().map(|s| s.name.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_method() {
        let (executor, _) = executor();
        let reply = executor.dispatch("fadeStream", json!({}));
        assert_eq!(reply.error.unwrap().kind, "notImplemented");
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let bus = EventBus::new();
        let (rx, _) = bus.subscribe();
        let mixer = Arc::new(Mixer::new(SampleRate(8000)));
        let executor = CommandExecutor::new(mixer, bus);
        wrap(&executor, "a", false);
        wrap(&executor, "b", true);

        executor.shutdown().unwrap();
        assert!(executor.registry().is_empty());
        assert!(rx.try_iter().any(|e| matches!(e, Event::Shutdown)));
    }
}
