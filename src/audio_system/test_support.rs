//! Decoded-source doubles for unit tests

use std::sync::Arc;

use parking_lot::Mutex;

use super::buffer::{Buffer, BufferView};
use super::source::{DecodedStream, Frame, SampleRate, SeekableStreamer, Streamer};
use crate::error::StreamError;

/// 8 kHz buffer whose frame `i` is `[i, i]`
pub fn ramp_buffer(len: usize) -> Arc<Buffer> {
    let frames = (0..len).map(|i| [i as f32, i as f32]).collect();
    Arc::new(Buffer::new(SampleRate(8000), frames))
}

/// Sequential source over a ramp that can be told to break
pub struct ScriptedSource {
    view: BufferView,
    fail_at: Option<usize>,
    fail_close: bool,
    closes: Arc<Mutex<usize>>,
    err: Option<StreamError>,
}

impl ScriptedSource {
    pub fn new(len: usize) -> Self {
        Self {
            view: BufferView::full(ramp_buffer(len)),
            fail_at: None,
            fail_close: false,
            closes: Arc::new(Mutex::new(0)),
            err: None,
        }
    }

    /// Stop with a decode error when the position reaches `frame`.
    /// A seek clears the error.
    pub fn failing_at(mut self, frame: usize) -> Self {
        self.fail_at = Some(frame);
        self
    }

    /// Every close returns an I/O error
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Count of successful closes
    pub fn closes(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.closes)
    }
}

impl Streamer for ScriptedSource {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        if self.err.is_some() {
            return (0, false);
        }
        let Some(at) = self.fail_at else {
            return self.view.stream(frames);
        };

        let room = at.saturating_sub(self.view.position());
        if room >= frames.len() {
            return self.view.stream(frames);
        }
        let (n, _) = self.view.stream(&mut frames[..room]);
        self.err = Some(StreamError::Decode("corrupt packet".to_string()));
        (n, false)
    }
}

impl SeekableStreamer for ScriptedSource {
    fn len(&self) -> usize {
        self.view.len()
    }

    fn position(&self) -> usize {
        self.view.position()
    }

    fn seek(&mut self, position: usize) -> Result<(), StreamError> {
        self.view.seek(position)?;
        self.err = None;
        Ok(())
    }

    fn err(&self) -> Option<&StreamError> {
        self.err.as_ref()
    }
}

impl DecodedStream for ScriptedSource {
    fn close(&mut self) -> Result<(), StreamError> {
        if self.fail_close {
            return Err(StreamError::Io(std::io::Error::other("close failed")));
        }
        *self.closes.lock() += 1;
        Ok(())
    }
}
