//! Decoded sources
//!
//! Turns a named file or an in-memory byte buffer into a seekable stereo
//! [`DecodedStream`]. The container and codec work is symphonia's; this
//! module picks a decoder by declared format and adapts symphonia's packet
//! model to frame-accurate streaming.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::audio_system::source::{DecodedStream, Frame, SampleRate, SeekableStreamer, Streamer};
use crate::error::StreamError;

/// Declared container format of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Mp3,
    Wav,
    Ogg,
    Flac,
    M4a,
}

impl Format {
    pub const ALL: [Format; 5] = [Format::Mp3, Format::Wav, Format::Ogg, Format::Flac, Format::M4a];

    /// Format for a bare extension, case-insensitive
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(Format::Mp3),
            "wav" | "wave" => Some(Format::Wav),
            "ogg" | "oga" => Some(Format::Ogg),
            "flac" => Some(Format::Flac),
            "m4a" | "mp4" => Some(Format::M4a),
            _ => None,
        }
    }

    /// Format implied by a file name's suffix
    pub fn from_path(path: &Path) -> Result<Self, StreamError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
            .ok_or_else(|| StreamError::UnsupportedFormat(path.display().to_string()))
    }

    /// Canonical extension, also used as the probe hint
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Mp3 => "mp3",
            Format::Wav => "wav",
            Format::Ogg => "ogg",
            Format::Flac => "flac",
            Format::M4a => "m4a",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = StreamError;

    /// Accepts `"wav"`, `".wav"` and `"WAV"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ext = s.trim().trim_start_matches('.');
        Format::from_extension(ext).ok_or_else(|| StreamError::UnsupportedFormat(s.to_string()))
    }
}

/// A decoded source and what it was decoded as
pub struct Decoded {
    pub stream: Box<dyn DecodedStream>,
    pub sample_rate: SampleRate,
    pub format: Format,
}

impl fmt::Debug for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoded")
            .field("len", &self.stream.len())
            .field("sample_rate", &self.sample_rate)
            .field("format", &self.format)
            .finish()
    }
}

/// Decoder entry point for one format
pub type DecodeFn = fn(MediaSourceStream, Format) -> Result<Decoded, StreamError>;

/// Format to decoder lookup
#[derive(Clone)]
pub struct DecoderTable {
    decoders: HashMap<Format, DecodeFn>,
}

impl Default for DecoderTable {
    /// Every format handled by symphonia
    fn default() -> Self {
        let mut table = Self::empty();
        for format in Format::ALL {
            table.register(format, SymphoniaStream::decode);
        }
        table
    }
}

impl DecoderTable {
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Install or replace the decoder for `format`
    pub fn register(&mut self, format: Format, decode: DecodeFn) {
        self.decoders.insert(format, decode);
    }

    pub fn supports(&self, format: Format) -> bool {
        self.decoders.contains_key(&format)
    }

    pub fn decode(&self, format: Format, source: MediaSourceStream) -> Result<Decoded, StreamError> {
        let decode = self
            .decoders
            .get(&format)
            .ok_or_else(|| StreamError::UnsupportedFormat(format.to_string()))?;
        decode(source, format)
    }

    /// Open and decode a file, choosing the decoder by its suffix.
    ///
    /// The suffix is checked before the file is touched.
    pub fn decode_file(&self, path: &Path) -> Result<Decoded, StreamError> {
        let format = Format::from_path(path)?;
        if !self.supports(format) {
            return Err(StreamError::UnsupportedFormat(path.display().to_string()));
        }

        let file = File::open(path)?;
        debug!("Opened {} as {}", path.display(), format);
        self.decode(format, media_stream(Box::new(file)))
    }

    pub fn decode_bytes(&self, format: Format, bytes: Vec<u8>) -> Result<Decoded, StreamError> {
        debug!("Decoding {} bytes as {}", bytes.len(), format);
        self.decode(format, media_stream(Box::new(Cursor::new(bytes))))
    }
}

fn media_stream(source: Box<dyn MediaSource>) -> MediaSourceStream {
    MediaSourceStream::new(source, Default::default())
}

fn decode_error(err: SymphoniaError) -> StreamError {
    match err {
        SymphoniaError::IoError(e) => StreamError::Io(e),
        SymphoniaError::Unsupported(what) => StreamError::UnsupportedFormat(what.to_string()),
        other => StreamError::Decode(other.to_string()),
    }
}

/// Symphonia-backed sequential source.
///
/// Timestamps are taken to be in frames, which holds for every format in
/// [`Format`].
pub struct SymphoniaStream {
    reader: Option<Box<dyn FormatReader>>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    len: usize,
    position: usize,
    pending: Vec<Frame>,
    pending_pos: usize,
    // Frames still to drop after an inexact seek
    skip: usize,
    eof: bool,
    err: Option<StreamError>,
}

impl SymphoniaStream {
    /// Probe `source` and prepare its first audio track
    pub fn decode(source: MediaSourceStream, format: Format) -> Result<Decoded, StreamError> {
        let mut hint = Hint::new();
        hint.with_extension(format.extension());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(decode_error)?;
        let mut reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| StreamError::UnsupportedFormat(format!("no audio track in {format} source")))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| StreamError::Decode("missing sample rate".to_string()))?;
        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(decode_error)?;

        let len = match params.n_frames {
            Some(n) => n as usize,
            None => count_frames(reader.as_mut(), track_id)?,
        };

        debug!(
            "Decoded {} track {}: {} frames at {} Hz",
            format, track_id, len, sample_rate
        );

        let stream = SymphoniaStream {
            reader: Some(reader),
            decoder,
            track_id,
            len,
            position: 0,
            pending: Vec::new(),
            pending_pos: 0,
            skip: 0,
            eof: false,
            err: None,
        };

        Ok(Decoded {
            stream: Box::new(stream),
            sample_rate: SampleRate(sample_rate),
            format,
        })
    }

    /// Decode the next packet into `pending`. Returns false at end of stream.
    fn refill(&mut self) -> Result<bool, StreamError> {
        if self.eof {
            return Ok(false);
        }
        let reader = self.reader.as_mut().ok_or(StreamError::Closed)?;

        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.eof = true;
                    return Ok(false);
                }
                Err(e) => return Err(decode_error(e)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(SymphoniaError::IoError(e)) => {
                    warn!("Skipping packet after I/O error: {}", e);
                    continue;
                }
                Err(e) => return Err(decode_error(e)),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            samples.copy_interleaved_ref(decoded);

            self.pending.clear();
            self.pending.extend(samples.samples().chunks_exact(channels).map(|frame| {
                // Mono feeds both sides; extra channels are dropped
                [frame[0], frame.get(1).copied().unwrap_or(frame[0])]
            }));

            let dropped = self.skip.min(self.pending.len());
            self.skip -= dropped;
            self.pending_pos = dropped;

            if self.pending_pos < self.pending.len() {
                return Ok(true);
            }
        }
    }
}

/// Walk every packet to find the length, then return to the start
fn count_frames(reader: &mut dyn FormatReader, track_id: u32) -> Result<usize, StreamError> {
    let mut frames = 0u64;
    loop {
        match reader.next_packet() {
            Ok(packet) if packet.track_id() == track_id => frames += packet.dur(),
            Ok(_) => {}
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(decode_error(e)),
        }
    }

    reader
        .seek(SeekMode::Accurate, SeekTo::TimeStamp { ts: 0, track_id })
        .map_err(decode_error)?;
    Ok(frames as usize)
}

impl Streamer for SymphoniaStream {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        if self.reader.is_none() || self.err.is_some() {
            return (0, false);
        }

        let mut filled = 0;
        while filled < frames.len() {
            if self.pending_pos >= self.pending.len() {
                match self.refill() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        warn!("Decoding stopped at frame {}: {}", self.position + filled, e);
                        self.err = Some(e);
                        break;
                    }
                }
            }

            let n = (self.pending.len() - self.pending_pos).min(frames.len() - filled);
            frames[filled..filled + n]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            self.pending_pos += n;
            filled += n;
        }

        self.position += filled;
        if self.eof && self.pending_pos >= self.pending.len() && self.position != self.len {
            // Header length was off; trust what was actually decoded
            debug!("Adjusting length from {} to {} frames", self.len, self.position);
            self.len = self.position;
        }

        (filled, filled > 0)
    }
}

impl SeekableStreamer for SymphoniaStream {
    fn len(&self) -> usize {
        self.len
    }

    fn position(&self) -> usize {
        self.position
    }

    fn seek(&mut self, position: usize) -> Result<(), StreamError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(StreamError::Closed);
        };
        if position > self.len {
            return Err(StreamError::InvalidArgument(format!(
                "seek position {} out of range 0..={}",
                position, self.len
            )));
        }

        self.pending.clear();
        self.pending_pos = 0;
        self.skip = 0;

        if position == self.len {
            self.eof = true;
            self.position = position;
            return Ok(());
        }

        let seeked = reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: position as u64,
                    track_id: self.track_id,
                },
            )
            .map_err(decode_error)?;
        self.decoder.reset();

        self.skip = seeked.required_ts.saturating_sub(seeked.actual_ts) as usize;
        self.position = position;
        self.eof = false;
        self.err = None;
        Ok(())
    }

    fn err(&self) -> Option<&StreamError> {
        self.err.as_ref()
    }
}

impl DecodedStream for SymphoniaStream {
    /// Drops the reader and the file or buffer behind it
    fn close(&mut self) -> Result<(), StreamError> {
        if self.reader.take().is_some() {
            self.pending = Vec::new();
            self.pending_pos = 0;
        }
        Ok(())
    }
}
