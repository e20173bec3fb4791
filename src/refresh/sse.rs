//! Server-sent events decoder.
//!
//! Implements the subset of the event-stream format the push endpoint
//! uses: `data`, `event`, `id` and `retry` fields, comment lines, and blank
//! lines as event terminators. Lines may end in `\n` or `\r\n`.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Longest line accepted before the stream is rejected.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; `message` when the stream did not name one
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event id seen on the stream
    pub id: Option<String>,
}

/// Incremental event-stream decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    data: String,
    has_data: bool,
    event: Option<String>,
    last_id: Option<String>,
    retry: Option<Duration>,
}

impl SseDecoder {
    /// Creates a decoder with no pending event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconnect delay most recently advertised by the server.
    #[must_use]
    pub const fn retry(&self) -> Option<Duration> {
        self.retry
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseEvent {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}

impl Decoder for SseDecoder {
    type Item = SseEvent;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(pos) = src.iter().position(|&b| b == b'\n') {
            let raw = src.split_to(pos + 1);
            let line = raw[..pos].strip_suffix(b"\r").unwrap_or(&raw[..pos]);
            let line = String::from_utf8_lossy(line);
            if let Some(event) = self.process_line(&line) {
                return Ok(Some(event));
            }
        }

        if src.len() > MAX_LINE_LENGTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("event-stream line exceeds {MAX_LINE_LENGTH} bytes"),
            ));
        }
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(event) = self.decode(buf)? {
            return Ok(Some(event));
        }
        // an unterminated trailing event is discarded
        buf.clear();
        self.data.clear();
        self.has_data = false;
        self.event = None;
        Ok(None)
    }
}
