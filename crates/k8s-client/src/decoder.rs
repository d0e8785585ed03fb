//! Response decoders
//!
//! A decoder turns a response body into a sequence of JSON values, one value
//! per call. Watch bodies are JSON values written back to back with no
//! enclosing array, so the default decoder frames values incrementally as
//! bytes arrive.

use crate::error::DecodeError;
use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

/// Response body as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Builds a decoder for a response body.
pub type DecoderFactory = Arc<dyn Fn(ByteStream) -> Box<dyn ResponseDecoder> + Send + Sync>;

/// Decodes one JSON value at a time from a response body.
#[async_trait::async_trait]
pub trait ResponseDecoder: Send {
    /// Wait for and return the next complete value.
    ///
    /// Returns [`DecodeError::Eof`] once the body ended cleanly between values.
    async fn decode(&mut self) -> Result<Value, DecodeError>;

    /// Release the underlying body. Calling it more than once has no effect;
    /// `decode` returns [`DecodeError::Eof`] afterwards.
    fn close(&mut self);
}

/// The default factory, producing [`JsonStreamDecoder`]s.
#[must_use]
pub fn json_decoder_factory() -> DecoderFactory {
    Arc::new(|body| Box::new(JsonStreamDecoder::new(body)))
}

/// Frames concatenated JSON values out of a byte stream.
pub struct JsonStreamDecoder {
    body: Option<ByteStream>,
    buf: BytesMut,
    framer: Framer,
}

impl JsonStreamDecoder {
    /// Create a decoder reading from `body`.
    pub fn new(body: ByteStream) -> Self {
        Self {
            body: Some(body),
            buf: BytesMut::new(),
            framer: Framer::default(),
        }
    }

    /// Try to cut one complete value off the front of the buffer.
    fn next_buffered(&mut self) -> Result<Option<Value>, DecodeError> {
        if self.framer.scanned() == 0 {
            let leading = self.buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            self.buf.advance(leading);
        }
        let Some(&first) = self.buf.first() else {
            return Ok(None);
        };

        // Objects and arrays are only parsed once their closing bracket arrived
        let framed = matches!(first, b'{' | b'[');
        let end = if framed {
            match self.framer.scan(&self.buf) {
                Some(end) => end,
                None => return Ok(None),
            }
        } else {
            self.buf.len()
        };

        let mut values = serde_json::Deserializer::from_slice(&self.buf[..end]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) => {
                let consumed = values.byte_offset();
                self.buf.advance(consumed);
                self.framer = Framer::default();
                Ok(Some(value))
            }
            // Scalar continues in a chunk that has not arrived yet
            Some(Err(e)) if e.is_eof() && !framed => Ok(None),
            Some(Err(e)) => Err(DecodeError::Json(e)),
            None => Ok(None),
        }
    }

    fn end_of_body(&self) -> DecodeError {
        if self.buf.is_empty() {
            DecodeError::Eof
        } else {
            DecodeError::UnexpectedEof
        }
    }
}

/// Bracket matcher for the object or array at the front of the buffer.
///
/// Remembers how far it got, so every byte is scanned once no matter how
/// many chunks a value is split across.
#[derive(Debug, Default)]
pub(crate) struct Framer {
    scanned: usize,
    closers: Vec<u8>,
    in_string: bool,
    escaped: bool,
}

impl Framer {
    /// Bytes of the current value inspected so far.
    pub(crate) fn scanned(&self) -> usize {
        self.scanned
    }

    /// Continue scanning `buf`, which starts with the value's opening bracket.
    ///
    /// Returns the length of the value once its closing bracket was seen, or
    /// the position of a mismatched bracket so the parser reports it.
    pub(crate) fn scan(&mut self, buf: &[u8]) -> Option<usize> {
        let start = self.scanned;
        for (offset, &byte) in buf.get(start..)?.iter().enumerate() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' => self.closers.push(b'}'),
                b'[' => self.closers.push(b']'),
                b'}' | b']' => {
                    let end = start + offset + 1;
                    if self.closers.pop() != Some(byte) || self.closers.is_empty() {
                        self.scanned = end;
                        return Some(end);
                    }
                }
                _ => {}
            }
        }
        self.scanned = buf.len();
        None
    }
}

#[async_trait::async_trait]
impl ResponseDecoder for JsonStreamDecoder {
    async fn decode(&mut self) -> Result<Value, DecodeError> {
        loop {
            if let Some(value) = self.next_buffered()? {
                return Ok(value);
            }

            let Some(body) = self.body.as_mut() else {
                return Err(self.end_of_body());
            };
            match body.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(DecodeError::Transport(e.to_string())),
                None => {
                    self.body = None;
                    return Err(self.end_of_body());
                }
            }
        }
    }

    fn close(&mut self) {
        self.body = None;
        self.buf.clear();
        self.framer = Framer::default();
    }
}

impl fmt::Debug for JsonStreamDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonStreamDecoder")
            .field("open", &self.body.is_some())
            .field("buffered", &self.buf.len())
            .finish()
    }
}
