//! Newline-terminated UTF-8 line codec for tokio.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtoError, Result};

/// Default maximum line length. Sync responses carry a whole snapshot, so
/// this is far above a chat line.
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Line codec yielding lines without their terminator.
///
/// Errors for an over-long or non-UTF-8 line are reported once and the
/// offending bytes are consumed, so the next call resumes at the following
/// line.
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    max_len: usize,
    /// Dropping the tail of an over-long line until its newline arrives.
    discarding: bool,
}

impl LineCodec {
    /// Codec with [`DEFAULT_MAX_LINE_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Codec with a custom max line length in bytes.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if self.discarding {
                    src.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                if src.len() > self.max_len {
                    let actual = src.len();
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Err(ProtoError::LineTooLong {
                        actual,
                        limit: self.max_len,
                    });
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            if line.len() > self.max_len {
                return Err(ProtoError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let text = std::str::from_utf8(&line)
                .map_err(|e| ProtoError::Line(format!("invalid utf-8: {e}")))?;
            return Ok(Some(text.trim_end_matches(['\r', '\n']).to_owned()));
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtoError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<()> {
        if line.contains(['\r', '\n']) {
            return Err(ProtoError::Line("embedded line terminator".to_owned()));
        }
        dst.reserve(line.len() + 1);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
