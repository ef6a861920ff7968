//! Channel-tagged frames for process links.
//!
//! A link carries one frame per line: `<channel> <payload>`. The channel
//! names the logical plugin-messaging channel; the payload is UTF-8 JSON.
//! Receivers ignore frames for channels they did not register. Lines that
//! do not parse as frames are logged and skipped; the stream only fails on
//! I/O errors.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::{ProtoError, Result};
use crate::line::LineCodec;
use crate::message::{decode, encode, PlayerStatusMessage};
use crate::LINK_CHANNEL;

/// One channel-tagged line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Logical channel name. Never contains whitespace.
    pub channel: String,
    /// Raw payload.
    pub payload: String,
}

impl Frame {
    /// Frame carrying a status envelope.
    pub fn envelope(channel: &str, msg: &PlayerStatusMessage) -> Result<Self> {
        let payload = String::from_utf8(encode(msg)?)
            .map_err(|e| ProtoError::Line(format!("invalid utf-8: {e}")))?;
        Ok(Self {
            channel: channel.to_owned(),
            payload,
        })
    }

    /// The hello a backend sends once after connecting.
    pub fn hello(server_name: &str) -> Result<Self> {
        let payload = serde_json::to_string(&LinkHello {
            server_name: server_name.to_owned(),
        })?;
        Ok(Self {
            channel: LINK_CHANNEL.to_owned(),
            payload,
        })
    }

    /// Whether this frame is on `channel`.
    #[inline]
    pub fn is_on(&self, channel: &str) -> bool {
        self.channel == channel
    }

    /// Decode the payload as a status envelope.
    pub fn to_envelope(&self) -> Result<PlayerStatusMessage> {
        decode(self.payload.as_bytes())
    }

    /// Decode the payload as a [`LinkHello`].
    pub fn to_hello(&self) -> Result<LinkHello> {
        if !self.is_on(LINK_CHANNEL) {
            return Err(ProtoError::Line(format!(
                "hello expected on {LINK_CHANNEL}, got {}",
                self.channel
            )));
        }
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Backend self-identification, sent on [`LINK_CHANNEL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkHello {
    /// Name the proxy records the link under.
    pub server_name: String,
}

/// Tokio codec for [`Frame`]s. Wraps [`LineCodec`].
#[derive(Default)]
pub struct FrameCodec {
    inner: LineCodec,
}

impl FrameCodec {
    /// Codec with the default line limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec with a custom max line length in bytes.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            inner: LineCodec::with_max_len(max_len),
        }
    }

    fn parse(line: &str) -> Result<Frame> {
        let (channel, payload) = line
            .split_once(' ')
            .ok_or_else(|| ProtoError::Line("frame missing channel separator".to_owned()))?;
        if channel.is_empty() {
            return Err(ProtoError::Line("frame has empty channel".to_owned()));
        }
        Ok(Frame {
            channel: channel.to_owned(),
            payload: payload.to_owned(),
        })
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            match self.inner.decode(src) {
                Ok(None) => return Ok(None),
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match Self::parse(&line) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(e) => warn!(error = %e, code = e.error_code(), "Skipping unparseable frame"),
                },
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, code = e.error_code(), "Skipping unreadable line");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtoError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.channel.is_empty() || frame.channel.contains(char::is_whitespace) {
            return Err(ProtoError::Line(format!(
                "invalid channel name '{}'",
                frame.channel
            )));
        }
        self.inner
            .encode(format!("{} {}", frame.channel, frame.payload), dst)
    }
}
