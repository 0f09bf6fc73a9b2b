//! Length-prefixed JSON framing used by the backend services.
//!
//! Each frame is `<len>#<json>`, where `<len>` is the decimal byte length
//! of the UTF-8 JSON body that follows the `#`.

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};

/// Longest accepted length header, in digits.
const MAX_HEADER_LEN: usize = 20;

/// Errors produced while framing or parsing backend traffic.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid frame length header")]
    InvalidHeader,
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

/// Tokio codec for `<len>#<json>` frames.
///
/// Decodes into untyped JSON; callers convert into `ReplyPacket` or
/// `RequestPacket` as appropriate for their side of the connection.
#[derive(Debug, Clone)]
pub struct JsonSocketCodec {
    max_frame_len: usize,
}

impl JsonSocketCodec {
    #[must_use]
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

impl Default for JsonSocketCodec {
    fn default() -> Self {
        Self::new(16 * 1024 * 1024)
    }
}

impl Decoder for JsonSocketCodec {
    type Item = Value;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, CodecError> {
        let Some(delim) = src.iter().take(MAX_HEADER_LEN + 1).position(|b| *b == b'#') else {
            if src.len() > MAX_HEADER_LEN {
                return Err(CodecError::InvalidHeader);
            }
            return Ok(None);
        };

        let header = &src[..delim];
        if header.is_empty() || !header.iter().all(u8::is_ascii_digit) {
            return Err(CodecError::InvalidHeader);
        }
        let len: usize = std::str::from_utf8(header)
            .ok()
            .and_then(|h| h.parse().ok())
            .ok_or(CodecError::InvalidHeader)?;
        if len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        let frame_len = delim + 1 + len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(delim + 1);
        let body = src.split_to(len);
        Ok(Some(serde_json::from_slice(&body)?))
    }
}

impl<T: Serialize> Encoder<T> for JsonSocketCodec {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), CodecError> {
        let body = serde_json::to_vec(&item)?;
        if body.len() > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len: body.len(),
                max: self.max_frame_len,
            });
        }
        let header = body.len().to_string();
        dst.reserve(header.len() + 1 + body.len());
        dst.put_slice(header.as_bytes());
        dst.put_u8(b'#');
        dst.put_slice(&body);
        Ok(())
    }
}
