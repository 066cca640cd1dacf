use std::io::Write;

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{Request, Response};

/// Codec for line-delimited JSON messages: one object per line.
pub struct LineCodec;

impl LineCodec {
    /// Decode one input line into a [`Request`]. Surrounding whitespace,
    /// including the trailing `\r` of CRLF input, is ignored.
    pub fn decode_request(line: &str) -> ProtocolResult<Request> {
        serde_json::from_str(line.trim())
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Decode one output line into a [`Response`].
    pub fn decode_response(line: &str) -> ProtocolResult<Response> {
        serde_json::from_str(line.trim())
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Encode a response as compact JSON terminated by a single `\n`.
    pub fn encode(msg: &Response) -> ProtocolResult<Vec<u8>> {
        let mut buf =
            serde_json::to_vec(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        // Compact JSON escapes control characters, so this only trips on a
        // serializer bug.
        if buf.contains(&b'\n') {
            return Err(ProtocolError::EmbeddedNewline);
        }
        buf.push(b'\n');
        Ok(buf)
    }

    /// Encode a request line (used by drivers and tests).
    pub fn encode_request(req: &Request) -> ProtocolResult<Vec<u8>> {
        let mut buf =
            serde_json::to_vec(req).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Write one response line and flush, so the peer sees the whole
    /// message before anything else is sent. Returns the bytes written.
    pub fn write_message<W: Write + ?Sized>(w: &mut W, msg: &Response) -> ProtocolResult<Vec<u8>> {
        let line = Self::encode(msg)?;
        w.write_all(&line)?;
        w.flush()?;
        Ok(line)
    }
}
