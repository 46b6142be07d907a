use std::borrow::Cow;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::status;

/// Longest accepted header line, excluding the newline.
///
/// The server pads the header to 12 bytes; anything much longer without a
/// newline means the stream is out of sync.
pub const MAX_HEADER_LEN: usize = 64;

/// Default maximum content size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One response unit: status code, declared length, content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol status code (200 = OK, 107 = auth required, ...).
    pub status: u16,
    /// Declared content length. Always equal to `content.len()`.
    pub length: usize,
    /// Content with the trailing terminator byte already removed.
    pub content: Bytes,
}

impl Frame {
    /// Create a frame; `length` is derived from the content.
    pub fn new(status: u16, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            status,
            length: content.len(),
            content,
        }
    }

    /// True when the status is 200.
    pub fn is_ok(&self) -> bool {
        status::is_ok(self.status)
    }

    /// Content as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// The total wire size of this frame (header + content + terminator).
    pub fn wire_size(&self) -> usize {
        header_line(self.status, self.length).len() + self.length + 1
    }
}

fn header_line(status: u16, length: usize) -> String {
    // Same padding the server uses: "%-3d %-8zd\n".
    format!("{status:<3} {length:<8}\n")
}

/// Encode a response frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────────────┬──────────────────┬────────────┐
/// │ "<status> <length>\n"  │ content          │ "\n"       │
/// │ ASCII, padded          │ (length bytes)   │ discarded  │
/// └────────────────────────┴──────────────────┴────────────┘
/// ```
pub fn encode_frame(status: u16, content: &[u8], dst: &mut BytesMut) {
    let header = header_line(status, content.len());
    dst.reserve(header.len() + content.len() + 1);
    dst.put_slice(header.as_bytes());
    dst.put_slice(content);
    dst.put_u8(b'\n');
}

/// Encode a request line: the text followed by a single newline.
pub fn encode_line(text: &str, dst: &mut BytesMut) -> Result<()> {
    if text.contains('\n') {
        return Err(FrameError::InvalidLine);
    }
    dst.reserve(text.len() + 1);
    dst.put_slice(text.as_bytes());
    dst.put_u8(b'\n');
    Ok(())
}

/// Decode a response frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes (header, content, terminator).
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let newline = match src.iter().position(|&b| b == b'\n') {
        Some(pos) => pos,
        None if src.len() > MAX_HEADER_LEN => {
            return Err(FrameError::MalformedHeader(preview(&src[..MAX_HEADER_LEN])));
        }
        None => return Ok(None), // Need more data
    };

    if newline > MAX_HEADER_LEN {
        return Err(FrameError::MalformedHeader(preview(&src[..MAX_HEADER_LEN])));
    }

    let (status, length) = parse_header(&src[..newline])?;

    if length > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: max_payload,
        });
    }

    let total = newline + 1 + length + 1;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(newline + 1);
    let content = src.split_to(length).freeze();
    src.advance(1);

    Ok(Some(Frame {
        status,
        length,
        content,
    }))
}

fn parse_header(line: &[u8]) -> Result<(u16, usize)> {
    let text = std::str::from_utf8(line).map_err(|_| FrameError::MalformedHeader(preview(line)))?;
    let mut fields = text.split_ascii_whitespace();

    let (Some(status), Some(length), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(FrameError::MalformedHeader(text.to_string()));
    };

    let status = status
        .parse::<u16>()
        .map_err(|_| FrameError::MalformedHeader(text.to_string()))?;
    let length = length
        .parse::<usize>()
        .map_err(|_| FrameError::MalformedHeader(text.to_string()))?;

    Ok((status, length))
}

fn preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum content size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
