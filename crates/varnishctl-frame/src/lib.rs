//! Status/length framing for the Varnish CLI protocol.
//!
//! Every server response is framed as:
//! - An ASCII header line `"<status> <length>\n"`
//! - `length` bytes of content
//! - One terminator byte, which is discarded
//!
//! Requests are a single line of text terminated by `\n`.
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod status;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, encode_line, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD,
    MAX_HEADER_LEN,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use status::{
    status_name, AUTH, CANT, CLOSE, COMMS, OK, PARAM, SYNTAX, TOO_FEW, TOO_MANY, UNIMPL, UNKNOWN,
};
pub use writer::FrameWriter;
