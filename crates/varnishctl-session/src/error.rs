use bytes::Bytes;
use varnishctl_frame::FrameError;
use varnishctl_transport::TransportError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error (resolve, connect, socket options).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error (I/O, premature close, malformed header).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The server answered with a status other than 200.
    /// `content` is the server's reply byte for byte.
    #[error("bad response code: {status} {}", String::from_utf8_lossy(.content))]
    Protocol { status: u16, content: Bytes },

    /// The authentication challenge could not be answered or was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A command was built with missing or extra arguments. No I/O happened.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A 200 response whose content could not be projected to the typed result.
    #[error("malformed response to '{command}': {reason}")]
    MalformedResponse { command: String, reason: String },

    /// The session was already closed.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// True for failures of the connection itself: the stream could not be
    /// opened, closed early, timed out, or failed mid-write.
    pub fn is_connection_error(&self) -> bool {
        match self {
            SessionError::Transport(_) => true,
            SessionError::Frame(FrameError::Io(_) | FrameError::ConnectionClosed) => true,
            _ => false,
        }
    }

    /// The server status code, for protocol failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            SessionError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
