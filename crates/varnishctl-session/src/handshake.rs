use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use varnishctl_frame::{Frame, FrameReader, FrameWriter, AUTH, OK};

use crate::error::{Result, SessionError};
use crate::observer::SessionObserver;
use crate::session::{exchange, SessionState};

/// Number of leading content bytes of a 107 frame that form the challenge.
pub const CHALLENGE_LEN: usize = 32;

/// Shared secret for the challenge-response handshake.
///
/// Treated as opaque credential material: the bytes are hashed verbatim
/// (a trailing newline in a secret file is part of the secret) and are
/// redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Read the whole secret file.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::read(path).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<redacted:{} bytes>)", self.0.len())
    }
}

/// Outcome of the connection-start exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    /// Authenticated, or degraded with the banner status.
    pub state: SessionState,
    /// The last frame of the handshake: the welcome banner after a successful
    /// auth, or the initial frame otherwise.
    pub banner: Frame,
}

/// Compute the lowercase hex SHA-256 answer to a challenge.
///
/// The digest input is `challenge \n secret \n challenge \n`.
pub fn challenge_response(challenge: &[u8], secret: &Secret) -> String {
    let mut hasher = Sha256::new();
    hasher.update(challenge);
    hasher.update(b"\n");
    hasher.update(secret.as_bytes());
    hasher.update(b"\n");
    hasher.update(challenge);
    hasher.update(b"\n");
    hex::encode(hasher.finalize())
}

/// Read the connection banner and, if challenged, authenticate.
///
/// Only a rejected `auth` reply or an unusable challenge is an error here.
/// A 107 without a configured secret, or any other non-200 banner, leaves the
/// session degraded: the observer is told, and the first real command will
/// fail with the server's own diagnostic.
pub fn handshake_client<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    secret: Option<&Secret>,
    server: &str,
    observer: &dyn SessionObserver,
) -> Result<HandshakeResult> {
    let banner = reader.read_frame()?;
    observer.response_received(server, banner.status, banner.length, &preview(&banner));

    match (banner.status, secret) {
        (OK, _) => Ok(HandshakeResult {
            state: SessionState::Authenticated,
            banner,
        }),
        (AUTH, Some(secret)) => {
            let challenge = extract_challenge(&banner)?;
            let line = format!("auth {}", challenge_response(challenge, secret));
            let reply = exchange(reader, writer, &line, "auth <redacted>", server, observer)?;
            if reply.status != OK {
                return Err(SessionError::Authentication(format!(
                    "server rejected auth response: {} {}",
                    reply.status,
                    reply.text()
                )));
            }
            Ok(HandshakeResult {
                state: SessionState::Authenticated,
                banner: reply,
            })
        }
        (status, _) => {
            observer.connect_degraded(server, status, &banner.text());
            Ok(HandshakeResult {
                state: SessionState::Degraded { status },
                banner,
            })
        }
    }
}

fn extract_challenge(frame: &Frame) -> Result<&[u8]> {
    if frame.content.len() < CHALLENGE_LEN {
        return Err(SessionError::Authentication(format!(
            "challenge too short: {} bytes (expected at least {})",
            frame.content.len(),
            CHALLENGE_LEN
        )));
    }
    Ok(&frame.content[..CHALLENGE_LEN])
}

pub(crate) fn preview(frame: &Frame) -> String {
    let end = frame.content.len().min(30);
    String::from_utf8_lossy(&frame.content[..end]).into_owned()
}
