use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

/// A connected admin-port stream. Implements `Read + Write`.
///
/// Every blocking operation on the stream is bounded by the endpoint timeout.
pub struct AdminStream {
    inner: TcpStream,
    peer: SocketAddr,
}

impl AdminStream {
    /// Connect to the endpoint, trying each resolved address in turn.
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        let target = endpoint.socket_addr_string();
        let addrs: Vec<SocketAddr> = target
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                endpoint: target.clone(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::Resolve {
                endpoint: target,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no addresses returned",
                ),
            });
        }

        let timeout = endpoint.timeout();
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    debug!(%addr, ?timeout, "connected to admin port");
                    return Self::from_tcp(stream, Some(timeout));
                }
                Err(err) => {
                    debug!(%addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            endpoint: target,
            source: last_err.unwrap_or_else(|| std::io::Error::other("no address attempted")),
        })
    }

    /// Wrap an already-connected TCP stream and apply the I/O timeout.
    pub fn from_tcp(stream: TcpStream, timeout: Option<Duration>) -> Result<Self> {
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        // Commands and responses are small; do not let Nagle delay them.
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            inner: stream,
            peer,
        })
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            inner: self.inner.try_clone()?,
            peer: self.peer,
        })
    }

    /// Address of the connected server.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Read for AdminStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for AdminStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for AdminStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminStream")
            .field("peer", &self.peer)
            .finish()
    }
}
