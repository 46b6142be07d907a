use tracing::{debug, info};
use varnishctl_frame::{FrameConfig, FrameReader, FrameWriter};
use varnishctl_transport::{AdminStream, Endpoint};

use crate::error::Result;
use crate::session::{Session, SessionConfig};

/// Connect with default settings: no secret, tracing observer.
pub fn connect(endpoint: &Endpoint) -> Result<Session> {
    connect_with_config(endpoint, &SessionConfig::default())
}

/// Open a TCP connection, apply the endpoint timeout to reads and writes, and
/// run the connection-start exchange.
pub fn connect_with_config(endpoint: &Endpoint, config: &SessionConfig) -> Result<Session> {
    let label = endpoint.to_string();
    debug!(server = %label, timeout_ms = endpoint.timeout().as_millis() as u64, "connecting");

    let stream = AdminStream::connect(endpoint)?;
    let write_half = stream.try_clone()?;

    let frame_config = FrameConfig {
        max_payload_size: config.max_payload_size,
        read_timeout: Some(endpoint.timeout()),
        write_timeout: Some(endpoint.timeout()),
    };
    let reader = FrameReader::with_config_admin(stream, frame_config.clone())?;
    let writer = FrameWriter::with_config_admin(write_half, frame_config)?;

    let session = Session::from_parts(label, reader, writer, config)?;
    info!(server = %session.label(), state = ?session.state(), "connected");
    Ok(session)
}
