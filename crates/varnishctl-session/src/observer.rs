//! Injectable reporting hooks.
//!
//! Sessions and the coordinator never configure logging themselves. They
//! report to a [`SessionObserver`]; the default [`TracingObserver`] turns
//! those reports into `tracing` events, and whoever owns the process decides
//! where the events go.

use tracing::{debug, error, warn};

use crate::error::SessionError;

/// Receives protocol events. All methods default to no-ops.
pub trait SessionObserver: Send + Sync {
    /// A command line is about to be written. Auth digests arrive redacted.
    fn command_sent(&self, _server: &str, _command: &str) {}

    /// A response frame was read. `preview` is at most the first 30 bytes.
    fn response_received(&self, _server: &str, _status: u16, _length: usize, _preview: &str) {}

    /// The connection banner was neither 200 nor an answerable 107.
    fn connect_degraded(&self, _server: &str, _status: u16, _content: &str) {}

    /// A batch against one server stopped with an error.
    fn batch_failed(&self, _server: &str, _error: &SessionError) {}

    /// A coordinator was created or left without servers.
    fn empty_pool(&self) {}
}

/// Forwards every report to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn command_sent(&self, server: &str, command: &str) {
        debug!(server, command, "SENT");
    }

    fn response_received(&self, server: &str, status: u16, length: usize, preview: &str) {
        debug!(server, status, length, preview, "RECV");
    }

    fn connect_degraded(&self, server: &str, status: u16, content: &str) {
        error!(server, status, content, "connecting failed");
    }

    fn batch_failed(&self, server: &str, error: &SessionError) {
        error!(server, %error, "batch failed");
    }

    fn empty_pool(&self) {
        warn!("no servers configured; declare at least one");
    }
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
