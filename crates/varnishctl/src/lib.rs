//! Client for the Varnish Cache administrative CLI protocol.
//!
//! Talks to one or more `varnishd` management ports: frames requests and
//! responses, answers the shared-secret challenge, and runs typed commands
//! singly, as ordered batches, or across a pool of servers.
//!
//! # Crate Structure
//!
//! - [`transport`]: endpoints and TCP streams with per-connection timeouts
//! - [`frame`]: status/length response framing and request lines
//! - [`session`]: authenticated sessions, batches, and the multi-server coordinator

/// Re-export transport types.
pub mod transport {
    pub use varnishctl_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use varnishctl_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use varnishctl_session::*;
}

pub use varnishctl_session::{connect, run_batch, Batch, Coordinator, Session, SessionConfig};
pub use varnishctl_transport::Endpoint;
