//! TCP transport for the Varnish administrative port.
//!
//! This is the lowest layer of varnishctl. It knows how to name a server
//! ([`Endpoint`]) and how to open a timeout-bounded byte stream to it
//! ([`AdminStream`]). It knows nothing about frames or commands.

pub mod endpoint;
pub mod error;
pub mod stream;

pub use endpoint::{Endpoint, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::{Result, TransportError};
pub use stream::AdminStream;
