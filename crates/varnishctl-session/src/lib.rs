//! Authenticated command sessions for the Varnish CLI protocol.
//!
//! This is the "just works" layer. Connect to an admin port, answer the
//! authentication challenge, and run typed commands, alone or as a batch,
//! against one server or a whole pool of them.

pub mod batch;
pub mod command;
pub mod connector;
pub mod coordinator;
pub mod error;
pub mod handshake;
pub mod observer;
pub mod response;
pub mod session;

pub use batch::{run_batch, run_batch_on, Batch, BatchError, BatchItem};
pub use command::{quote_arg, split_line, Command, PurgeCondition};
pub use connector::{connect, connect_with_config};
pub use coordinator::{
    ConcurrentRun, Coordinator, CoordinatorConfig, ServerOutcome, DEFAULT_MAX_WORKERS,
};
pub use error::{Result, SessionError};
pub use handshake::{challenge_response, handshake_client, HandshakeResult, Secret, CHALLENGE_LEN};
pub use observer::{NoopObserver, SessionObserver, TracingObserver};
pub use response::{CommandOutput, Response};
pub use session::{Session, SessionConfig, SessionState};
