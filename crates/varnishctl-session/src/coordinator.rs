//! Run one batch against a pool of admin ports.
//!
//! Sequential runs visit servers in pool order and hand back one outcome per
//! server. Concurrent runs feed the endpoints to a bounded set of named worker
//! threads through a channel and return a join handle right away; their
//! outputs are discarded and failures go to the observer.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info};
use varnishctl_transport::Endpoint;

use crate::batch::{run_batch, Batch, BatchError};
use crate::connector::connect_with_config;
use crate::error::{Result, SessionError};
use crate::response::CommandOutput;
use crate::session::SessionConfig;

/// Default upper bound on concurrent worker threads.
pub const DEFAULT_MAX_WORKERS: usize = 8;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub session: SessionConfig,
    /// Worker threads per concurrent run. Zero is treated as one.
    pub max_workers: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Result of a batch on one server.
#[derive(Debug)]
pub struct ServerOutcome {
    pub endpoint: Endpoint,
    pub result: std::result::Result<Vec<CommandOutput>, BatchError>,
}

impl ServerOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Join handle for a concurrent run.
///
/// Dropping it without calling [`ConcurrentRun::join`] detaches the workers;
/// each still closes its own sessions.
#[must_use = "dropping a ConcurrentRun detaches its workers"]
#[derive(Debug)]
pub struct ConcurrentRun {
    handles: Vec<JoinHandle<usize>>,
    inline_failures: usize,
}

impl ConcurrentRun {
    /// Number of worker threads started.
    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker and return how many servers failed.
    pub fn join(self) -> usize {
        let mut failures = self.inline_failures;
        for handle in self.handles {
            match handle.join() {
                Ok(count) => failures += count,
                Err(_) => error!("coordinator worker panicked"),
            }
        }
        failures
    }
}

/// A pool of admin endpoints sharing one session configuration.
#[derive(Debug)]
pub struct Coordinator {
    servers: Vec<Endpoint>,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Create a coordinator. An empty pool is allowed but reported.
    pub fn new(servers: impl IntoIterator<Item = Endpoint>, config: CoordinatorConfig) -> Self {
        let servers: Vec<Endpoint> = servers.into_iter().collect();
        if servers.is_empty() {
            config.session.observer.empty_pool();
        }
        Self { servers, config }
    }

    pub fn servers(&self) -> &[Endpoint] {
        &self.servers
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn add_server(&mut self, endpoint: Endpoint) {
        self.servers.push(endpoint);
    }

    /// Remove every entry equal to `endpoint`. Returns whether any was removed.
    pub fn remove_server(&mut self, endpoint: &Endpoint) -> bool {
        let before = self.servers.len();
        self.servers.retain(|server| server != endpoint);
        let removed = self.servers.len() != before;
        if removed && self.servers.is_empty() {
            self.config.session.observer.empty_pool();
        }
        removed
    }

    /// Run the batch on each server in pool order.
    ///
    /// A failure on one server never stops the others.
    pub fn run(&self, batch: &Batch) -> Vec<ServerOutcome> {
        self.servers
            .iter()
            .map(|endpoint| {
                let result = run_batch(endpoint, batch, &self.config.session);
                if let Err(err) = &result {
                    self.config
                        .session
                        .observer
                        .batch_failed(&endpoint.to_string(), &err.source);
                }
                ServerOutcome {
                    endpoint: endpoint.clone(),
                    result,
                }
            })
            .collect()
    }

    /// Start the batch on every server in the background.
    pub fn run_concurrent(&self, batch: &Batch) -> ConcurrentRun {
        if self.servers.is_empty() {
            return ConcurrentRun {
                handles: Vec::new(),
                inline_failures: 0,
            };
        }

        let (tx, rx) = crossbeam_channel::bounded(self.servers.len());
        for endpoint in &self.servers {
            // Capacity covers every endpoint.
            let _ = tx.send(endpoint.clone());
        }
        drop(tx);

        let batch = Arc::new(batch.clone());
        let config = Arc::new(self.config.session.clone());
        let workers = self.config.max_workers.max(1).min(self.servers.len());
        info!(servers = self.servers.len(), workers, "starting concurrent run");

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let queue = rx.clone();
            let batch = Arc::clone(&batch);
            let config = Arc::clone(&config);
            let spawned = thread::Builder::new()
                .name(format!("varnishctl-worker-{id}"))
                .spawn(move || worker_loop(id, &queue, &batch, &config));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    error!(worker = id, error = %err, "failed to spawn worker");
                    break;
                }
            }
        }

        // Without any worker, drain the queue on the caller's thread.
        let inline_failures = if handles.is_empty() {
            worker_loop(0, &rx, &batch, &config)
        } else {
            0
        };

        ConcurrentRun {
            handles,
            inline_failures,
        }
    }

    /// Run `help` on the first server only and return its text.
    pub fn help(&self, command: Option<&str>) -> Result<String> {
        let endpoint = self.servers.first().ok_or_else(|| {
            SessionError::InvalidArgument("no servers configured".to_string())
        })?;
        let mut session = connect_with_config(endpoint, &self.config.session)?;
        let text = session.help(command);
        session.close();
        text
    }

    /// Connect to, handshake with, and disconnect from every server
    /// concurrently, wait, then empty the pool. Safe to call more than once.
    pub fn close(&mut self) {
        if self.servers.is_empty() {
            return;
        }
        let failures = self.run_concurrent(&Batch::new()).join();
        debug!(servers = self.servers.len(), failures, "pool closed");
        self.servers.clear();
    }
}

fn worker_loop(
    id: usize,
    queue: &Receiver<Endpoint>,
    batch: &Batch,
    config: &SessionConfig,
) -> usize {
    debug!(worker = id, "worker started");
    let mut failures = 0;
    while let Ok(endpoint) = queue.recv() {
        if let Err(err) = run_batch(&endpoint, batch, config) {
            config.observer.batch_failed(&endpoint.to_string(), &err.source);
            failures += 1;
        }
    }
    debug!(worker = id, failures, "worker stopped");
    failures
}
