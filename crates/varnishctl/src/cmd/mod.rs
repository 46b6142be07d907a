use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use varnishctl_session::{Coordinator, CoordinatorConfig, Secret, SessionConfig, TracingObserver};
use varnishctl_transport::Endpoint;

use crate::exit::{io_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod exec;
pub mod help;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a batch of commands on every server.
    Exec(ExecArgs),
    /// Print parsed statistics counters from every server.
    Stats,
    /// Print the loaded VCL configurations of every server.
    VclList,
    /// Ping every server.
    Ping(PingArgs),
    /// Show command help from the first server.
    Help(HelpArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, connection: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Exec(args) => exec::run(args, connection, format),
        Command::Stats => exec::run_one(&["stats"], connection, format),
        Command::VclList => exec::run_one(&["vcl.list"], connection, format),
        Command::Ping(args) => match args.timestamp {
            Some(timestamp) => exec::run_one(&["ping", timestamp.as_str()], connection, format),
            None => exec::run_one(&["ping"], connection, format),
        },
        Command::Help(args) => help::run(args, connection, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where to connect and how to authenticate.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// Admin port address: HOST, HOST:PORT, or HOST:PORT:TIMEOUT_SECS. Repeatable.
    #[arg(
        short = 'T',
        long = "server",
        value_name = "HOST:PORT",
        env = "VARNISHCTL_SERVERS",
        value_delimiter = ',',
        global = true
    )]
    pub servers: Vec<String>,

    /// File holding the shared secret, used verbatim.
    #[arg(
        short = 'S',
        long = "secret-file",
        value_name = "PATH",
        env = "VARNISHCTL_SECRET_FILE",
        global = true
    )]
    pub secret_file: Option<PathBuf>,

    /// Per-connection timeout for every server (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION", global = true)]
    pub timeout: Option<String>,

    /// Worker threads for concurrent runs.
    #[arg(long, value_name = "N", default_value_t = varnishctl_session::DEFAULT_MAX_WORKERS, global = true)]
    pub workers: usize,
}

impl ConnectArgs {
    pub fn endpoints(&self) -> CliResult<Vec<Endpoint>> {
        let timeout = self.timeout.as_deref().map(parse_duration).transpose()?;
        let endpoints = self
            .servers
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                let endpoint = Endpoint::parse(s).map_err(|e| transport_error("server", e))?;
                Ok(match timeout {
                    Some(timeout) => endpoint.with_timeout(timeout),
                    None => endpoint,
                })
            })
            .collect::<CliResult<Vec<_>>>()?;

        if endpoints.is_empty() {
            return Err(CliError::new(
                USAGE,
                "no servers configured; pass -T HOST:PORT or set VARNISHCTL_SERVERS",
            ));
        }
        Ok(endpoints)
    }

    pub fn session_config(&self) -> CliResult<SessionConfig> {
        let mut config = SessionConfig::default().with_observer(Arc::new(TracingObserver));
        if let Some(path) = &self.secret_file {
            let secret = Secret::from_file(path)
                .map_err(|e| io_error(&format!("secret file {}", path.display()), e))?;
            config = config.with_secret(secret);
        }
        Ok(config)
    }

    pub fn coordinator(&self) -> CliResult<Coordinator> {
        let endpoints = self.endpoints()?;
        let config = CoordinatorConfig {
            session: self.session_config()?,
            max_workers: self.workers,
        };
        Ok(Coordinator::new(endpoints, config))
    }
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Commands to run in order, each as one argument: "vcl.use boot".
    /// Double-quote arguments that contain whitespace.
    #[arg(value_name = "COMMAND", required = true)]
    pub commands: Vec<String>,
    /// Run on all servers at once; only a failure count is reported.
    #[arg(long)]
    pub concurrent: bool,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Timestamp to send with the ping.
    pub timestamp: Option<String>,
}

#[derive(Args, Debug)]
pub struct HelpArgs {
    /// Command to describe.
    pub command: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms`, or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
