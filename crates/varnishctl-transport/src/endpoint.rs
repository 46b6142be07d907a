use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Default Varnish management port.
pub const DEFAULT_PORT: u16 = 6082;

/// Default per-connection timeout (connect, each read, each write).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Address and timeout of one administrative port.
///
/// Accepted string forms:
/// ```text
/// host
/// host:port
/// host:port:timeout_secs
/// [v6addr]:port[:timeout_secs]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Endpoint {
    /// Create an endpoint with the default timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the per-connection timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Parse an endpoint string (see type docs for accepted forms).
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "empty endpoint"));
        }

        let (host, rest) = if let Some(after) = trimmed.strip_prefix('[') {
            let close = after
                .find(']')
                .ok_or_else(|| invalid(input, "unterminated '[' in IPv6 address"))?;
            let host = &after[..close];
            let rest = &after[close + 1..];
            let rest = match rest.strip_prefix(':') {
                Some(rest) => rest,
                None if rest.is_empty() => "",
                None => return Err(invalid(input, "expected ':' after ']'")),
            };
            (host, rest)
        } else {
            if trimmed.matches(':').count() > 2 {
                return Err(invalid(input, "IPv6 addresses must be written in brackets"));
            }
            match trimmed.split_once(':') {
                Some((host, rest)) => (host, rest),
                None => (trimmed, ""),
            }
        };

        if host.is_empty() {
            return Err(invalid(input, "missing host"));
        }

        let mut parts = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(':').collect::<Vec<_>>()
        };
        if parts.len() > 2 {
            return Err(invalid(input, "too many ':' separated fields"));
        }

        let timeout = match parts.len() {
            2 => Some(parse_timeout(input, parts.pop().unwrap_or_default())?),
            _ => None,
        };
        let port = match parts.pop() {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| invalid(input, &format!("invalid port '{port}'")))?,
            None => DEFAULT_PORT,
        };
        if port == 0 {
            return Err(invalid(input, "port must be non-zero"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// `host:port` form suitable for `ToSocketAddrs`.
    pub fn socket_addr_string(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.socket_addr_string())
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_timeout(input: &str, raw: &str) -> Result<Duration> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| invalid(input, &format!("invalid timeout '{raw}'")))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid(input, "timeout must be a positive number of seconds"));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid(input, "timeout out of range"))
}

fn invalid(input: &str, reason: &str) -> TransportError {
    TransportError::InvalidEndpoint {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
