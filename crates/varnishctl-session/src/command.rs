//! The closed set of commands a session can issue.
//!
//! Commands are resolved from `(name, args...)` once, when a batch is built,
//! so argument mistakes surface before any connection is opened.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, SessionError};

/// One `purge <field> <operator> <argument>` condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeCondition {
    pub field: String,
    pub operator: String,
    pub argument: String,
}

impl PurgeCondition {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        argument: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            argument: argument.into(),
        }
    }
}

/// A typed admin command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Start,
    Stop,
    Ping { timestamp: Option<String> },
    Stats,
    Help { command: Option<String> },
    VclLoad { name: String, file: String },
    VclInline { name: String, source: String },
    VclShow { name: String },
    VclUse { name: String },
    VclDiscard { name: String },
    VclList,
    ParamShow { name: String, long: bool },
    ParamSet { name: String, value: String },
    BanUrl { regex: String },
    PurgeUrl { regex: String },
    PurgeHash { regex: String },
    PurgeList,
    Purge { conditions: Vec<PurgeCondition> },
}

impl Command {
    /// Resolve a command from its wire name and string arguments.
    ///
    /// Both the dotted wire form (`vcl.load`) and the underscore form
    /// (`vcl_load`) are accepted.
    pub fn parse<S: AsRef<str>>(name: &str, args: &[S]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let normalized = name.trim().replace('_', ".");

        let command = match normalized.as_str() {
            "start" => {
                expect_args(&normalized, &args, 0, 0)?;
                Command::Start
            }
            "stop" => {
                expect_args(&normalized, &args, 0, 0)?;
                Command::Stop
            }
            "ping" => {
                expect_args(&normalized, &args, 0, 1)?;
                Command::Ping {
                    timestamp: optional(&normalized, &args, "timestamp")?,
                }
            }
            "stats" => {
                expect_args(&normalized, &args, 0, 0)?;
                Command::Stats
            }
            "help" => {
                expect_args(&normalized, &args, 0, 1)?;
                Command::Help {
                    command: optional(&normalized, &args, "command")?,
                }
            }
            "vcl.load" => {
                expect_args(&normalized, &args, 2, 2)?;
                Command::VclLoad {
                    name: required(&normalized, &args, 0, "configuration name")?,
                    file: required(&normalized, &args, 1, "file name")?,
                }
            }
            "vcl.inline" => {
                expect_args(&normalized, &args, 2, 2)?;
                Command::VclInline {
                    name: required(&normalized, &args, 0, "configuration name")?,
                    source: required(&normalized, &args, 1, "VCL source")?,
                }
            }
            "vcl.show" => {
                expect_args(&normalized, &args, 1, 1)?;
                Command::VclShow {
                    name: required(&normalized, &args, 0, "configuration name")?,
                }
            }
            "vcl.use" => {
                expect_args(&normalized, &args, 1, 1)?;
                Command::VclUse {
                    name: required(&normalized, &args, 0, "configuration name")?,
                }
            }
            "vcl.discard" => {
                expect_args(&normalized, &args, 1, 1)?;
                Command::VclDiscard {
                    name: required(&normalized, &args, 0, "configuration name")?,
                }
            }
            "vcl.list" => {
                expect_args(&normalized, &args, 0, 0)?;
                Command::VclList
            }
            "param.show" => {
                expect_args(&normalized, &args, 1, 2)?;
                let (long, rest) = match args.as_slice() {
                    ["-l", rest @ ..] => (true, rest),
                    rest => (false, rest),
                };
                if rest.len() != 1 {
                    return Err(SessionError::InvalidArgument(
                        "param.show takes [-l] <param>".to_string(),
                    ));
                }
                Command::ParamShow {
                    name: required(&normalized, rest, 0, "parameter name")?,
                    long,
                }
            }
            "param.set" => {
                expect_args(&normalized, &args, 2, 2)?;
                Command::ParamSet {
                    name: required(&normalized, &args, 0, "parameter name")?,
                    value: args[1].to_string(),
                }
            }
            "ban.url" => {
                expect_args(&normalized, &args, 1, 1)?;
                Command::BanUrl {
                    regex: required(&normalized, &args, 0, "regex")?,
                }
            }
            "purge.url" => {
                expect_args(&normalized, &args, 1, 1)?;
                Command::PurgeUrl {
                    regex: required(&normalized, &args, 0, "regex")?,
                }
            }
            "purge.hash" => {
                expect_args(&normalized, &args, 1, 1)?;
                Command::PurgeHash {
                    regex: required(&normalized, &args, 0, "regex")?,
                }
            }
            "purge.list" => {
                expect_args(&normalized, &args, 0, 0)?;
                Command::PurgeList
            }
            "purge" => {
                if args.is_empty() || args.len() % 3 != 0 {
                    return Err(SessionError::InvalidArgument(format!(
                        "purge takes one or more <field> <operator> <arg> triples, got {} argument(s)",
                        args.len()
                    )));
                }
                let conditions = args
                    .chunks(3)
                    .map(|c| PurgeCondition::new(c[0], c[1], c[2]))
                    .collect();
                Command::purge(conditions)?
            }
            other => {
                return Err(SessionError::InvalidArgument(format!(
                    "unknown command '{other}'"
                )))
            }
        };

        Ok(command)
    }

    /// Build a multi-condition purge. At least one condition is required.
    pub fn purge(conditions: Vec<PurgeCondition>) -> Result<Self> {
        if conditions.is_empty() {
            return Err(SessionError::InvalidArgument(
                "purge requires at least one condition".to_string(),
            ));
        }
        if conditions
            .iter()
            .any(|c| c.field.is_empty() || c.operator.is_empty())
        {
            return Err(SessionError::InvalidArgument(
                "purge condition needs a field and an operator".to_string(),
            ));
        }
        Ok(Command::Purge { conditions })
    }

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Ping { .. } => "ping",
            Command::Stats => "stats",
            Command::Help { .. } => "help",
            Command::VclLoad { .. } => "vcl.load",
            Command::VclInline { .. } => "vcl.inline",
            Command::VclShow { .. } => "vcl.show",
            Command::VclUse { .. } => "vcl.use",
            Command::VclDiscard { .. } => "vcl.discard",
            Command::VclList => "vcl.list",
            Command::ParamShow { .. } => "param.show",
            Command::ParamSet { .. } => "param.set",
            Command::BanUrl { .. } => "ban.url",
            Command::PurgeUrl { .. } => "purge.url",
            Command::PurgeHash { .. } => "purge.hash",
            Command::PurgeList => "purge.list",
            Command::Purge { .. } => "purge",
        }
    }

    /// Wire lines for this command, in send order.
    ///
    /// Every command is one line except `purge`, which sends one line per
    /// condition.
    pub fn lines(&self) -> Vec<String> {
        let name = self.name();
        match self {
            Command::Start
            | Command::Stop
            | Command::Stats
            | Command::VclList
            | Command::PurgeList => vec![name.to_string()],
            Command::Ping { timestamp: arg } | Command::Help { command: arg } => {
                vec![line(name, arg.as_deref())]
            }
            Command::VclLoad { name: a, file: b }
            | Command::VclInline { name: a, source: b }
            | Command::ParamSet { name: a, value: b } => vec![line(name, [a.as_str(), b.as_str()])],
            Command::VclShow { name: a }
            | Command::VclUse { name: a }
            | Command::VclDiscard { name: a }
            | Command::BanUrl { regex: a }
            | Command::PurgeUrl { regex: a }
            | Command::PurgeHash { regex: a } => vec![line(name, [a.as_str()])],
            Command::ParamShow { name: param, long } => {
                if *long {
                    vec![line(name, ["-l", param.as_str()])]
                } else {
                    vec![line(name, [param.as_str()])]
                }
            }
            Command::Purge { conditions } => conditions
                .iter()
                .map(|c| {
                    line(
                        name,
                        [c.field.as_str(), c.operator.as_str(), c.argument.as_str()],
                    )
                })
                .collect(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("; "))
    }
}

fn line<'a>(name: &str, args: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = name.to_string();
    for arg in args {
        out.push(' ');
        out.push_str(&quote_arg(arg));
    }
    out
}

/// Render one argument so the server's tokenizer reads it back unchanged.
///
/// Plain tokens are sent verbatim. Anything with whitespace, quotes,
/// backslashes, or control characters is wrapped in double quotes with
/// backslash escapes, which keeps multi-line VCL on a single request line.
pub fn quote_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\' || c.is_control());
    if !needs_quotes {
        return arg.to_string();
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                // `\xHH` is a single byte once unescaped.
                let mut utf8 = [0u8; 4];
                for byte in c.encode_utf8(&mut utf8).bytes() {
                    out.push_str(&format!("\\x{byte:02x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Split a command line into tokens, reading double-quoted tokens with the
/// same escapes [`quote_arg`] produces.
///
/// Unquoted tokens end at whitespace and are taken literally.
pub fn split_line(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(first) = chars.next() else {
            return Ok(tokens);
        };

        if first != '"' {
            let mut token = String::from(first);
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                token.push(c);
            }
            tokens.push(token);
            continue;
        }

        let mut bytes = Vec::new();
        loop {
            let c = chars
                .next()
                .ok_or_else(|| bad_line(line, "unterminated quoted argument"))?;
            match c {
                '"' => break,
                '\\' => match chars.next() {
                    Some('\\') => bytes.push(b'\\'),
                    Some('"') => bytes.push(b'"'),
                    Some('n') => bytes.push(b'\n'),
                    Some('r') => bytes.push(b'\r'),
                    Some('t') => bytes.push(b'\t'),
                    Some('x') => {
                        let hex: String = chars.by_ref().take(2).collect();
                        if hex.len() != 2 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                            return Err(bad_line(line, "invalid \\x escape"));
                        }
                        let byte = u8::from_str_radix(&hex, 16)
                            .map_err(|_| bad_line(line, "invalid \\x escape"))?;
                        bytes.push(byte);
                    }
                    _ => return Err(bad_line(line, "invalid backslash escape")),
                },
                c => {
                    let mut utf8 = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                }
            }
        }
        if chars.peek().is_some_and(|c| !c.is_whitespace()) {
            return Err(bad_line(line, "quoted argument must be followed by whitespace"));
        }
        let token =
            String::from_utf8(bytes).map_err(|_| bad_line(line, "escapes do not form UTF-8"))?;
        tokens.push(token);
    }
}

fn bad_line(line: &str, reason: &str) -> SessionError {
    SessionError::InvalidArgument(format!("{reason}: {line}"))
}

fn expect_args(name: &str, args: &[&str], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(SessionError::InvalidArgument(format!(
            "{name} takes {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn required(name: &str, args: &[&str], index: usize, what: &str) -> Result<String> {
    match args.get(index) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(SessionError::InvalidArgument(format!(
            "{name} requires a {what}"
        ))),
    }
}

fn optional(name: &str, args: &[&str], what: &str) -> Result<Option<String>> {
    match args.first() {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Err(SessionError::InvalidArgument(format!(
            "{name}: empty {what}"
        ))),
        Some(value) => Ok(Some(value.to_string())),
    }
}
