use std::borrow::Cow;
use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Serialize, Serializer};
use varnishctl_frame::Frame;

use crate::error::{Result, SessionError};

/// A successful raw response.
///
/// `content` holds exactly the `length` bytes the server sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub status: u16,
    pub length: usize,
    #[serde(serialize_with = "serialize_text")]
    pub content: Bytes,
}

impl Response {
    /// Content as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

impl From<Frame> for Response {
    fn from(frame: Frame) -> Self {
        Self {
            status: frame.status,
            length: frame.length,
            content: frame.content,
        }
    }
}

fn serialize_text<S>(content: &Bytes, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&String::from_utf8_lossy(content))
}

/// Result of one executed command, raw or projected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CommandOutput {
    Response(Response),
    Text(String),
    Ping((f64, f64)),
    Stats(BTreeMap<String, u64>),
    VclList(BTreeMap<String, Vec<String>>),
}

impl CommandOutput {
    /// Plain-text rendering, used for raw output.
    pub fn to_text(&self) -> String {
        match self {
            CommandOutput::Response(response) => response.text().into_owned(),
            CommandOutput::Text(text) => text.clone(),
            CommandOutput::Ping((a, b)) => format!("{a} {b}"),
            CommandOutput::Stats(stats) => stats
                .iter()
                .map(|(name, count)| format!("{count} {name}"))
                .collect::<Vec<_>>()
                .join("\n"),
            CommandOutput::VclList(vcls) => vcls
                .iter()
                .map(|(name, fields)| {
                    let mut tokens = fields.clone();
                    tokens.push(name.clone());
                    tokens.join(" ")
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Parse `stats` output.
///
/// Each non-blank line is `<count> <field tokens...>`; the key is the field
/// tokens lower-cased and joined with `_`.
pub fn parse_stats(content: &str) -> Result<BTreeMap<String, u64>> {
    let mut stats = BTreeMap::new();
    for line in content.lines() {
        let mut tokens = line.split_whitespace();
        let Some(count) = tokens.next() else {
            continue;
        };
        let count: u64 = count
            .parse()
            .map_err(|_| malformed("stats", format!("invalid counter in line '{line}'")))?;
        let name = tokens.collect::<Vec<_>>().join("_").to_lowercase();
        if name.is_empty() {
            return Err(malformed("stats", format!("missing field name in line '{line}'")));
        }
        stats.insert(name, count);
    }
    Ok(stats)
}

/// Parse `vcl.list` output into name -> preceding tokens.
pub fn parse_vcl_list(content: &str) -> BTreeMap<String, Vec<String>> {
    content
        .lines()
        .filter_map(|line| {
            let mut tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            let name = tokens.pop()?;
            Some((name, tokens))
        })
        .collect()
}

/// Parse a `ping` reply: the second and third tokens as numbers.
pub fn parse_ping(content: &str) -> Result<(f64, f64)> {
    let tokens: Vec<&str> = content.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(malformed("ping", format!("expected 'PONG <a> <b>', got '{content}'")));
    }
    let number = |raw: &str| {
        raw.parse::<f64>()
            .map_err(|_| malformed("ping", format!("invalid number '{raw}'")))
    };
    Ok((number(tokens[1])?, number(tokens[2])?))
}

fn malformed(command: &str, reason: String) -> SessionError {
    SessionError::MalformedResponse {
        command: command.to_string(),
        reason,
    }
}
