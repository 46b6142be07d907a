//! Ordered command batches run over one session.

use std::io::{Read, Write};

use varnishctl_transport::Endpoint;

use crate::command::{split_line, Command};
use crate::connector::connect_with_config;
use crate::error::{Result, SessionError};
use crate::response::CommandOutput;
use crate::session::{Session, SessionConfig};

/// One `(name, args...)` entry before it is resolved to a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub name: String,
    pub args: Vec<String>,
}

impl BatchItem {
    pub fn new<S: Into<String>>(name: impl Into<String>, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Tokenize a command line such as `vcl.use boot`.
    ///
    /// Arguments holding whitespace can be double-quoted:
    /// `vcl.inline boot "vcl 4.0;\nbackend b { .host = \"x\"; }"`.
    pub fn from_line(line: &str) -> Result<Self> {
        let mut tokens = split_line(line)?.into_iter();
        let name = tokens
            .next()
            .ok_or_else(|| SessionError::InvalidArgument("empty command line".to_string()))?;
        Ok(Self::new(name, tokens))
    }
}

impl From<&str> for BatchItem {
    fn from(name: &str) -> Self {
        Self::new(name, Vec::<String>::new())
    }
}

impl<S: Into<String>> From<(&str, Vec<S>)> for BatchItem {
    fn from((name, args): (&str, Vec<S>)) -> Self {
        Self::new(name, args)
    }
}

/// An ordered list of resolved commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every item up front. The first unknown name or bad argument
    /// count fails the whole batch before any connection is made.
    pub fn from_items<I, T>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<BatchItem>,
    {
        let mut batch = Self::new();
        for item in items {
            let item = item.into();
            batch.commands.push(Command::parse(&item.name, item.args.as_slice())?);
        }
        Ok(batch)
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Resolve and append one command.
    pub fn command<S: AsRef<str>>(&mut self, name: &str, args: &[S]) -> Result<&mut Self> {
        self.commands.push(Command::parse(name, args)?);
        Ok(self)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// A batch that stopped early.
///
/// `completed` holds the outputs of the commands that ran before the failure.
/// `failed_index` is `None` when the session could not be opened at all.
#[derive(Debug, thiserror::Error)]
#[error("batch failed after {} command(s): {source}", .completed.len())]
pub struct BatchError {
    pub completed: Vec<CommandOutput>,
    pub failed_index: Option<usize>,
    #[source]
    pub source: SessionError,
}

impl BatchError {
    fn connect(source: SessionError) -> Self {
        Self {
            completed: Vec::new(),
            failed_index: None,
            source,
        }
    }
}

/// Open one session, run the batch in order, and close the session.
///
/// Execution stops at the first error. The session is closed on every path.
pub fn run_batch(
    endpoint: &Endpoint,
    batch: &Batch,
    config: &SessionConfig,
) -> std::result::Result<Vec<CommandOutput>, BatchError> {
    let mut session = connect_with_config(endpoint, config).map_err(BatchError::connect)?;
    let result = run_batch_on(&mut session, batch);
    session.close();
    result
}

/// Run a batch over an already-open session, leaving it open.
pub fn run_batch_on<R: Read, W: Write>(
    session: &mut Session<R, W>,
    batch: &Batch,
) -> std::result::Result<Vec<CommandOutput>, BatchError> {
    let mut completed = Vec::with_capacity(batch.len());
    for (index, command) in batch.commands().iter().enumerate() {
        match session.execute(command) {
            Ok(output) => completed.push(output),
            Err(source) => {
                return Err(BatchError {
                    completed,
                    failed_index: Some(index),
                    source,
                })
            }
        }
    }
    Ok(completed)
}
