use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use varnishctl_frame::{Frame, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD, OK};
use varnishctl_transport::AdminStream;

use crate::command::{Command, PurgeCondition};
use crate::error::{Result, SessionError};
use crate::handshake::{handshake_client, preview, Secret};
use crate::observer::{SessionObserver, TracingObserver};
use crate::response::{parse_ping, parse_stats, parse_vcl_list, CommandOutput, Response};

/// Lifecycle state of a session after the connection-start exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Banner was 200, or the challenge was answered.
    Authenticated,
    /// Banner was not usable; commands will be answered with server errors.
    Degraded { status: u16 },
    /// The stream has been released.
    Closed,
}

/// Settings shared by every session a caller opens.
#[derive(Clone)]
pub struct SessionConfig {
    /// Shared secret for the 107 challenge, if the server requires one.
    pub secret: Option<Secret>,
    /// Largest response content accepted from the server.
    pub max_payload_size: usize,
    /// Receiver of protocol reports.
    pub observer: Arc<dyn SessionObserver>,
}

impl SessionConfig {
    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            observer: Arc::new(TracingObserver),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &self.secret)
            .field("max_payload_size", &self.max_payload_size)
            .finish_non_exhaustive()
    }
}

/// Write one line and read the matching frame, reporting both.
///
/// `shown` is what the observer sees in place of `line`.
pub(crate) fn exchange<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    line: &str,
    shown: &str,
    server: &str,
    observer: &dyn SessionObserver,
) -> Result<Frame> {
    observer.command_sent(server, shown);
    writer.write_line(line)?;
    let frame = reader.read_frame()?;
    observer.response_received(server, frame.status, frame.length, &preview(&frame));
    Ok(frame)
}

/// One connection to an admin port.
///
/// Commands are strictly request/response: one line out, one frame back.
/// A session is used from one thread at a time; share endpoints, not
/// sessions.
pub struct Session<R = AdminStream, W = AdminStream> {
    label: String,
    io: Option<(FrameReader<R>, FrameWriter<W>)>,
    state: SessionState,
    banner: Option<Frame>,
    observer: Arc<dyn SessionObserver>,
}

impl<R: Read, W: Write> Session<R, W> {
    /// Run the connection-start exchange over an already-open stream pair.
    pub fn from_parts(
        label: impl Into<String>,
        mut reader: FrameReader<R>,
        mut writer: FrameWriter<W>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let label = label.into();
        let handshake = handshake_client(
            &mut reader,
            &mut writer,
            config.secret.as_ref(),
            &label,
            config.observer.as_ref(),
        )?;

        Ok(Self {
            label,
            io: Some((reader, writer)),
            state: handshake.state,
            banner: Some(handshake.banner),
            observer: Arc::clone(&config.observer),
        })
    }

    /// Send one raw command line and require a 200 answer.
    pub fn fetch(&mut self, line: &str) -> Result<Response> {
        let frame = self.send(line)?;
        if frame.status != OK {
            return Err(SessionError::Protocol {
                status: frame.status,
                content: frame.content,
            });
        }
        Ok(Response::from(frame))
    }

    /// Run one typed command and project its result.
    pub fn execute(&mut self, command: &Command) -> Result<CommandOutput> {
        let response = self.fetch_command(command)?;
        let output = match command {
            Command::Ping { .. } => CommandOutput::Ping(parse_ping(&response.text())?),
            Command::Stats => CommandOutput::Stats(parse_stats(&response.text())?),
            Command::VclList => CommandOutput::VclList(parse_vcl_list(&response.text())),
            Command::Help { .. }
            | Command::BanUrl { .. }
            | Command::PurgeUrl { .. }
            | Command::PurgeHash { .. }
            | Command::PurgeList => CommandOutput::Text(response.text().into_owned()),
            _ => CommandOutput::Response(response),
        };
        Ok(output)
    }

    pub fn start(&mut self) -> Result<Response> {
        self.fetch_command(&Command::Start)
    }

    pub fn stop(&mut self) -> Result<Response> {
        self.fetch_command(&Command::Stop)
    }

    /// Ping the server; returns the two numbers of the `PONG` reply.
    pub fn ping(&mut self, timestamp: Option<&str>) -> Result<(f64, f64)> {
        let command = Command::parse("ping", timestamp.as_slice())?;
        parse_ping(&self.fetch_command(&command)?.text())
    }

    pub fn stats(&mut self) -> Result<BTreeMap<String, u64>> {
        parse_stats(&self.fetch_command(&Command::Stats)?.text())
    }

    pub fn help(&mut self, command: Option<&str>) -> Result<String> {
        let command = Command::parse("help", command.as_slice())?;
        Ok(self.fetch_command(&command)?.text().into_owned())
    }

    pub fn vcl_load(&mut self, name: &str, file: &str) -> Result<Response> {
        self.run("vcl.load", &[name, file])
    }

    /// Compile VCL source sent inline. Multi-line source is quoted onto one
    /// request line.
    pub fn vcl_inline(&mut self, name: &str, source: &str) -> Result<Response> {
        self.run("vcl.inline", &[name, source])
    }

    pub fn vcl_show(&mut self, name: &str) -> Result<Response> {
        self.run("vcl.show", &[name])
    }

    pub fn vcl_use(&mut self, name: &str) -> Result<Response> {
        self.run("vcl.use", &[name])
    }

    pub fn vcl_discard(&mut self, name: &str) -> Result<Response> {
        self.run("vcl.discard", &[name])
    }

    /// Map of configuration name to the tokens listed before it.
    pub fn vcl_list(&mut self) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(parse_vcl_list(&self.fetch_command(&Command::VclList)?.text()))
    }

    pub fn param_show(&mut self, name: &str, long: bool) -> Result<Response> {
        if long {
            self.run("param.show", &["-l", name])
        } else {
            self.run("param.show", &[name])
        }
    }

    pub fn param_set(&mut self, name: &str, value: &str) -> Result<Response> {
        self.run("param.set", &[name, value])
    }

    pub fn ban_url(&mut self, regex: &str) -> Result<String> {
        Ok(self.run("ban.url", &[regex])?.text().into_owned())
    }

    pub fn purge_url(&mut self, regex: &str) -> Result<String> {
        Ok(self.run("purge.url", &[regex])?.text().into_owned())
    }

    pub fn purge_hash(&mut self, regex: &str) -> Result<String> {
        Ok(self.run("purge.hash", &[regex])?.text().into_owned())
    }

    pub fn purge_list(&mut self) -> Result<String> {
        Ok(self.fetch_command(&Command::PurgeList)?.text().into_owned())
    }

    /// Send one `purge` line per condition, stopping at the first failure.
    /// Returns the response to the last condition.
    pub fn purge(&mut self, conditions: &[PurgeCondition]) -> Result<Response> {
        let command = Command::purge(conditions.to_vec())?;
        self.fetch_command(&command)
    }

    /// Release the stream. Safe to call more than once.
    pub fn close(&mut self) {
        if self.io.take().is_some() {
            tracing::debug!(server = %self.label, "session closed");
        }
        self.state = SessionState::Closed;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last frame of the connection-start exchange.
    pub fn banner(&self) -> Option<&Frame> {
        self.banner.as_ref()
    }

    /// The server label used in reports.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn run(&mut self, name: &str, args: &[&str]) -> Result<Response> {
        let command = Command::parse(name, args)?;
        self.fetch_command(&command)
    }

    fn fetch_command(&mut self, command: &Command) -> Result<Response> {
        let mut last = None;
        for line in command.lines() {
            last = Some(self.fetch(&line)?);
        }
        last.ok_or_else(|| SessionError::InvalidArgument(format!("{} sent no lines", command.name())))
    }

    fn send(&mut self, line: &str) -> Result<Frame> {
        let (reader, writer) = self.io.as_mut().ok_or(SessionError::Closed)?;
        self.observer.command_sent(&self.label, line);

        // A line refused before any byte went out leaves the stream intact.
        if let Err(err) = writer.write_line(line) {
            let err = SessionError::from(err);
            if err.is_connection_error() {
                self.close();
            }
            return Err(err);
        }

        match reader.read_frame() {
            Ok(frame) => {
                self.observer
                    .response_received(&self.label, frame.status, frame.length, &preview(&frame));
                Ok(frame)
            }
            Err(err) => {
                // Undecoded bytes stay buffered, so the stream is out of step.
                self.close();
                Err(err.into())
            }
        }
    }
}

impl<R, W> fmt::Debug for Session<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("label", &self.label)
            .field("state", &self.state)
            .field("open", &self.io.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use varnishctl_frame::{encode_frame, FrameConfig, FrameError};

    use super::*;
    use crate::observer::recording::RecordingObserver;
    use crate::observer::NoopObserver;

    type TestSession = Session<Cursor<Vec<u8>>, Cursor<Vec<u8>>>;

    fn quiet() -> SessionConfig {
        SessionConfig::default().with_observer(Arc::new(NoopObserver))
    }

    fn session_with(frames: &[(u16, &str)], config: &SessionConfig) -> TestSession {
        let mut buf = BytesMut::new();
        encode_frame(200, b"Varnish Cache CLI 1.0", &mut buf);
        for (status, content) in frames {
            encode_frame(*status, content.as_bytes(), &mut buf);
        }
        Session::from_parts(
            "cache:6082",
            FrameReader::new(Cursor::new(buf.to_vec())),
            FrameWriter::new(Cursor::new(Vec::new())),
            config,
        )
        .unwrap()
    }

    fn sent(session: &TestSession) -> String {
        let (_, writer) = session.io.as_ref().unwrap();
        String::from_utf8(writer.get_ref().get_ref().clone()).unwrap()
    }

    #[test]
    fn fetch_returns_ok_response() {
        let mut session = session_with(&[(200, "PONG 1 1.0")], &quiet());
        assert_eq!(session.state(), SessionState::Authenticated);

        let response = session.fetch("ping").unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "PONG 1 1.0");
        assert_eq!(sent(&session), "ping\n");
    }

    #[test]
    fn non_200_is_protocol_error_with_server_text() {
        let mut session = session_with(&[(106, "Unknown parameter \"nope\".")], &quiet());
        let err = session.param_show("nope", false).unwrap_err();
        match err {
            SessionError::Protocol { status, content } => {
                assert_eq!(status, 106);
                assert_eq!(&content[..], b"Unknown parameter \"nope\".");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The session stays usable after a protocol error.
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[test]
    fn typed_wrappers_project_results() {
        let mut session = session_with(
            &[
                (200, "PONG 123.0 0.5"),
                (200, "5 client_req\n2 cache hit"),
                (200, "active auto boot"),
                (200, "Available commands:\nping [timestamp]"),
            ],
            &quiet(),
        );

        assert_eq!(session.ping(None).unwrap(), (123.0, 0.5));
        let stats = session.stats().unwrap();
        assert_eq!(stats["client_req"], 5);
        assert_eq!(stats["cache_hit"], 2);
        let vcls = session.vcl_list().unwrap();
        assert_eq!(vcls["boot"], vec!["active".to_string(), "auto".to_string()]);
        assert!(session.help(None).unwrap().starts_with("Available commands"));

        assert_eq!(sent(&session), "ping\nstats\nvcl.list\nhelp\n");
    }

    #[test]
    fn param_show_long_and_param_set_lines() {
        let mut session = session_with(&[(200, "default_ttl 120"), (200, "")], &quiet());
        session.param_show("default_ttl", true).unwrap();
        let response = session.param_set("default_ttl", "240").unwrap();
        assert_eq!(response.length, 0);
        assert_eq!(sent(&session), "param.show -l default_ttl\nparam.set default_ttl 240\n");
    }

    #[test]
    fn purge_sends_each_condition_and_returns_last() {
        let mut session = session_with(&[(200, "first"), (200, "second")], &quiet());
        let response = session
            .purge(&[
                PurgeCondition::new("req.url", "~", "^/a"),
                PurgeCondition::new("req.http.host", "==", "example.com"),
            ])
            .unwrap();
        assert_eq!(response.text(), "second");
        assert_eq!(
            sent(&session),
            "purge req.url ~ ^/a\npurge req.http.host == example.com\n"
        );
    }

    #[test]
    fn purge_with_no_conditions_is_rejected_before_io() {
        let mut session = session_with(&[], &quiet());
        assert!(matches!(
            session.purge(&[]),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(sent(&session).is_empty());
    }

    #[test]
    fn missing_argument_fails_before_io() {
        let mut session = session_with(&[], &quiet());
        assert!(matches!(
            session.vcl_show(""),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(sent(&session).is_empty());
    }

    #[test]
    fn execute_dispatches_projection() {
        let mut session = session_with(&[(200, "5 client_req"), (200, "ok")], &quiet());

        let stats = session.execute(&Command::Stats).unwrap();
        assert!(matches!(stats, CommandOutput::Stats(ref m) if m["client_req"] == 5));

        let raw = session
            .execute(&Command::parse("vcl.use", &["boot"]).unwrap())
            .unwrap();
        assert!(matches!(raw, CommandOutput::Response(ref r) if r.text() == "ok"));
    }

    #[test]
    fn close_is_idempotent_and_blocks_commands() {
        let mut session = session_with(&[], &quiet());
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.stats(), Err(SessionError::Closed)));
    }

    #[test]
    fn connection_loss_closes_session() {
        let mut session = session_with(&[], &quiet());
        let err = session.stats().unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.stats(), Err(SessionError::Closed)));
    }

    #[test]
    fn oversized_frame_closes_session_before_next_command() {
        let mut buf = BytesMut::new();
        encode_frame(200, b"Varnish Cache CLI 1.0", &mut buf);
        encode_frame(200, &[b'x'; 64], &mut buf);
        encode_frame(200, b"", &mut buf);
        let reader = FrameReader::with_config(
            Cursor::new(buf.to_vec()),
            FrameConfig {
                max_payload_size: 32,
                ..FrameConfig::default()
            },
        );
        let mut session = Session::from_parts(
            "cache:6082",
            reader,
            FrameWriter::new(Cursor::new(Vec::new())),
            &quiet(),
        )
        .unwrap();

        let err = session.vcl_show("big").unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::PayloadTooLarge { size: 64, max: 32 })
        ));
        assert_eq!(session.state(), SessionState::Closed);

        assert!(matches!(
            session.param_set("default_ttl", "1"),
            Err(SessionError::Closed)
        ));
    }

    #[test]
    fn raw_responses_keep_non_utf8_content() {
        let mut buf = BytesMut::new();
        encode_frame(200, b"Varnish Cache CLI 1.0", &mut buf);
        encode_frame(200, b"caf\xe9", &mut buf);
        encode_frame(300, b"bad \xff", &mut buf);
        let mut session = Session::from_parts(
            "cache:6082",
            FrameReader::new(Cursor::new(buf.to_vec())),
            FrameWriter::new(Cursor::new(Vec::new())),
            &quiet(),
        )
        .unwrap();

        let response = session.vcl_show("latin1").unwrap();
        assert_eq!(response.length, 4);
        assert_eq!(&response.content[..], b"caf\xe9");

        match session.vcl_show("other").unwrap_err() {
            SessionError::Protocol { status, content } => {
                assert_eq!(status, 300);
                assert_eq!(&content[..], b"bad \xff");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejected_line_keeps_session_open() {
        let mut session = session_with(&[(200, "PONG 1 1.0")], &quiet());
        assert!(matches!(
            session.fetch("ping\nstats"),
            Err(SessionError::Frame(FrameError::InvalidLine))
        ));
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.ping(None).unwrap(), (1.0, 1.0));
    }

    #[test]
    fn degraded_session_surfaces_server_error_on_first_command() {
        let mut buf = BytesMut::new();
        encode_frame(107, b"abcdefghijklmnopqrstuvwxyzabcdef\n\nAuthentication required.", &mut buf);
        encode_frame(107, b"Authentication required.", &mut buf);

        let mut session = Session::from_parts(
            "cache:6082",
            FrameReader::new(Cursor::new(buf.to_vec())),
            FrameWriter::new(Cursor::new(Vec::new())),
            &quiet(),
        )
        .unwrap();
        assert_eq!(session.state(), SessionState::Degraded { status: 107 });

        let err = session.stats().unwrap_err();
        assert_eq!(err.status(), Some(107));
    }

    #[test]
    fn observer_sees_commands_and_previews() {
        let observer = Arc::new(RecordingObserver::default());
        let config = SessionConfig::default().with_observer(observer.clone());
        let long = "x".repeat(100);
        let mut session = session_with(&[(200, long.as_str())], &config);

        session.fetch("vcl.show boot").unwrap();

        let events = observer.events();
        assert!(events.contains(&"sent cache:6082 vcl.show boot".to_string()));
        assert!(events.contains(&format!("recv cache:6082 200 100 {}", "x".repeat(30))));
    }

    #[test]
    fn config_debug_redacts_secret() {
        let config = SessionConfig::default().with_secret(Secret::from("hunter2"));
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
    }
}
