#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use varnishctl_session::{challenge_response, Secret};
use varnishctl_transport::Endpoint;

pub const CHALLENGE: &str = "abcdefghijklmnopqrstuvwxyzabcdef";

/// A scripted admin port on 127.0.0.1 that answers a small command set.
pub struct MockAdmin {
    port: u16,
    commands: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl MockAdmin {
    pub fn start(secret: Option<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock admin port");
        let port = listener.local_addr().expect("local addr").port();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let secret = secret.map(Secret::from);

        let accept_commands = Arc::clone(&commands);
        let accept_connections = Arc::clone(&connections);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accept_connections.fetch_add(1, Ordering::SeqCst);
                let commands = Arc::clone(&accept_commands);
                let secret = secret.clone();
                thread::spawn(move || serve(stream, secret, commands));
            }
        });

        Self {
            port,
            commands,
            connections,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.port).with_timeout(Duration::from_secs(2))
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// An endpoint nobody listens on.
pub fn dead_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Endpoint::new("127.0.0.1", port).with_timeout(Duration::from_millis(500))
}

fn respond(stream: &mut TcpStream, status: u16, content: &str) -> std::io::Result<()> {
    write!(stream, "{status:<3} {:<8}\n{content}\n", content.len())?;
    stream.flush()
}

fn serve(stream: TcpStream, secret: Option<Secret>, commands: Arc<Mutex<Vec<String>>>) {
    let mut out = match stream.try_clone() {
        Ok(out) => out,
        Err(_) => return,
    };
    let mut lines = BufReader::new(stream);

    let greeting = match &secret {
        Some(_) => respond(
            &mut out,
            107,
            &format!("{CHALLENGE}\n\nAuthentication required.\n"),
        ),
        None => respond(&mut out, 200, "Varnish Cache CLI 1.0"),
    };
    if greeting.is_err() {
        return;
    }
    let mut authenticated = secret.is_none();

    loop {
        let mut line = String::new();
        match lines.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end_matches('\n').to_string();
        commands.lock().unwrap().push(line.clone());

        let (status, content) = if let Some(answer) = line.strip_prefix("auth ") {
            let expected = secret
                .as_ref()
                .map(|s| challenge_response(CHALLENGE.as_bytes(), s));
            if expected.as_deref() == Some(answer) {
                authenticated = true;
                (200, "welcome".to_string())
            } else {
                (107, format!("{CHALLENGE}\n\nAuthentication required.\n"))
            }
        } else if !authenticated {
            (107, "Authentication required.".to_string())
        } else {
            answer(&line)
        };

        if respond(&mut out, status, &content).is_err() {
            return;
        }
    }
}

fn answer(line: &str) -> (u16, String) {
    let mut tokens = line.split_whitespace();
    let name = tokens.next().unwrap_or_default();
    let args: Vec<&str> = tokens.collect();
    match (name, args.as_slice()) {
        ("ping", _) => (200, "PONG 1700000000 1.0".to_string()),
        ("stats", []) => (200, "      5 client_req\n      2 cache hit".to_string()),
        ("vcl.list", []) => (200, "active 0 boot\navailable 0 old".to_string()),
        ("help", []) => (200, "Available commands:\nping [timestamp]\nstats".to_string()),
        ("help", [command]) => (200, format!("{command}: usage")),
        ("vcl.use", [_]) => (200, String::new()),
        ("param.show", ["default_ttl"]) => (200, "default_ttl 120 [seconds]".to_string()),
        ("param.show", _) => (106, "Unknown parameter".to_string()),
        _ => (101, "Unknown request.".to_string()),
    }
}
