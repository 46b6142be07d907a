#![cfg(feature = "cli")]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;

use varnishctl::session::{challenge_response, Secret};

const CHALLENGE: &str = "abcdefghijklmnopqrstuvwxyzabcdef";

/// Starts a scripted admin port and returns its address and request log.
fn mock_admin(secret: Option<&str>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr").to_string();
    let log = Arc::new(Mutex::new(Vec::new()));
    let secret = secret.map(Secret::from);

    let accept_log = Arc::clone(&log);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let log = Arc::clone(&accept_log);
            let secret = secret.clone();
            thread::spawn(move || serve(stream, secret, log));
        }
    });

    (addr, log)
}

fn respond(out: &mut TcpStream, status: u16, content: &str) -> std::io::Result<()> {
    write!(out, "{status:<3} {:<8}\n{content}\n", content.len())?;
    out.flush()
}

fn serve(stream: TcpStream, secret: Option<Secret>, log: Arc<Mutex<Vec<String>>>) {
    let Ok(mut out) = stream.try_clone() else {
        return;
    };
    let mut lines = BufReader::new(stream);
    let banner = match secret {
        Some(_) => respond(&mut out, 107, &format!("{CHALLENGE}\n\nAuthentication required.")),
        None => respond(&mut out, 200, "Varnish Cache CLI 1.0"),
    };
    if banner.is_err() {
        return;
    }

    loop {
        let mut line = String::new();
        match lines.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end().to_string();
        log.lock().unwrap().push(line.clone());

        let (status, content) = match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["auth", answer] => {
                let expected = secret
                    .as_ref()
                    .map(|s| challenge_response(CHALLENGE.as_bytes(), s));
                if expected.as_deref() == Some(*answer) {
                    (200, "welcome".to_string())
                } else {
                    (107, CHALLENGE.to_string())
                }
            }
            ["ping", ..] => (200, "PONG 1700000000 1.0".to_string()),
            ["stats"] => (200, "5 client_req\n2 cache hit".to_string()),
            ["vcl.list"] => (200, "active 0 boot".to_string()),
            ["help", command] => (200, format!("{command}: usage")),
            ["vcl.use", _] => (200, String::new()),
            ["vcl.inline", ..] => (200, "VCL compiled.".to_string()),
            ["param.show", ..] => (106, "Unknown parameter".to_string()),
            _ => (101, "Unknown request.".to_string()),
        };
        if respond(&mut out, status, &content).is_err() {
            return;
        }
    }
}

fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

fn varnishctl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_varnishctl"))
        .env_remove("VARNISHCTL_SERVERS")
        .env_remove("VARNISHCTL_SECRET_FILE")
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("varnishctl should run")
}

fn secret_file(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "varnishctl-cli-secret-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::write(&path, contents).expect("secret file should be writable");
    path
}

#[test]
fn stats_json_from_authenticated_server() {
    let (addr, log) = mock_admin(Some("s3cr3t\n"));
    let secret = secret_file("s3cr3t\n");

    let output = varnishctl(&[
        "--format",
        "json",
        "-T",
        &addr,
        "-S",
        secret.to_str().unwrap(),
        "stats",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value[0]["ok"], true);
    assert_eq!(value[0]["outputs"][0]["kind"], "stats");
    assert_eq!(value[0]["outputs"][0]["data"]["cache_hit"], 2);
    assert!(log.lock().unwrap()[0].starts_with("auth "));

    let _ = std::fs::remove_file(&secret);
}

#[test]
fn exec_failure_returns_exit_code_one() {
    let (addr, log) = mock_admin(None);

    let output = varnishctl(&[
        "--format",
        "json",
        "-T",
        &addr,
        "exec",
        "vcl.use boot",
        "param.show bogus",
        "vcl.use other",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("command #2"), "stderr: {stderr}");
    assert!(stderr.contains("106 Unknown parameter"), "stderr: {stderr}");
    assert_eq!(
        *log.lock().unwrap(),
        vec!["vcl.use boot".to_string(), "param.show bogus".to_string()]
    );
}

#[test]
fn exec_sends_quoted_argument_as_one_token() {
    let (addr, log) = mock_admin(None);
    let line = r#"vcl.inline boot "vcl 4.0; backend b { .host = \"x\"; }""#;

    let output = varnishctl(&["--format", "json", "-T", &addr, "exec", line]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value[0]["outputs"][0]["kind"], "response");
    assert_eq!(value[0]["outputs"][0]["data"]["content"], "VCL compiled.");
    assert_eq!(*log.lock().unwrap(), vec![line.to_string()]);
}

#[test]
fn exec_unterminated_quote_is_usage_error() {
    let output = varnishctl(&["-T", "127.0.0.1:6082", "exec", r#"vcl.inline boot "vcl 4.0;"#]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn exec_unknown_command_is_usage_error() {
    let output = varnishctl(&["-T", "127.0.0.1:6082", "exec", "frobnicate"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn out_of_range_endpoint_timeout_is_usage_error() {
    let output = varnishctl(&["-T", "127.0.0.1:6082:1e30", "ping"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("timeout out of range"));
}

#[test]
fn missing_servers_is_usage_error() {
    let output = varnishctl(&["stats"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no servers configured"));
}

#[test]
fn refused_connection_returns_transport_code() {
    let output = varnishctl(&["-T", &dead_addr(), "--timeout", "1s", "ping"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn concurrent_exec_reports_failure_count() {
    let (live, _) = mock_admin(None);
    let dead = dead_addr();
    let servers = format!("{live},{dead}");

    let output = varnishctl(&[
        "--format",
        "json",
        "-T",
        &servers,
        "exec",
        "--concurrent",
        "ping",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["servers"], 2);
    assert_eq!(value["failed"], 1);
}

#[test]
fn help_raw_prints_server_text() {
    let (addr, _) = mock_admin(None);
    let output = varnishctl(&["--format", "raw", "-T", &addr, "help", "vcl.load"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "vcl.load: usage\n");
}

#[test]
fn version_prints_package_version() {
    let output = varnishctl(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("varnishctl {}", env!("CARGO_PKG_VERSION"))
    );
}
