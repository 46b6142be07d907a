use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use varnishctl_frame::status_name;
use varnishctl_session::{CommandOutput, ServerOutcome};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ErrorOutput {
    message: String,
    failed_index: Option<usize>,
    status: Option<u16>,
}

#[derive(Serialize)]
struct ServerOutput<'a> {
    server: String,
    ok: bool,
    outputs: &'a [CommandOutput],
    error: Option<ErrorOutput>,
}

impl<'a> ServerOutput<'a> {
    fn from_outcome(outcome: &'a ServerOutcome) -> Self {
        match &outcome.result {
            Ok(outputs) => Self {
                server: outcome.endpoint.to_string(),
                ok: true,
                outputs,
                error: None,
            },
            Err(err) => Self {
                server: outcome.endpoint.to_string(),
                ok: false,
                outputs: &err.completed,
                error: Some(ErrorOutput {
                    message: err.source.to_string(),
                    failed_index: err.failed_index,
                    status: err.source.status(),
                }),
            },
        }
    }
}

pub fn print_outcomes(outcomes: &[ServerOutcome], format: OutputFormat) {
    let rows: Vec<ServerOutput<'_>> = outcomes.iter().map(ServerOutput::from_outcome).collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SERVER", "#", "KIND", "OUTPUT"]);
            for row in &rows {
                for (index, output) in row.outputs.iter().enumerate() {
                    table.add_row(vec![
                        row.server.clone(),
                        (index + 1).to_string(),
                        kind(output).to_string(),
                        output.to_text(),
                    ]);
                }
                if let Some(error) = &row.error {
                    table.add_row(vec![
                        row.server.clone(),
                        error
                            .failed_index
                            .map(|i| (i + 1).to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        "ERROR".to_string(),
                        error.message.clone(),
                    ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                let state = if row.ok { "ok" } else { "FAILED" };
                println!("{} [{state}]", row.server);
                for output in row.outputs {
                    for line in output.to_text().lines() {
                        println!("  {line}");
                    }
                }
                if let Some(error) = &row.error {
                    let status = error
                        .status
                        .map(|s| format!(" ({})", status_name(s)))
                        .unwrap_or_default();
                    println!("  error{status}: {}", error.message);
                }
            }
        }
        OutputFormat::Raw => {
            for row in &rows {
                for output in row.outputs {
                    match output {
                        CommandOutput::Response(response) => print_raw_bytes(&response.content),
                        other => print_raw(&other.to_text()),
                    }
                }
            }
        }
    }
}

#[derive(Serialize)]
struct TextOutput<'a> {
    server: &'a str,
    text: &'a str,
}

/// Print a single text answer from one server.
pub fn print_text(server: &str, text: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&TextOutput { server, text }),
        OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => print_raw(text),
    }
}

#[derive(Serialize)]
struct RunSummary {
    servers: usize,
    failed: usize,
}

/// Summary of a concurrent run, whose outputs are not collected.
pub fn print_summary(servers: usize, failed: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&RunSummary { servers, failed }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("servers={servers} succeeded={} failed={failed}", servers - failed)
        }
        OutputFormat::Raw => println!("{failed}"),
    }
}

pub fn print_raw(text: &str) {
    print_raw_bytes(text.as_bytes());
}

/// Write server content unchanged, ending it with a newline if it lacks one.
fn print_raw_bytes(content: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(content);
    if !content.ends_with(b"\n") {
        let _ = out.write_all(b"\n");
    }
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn kind(output: &CommandOutput) -> &'static str {
    match output {
        CommandOutput::Response(_) => "response",
        CommandOutput::Text(_) => "text",
        CommandOutput::Ping(_) => "ping",
        CommandOutput::Stats(_) => "stats",
        CommandOutput::VclList(_) => "vcl_list",
    }
}
