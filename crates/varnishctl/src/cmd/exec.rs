use tracing::info;
use varnishctl_session::{Batch, BatchItem, Coordinator};

use crate::cmd::{ConnectArgs, ExecArgs};
use crate::exit::{batch_error, session_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_outcomes, print_summary, OutputFormat};

pub fn run(args: ExecArgs, connection: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let items = args
        .commands
        .iter()
        .map(|line| BatchItem::from_line(line))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| session_error("invalid command", e))?;
    let batch = Batch::from_items(items).map_err(|e| session_error("invalid command", e))?;
    let coordinator = connection.coordinator()?;

    if args.concurrent {
        let servers = coordinator.servers().len();
        info!(servers, commands = batch.len(), "running batch concurrently");
        let failed = coordinator.run_concurrent(&batch).join();
        print_summary(servers, failed, format);
        return Ok(if failed == 0 { SUCCESS } else { FAILURE });
    }

    run_sequential(&coordinator, &batch, format)
}

/// Run a single command, given as `name args...`, on every server.
pub fn run_one(tokens: &[&str], connection: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let (name, args) = tokens
        .split_first()
        .ok_or_else(|| CliError::new(USAGE, "missing command"))?;
    let mut batch = Batch::new();
    batch
        .command(name, args)
        .map_err(|e| session_error("invalid command", e))?;

    let coordinator = connection.coordinator()?;
    run_sequential(&coordinator, &batch, format)
}

fn run_sequential(coordinator: &Coordinator, batch: &Batch, format: OutputFormat) -> CliResult<i32> {
    let outcomes = coordinator.run(batch);
    print_outcomes(&outcomes, format);

    // Report the first failing server; the rest are already in the output.
    match outcomes.into_iter().find_map(|o| {
        let server = o.endpoint.to_string();
        o.result.err().map(|err| (server, err))
    }) {
        Some((server, err)) => Err(batch_error(&server, err)),
        None => Ok(SUCCESS),
    }
}
