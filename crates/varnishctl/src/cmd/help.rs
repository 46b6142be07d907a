use crate::cmd::{ConnectArgs, HelpArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_text, OutputFormat};

pub fn run(args: HelpArgs, connection: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let coordinator = connection.coordinator()?;
    let server = coordinator
        .servers()
        .first()
        .map(ToString::to_string)
        .unwrap_or_default();

    let text = coordinator
        .help(args.command.as_deref())
        .map_err(|e| session_error(&format!("help from {server}"), e))?;
    print_text(&server, &text, format);
    Ok(SUCCESS)
}
