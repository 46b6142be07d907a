//! Response status codes.
//!
//! Codes below 200 are client-side problems with the command, 200 is success,
//! codes from 300 up are server-side failures.

/// Malformed command line.
pub const SYNTAX: u16 = 100;

/// Unknown command.
pub const UNKNOWN: u16 = 101;

/// Command recognised but not implemented.
pub const UNIMPL: u16 = 102;

/// Too few arguments.
pub const TOO_FEW: u16 = 104;

/// Too many arguments.
pub const TOO_MANY: u16 = 105;

/// Bad parameter value.
pub const PARAM: u16 = 106;

/// Authentication required; the content carries the challenge.
pub const AUTH: u16 = 107;

/// Success.
pub const OK: u16 = 200;

/// Command could not be carried out.
pub const CANT: u16 = 300;

/// Communication failure on the server side.
pub const COMMS: u16 = 400;

/// Server is closing the connection.
pub const CLOSE: u16 = 500;

/// Returns a human-readable name for a status code.
pub fn status_name(status: u16) -> &'static str {
    match status {
        SYNTAX => "SYNTAX",
        UNKNOWN => "UNKNOWN",
        UNIMPL => "UNIMPL",
        TOO_FEW => "TOO_FEW",
        TOO_MANY => "TOO_MANY",
        PARAM => "PARAM",
        AUTH => "AUTH",
        OK => "OK",
        CANT => "CANT",
        COMMS => "COMMS",
        CLOSE => "CLOSE",
        _ => "UNRECOGNISED",
    }
}

/// Returns true for the single success code.
pub fn is_ok(status: u16) -> bool {
    status == OK
}
