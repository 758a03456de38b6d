use crate::command::wrong_arg_count;
use crate::resp::RespValue;

pub fn cmd_ping(args: &[RespValue]) -> RespValue {
    match args {
        [] => RespValue::simple_string("PONG"),
        [msg] => match msg.as_str() {
            Some(bytes) => RespValue::bulk_string(bytes.to_vec()),
            None => RespValue::simple_string("PONG"),
        },
        _ => wrong_arg_count("ping"),
    }
}

/// Handshake stub: clients ask for the command table on connect, we have
/// nothing to describe.
pub fn cmd_command(_args: &[RespValue]) -> RespValue {
    RespValue::array(vec![])
}
