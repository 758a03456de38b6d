pub mod hash;
pub mod key;
pub mod pubsub;
pub mod server_cmd;
pub mod string;

use crate::error::RedlogError;
use crate::resp::RespValue;
use crate::store::Store;
use tracing::warn;

/// Every command the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ping,
    Get,
    Set,
    Del,
    HSet,
    HGet,
    HGetAll,
    Command,
    Subscribe,
    Unsubscribe,
    Publish,
}

impl CommandKind {
    /// Case-insensitive lookup of a command name.
    pub fn lookup(name: &str) -> Option<Self> {
        let kind = match name.to_uppercase().as_str() {
            "PING" => CommandKind::Ping,
            "GET" => CommandKind::Get,
            "SET" => CommandKind::Set,
            "DEL" => CommandKind::Del,
            "HSET" => CommandKind::HSet,
            "HGET" => CommandKind::HGet,
            "HGETALL" => CommandKind::HGetAll,
            "COMMAND" => CommandKind::Command,
            "SUBSCRIBE" => CommandKind::Subscribe,
            "UNSUBSCRIBE" => CommandKind::Unsubscribe,
            "PUBLISH" => CommandKind::Publish,
            _ => return None,
        };
        Some(kind)
    }

    /// Lowercase name, as used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Ping => "ping",
            CommandKind::Get => "get",
            CommandKind::Set => "set",
            CommandKind::Del => "del",
            CommandKind::HSet => "hset",
            CommandKind::HGet => "hget",
            CommandKind::HGetAll => "hgetall",
            CommandKind::Command => "command",
            CommandKind::Subscribe => "subscribe",
            CommandKind::Unsubscribe => "unsubscribe",
            CommandKind::Publish => "publish",
        }
    }

    /// Commands whose successful results are recorded in the append-only log.
    pub fn is_write(&self) -> bool {
        matches!(self, CommandKind::Set | CommandKind::HSet | CommandKind::Del)
    }
}

/// Run a keyspace command against the store.
///
/// `args` excludes the command name. Pub/sub commands need a connection and
/// the broker, so they are answered with an error here.
pub async fn execute(kind: CommandKind, args: &[RespValue], store: &Store) -> RespValue {
    match kind {
        CommandKind::Ping => server_cmd::cmd_ping(args),
        CommandKind::Command => server_cmd::cmd_command(args),
        CommandKind::Get => string::cmd_get(args, store).await,
        CommandKind::Set => string::cmd_set(args, store).await,
        CommandKind::Del => key::cmd_del(args, store).await,
        CommandKind::HSet => hash::cmd_hset(args, store).await,
        CommandKind::HGet => hash::cmd_hget(args, store).await,
        CommandKind::HGetAll => hash::cmd_hgetall(args, store).await,
        CommandKind::Subscribe | CommandKind::Unsubscribe | CommandKind::Publish => {
            RespValue::error(format!(
                "ERR '{}' is not a keyspace command",
                kind.name()
            ))
        }
    }
}

/// Re-apply one command array read back from the append-only log.
///
/// Only write commands are applied; anything else is skipped with a warning.
/// Nothing is logged again.
pub async fn apply_replayed(store: &Store, command: Vec<RespValue>) {
    let Some(name) = command.first().and_then(arg_to_string) else {
        warn!("Skipping log record without a command name");
        return;
    };

    match CommandKind::lookup(&name) {
        Some(kind) if kind.is_write() => {
            let result = execute(kind, &command[1..], store).await;
            if let RespValue::Error(e) = result {
                warn!("Replayed {name} failed: {e}");
            }
        }
        _ => warn!("Skipping non-write command in log: {name}"),
    }
}

/// Extract string bytes from a RespValue argument.
pub fn arg_to_bytes(arg: &RespValue) -> Option<&[u8]> {
    arg.as_str()
}

/// Extract a UTF-8 string from a RespValue argument.
pub fn arg_to_string(arg: &RespValue) -> Option<String> {
    arg.to_string_lossy()
}

/// Return a wrong number of arguments error.
pub fn wrong_arg_count(cmd: &str) -> RespValue {
    RespValue::error(RedlogError::WrongArgCount(cmd.to_string()).to_string())
}
