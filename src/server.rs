use crate::command::{self, CommandKind};
use crate::config::{SharedConfig, UnknownCommandReply};
use crate::connection::{ClientState, SharedWriter, shared_writer, write_value};
use crate::error::{RedlogError, RedlogResult};
use crate::persistence::aof::{SharedAof, aof_flush_loop};
use crate::pubsub::SharedPubSub;
use crate::resp::{RespError, RespReader, RespValue};
use crate::store::SharedStore;
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Everything a connection handler needs, cloned once per connection.
#[derive(Clone)]
pub struct ServerContext {
    pub config: SharedConfig,
    pub store: SharedStore,
    pub pubsub: SharedPubSub,
    pub aof: SharedAof,
}

/// Bind the configured address and serve until ctrl-c.
pub async fn run_server(ctx: ServerContext) -> RedlogResult<()> {
    let addr = ctx.config.read().await.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("redlog listening on {addr}");
    serve(listener, ctx).await
}

/// Accept loop over an already-bound listener.
pub async fn serve(listener: TcpListener, ctx: ServerContext) -> RedlogResult<()> {
    tokio::spawn(aof_flush_loop(ctx.aof.clone()));

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept connection: {e}");
                        continue;
                    }
                };
                debug!("New connection from {peer_addr}");

                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, ctx).await {
                        debug!("Connection error from {peer_addr}: {e}");
                    }
                    debug!("Connection closed: {peer_addr}");
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                ctx.aof.flush().await?;
                return Ok(());
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, ctx: ServerContext) -> RedlogResult<()> {
    let (read_half, write_half) = stream.into_split();
    let writer = shared_writer(write_half);
    let mut reader = RespReader::new(read_half);
    let mut client = ClientState::new();

    let result = serve_client(&mut reader, &writer, &mut client, &ctx).await;

    if client.in_subscribe_mode() {
        ctx.pubsub.write().await.unsubscribe_all(client.id);
    }
    result
}

/// Request/response loop for one client. Requests are answered strictly in
/// arrival order.
async fn serve_client<R: AsyncRead + Unpin>(
    reader: &mut RespReader<R>,
    writer: &SharedWriter,
    client: &mut ClientState,
    ctx: &ServerContext,
) -> RedlogResult<()> {
    let unknown_command = ctx.config.read().await.unknown_command;

    loop {
        let value = match reader.read_value().await {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(()),
            Err(RespError::Io(e)) => return Err(RedlogError::Io(e)),
            Err(e) => {
                let err = RedlogError::from(e);
                let _ = write_value(writer, &RespValue::error(err.to_string())).await;
                return Err(err);
            }
        };

        if let Some(reply) = process_command(value, client, writer, ctx, unknown_command).await? {
            write_value(writer, &reply).await?;
        }
    }
}

/// Run one request. `None` means the handler already wrote its own replies.
async fn process_command(
    value: RespValue,
    client: &mut ClientState,
    writer: &SharedWriter,
    ctx: &ServerContext,
    unknown_command: UnknownCommandReply,
) -> RedlogResult<Option<RespValue>> {
    let items = match value {
        RespValue::Array(Some(items)) if !items.is_empty() => items,
        _ => return Ok(Some(RespValue::error("ERR invalid command format"))),
    };

    let cmd_name = match items[0].to_string_lossy() {
        Some(name) => name.to_uppercase(),
        None => return Ok(Some(RespValue::error("ERR invalid command name"))),
    };

    let Some(kind) = CommandKind::lookup(&cmd_name) else {
        debug!("Unknown command '{cmd_name}' from client {}", client.id);
        let reply = match unknown_command {
            UnknownCommandReply::Blank => RespValue::simple_string(""),
            UnknownCommandReply::Error => {
                RespValue::error(format!("ERR unknown command '{cmd_name}'"))
            }
        };
        return Ok(Some(reply));
    };

    let args = &items[1..];

    match kind {
        CommandKind::Subscribe => {
            command::pubsub::cmd_subscribe(args, client, &ctx.pubsub, writer).await?;
            Ok(None)
        }
        CommandKind::Unsubscribe => {
            command::pubsub::cmd_unsubscribe(args, client, &ctx.pubsub, writer).await?;
            Ok(None)
        }
        CommandKind::Publish => Ok(Some(command::pubsub::cmd_publish(args, &ctx.pubsub).await)),
        _ => {
            let result = command::execute(kind, args, &ctx.store).await;

            if kind.is_write() && !result.is_error() {
                let record = RespValue::array(items);
                if let Err(e) = ctx.aof.append(&record).await {
                    error!("Failed to log {cmd_name}: {e}");
                    return Ok(Some(RespValue::error(format!(
                        "ERR failed to persist command: {e}"
                    ))));
                }
            }

            Ok(Some(result))
        }
    }
}
