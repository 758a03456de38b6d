use crate::command::{arg_to_bytes, arg_to_string, wrong_arg_count};
use crate::connection::{ClientState, SharedWriter, write_value};
use crate::pubsub::{SharedPubSub, spawn_delivery};
use crate::resp::RespValue;
use std::io;
use tracing::debug;

/// SUBSCRIBE channel [channel ...]
///
/// Writes one confirmation per channel straight to the connection; there is
/// no ordinary reply. Each new subscription gets its own delivery task.
pub async fn cmd_subscribe(
    args: &[RespValue],
    client: &mut ClientState,
    pubsub: &SharedPubSub,
    writer: &SharedWriter,
) -> io::Result<()> {
    if args.is_empty() {
        return write_value(writer, &wrong_arg_count("subscribe")).await;
    }

    for arg in args {
        let Some(channel) = arg_to_string(arg) else {
            continue;
        };

        let (count, fresh) = pubsub.write().await.subscribe(client.id, &channel);
        client.subscriptions = count;
        debug!("Client {} subscribed to '{channel}'", client.id);

        // Confirm before the delivery task can write anything. Messages
        // published in between wait in the mailbox.
        let confirmation = RespValue::array(vec![
            RespValue::bulk_string(b"subscribe".to_vec()),
            RespValue::bulk_string(channel.as_bytes().to_vec()),
            RespValue::bulk_string(count.to_string().into_bytes()),
        ]);
        write_value(writer, &confirmation).await?;

        if let Some(subscription) = fresh {
            spawn_delivery(pubsub.clone(), client.id, channel, subscription, writer.clone());
        }
    }
    Ok(())
}

/// UNSUBSCRIBE [channel ...]
///
/// With no channels, leaves every channel the client is on.
pub async fn cmd_unsubscribe(
    args: &[RespValue],
    client: &mut ClientState,
    pubsub: &SharedPubSub,
    writer: &SharedWriter,
) -> io::Result<()> {
    let channels: Vec<String> = if args.is_empty() {
        pubsub.read().await.client_channel_list(client.id)
    } else {
        args.iter().filter_map(arg_to_string).collect()
    };

    if channels.is_empty() {
        client.subscriptions = 0;
        let reply = RespValue::array(vec![
            RespValue::bulk_string(b"unsubscribe".to_vec()),
            RespValue::null_bulk_string(),
            RespValue::integer(0),
        ]);
        return write_value(writer, &reply).await;
    }

    for channel in channels {
        let count = pubsub.write().await.unsubscribe(client.id, &channel);
        client.subscriptions = count;
        debug!("Client {} unsubscribed from '{channel}'", client.id);

        let reply = RespValue::array(vec![
            RespValue::bulk_string(b"unsubscribe".to_vec()),
            RespValue::bulk_string(channel.into_bytes()),
            RespValue::integer(count as i64),
        ]);
        write_value(writer, &reply).await?;
    }
    Ok(())
}

pub async fn cmd_publish(args: &[RespValue], pubsub: &SharedPubSub) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("publish");
    }
    let channel = match arg_to_string(&args[0]) {
        Some(c) => c,
        None => return RespValue::error("ERR invalid channel"),
    };
    let message = match arg_to_bytes(&args[1]) {
        Some(m) => m,
        None => return RespValue::error("ERR invalid message"),
    };

    let delivered = pubsub.read().await.publish(&channel, message);
    RespValue::integer(delivered as i64)
}
