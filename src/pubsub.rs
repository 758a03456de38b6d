use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::{SharedWriter, write_value};
use crate::resp::RespValue;

pub type MailboxReceiver = mpsc::Receiver<Vec<u8>>;

/// One (client, channel) pair: where published payloads are queued and how
/// the delivery task is told to stop.
#[derive(Debug)]
struct Subscription {
    mailbox: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
}

/// Everything the broker tracks for one client.
#[derive(Debug)]
struct ClientSubscriptions {
    /// Parent of every subscription token this client owns.
    cancel: CancellationToken,
    channels: HashSet<String>,
}

/// Handed back on a fresh subscription so the caller can start delivery.
#[derive(Debug)]
pub struct NewSubscription {
    pub mailbox: MailboxReceiver,
    pub cancel: CancellationToken,
}

/// Registry for Pub/Sub channel subscriptions.
#[derive(Debug)]
pub struct PubSubRegistry {
    /// channel name -> client id -> subscription
    channels: HashMap<String, HashMap<u64, Subscription>>,
    clients: HashMap<u64, ClientSubscriptions>,
    mailbox_capacity: usize,
}

impl PubSubRegistry {
    pub fn new(mailbox_capacity: usize) -> Self {
        PubSubRegistry {
            channels: HashMap::new(),
            clients: HashMap::new(),
            mailbox_capacity: mailbox_capacity.max(1),
        }
    }

    /// Subscribe a client to a channel.
    ///
    /// Returns the client's total subscription count, plus the mailbox and
    /// token for a new delivery task. Subscribing twice to the same channel
    /// keeps the existing subscription and returns `None` for the second part.
    pub fn subscribe(&mut self, client_id: u64, channel: &str) -> (usize, Option<NewSubscription>) {
        let client = self
            .clients
            .entry(client_id)
            .or_insert_with(|| ClientSubscriptions {
                cancel: CancellationToken::new(),
                channels: HashSet::new(),
            });

        if !client.channels.insert(channel.to_string()) {
            return (client.channels.len(), None);
        }

        let (tx, rx) = mpsc::channel(self.mailbox_capacity);
        let cancel = client.cancel.child_token();
        let count = client.channels.len();

        self.channels.entry(channel.to_string()).or_default().insert(
            client_id,
            Subscription {
                mailbox: tx,
                cancel: cancel.clone(),
            },
        );

        (
            count,
            Some(NewSubscription {
                mailbox: rx,
                cancel,
            }),
        )
    }

    /// Unsubscribe a client from a channel. Returns the client's remaining subscription count.
    pub fn unsubscribe(&mut self, client_id: u64, channel: &str) -> usize {
        if let Some(subscribers) = self.channels.get_mut(channel) {
            if let Some(sub) = subscribers.remove(&client_id) {
                sub.cancel.cancel();
            }
            if subscribers.is_empty() {
                self.channels.remove(channel);
            }
        }

        let remaining = match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.channels.remove(channel);
                client.channels.len()
            }
            None => 0,
        };
        if remaining == 0 {
            self.clients.remove(&client_id);
        }
        remaining
    }

    /// Remove all subscriptions for a client (explicit UNSUBSCRIBE, disconnect,
    /// or a failed delivery). Returns the channels that were dropped.
    pub fn unsubscribe_all(&mut self, client_id: u64) -> Vec<String> {
        let Some(client) = self.clients.remove(&client_id) else {
            return Vec::new();
        };
        client.cancel.cancel();

        let mut dropped = Vec::with_capacity(client.channels.len());
        for channel in client.channels {
            if let Some(subscribers) = self.channels.get_mut(&channel) {
                subscribers.remove(&client_id);
                if subscribers.is_empty() {
                    self.channels.remove(&channel);
                }
            }
            dropped.push(channel);
        }
        dropped
    }

    /// Queue a message for every subscriber of `channel`.
    ///
    /// Never waits: a full mailbox drops the message for that subscriber.
    /// Returns the number of mailboxes the message was queued into.
    pub fn publish(&self, channel: &str, message: &[u8]) -> usize {
        let Some(subscribers) = self.channels.get(channel) else {
            return 0;
        };

        let mut delivered = 0;
        for (client_id, sub) in subscribers {
            match sub.mailbox.try_send(message.to_vec()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Mailbox full for client {client_id} on '{channel}', dropping message");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Delivery task for client {client_id} on '{channel}' is gone");
                }
            }
        }
        delivered
    }

    /// Channels a client is subscribed to.
    pub fn client_channel_list(&self, client_id: u64) -> Vec<String> {
        self.clients
            .get(&client_id)
            .map(|c| c.channels.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of clients subscribed to a channel.
    #[cfg(test)]
    fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |s| s.len())
    }
}

pub type SharedPubSub = Arc<RwLock<PubSubRegistry>>;

/// Build the frame a subscriber receives for one published message.
pub fn message_frame(channel: &str, payload: Vec<u8>) -> RespValue {
    RespValue::array(vec![
        RespValue::bulk_string(b"message".to_vec()),
        RespValue::bulk_string(channel.as_bytes().to_vec()),
        RespValue::bulk_string(payload),
    ])
}

/// Start the task that drains one subscription's mailbox onto the client's
/// connection.
pub fn spawn_delivery(
    pubsub: SharedPubSub,
    client_id: u64,
    channel: String,
    subscription: NewSubscription,
    writer: SharedWriter,
) -> JoinHandle<()> {
    tokio::spawn(deliver(pubsub, client_id, channel, subscription, writer))
}

async fn deliver(
    pubsub: SharedPubSub,
    client_id: u64,
    channel: String,
    subscription: NewSubscription,
    writer: SharedWriter,
) {
    let NewSubscription {
        mut mailbox,
        cancel,
    } = subscription;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Client {client_id} stopped listening on '{channel}'");
                return;
            }
            message = mailbox.recv() => {
                let Some(payload) = message else {
                    return;
                };
                let frame = message_frame(&channel, payload);
                if let Err(e) = write_value(&writer, &frame).await {
                    debug!("Write to client {client_id} failed ({e}), dropping its subscriptions");
                    pubsub.write().await.unsubscribe_all(client_id);
                    return;
                }
            }
        }
    }
}
