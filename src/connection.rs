use crate::resp::RespValue;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Outbound half of a client connection.
///
/// Command replies and pub/sub deliveries share it, so every frame is written
/// under the lock in one piece.
pub type SharedWriter = Arc<Mutex<BoxedWriter>>;

pub fn shared_writer<W>(writer: W) -> SharedWriter
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    Arc::new(Mutex::new(Box::new(writer)))
}

/// Serialize `value` and write it as one frame.
pub async fn write_value(writer: &SharedWriter, value: &RespValue) -> io::Result<()> {
    let bytes = value.serialize();
    let mut w = writer.lock().await;
    w.write_all(&bytes).await?;
    w.flush().await
}

/// Per-client connection state.
#[derive(Debug)]
pub struct ClientState {
    pub id: u64,
    /// Number of channels this client is subscribed to.
    pub subscriptions: usize,
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientState {
    pub fn new() -> Self {
        ClientState {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            subscriptions: 0,
        }
    }

    pub fn in_subscribe_mode(&self) -> bool {
        self.subscriptions > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_client_ids_are_unique() {
        let a = ClientState::new();
        let b = ClientState::new();
        assert_ne!(a.id, b.id);
        assert!(!a.in_subscribe_mode());
    }

    #[tokio::test]
    async fn test_write_value_writes_one_frame() {
        let (client, mut server) = tokio::io::duplex(256);
        let writer = shared_writer(client);
        write_value(&writer, &RespValue::ok()).await.unwrap();
        write_value(&writer, &RespValue::null_bulk_string()).await.unwrap();
        drop(writer);

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"+OK\r\n$-1\r\n");
    }
}
