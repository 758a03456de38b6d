use redlog::command;
use redlog::config::Config;
use redlog::error::RedlogResult;
use redlog::persistence::aof::Aof;
use redlog::pubsub::PubSubRegistry;
use redlog::server::{self, ServerContext};
use redlog::store::Store;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> RedlogResult<()> {
    // Parse command line args
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_args(&args);

    // Initialize tracing; RUST_LOG wins over --loglevel
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.loglevel)),
        )
        .init();

    std::fs::create_dir_all(&config.dir)?;
    let aof_path = config.aof_path();
    let aof = Aof::open(&aof_path).await?;
    info!("Append-only log: {}", aof_path.display());

    // The whole log is applied before the first connection is accepted.
    let store = Store::new();
    let store_ref = &store;
    let replayed = aof
        .replay(move |cmd| command::apply_replayed(store_ref, cmd))
        .await?;
    let (strings, hashes) = store.key_counts().await;
    info!("Replayed {replayed} commands from the log ({strings} string keys, {hashes} hash keys)");

    info!(
        "Unknown commands get a {} reply",
        config.unknown_command.as_str()
    );

    let ctx = ServerContext {
        pubsub: Arc::new(RwLock::new(PubSubRegistry::new(config.mailbox_capacity))),
        config: Arc::new(RwLock::new(config)),
        store: Arc::new(store),
        aof: Arc::new(aof),
    };

    server::run_server(ctx).await
}
