use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use ripple_codec::{AesGcmCodec, Base64Codec, BodyCodec};
use ripple_rpc::RpcHandler;
use ripple_store::{Database, Location};
use ripple_sync::{Broadcaster, SyncClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripple=debug".into()),
        )
        .init();

    let db_path = std::env::var("RIPPLE_DB_PATH").unwrap_or_else(|_| "ripple.db".into());
    let codec: Arc<dyn BodyCodec> = match std::env::var("RIPPLE_CODEC").as_deref() {
        Ok("aes") => Arc::new(AesGcmCodec::generate()),
        _ => Arc::new(Base64Codec),
    };

    let store = {
        let path = PathBuf::from(&db_path);
        let store = tokio::task::spawn_blocking(move || Database::open(Location::Disk(path)))
            .await??;
        Arc::new(store)
    };

    let seed = store.clone();
    let summary = tokio::task::spawn_blocking(move || seed.seed_if_empty()).await??;
    if summary.chats > 0 {
        info!("Seeded {} chats, {} messages", summary.chats, summary.messages);
    }

    let broadcaster = Arc::new(Broadcaster::new(store.clone(), codec.clone()));
    broadcaster.start().await?;

    let rpc = RpcHandler::new(store.clone(), broadcaster.clone());
    info!(
        "Store ready: {} chats, {} messages; sync on port {}",
        rpc.chat_count()?,
        rpc.message_count()?,
        rpc.connection_port()
    );

    // Demo client: a UI process would run this on its side of the boundary
    let client = SyncClient::new(store.clone(), codec, rpc.connection_port());
    client.connect();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    client.stop();
    broadcaster.stop().await;
    store.close();

    Ok(())
}
