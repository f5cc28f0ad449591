use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::Duration;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ripple_codec::BodyCodec;
use ripple_store::{Database, MESSAGE_BODIES, SENDERS};
use ripple_types::{NewMessage, PushEvent};

use crate::SyncError;
use crate::registry::{ClientCommand, ClientRegistry};

/// Randomized pause between manufactured messages, in milliseconds.
const EMIT_INTERVAL_MS: std::ops::Range<u64> = 1_000..3_000;

/// Push server. Holds open client connections, periodically writes a
/// message through the store (standing in for external senders), and
/// notifies every connected client that the message exists. The payload
/// never carries the body — clients re-fetch content through the store.
pub struct Broadcaster {
    store: Arc<Database>,
    codec: Arc<dyn BodyCodec>,
    registry: ClientRegistry,
    port: AtomicU16,
    stopped: Arc<AtomicBool>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Broadcaster {
    pub fn new(store: Arc<Database>, codec: Arc<dyn BodyCodec>) -> Self {
        Self {
            store,
            codec,
            registry: ClientRegistry::new(),
            port: AtomicU16::new(0),
            stopped: Arc::new(AtomicBool::new(false)),
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Binds an ephemeral local port, starts accepting connections and
    /// runs the emission loop. Returns the bound port.
    pub async fn start(&self) -> Result<u16, SyncError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        self.port.store(port, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);

        let app = Router::new()
            .route("/sync", get(ws_upgrade))
            .layer(TraceLayer::new_for_http())
            .with_state(self.registry.clone());

        let serve = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!("Sync listener terminated: {}", e);
            }
        });
        let emit = tokio::spawn(emission_loop(
            self.store.clone(),
            self.codec.clone(),
            self.registry.clone(),
            self.stopped.clone(),
        ));

        let mut tasks = self.tasks.lock().expect("task lock poisoned");
        tasks.push(serve);
        tasks.push(emit);

        info!("Sync server listening on port {}", port);
        Ok(port)
    }

    pub fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    /// Forcibly closes every open connection, proving the client reconnect
    /// path without a real network fault.
    pub async fn simulate_drop(&self) {
        self.registry.drop_all().await;
        info!("Simulated connection drop");
    }

    /// Cancels the emission loop and closes the listener. Idempotent.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let tasks: Vec<_> = {
            let mut guard = self.tasks.lock().expect("task lock poisoned");
            guard.drain(..).collect()
        };
        for task in tasks {
            task.abort();
        }
        self.registry.drop_all().await;
        self.port.store(0, Ordering::SeqCst);
    }
}

async fn ws_upgrade(
    State(registry): State<ClientRegistry>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Per-connection task: forwards broadcast events to the socket and
/// answers ping frames. Ping is the only client request the server
/// answers; malformed or unknown payloads are dropped silently.
async fn handle_socket(socket: WebSocket, registry: ClientRegistry) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut rx) = registry.register().await;
    debug!("Sync client {} connected", conn_id);

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(ClientCommand::Event(event)) => {
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(ClientCommand::Close) | None => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(PushEvent::Ping) = serde_json::from_str::<PushEvent>(text.as_str()) {
                        let reply = serde_json::to_string(&PushEvent::Pong).unwrap();
                        if sender.send(Message::Text(reply.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    registry.unregister(conn_id).await;
    debug!("Sync client {} disconnected", conn_id);
}

/// Self-scheduling emission loop. Each cycle sleeps a randomized interval,
/// writes one message through the store and broadcasts a content-free
/// notification. Skips the cycle (without error) while no chats exist.
async fn emission_loop(
    store: Arc<Database>,
    codec: Arc<dyn BodyCodec>,
    registry: ClientRegistry,
    stopped: Arc<AtomicBool>,
) {
    let mut chat_ids: Vec<String> = Vec::new();

    loop {
        let delay = rand::rng().random_range(EMIT_INTERVAL_MS);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if stopped.load(Ordering::SeqCst) {
            break;
        }

        if chat_ids.is_empty() {
            let fetch = store.clone();
            chat_ids = match tokio::task::spawn_blocking(move || fetch.get_chats(200, 0)).await {
                Ok(Ok(chats)) => chats.into_iter().map(|c| c.id).collect(),
                Ok(Err(e)) => {
                    debug!("Chat list unavailable, skipping emission: {}", e);
                    Vec::new()
                }
                Err(e) => {
                    warn!("Chat list task failed: {}", e);
                    Vec::new()
                }
            };
            if chat_ids.is_empty() {
                continue;
            }
        }

        let (chat_id, msg_sender, body) = {
            let mut rng = rand::rng();
            (
                chat_ids[rng.random_range(0..chat_ids.len())].clone(),
                SENDERS[rng.random_range(0..SENDERS.len())].to_string(),
                MESSAGE_BODIES[rng.random_range(0..MESSAGE_BODIES.len())],
            )
        };

        let now = chrono::Utc::now();
        let suffix = Uuid::new_v4().simple().to_string();
        let message_id = format!("sync-{}-{}", now.timestamp_millis(), &suffix[..6]);

        let encrypted = match codec.encrypt(body) {
            Ok(ciphertext) => ciphertext,
            Err(e) => {
                warn!("Codec rejected {}: {}", codec.redact(body), e);
                continue;
            }
        };

        let msg = NewMessage {
            id: message_id.clone(),
            sender: msg_sender.clone(),
            body: encrypted,
            ts: now.timestamp(),
        };

        let insert = store.clone();
        let cid = chat_id.clone();
        let row = msg.clone();
        match tokio::task::spawn_blocking(move || insert.insert_message(&cid, &row)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Emission insert failed for {}: {}", chat_id, e);
                continue;
            }
            Err(e) => {
                warn!("Emission insert task failed: {}", e);
                continue;
            }
        }

        registry
            .broadcast(PushEvent::NewMessage {
                chat_id: chat_id.clone(),
                message_id: message_id.clone(),
                ts: msg.ts,
                sender: msg_sender,
            })
            .await;
        debug!("Emitted message {} to {}", message_id, chat_id);
    }
}
