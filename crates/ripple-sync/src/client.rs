use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use ripple_codec::BodyCodec;
use ripple_store::Database;
use ripple_types::{Message, PushEvent};

use crate::connection::{ConnectionState, ConnectionStatus, HEARTBEAT_INTERVAL, backoff_delay};

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Per-chat metadata the client keeps current from notifications alone.
#[derive(Debug, Clone, Default)]
pub struct ChatSummary {
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_sender: Option<String>,
    pub unread_count: u32,
}

/// In-memory session state for one UI process: connection state machine,
/// chat summary metadata, and the transcript of the currently open chat.
#[derive(Default)]
pub struct Session {
    pub connection: ConnectionState,
    pub chats: HashMap<String, ChatSummary>,
    pub active_chat: Option<String>,
    pub transcript: Vec<Message>,
}

/// Maintains a connection to the broadcaster: heartbeats it, reconnects
/// with exponential backoff on failure, and reconciles content-free
/// notifications with full records fetched from the store. Connection
/// failures never surface as errors — they resolve into `Reconnecting`
/// and a scheduled retry; only `stop()` produces the terminal state.
pub struct SyncClient {
    store: Arc<Database>,
    codec: Arc<dyn BodyCodec>,
    port: u16,
    session: Arc<Mutex<Session>>,
    stopped: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncClient {
    pub fn new(store: Arc<Database>, codec: Arc<dyn BodyCodec>, port: u16) -> Self {
        Self {
            store,
            codec,
            port,
            session: Arc::new(Mutex::new(Session::default())),
            stopped: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn session(&self) -> Arc<Mutex<Session>> {
        self.session.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session.lock().expect("session lock poisoned").connection.status
    }

    /// Switches the open chat; the transcript always belongs to the
    /// active chat, so it is cleared on every switch.
    pub fn set_active_chat(&self, chat_id: Option<String>) {
        let mut session = self.session.lock().expect("session lock poisoned");
        session.active_chat = chat_id;
        session.transcript.clear();
    }

    /// Starts (or restarts) the connection loop. A second `connect()`
    /// tears down the previous connection and its timers first.
    pub fn connect(&self) {
        if let Some(task) = self.task.lock().expect("task lock poisoned").take() {
            task.abort();
        }
        self.stopped.store(false, Ordering::SeqCst);

        let handle = tokio::spawn(run_loop(
            self.store.clone(),
            self.codec.clone(),
            self.port,
            self.session.clone(),
            self.stopped.clone(),
        ));
        *self.task.lock().expect("task lock poisoned") = Some(handle);
    }

    /// Safe from any state; no state-changing callback fires afterwards.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.lock().expect("task lock poisoned").take() {
            task.abort();
        }
        self.session
            .lock()
            .expect("session lock poisoned")
            .connection
            .disconnected();
        debug!("Sync client stopped");
    }
}

async fn run_loop(
    store: Arc<Database>,
    codec: Arc<dyn BodyCodec>,
    port: u16,
    session: Arc<Mutex<Session>>,
    stopped: Arc<AtomicBool>,
) {
    let url = format!("ws://127.0.0.1:{}/sync", port);

    loop {
        if stopped.load(Ordering::SeqCst) {
            break;
        }

        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                session.lock().expect("session lock poisoned").connection.connected();
                debug!("Connected to sync server on port {}", port);

                run_connected(socket, &store, &codec, &session).await;
            }
            Err(e) => {
                debug!("Sync connect failed: {}", e);
            }
        }

        if stopped.load(Ordering::SeqCst) {
            break;
        }
        let retry = {
            let mut guard = session.lock().expect("session lock poisoned");
            guard.connection.reconnecting();
            guard.connection.retry_count
        };
        let delay = backoff_delay(retry);
        debug!("Reconnecting in {:?} (attempt {})", delay, retry);
        tokio::time::sleep(delay).await;
    }
}

/// Runs until the connection closes or errors. The heartbeat timer only
/// exists inside this function, so it cannot outlive the connection.
async fn run_connected(
    socket: WsConnection,
    store: &Arc<Database>,
    codec: &Arc<dyn BodyCodec>,
    session: &Arc<Mutex<Session>>,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let ping = serde_json::to_string(&PushEvent::Ping).unwrap();
                if sender.send(WsMessage::Text(ping.into())).await.is_err() {
                    return;
                }
            }
            frame = receiver.next() => {
                let text = match frame {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => continue,
                };
                match serde_json::from_str::<PushEvent>(text.as_str()) {
                    Ok(PushEvent::Pong) => {
                        session.lock().expect("session lock poisoned").connection.pong_received();
                    }
                    Ok(PushEvent::NewMessage { chat_id, message_id, ts, sender }) => {
                        handle_new_message(store, codec, session, chat_id, message_id, ts, sender)
                            .await;
                    }
                    // Server never sends ping; malformed payloads are dropped
                    Ok(PushEvent::Ping) | Err(_) => {}
                }
            }
        }
    }
}

/// Notify-then-fetch: the notification always updates summary metadata;
/// only when the affected chat is open does the client fetch the full
/// record from the store, append it, and mark the chat read. Bodies never
/// cross the push channel.
async fn handle_new_message(
    store: &Arc<Database>,
    codec: &Arc<dyn BodyCodec>,
    session: &Arc<Mutex<Session>>,
    chat_id: String,
    message_id: String,
    ts: i64,
    msg_sender: String,
) {
    let ts_dt = DateTime::from_timestamp(ts, 0).unwrap_or_default();

    let is_active = {
        let mut guard = session.lock().expect("session lock poisoned");
        let is_active = guard.active_chat.as_deref() == Some(chat_id.as_str());
        let summary = guard.chats.entry(chat_id.clone()).or_default();
        if summary.last_message_at.map_or(true, |t| ts_dt > t) {
            summary.last_message_at = Some(ts_dt);
        }
        summary.last_sender = Some(msg_sender);
        if !is_active {
            summary.unread_count += 1;
        }
        is_active
    };
    if !is_active {
        return;
    }

    // The user is viewing this chat: resolve the notification to content.
    let fetch = store.clone();
    let cid = chat_id.clone();
    match tokio::task::spawn_blocking(move || fetch.get_messages(&cid, 1, 0)).await {
        Ok(Ok(msgs)) => {
            if let Some(mut msg) = msgs.into_iter().next() {
                if msg.id == message_id {
                    match codec.decrypt(&msg.body) {
                        Ok(plaintext) => {
                            msg.body = plaintext;
                            session
                                .lock()
                                .expect("session lock poisoned")
                                .transcript
                                .push(msg);
                        }
                        Err(e) => warn!("Dropping undecryptable message {}: {}", msg.id, e),
                    }
                }
            }
        }
        // Either way the message appears on the next full fetch
        Ok(Err(e)) => debug!("Fetch after notification failed: {}", e),
        Err(e) => warn!("Fetch task failed: {}", e),
    }

    let mark = store.clone();
    let cid = chat_id.clone();
    match tokio::task::spawn_blocking(move || mark.mark_as_read(&cid)).await {
        Ok(Ok(())) => {
            let mut guard = session.lock().expect("session lock poisoned");
            if let Some(summary) = guard.chats.get_mut(&chat_id) {
                summary.unread_count = 0;
            }
        }
        Ok(Err(e)) => debug!("Mark-as-read failed for {}: {}", chat_id, e),
        Err(e) => warn!("Mark-as-read task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Broadcaster;
    use ripple_codec::Base64Codec;
    use ripple_store::{Location, StoreError};
    use ripple_types::NewMessage;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn wait_for_status(client: &SyncClient, wanted: ConnectionStatus) {
        timeout(Duration::from_secs(10), async {
            loop {
                if client.status() == wanted {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached {:?}", wanted));
    }

    fn seeded_store() -> Arc<Database> {
        let db = Database::open(Location::Memory).unwrap();
        db.seed_if_empty().unwrap();
        Arc::new(db)
    }

    fn codec() -> Arc<dyn BodyCodec> {
        Arc::new(Base64Codec)
    }

    /// Insert a message the way the broadcaster would: encrypted body.
    fn insert_encrypted(
        store: &Database,
        chat_id: &str,
        id: &str,
        body: &str,
        ts: i64,
    ) -> Result<(), StoreError> {
        store.insert_message(
            chat_id,
            &NewMessage {
                id: id.into(),
                sender: "Alice".into(),
                body: Base64Codec.encrypt(body).unwrap(),
                ts,
            },
        )
    }

    #[tokio::test]
    async fn connects_and_stops_cleanly() {
        let store = Arc::new(Database::open(Location::Memory).unwrap());
        let broadcaster = Broadcaster::new(store.clone(), codec());
        let port = broadcaster.start().await.unwrap();

        let client = SyncClient::new(store, codec(), port);
        assert_eq!(client.status(), ConnectionStatus::Offline);

        client.connect();
        wait_for_status(&client, ConnectionStatus::Connected).await;

        client.stop();
        assert_eq!(client.status(), ConnectionStatus::Offline);

        // Stop suppressed further reconnection attempts
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(client.status(), ConnectionStatus::Offline);

        broadcaster.stop().await;
    }

    #[tokio::test]
    async fn reconnects_after_forced_drop() {
        let store = Arc::new(Database::open(Location::Memory).unwrap());
        let broadcaster = Broadcaster::new(store.clone(), codec());
        let port = broadcaster.start().await.unwrap();

        let client = SyncClient::new(store, codec(), port);
        client.connect();
        wait_for_status(&client, ConnectionStatus::Connected).await;

        broadcaster.simulate_drop().await;
        // First retry fires after 1s backoff and finds the listener alive
        wait_for_status(&client, ConnectionStatus::Connected).await;

        client.stop();
        broadcaster.stop().await;
    }

    #[tokio::test]
    async fn notification_for_inactive_chat_only_updates_metadata() {
        let store = seeded_store();
        let session = Arc::new(Mutex::new(Session::default()));
        let codec = codec();

        let ts = 2_000_000_000;
        insert_encrypted(&store, "chat-007", "n1", "hello there", ts).unwrap();
        handle_new_message(
            &store,
            &codec,
            &session,
            "chat-007".into(),
            "n1".into(),
            ts,
            "Alice".into(),
        )
        .await;

        let guard = session.lock().unwrap();
        let summary = guard.chats.get("chat-007").unwrap();
        assert_eq!(summary.unread_count, 1);
        assert_eq!(summary.last_message_at.unwrap().timestamp(), ts);
        assert!(guard.transcript.is_empty());
    }

    #[tokio::test]
    async fn notification_for_active_chat_fetches_and_marks_read() {
        let store = seeded_store();
        let session = Arc::new(Mutex::new(Session::default()));
        session.lock().unwrap().active_chat = Some("chat-007".into());
        let codec = codec();

        let ts = 2_000_000_000;
        insert_encrypted(&store, "chat-007", "n2", "fetched in full", ts).unwrap();
        handle_new_message(
            &store,
            &codec,
            &session,
            "chat-007".into(),
            "n2".into(),
            ts,
            "Alice".into(),
        )
        .await;

        {
            let guard = session.lock().unwrap();
            assert_eq!(guard.transcript.len(), 1);
            // Body was decrypted on the way into the transcript
            assert_eq!(guard.transcript[0].body, "fetched in full");
            assert_eq!(guard.chats.get("chat-007").unwrap().unread_count, 0);
        }

        // The unread reset reached the store too
        let chats = store.get_chats(200, 0).unwrap();
        assert_eq!(chats.iter().find(|c| c.id == "chat-007").unwrap().unread_count, 0);
    }

    #[tokio::test]
    async fn mismatched_fetch_skips_transcript_append() {
        let store = seeded_store();
        let session = Arc::new(Mutex::new(Session::default()));
        session.lock().unwrap().active_chat = Some("chat-007".into());
        let codec = codec();

        let ts = 2_000_000_000;
        insert_encrypted(&store, "chat-007", "n3", "first", ts).unwrap();
        // A newer message lands before the fetch resolves the notification
        insert_encrypted(&store, "chat-007", "n4", "second", ts + 1).unwrap();

        handle_new_message(
            &store,
            &codec,
            &session,
            "chat-007".into(),
            "n3".into(),
            ts,
            "Alice".into(),
        )
        .await;

        // Identity mismatch: nothing appended, metadata still updated
        let guard = session.lock().unwrap();
        assert!(guard.transcript.is_empty());
        assert!(guard.chats.contains_key("chat-007"));
    }

    #[tokio::test]
    async fn stale_timestamp_does_not_move_summary_backwards() {
        let store = seeded_store();
        let session = Arc::new(Mutex::new(Session::default()));
        let codec = codec();

        let newer = 2_000_000_000;
        let older = 1_999_000_000;
        insert_encrypted(&store, "chat-007", "n5", "newer", newer).unwrap();
        handle_new_message(
            &store, &codec, &session, "chat-007".into(), "n5".into(), newer, "Alice".into(),
        )
        .await;
        insert_encrypted(&store, "chat-007", "n6", "older", older).unwrap();
        handle_new_message(
            &store, &codec, &session, "chat-007".into(), "n6".into(), older, "Bob".into(),
        )
        .await;

        let guard = session.lock().unwrap();
        let summary = guard.chats.get("chat-007").unwrap();
        assert_eq!(summary.last_message_at.unwrap().timestamp(), newer);
        assert_eq!(summary.unread_count, 2);
    }
}
