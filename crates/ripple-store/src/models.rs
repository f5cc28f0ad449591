/// Database row types — these map directly to SQLite rows with epoch-second
/// timestamps. Distinct from the ripple-types API models, which carry
/// `DateTime<Utc>` for the RPC boundary.
use chrono::DateTime;
use ripple_types::{Chat, Message};
use tracing::warn;

pub struct ChatRow {
    pub id: String,
    pub title: String,
    pub last_message_at: i64,
    pub unread_count: u32,
}

pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub ts: i64,
    pub sender: String,
    pub body: String,
}

impl From<ChatRow> for Chat {
    fn from(row: ChatRow) -> Self {
        Chat {
            last_message_at: DateTime::from_timestamp(row.last_message_at, 0)
                .unwrap_or_else(|| {
                    warn!("Corrupt last_message_at {} on chat '{}'", row.last_message_at, row.id);
                    DateTime::default()
                }),
            id: row.id,
            title: row.title,
            unread_count: row.unread_count,
        }
    }
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            ts: DateTime::from_timestamp(row.ts, 0).unwrap_or_else(|| {
                warn!("Corrupt ts {} on message '{}'", row.ts, row.id);
                DateTime::default()
            }),
            id: row.id,
            chat_id: row.chat_id,
            sender: row.sender,
            body: row.body,
        }
    }
}
