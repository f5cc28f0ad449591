use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat summary as exposed across the RPC boundary.
/// Timestamps are ISO-8601 UTC on the wire; the store keeps epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: u32,
}

/// A message is immutable once inserted and belongs to exactly one chat.
/// The persisted body is always the codec-encrypted form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub ts: DateTime<Utc>,
    pub sender: String,
    pub body: String,
}

/// Input for inserting a new message. `ts` is Unix epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub id: String,
    pub sender: String,
    pub body: String,
    pub ts: i64,
}
