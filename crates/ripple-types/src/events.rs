use serde::{Deserialize, Serialize};

/// Events exchanged over the push channel.
///
/// `NewMessage` deliberately carries no body: clients re-fetch content
/// through the store boundary, so plaintext never crosses the socket.
/// Frames that fail to parse into this enum are dropped by both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushEvent {
    /// Client-initiated heartbeat
    Ping,

    /// Server reply to a `Ping`
    Pong,

    /// A message was written to the store; fetch it via the store boundary
    #[serde(rename_all = "camelCase")]
    NewMessage {
        chat_id: String,
        message_id: String,
        /// Unix epoch seconds
        ts: i64,
        sender: String,
    },
}
