//! Real-time sync layer: a broadcaster that pushes content-free
//! new-message notifications to connected clients, and the reconnecting
//! client state machine that resolves those notifications against the
//! store.

pub mod broadcaster;
pub mod client;
pub mod connection;
pub mod registry;

pub use broadcaster::Broadcaster;
pub use client::{ChatSummary, Session, SyncClient};
pub use connection::{ConnectionState, ConnectionStatus, backoff_delay};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// No local port could be acquired for the push channel.
    #[error("failed to bind sync listener: {0}")]
    Bind(#[from] std::io::Error),
}
