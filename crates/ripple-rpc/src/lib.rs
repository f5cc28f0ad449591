//! Local RPC boundary: the surface a UI process binds to.
//!
//! Every argument is validated here, before it can reach the store —
//! negative pagination fails fast, `limit` is clamped to 50 and search
//! queries are truncated to 200 characters regardless of what the caller
//! requested.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use ripple_store::{Database, SeedSummary, StoreError};
use ripple_sync::Broadcaster;
use ripple_types::{Chat, Message};

/// Hard ceiling on page size at the boundary.
const MAX_LIMIT: i64 = 50;

/// Search queries are truncated to this many characters.
const MAX_QUERY_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Bad pagination or an empty required string; recovered at this
    /// boundary, never forwarded to the store.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct RpcHandler {
    store: Arc<Database>,
    broadcaster: Arc<Broadcaster>,
}

impl RpcHandler {
    pub fn new(store: Arc<Database>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    pub fn get_chats(&self, limit: i64, offset: i64) -> Result<Vec<Chat>, RpcError> {
        let (limit, offset) = page(limit, offset)?;
        Ok(self.store.get_chats(limit, offset)?)
    }

    pub fn get_messages(
        &self,
        chat_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, RpcError> {
        require_id(chat_id)?;
        let (limit, offset) = page(limit, offset)?;
        Ok(self.store.get_messages(chat_id, limit, offset)?)
    }

    pub fn search_messages(&self, chat_id: &str, query: &str) -> Result<Vec<Message>, RpcError> {
        require_id(chat_id)?;
        let truncated = truncate_query(query);
        if truncated.len() < query.len() {
            debug!("Search query truncated to {} chars", MAX_QUERY_CHARS);
        }
        Ok(self.store.search_messages(chat_id, truncated)?)
    }

    pub fn mark_as_read(&self, chat_id: &str) -> Result<(), RpcError> {
        require_id(chat_id)?;
        Ok(self.store.mark_as_read(chat_id)?)
    }

    pub fn seed_if_empty(&self) -> Result<SeedSummary, RpcError> {
        Ok(self.store.seed_if_empty()?)
    }

    pub fn chat_count(&self) -> Result<u64, RpcError> {
        Ok(self.store.chat_count()?)
    }

    pub fn message_count(&self) -> Result<u64, RpcError> {
        Ok(self.store.message_count()?)
    }

    pub async fn simulate_drop(&self) {
        self.broadcaster.simulate_drop().await;
    }

    pub fn connection_port(&self) -> u16 {
        self.broadcaster.port()
    }
}

fn page(limit: i64, offset: i64) -> Result<(u32, u32), RpcError> {
    if limit < 0 || offset < 0 {
        return Err(RpcError::InvalidArgument(format!(
            "limit and offset must be non-negative (got limit={limit}, offset={offset})"
        )));
    }
    let limit = limit.min(MAX_LIMIT) as u32;
    let offset = u32::try_from(offset)
        .map_err(|_| RpcError::InvalidArgument(format!("offset {offset} out of range")))?;
    Ok((limit, offset))
}

fn require_id(chat_id: &str) -> Result<(), RpcError> {
    if chat_id.is_empty() {
        return Err(RpcError::InvalidArgument("chat id must not be empty".into()));
    }
    Ok(())
}

/// Cuts at a character boundary, never mid-codepoint.
fn truncate_query(query: &str) -> &str {
    match query.char_indices().nth(MAX_QUERY_CHARS) {
        Some((idx, _)) => &query[..idx],
        None => query,
    }
}
