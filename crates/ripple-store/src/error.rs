use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store location is unwritable or schema creation failed.
    /// FTS index unavailability is NOT an init error — search falls back
    /// to substring matching instead.
    #[error("failed to initialize store: {0}")]
    Init(String),

    /// The store was closed (or its lock was poisoned by a panicking
    /// writer). Programming error, not recoverable.
    #[error("store is not initialized")]
    NotInitialized,

    /// The operation referenced a chat id that does not exist.
    #[error("chat not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
