pub mod error;
pub mod migrations;
pub mod models;
mod queries;
mod seed;

pub use error::StoreError;
pub use seed::{MESSAGE_BODIES, SENDERS, SeedSummary};

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::info;

/// Where the store lives. `Memory` is the volatile instance used by tests.
#[derive(Debug, Clone)]
pub enum Location {
    Disk(PathBuf),
    Memory,
}

/// Handle to the chat/message store. All mutations run inside SQLite
/// transactions behind a single connection, so readers never observe a
/// half-applied insert. Cheap to share behind an `Arc`.
pub struct Database {
    conn: Mutex<Option<Connection>>,
    fts_available: bool,
}

impl Database {
    pub fn open(location: Location) -> Result<Self, StoreError> {
        let conn = match &location {
            Location::Disk(path) => Connection::open(path),
            Location::Memory => Connection::open_in_memory(),
        }
        .map_err(|e| StoreError::Init(e.to_string()))?;

        // WAL so concurrent readers are not blocked by writers.
        // Meaningless for the in-memory instance, so only set on disk.
        if let Location::Disk(path) = &location {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| StoreError::Init(e.to_string()))?;
            info!("Store opened at {}", path.display());
        }
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| StoreError::Init(e.to_string()))?;

        migrations::run(&conn).map_err(|e| StoreError::Init(e.to_string()))?;
        let fts_available = migrations::attempt_fts(&conn);

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            fts_available,
        })
    }

    /// Capability flag computed once at open; `search_messages` branches on
    /// it instead of re-probing per call.
    pub fn fts_available(&self) -> bool {
        self.fts_available
    }

    /// Releases the underlying connection. Idempotent; every other
    /// operation afterwards fails with `StoreError::NotInitialized`.
    pub fn close(&self) {
        if let Ok(mut guard) = self.conn.lock() {
            guard.take();
        }
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Option<Connection>>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::NotInitialized)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let guard = self.lock_conn()?;
        let conn = guard.as_ref().ok_or(StoreError::NotInitialized)?;
        f(conn)
    }

    pub(crate) fn with_conn_mut<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut guard = self.lock_conn()?;
        let conn = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        f(conn)
    }
}
