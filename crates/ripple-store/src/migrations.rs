use rusqlite::Connection;
use tracing::{debug, info};

pub fn run(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS chats (
            id              TEXT PRIMARY KEY,
            title           TEXT NOT NULL,
            last_message_at INTEGER NOT NULL,
            unread_count    INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS messages (
            id      TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL REFERENCES chats(id),
            ts      INTEGER NOT NULL,
            sender  TEXT NOT NULL,
            body    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chats_last_message_at
            ON chats(last_message_at DESC);

        CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
            ON messages(chat_id, ts DESC);
        ",
    )?;

    info!("Store migrations complete");
    Ok(())
}

/// Best-effort creation of the FTS5 search index over message bodies.
/// Returns false when the SQLite build lacks FTS5; callers record the
/// capability once and never re-probe.
pub fn attempt_fts(conn: &Connection) -> bool {
    let result = conn.execute_batch(
        "
        CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts
            USING fts5(body, content='messages', content_rowid='rowid');

        CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
            INSERT INTO messages_fts(rowid, body) VALUES (new.rowid, new.body);
        END;

        CREATE TRIGGER IF NOT EXISTS messages_ad AFTER DELETE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, body)
                VALUES('delete', old.rowid, old.body);
        END;

        CREATE TRIGGER IF NOT EXISTS messages_au AFTER UPDATE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, body)
                VALUES('delete', old.rowid, old.body);
            INSERT INTO messages_fts(rowid, body) VALUES (new.rowid, new.body);
        END;
        ",
    );

    match result {
        Ok(()) => true,
        Err(e) => {
            debug!("FTS5 unavailable, search will use substring fallback: {}", e);
            false
        }
    }
}
