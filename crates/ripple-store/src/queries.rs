use rusqlite::{Connection, params};
use tracing::debug;

use ripple_types::{Chat, Message, NewMessage};

use crate::models::{ChatRow, MessageRow};
use crate::{Database, StoreError};

/// Hard cap on search results, scoped to one chat.
const SEARCH_LIMIT: u32 = 50;

impl Database {
    /// Chats ordered by last activity, newest first.
    pub fn get_chats(&self, limit: u32, offset: u32) -> Result<Vec<Chat>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, title, last_message_at, unread_count FROM chats
                 ORDER BY last_message_at DESC LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt
                .query_map(params![limit, offset], chat_from_row)?
                .collect::<rusqlite::Result<Vec<ChatRow>>>()?;
            Ok(rows.into_iter().map(Chat::from).collect())
        })
    }

    /// Messages for one chat, `ts` descending. An unknown chat id yields an
    /// empty vec, not an error.
    pub fn get_messages(
        &self,
        chat_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, chat_id, ts, sender, body FROM messages
                 WHERE chat_id = ?1 ORDER BY ts DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![chat_id, limit, offset], message_from_row)?
                .collect::<rusqlite::Result<Vec<MessageRow>>>()?;
            Ok(rows.into_iter().map(Message::from).collect())
        })
    }

    /// Inserts a message and updates the owning chat in one transaction:
    /// `last_message_at` moves forward only, `unread_count` always
    /// increments by 1. All three effects commit together or not at all.
    pub fn insert_message(&self, chat_id: &str, msg: &NewMessage) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM chats WHERE id = ?1)",
                [chat_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound(chat_id.to_string()));
            }

            tx.execute(
                "INSERT INTO messages (id, chat_id, ts, sender, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![msg.id, chat_id, msg.ts, msg.sender, msg.body],
            )?;
            tx.execute(
                "UPDATE chats SET last_message_at = ?1
                 WHERE id = ?2 AND last_message_at < ?1",
                params![msg.ts, chat_id],
            )?;
            tx.execute(
                "UPDATE chats SET unread_count = unread_count + 1 WHERE id = ?1",
                [chat_id],
            )?;

            tx.commit()?;
            debug!("Inserted message {} into {}", msg.id, chat_id);
            Ok(())
        })
    }

    /// At most 50 matches within one chat. Token matching when the FTS
    /// index exists, raw substring containment otherwise; an FTS query
    /// failure degrades to the substring path instead of erroring.
    pub fn search_messages(&self, chat_id: &str, query: &str) -> Result<Vec<Message>, StoreError> {
        self.with_conn(|conn| {
            let rows = if self.fts_available() {
                // Quote the query so user input is matched as a phrase
                // rather than parsed as FTS5 operators.
                let escaped = format!("\"{}\"", query.replace('"', "\"\""));
                match search_fts(conn, chat_id, &escaped) {
                    Ok(rows) => rows,
                    Err(e) => {
                        debug!("FTS query failed, using substring fallback: {}", e);
                        search_like(conn, chat_id, query)?
                    }
                }
            } else {
                search_like(conn, chat_id, query)?
            };
            Ok(rows.into_iter().map(Message::from).collect())
        })
    }

    /// Resets the unread counter. No-op (not an error) for unknown ids.
    pub fn mark_as_read(&self, chat_id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("UPDATE chats SET unread_count = 0 WHERE id = ?1", [chat_id])?;
            Ok(())
        })
    }

    pub fn chat_count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))?)
        })
    }

    pub fn message_count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?)
        })
    }
}

fn chat_from_row(row: &rusqlite::Row) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        title: row.get(1)?,
        last_message_at: row.get(2)?,
        unread_count: row.get(3)?,
    })
}

fn message_from_row(row: &rusqlite::Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        ts: row.get(2)?,
        sender: row.get(3)?,
        body: row.get(4)?,
    })
}

fn search_fts(conn: &Connection, chat_id: &str, escaped: &str) -> rusqlite::Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT m.id, m.chat_id, m.ts, m.sender, m.body
         FROM messages_fts AS f
         JOIN messages AS m ON m.rowid = f.rowid
         WHERE f.body MATCH ?1 AND m.chat_id = ?2
         LIMIT ?3",
    )?;
    stmt.query_map(params![escaped, chat_id, SEARCH_LIMIT], message_from_row)?
        .collect()
}

fn search_like(conn: &Connection, chat_id: &str, query: &str) -> rusqlite::Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, chat_id, ts, sender, body FROM messages
         WHERE chat_id = ?1 AND body LIKE ?2
         LIMIT ?3",
    )?;
    stmt.query_map(
        params![chat_id, format!("%{}%", query), SEARCH_LIMIT],
        message_from_row,
    )?
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Location;

    /// A small store with three chats and a handful of messages, written
    /// through raw SQL because chats are seed-only in the public contract.
    fn fixture() -> Database {
        let db = Database::open(Location::Memory).unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "
                INSERT INTO chats (id, title, last_message_at, unread_count) VALUES
                    ('chat-a', 'Alice', 300, 0),
                    ('chat-b', 'Backend Team', 200, 2),
                    ('chat-c', 'Charlie', 100, 0);
                INSERT INTO messages (id, chat_id, ts, sender, body) VALUES
                    ('a1', 'chat-a', 100, 'Alice', 'good morning'),
                    ('a2', 'chat-a', 200, 'me', 'meeting at noon'),
                    ('a3', 'chat-a', 300, 'Alice', 'see you there'),
                    ('b1', 'chat-b', 200, 'Bob', 'deploy finished');
                ",
            )?;
            Ok(())
        })
        .unwrap();
        db
    }

    fn msg(id: &str, ts: i64, body: &str) -> NewMessage {
        NewMessage {
            id: id.into(),
            sender: "Eve".into(),
            body: body.into(),
            ts,
        }
    }

    #[test]
    fn fts_index_is_available_with_bundled_sqlite() {
        let db = Database::open(Location::Memory).unwrap();
        assert!(db.fts_available());
    }

    #[test]
    fn chats_sorted_by_last_message_desc() {
        let db = fixture();
        let chats = db.get_chats(10, 0).unwrap();
        let ids: Vec<_> = chats.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["chat-a", "chat-b", "chat-c"]);
    }

    #[test]
    fn chat_paging_composes() {
        let db = fixture();
        let all = db.get_chats(3, 0).unwrap();
        let first = db.get_chats(2, 0).unwrap();
        let rest = db.get_chats(1, 2).unwrap();
        let recombined: Vec<_> = first.iter().chain(rest.iter()).map(|c| &c.id).collect();
        let expected: Vec<_> = all.iter().map(|c| &c.id).collect();
        assert_eq!(recombined, expected);
    }

    #[test]
    fn messages_scoped_and_desc() {
        let db = fixture();
        let msgs = db.get_messages("chat-a", 10, 0).unwrap();
        assert!(msgs.iter().all(|m| m.chat_id == "chat-a"));
        let ids: Vec<_> = msgs.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a3", "a2", "a1"]);
    }

    #[test]
    fn unknown_chat_yields_empty_not_error() {
        let db = fixture();
        assert!(db.get_messages("chat-zzz", 10, 0).unwrap().is_empty());
    }

    #[test]
    fn insert_is_atomic_across_message_and_chat() {
        let db = fixture();
        db.insert_message("chat-c", &msg("c1", 500, "hello")).unwrap();

        let msgs = db.get_messages("chat-c", 1, 0).unwrap();
        assert_eq!(msgs[0].id, "c1");

        let top = &db.get_chats(1, 0).unwrap()[0];
        assert_eq!(top.id, "chat-c");
        assert_eq!(top.last_message_at.timestamp(), 500);
        assert_eq!(top.unread_count, 1);
    }

    #[test]
    fn insert_into_unknown_chat_fails_without_side_effects() {
        let db = fixture();
        let before = db.message_count().unwrap();

        let err = db.insert_message("chat-zzz", &msg("x1", 500, "hi")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(db.message_count().unwrap(), before);
    }

    #[test]
    fn backward_timestamp_never_moves_chat_backwards() {
        let db = fixture();
        db.insert_message("chat-a", &msg("a0", 50, "late arrival")).unwrap();

        let chats = db.get_chats(10, 0).unwrap();
        let chat_a = chats.iter().find(|c| c.id == "chat-a").unwrap();
        // last_message_at untouched, unread still incremented
        assert_eq!(chat_a.last_message_at.timestamp(), 300);
        assert_eq!(chat_a.unread_count, 1);
        // and the message is still stored
        assert!(db.get_messages("chat-a", 10, 0).unwrap().iter().any(|m| m.id == "a0"));
    }

    #[test]
    fn search_is_chat_scoped() {
        let db = fixture();
        // "deploy finished" only exists in chat-b
        assert!(db.search_messages("chat-a", "deploy").unwrap().is_empty());
        let hits = db.search_messages("chat-b", "deploy").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b1");
    }

    #[test]
    fn search_no_match_is_empty_not_error() {
        let db = fixture();
        assert!(db.search_messages("chat-a", "zzz_no_match_zzz").unwrap().is_empty());
    }

    #[test]
    fn search_caps_at_fifty() {
        let db = fixture();
        for i in 0..60i64 {
            db.insert_message("chat-c", &msg(&format!("s{i}"), 1000 + i, "needle in here"))
                .unwrap();
        }
        assert_eq!(db.search_messages("chat-c", "needle").unwrap().len(), 50);
    }

    #[test]
    fn search_operator_characters_fall_back_cleanly() {
        let db = fixture();
        // FTS5 would choke on bare operators; the phrase quoting (or the
        // LIKE fallback) must keep this a plain no-match, never an error.
        assert!(db.search_messages("chat-a", "NOT (").unwrap().is_empty());
    }

    #[test]
    fn substring_fallback_matches_partial_words() {
        let db = fixture();
        let hits = db
            .with_conn(|conn| Ok(search_like(conn, "chat-a", "morn")?))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a1");
    }

    #[test]
    fn mark_as_read_resets_and_tolerates_unknown() {
        let db = fixture();
        db.mark_as_read("chat-b").unwrap();
        let chats = db.get_chats(10, 0).unwrap();
        assert_eq!(chats.iter().find(|c| c.id == "chat-b").unwrap().unread_count, 0);

        db.mark_as_read("chat-zzz").unwrap();
    }

    #[test]
    fn closed_store_refuses_operations() {
        let db = fixture();
        db.close();
        db.close(); // idempotent

        assert!(matches!(db.get_chats(1, 0), Err(StoreError::NotInitialized)));
        assert!(matches!(
            db.insert_message("chat-a", &msg("x", 1, "hi")),
            Err(StoreError::NotInitialized)
        ));
        assert!(matches!(db.message_count(), Err(StoreError::NotInitialized)));
    }
}
