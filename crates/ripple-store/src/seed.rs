use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

use crate::{Database, StoreError};

/// Fixed PRNG seed: reseeding an empty store always produces identical data.
const SEED: u64 = 42;

/// Fixed time anchor (2025-01-01T00:00:00Z) so seeded timestamps are part of
/// the reproducible output rather than drifting with the wall clock.
const TIME_ANCHOR: i64 = 1_735_689_600;

const CHAT_COUNT: usize = 200;
const TARGET_MESSAGES: f64 = 20_000.0;
const MIN_PER_CHAT: u32 = 20;
const MAX_PER_CHAT: u32 = 200;

pub const SENDERS: [&str; 5] = ["Alice", "Bob", "Charlie", "Diana", "Eve"];

const FIRST_NAMES: [&str; 15] = [
    "Alice", "Bob", "Charlie", "Diana", "Eve", "Frank", "Grace", "Hector", "Ivy", "Jack", "Karen",
    "Leo", "Mia", "Noah", "Olivia",
];

const GROUP_NAMES: [&str; 12] = [
    "Project Alpha",
    "Backend Team",
    "Design Review",
    "Standup Notes",
    "Launch Planning",
    "Bug Triage",
    "Coffee Chat",
    "Book Club",
    "Travel Plans",
    "Game Night",
    "Fitness Goals",
    "Music Recs",
];

pub const MESSAGE_BODIES: [&str; 15] = [
    "Hey, how are you?",
    "Did you see the latest update?",
    "Meeting at 3pm today.",
    "Can you review my PR?",
    "Sounds good, let me check.",
    "I will get back to you shortly.",
    "Thanks for the heads up!",
    "Let me know if you need anything.",
    "Working on it now.",
    "Sure, I can help with that.",
    "On my way!",
    "Just finished the report.",
    "Good morning!",
    "See you tomorrow.",
    "Got it, thanks!",
];

/// Counts written by `seed_if_empty`. Zero on both fields means the store
/// already had chats and nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub chats: u32,
    pub messages: u32,
}

impl Database {
    /// Populates an empty store with 200 chats and at least 20,000
    /// messages, all inside one transaction — a failure partway leaves
    /// zero new rows. No-op when any chat already exists.
    pub fn seed_if_empty(&self) -> Result<SeedSummary, StoreError> {
        self.with_conn_mut(|conn| {
            let existing: u32 =
                conn.query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))?;
            if existing > 0 {
                return Ok(SeedSummary { chats: 0, messages: 0 });
            }

            let mut rng = StdRng::seed_from_u64(SEED);

            // Distribute messages unevenly across chats, then scale the
            // weights up until the total clears the target. Rounding may
            // overshoot slightly; the guarantees are >=20,000 total and
            // >=20 per chat.
            let weights: Vec<u32> = (0..CHAT_COUNT)
                .map(|_| rng.random_range(MIN_PER_CHAT..=MAX_PER_CHAT))
                .collect();
            let raw_total: u32 = weights.iter().sum();
            let scale = (TARGET_MESSAGES / f64::from(raw_total)).max(1.0);
            let per_chat: Vec<u32> = weights
                .iter()
                .map(|&w| ((f64::from(w) * scale).round() as u32).max(MIN_PER_CHAT))
                .collect();

            let mut total_messages: u32 = 0;

            let tx = conn.transaction()?;
            {
                let mut insert_chat = tx.prepare(
                    "INSERT INTO chats (id, title, last_message_at, unread_count)
                     VALUES (?1, ?2, 0, 0)",
                )?;
                let mut insert_msg = tx.prepare(
                    "INSERT INTO messages (id, chat_id, ts, sender, body)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                let mut update_chat_ts =
                    tx.prepare("UPDATE chats SET last_message_at = ?1 WHERE id = ?2")?;

                for (c, &count) in per_chat.iter().enumerate() {
                    let chat_id = format!("chat-{:03}", c + 1);

                    // ~60% DM-style titles, ~40% group-style
                    let title = if rng.random_bool(0.6) {
                        FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())]
                    } else {
                        GROUP_NAMES[rng.random_range(0..GROUP_NAMES.len())]
                    };

                    insert_chat.execute(rusqlite::params![chat_id, title])?;

                    // Spread messages over the last 7 days with 30-300s gaps
                    let mut ts = TIME_ANCHOR - rng.random_range(0..7 * 86_400);
                    for m in 0..count {
                        ts += i64::from(rng.random_range(30u32..=300));
                        let msg_id = format!("msg-{}-{:04}", chat_id, m);
                        let sender = if rng.random_bool(0.4) {
                            "me"
                        } else {
                            SENDERS[rng.random_range(0..SENDERS.len())]
                        };
                        let body = MESSAGE_BODIES[rng.random_range(0..MESSAGE_BODIES.len())];
                        insert_msg.execute(rusqlite::params![msg_id, chat_id, ts, sender, body])?;
                    }

                    update_chat_ts.execute(rusqlite::params![ts, chat_id])?;
                    total_messages += count;
                }
            }
            tx.commit()?;

            info!("Seeded {} chats, {} messages", CHAT_COUNT, total_messages);
            Ok(SeedSummary {
                chats: CHAT_COUNT as u32,
                messages: total_messages,
            })
        })
    }
}
