use std::time::Duration;

use chrono::{DateTime, Utc};

/// While connected, the client pings every 10 seconds.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

const BASE_DELAY_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Offline,
    Reconnecting,
    Connected,
}

/// Pure connection state machine. The retry counter is unbounded; the
/// backoff delay derived from it saturates at 60 s.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub retry_count: u32,
    pub last_seen: Option<DateTime<Utc>>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handshake succeeded: reset the retry counter, stamp last-seen.
    pub fn connected(&mut self) {
        self.status = ConnectionStatus::Connected;
        self.retry_count = 0;
        self.last_seen = Some(Utc::now());
    }

    /// Unexpected close or send/receive failure: schedule another attempt.
    pub fn reconnecting(&mut self) {
        self.status = ConnectionStatus::Reconnecting;
        self.retry_count += 1;
    }

    /// Explicit stop: terminal until the next `connect()`.
    pub fn disconnected(&mut self) {
        self.status = ConnectionStatus::Offline;
    }

    /// A pong only refreshes liveness; it never changes status or counter.
    pub fn pong_received(&mut self) {
        self.last_seen = Some(Utc::now());
    }
}

/// Delay before the nth retry: `min(60s, 1s * 2^(n-1))`.
pub fn backoff_delay(retry_count: u32) -> Duration {
    let exp = retry_count.saturating_sub(1).min(6);
    Duration::from_secs((BASE_DELAY_SECS << exp).min(MAX_BACKOFF_SECS))
}
