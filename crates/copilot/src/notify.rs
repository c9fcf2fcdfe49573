//! Notification sink for transient, user-facing notices.
//!
//! Notices auto-dismiss after a fixed interval. Expired entries are pruned
//! whenever the board is read or written, so readers only ever see notices
//! that are still live.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

/// How long a notice stays visible.
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(4);

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    Success,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Success => write!(f, "success"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single notice as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Monotonic sequence number, unique per board.
    pub id: u64,
    pub message: String,
    pub severity: Severity,
}

/// Anything that can surface a notice to the operator.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);

    /// Surface a notice with the default severity.
    fn error(&self, message: &str) {
        self.notify(message, Severity::default());
    }
}

#[derive(Debug)]
struct Entry {
    notice: Notice,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Board {
    next_id: u64,
    entries: VecDeque<Entry>,
}

impl Board {
    fn prune(&mut self, now: Instant) {
        // Entries are pushed in expiry order, so the front is always oldest.
        while self
            .entries
            .front()
            .is_some_and(|entry| entry.expires_at <= now)
        {
            self.entries.pop_front();
        }
    }
}

/// Process-wide notice channel with time-based auto-dismissal.
#[derive(Debug)]
pub struct NoticeBoard {
    ttl: Duration,
    board: Mutex<Board>,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            board: Mutex::new(Board::default()),
        }
    }

    /// Notices that have not yet been dismissed, oldest first.
    pub fn active(&self) -> Vec<Notice> {
        let mut board = self.lock();
        board.prune(Instant::now());
        board
            .entries
            .iter()
            .map(|entry| entry.notice.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        // A poisoned board only means a reader panicked mid-clone; the data is intact.
        self.board
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_TTL)
    }
}

impl NotificationSink for NoticeBoard {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => warn!(%severity, "{message}"),
            Severity::Success | Severity::Info => info!(%severity, "{message}"),
        }

        let now = Instant::now();
        let mut board = self.lock();
        board.prune(now);
        board.next_id += 1;
        let notice = Notice {
            id: board.next_id,
            message: message.to_string(),
            severity,
        };
        board.entries.push_back(Entry {
            notice,
            expires_at: now + self.ttl,
        });
    }
}
