//! Shared conversation state and immutable view snapshots.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::history::{Exchange, HistoryStore};
use crate::notify::Notice;

/// Last known service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    #[default]
    Unknown,
    Up,
    Down,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::Up => write!(f, "OK"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

/// Side-channel status, not part of the history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Status {
    pub health: Health,
    /// Last successfully fetched statistics payload, verbatim.
    pub stats: Option<Value>,
    /// Transient upload progress text.
    pub upload_status: Option<String>,
    /// Rebuild calls still outstanding. Overlapping rebuilds each hold one.
    pub rebuilds_in_flight: usize,
}

impl Status {
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilds_in_flight > 0
    }
}

/// Everything the presentation layer can show.
#[derive(Debug, Default)]
pub struct Conversation {
    pub history: HistoryStore,
    pub status: Status,
}

impl Conversation {
    pub fn snapshot(&self, ask_in_flight: bool, notices: Vec<Notice>) -> ViewSnapshot {
        ViewSnapshot {
            exchanges: self.history.snapshot(),
            health: self.status.health,
            stats: self.status.stats.clone(),
            upload_status: self.status.upload_status.clone(),
            rebuilding: self.status.is_rebuilding(),
            ask_in_flight,
            notices,
        }
    }
}

/// Conversation state shared between the controller and the poller.
///
/// Writers take the lock for a single mutation and never hold it across a
/// gateway call.
pub type SharedState = Arc<RwLock<Conversation>>;

pub fn shared() -> SharedState {
    Arc::new(RwLock::new(Conversation::default()))
}

/// Read-only copy of the state handed to a presenter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub exchanges: Vec<Exchange>,
    pub health: Health,
    pub stats: Option<Value>,
    pub upload_status: Option<String>,
    pub rebuilding: bool,
    pub ask_in_flight: bool,
    pub notices: Vec<Notice>,
}
