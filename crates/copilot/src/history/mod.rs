//! Conversation history store.
//!
//! A bounded FIFO of question/answer exchanges, oldest first. Only the most
//! recently appended exchange can be resolved or failed; the caller is
//! responsible for never having more than one exchange pending.

mod citation;

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use citation::Citation;

/// Maximum number of exchanges retained.
pub const HISTORY_CAPACITY: usize = 10;

/// Handle to an appended exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeState {
    Pending,
    Resolved,
    Failed,
}

impl ExchangeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One question and, once available, its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    id: ExchangeId,
    question: String,
    answer: Option<String>,
    sources: Vec<Citation>,
    state: ExchangeState,
}

impl Exchange {
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn sources(&self) -> &[Citation] {
        &self.sources
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }
}

#[derive(Debug)]
pub struct HistoryStore {
    entries: VecDeque<Exchange>,
    next_id: u64,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
            next_id: 0,
        }
    }

    /// Append a pending exchange, evicting the oldest beyond capacity.
    pub fn append(&mut self, question: impl Into<String>) -> ExchangeId {
        let question = question.into();
        debug_assert!(!question.trim().is_empty(), "questions are validated upstream");

        self.next_id += 1;
        let id = ExchangeId(self.next_id);
        self.entries.push_back(Exchange {
            id,
            question,
            answer: None,
            sources: Vec::new(),
            state: ExchangeState::Pending,
        });
        while self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        id
    }

    /// Resolve the most recent exchange. Returns false if there was nothing
    /// pending to resolve.
    pub fn resolve(&mut self, answer: impl Into<String>, sources: Vec<Citation>) -> bool {
        self.settle(ExchangeState::Resolved, answer.into(), sources)
    }

    /// Fail the most recent exchange with `message` as its answer.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        self.settle(ExchangeState::Failed, message.into(), Vec::new())
    }

    fn settle(&mut self, state: ExchangeState, answer: String, sources: Vec<Citation>) -> bool {
        let Some(latest) = self.entries.back_mut() else {
            return false;
        };
        if latest.state.is_terminal() {
            return false;
        }
        latest.answer = Some(answer);
        latest.sources = sources;
        latest.state = state;
        true
    }

    /// Ordered copy of the history, oldest first.
    pub fn snapshot(&self) -> Vec<Exchange> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest_id(&self) -> Option<ExchangeId> {
        self.entries.back().map(Exchange::id)
    }

    /// The most recent exchange, if it is still pending.
    pub fn pending(&self) -> Option<&Exchange> {
        self.entries
            .back()
            .filter(|exchange| exchange.state == ExchangeState::Pending)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled(store: &mut HistoryStore, question: &str, answer: &str) -> ExchangeId {
        let id = store.append(question);
        assert!(store.resolve(answer, Vec::new()));
        id
    }

    #[test]
    fn retains_ten_most_recent_oldest_first() {
        let mut store = HistoryStore::new();
        for n in 1..=13 {
            settled(&mut store, &format!("q{n}"), "a");
        }

        let questions: Vec<_> = store
            .snapshot()
            .iter()
            .map(|exchange| exchange.question().to_string())
            .collect();
        let expected: Vec<_> = (4..=13).map(|n| format!("q{n}")).collect();
        assert_eq!(store.len(), HISTORY_CAPACITY);
        assert_eq!(questions, expected);
    }

    #[test]
    fn append_creates_pending_exchange() {
        let mut store = HistoryStore::new();
        let id = store.append("What is VaR?");

        let pending = store.pending().unwrap();
        assert_eq!(pending.id(), id);
        assert_eq!(pending.answer(), None);
        assert!(pending.sources().is_empty());
        assert_eq!(store.latest_id(), Some(id));
    }

    #[test]
    fn resolve_targets_only_latest_entry() {
        let mut store = HistoryStore::new();
        for n in 0..11 {
            settled(&mut store, &format!("old{n}"), "done");
        }
        store.append("latest");
        let citation = Citation {
            label: "1".into(),
            similarity: Some(0.87),
            source_name: None,
            snippet: None,
        };
        assert!(store.resolve("Paris", vec![citation.clone()]));

        let snapshot = store.snapshot();
        let (latest, earlier) = snapshot.split_last().unwrap();
        assert_eq!(latest.state(), ExchangeState::Resolved);
        assert_eq!(latest.answer(), Some("Paris"));
        assert_eq!(latest.sources(), [citation]);
        assert!(earlier.iter().all(|e| e.answer() == Some("done")));
    }

    #[test]
    fn fail_replaces_answer_and_clears_sources() {
        let mut store = HistoryStore::new();
        store.append("q");
        assert!(store.fail("Request failed. Check logs."));

        let exchange = &store.snapshot()[0];
        assert_eq!(exchange.state(), ExchangeState::Failed);
        assert_eq!(exchange.answer(), Some("Request failed. Check logs."));
        assert!(exchange.sources().is_empty());
        assert!(store.pending().is_none());
    }

    #[test]
    fn settling_empty_store_is_noop() {
        let mut store = HistoryStore::new();
        assert!(!store.resolve("x", Vec::new()));
        assert!(!store.fail("x"));
        assert!(store.is_empty());
    }

    #[test]
    fn terminal_exchanges_are_final() {
        let mut store = HistoryStore::new();
        store.append("q");
        assert!(store.fail("nope"));
        assert!(!store.resolve("late answer", Vec::new()));
        assert_eq!(store.snapshot()[0].answer(), Some("nope"));
        assert_eq!(store.snapshot()[0].state(), ExchangeState::Failed);
    }

    #[test]
    fn ids_stay_monotonic_across_eviction() {
        let mut store = HistoryStore::new();
        let ids: Vec<_> = (0..15).map(|n| settled(&mut store, &format!("q{n}"), "a")).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(store.snapshot()[0].id(), ids[5]);
    }
}
