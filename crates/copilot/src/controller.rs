//! Exchange lifecycle controller.
//!
//! Drives a submitted question through `Pending` to `Resolved` or `Failed`.
//! Only one ask may be outstanding at a time; a second submission while one
//! is in flight is refused without touching the history.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::gateway::{Endpoint, Gateway, Payload, Request};
use crate::history::{Citation, ExchangeId};
use crate::state::SharedState;

/// Answer shown when the service returned none.
pub const NO_ANSWER: &str = "No answer";

/// Answer recorded on a failed exchange.
pub const ASK_FAILED: &str = "Request failed. Check logs.";

/// Result of a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskOutcome {
    /// Empty or whitespace-only question; nothing happened.
    Ignored,
    /// Another ask is still pending; nothing happened.
    Busy,
    Resolved(ExchangeId),
    Failed(ExchangeId),
    /// The exchange was no longer the latest when its result landed, so the
    /// result was dropped.
    Superseded(ExchangeId),
}

impl AskOutcome {
    pub fn exchange_id(self) -> Option<ExchangeId> {
        match self {
            Self::Resolved(id) | Self::Failed(id) | Self::Superseded(id) => Some(id),
            Self::Ignored | Self::Busy => None,
        }
    }
}

/// Single-flight guard; released on drop whatever the outcome.
struct AskInFlight<'a>(&'a AtomicBool);

impl<'a> AskInFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for AskInFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ExchangeController {
    gateway: Arc<dyn Gateway>,
    state: SharedState,
    in_flight: AtomicBool,
}

impl ExchangeController {
    pub fn new(gateway: Arc<dyn Gateway>, state: SharedState) -> Self {
        Self {
            gateway,
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether an ask is currently outstanding. The submission path is
    /// disabled while this is true.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submit a question and wait for its exchange to settle.
    pub async fn submit(&self, question: &str) -> AskOutcome {
        let question = question.trim();
        if question.is_empty() {
            debug!("ignoring empty question");
            return AskOutcome::Ignored;
        }

        let Some(_guard) = AskInFlight::acquire(&self.in_flight) else {
            debug!("ask already in flight, refusing submission");
            return AskOutcome::Busy;
        };

        let id = self.state.write().await.history.append(question);
        info!(exchange = %id, "question submitted");

        let result = self
            .gateway
            .call(Request::get(Endpoint::Ask).with_query("question", question))
            .await;

        let mut state = self.state.write().await;
        if state.history.latest_id() != Some(id) {
            warn!(exchange = %id, "exchange is no longer the latest, dropping its result");
            return AskOutcome::Superseded(id);
        }

        match result {
            Ok(payload) => {
                let (answer, sources) = answer_from(&payload);
                debug!(exchange = %id, citations = sources.len(), "exchange resolved");
                state.history.resolve(answer, sources);
                AskOutcome::Resolved(id)
            }
            Err(failure) => {
                debug!(exchange = %id, "exchange failed: {failure}");
                state.history.fail(ASK_FAILED);
                AskOutcome::Failed(id)
            }
        }
    }
}

fn answer_from(payload: &Payload) -> (String, Vec<Citation>) {
    let answer = payload
        .field("answer")
        .and_then(Value::as_str)
        .filter(|answer| !answer.is_empty())
        .unwrap_or(NO_ANSWER)
        .to_string();
    (answer, Citation::parse_all(payload.field("sources")))
}
