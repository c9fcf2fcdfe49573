//! Command handlers invoked by the surrounding shell.
//!
//! [`Copilot`] owns the shared state and wires the controller and poller to a
//! gateway and a notice board. It is cheap to clone, so each action can run
//! on its own task.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::controller::{AskOutcome, ExchangeController};
use crate::gateway::{Attachment, Gateway, HttpGateway};
use crate::notify::NoticeBoard;
use crate::poller::{StatusPoller, UploadOutcome};
use crate::state::{self, Health, SharedState, ViewSnapshot};

/// A user action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Ask(String),
    CheckHealth,
    RefreshStats,
    RebuildIndex,
    Upload(Option<Attachment>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Ask(AskOutcome),
    Health(Health),
    Stats(bool),
    Rebuild(bool),
    Upload(UploadOutcome),
}

impl ActionOutcome {
    /// Whether the action achieved what the operator asked for.
    pub fn is_success(&self) -> bool {
        match self {
            Self::Ask(outcome) => matches!(outcome, AskOutcome::Resolved(_)),
            Self::Health(health) => *health == Health::Up,
            Self::Stats(ok) | Self::Rebuild(ok) => *ok,
            Self::Upload(outcome) => matches!(outcome, UploadOutcome::Uploaded(_)),
        }
    }
}

#[derive(Clone)]
pub struct Copilot {
    state: SharedState,
    notices: Arc<NoticeBoard>,
    controller: Arc<ExchangeController>,
    poller: Arc<StatusPoller>,
}

impl Copilot {
    pub fn new(gateway: Arc<dyn Gateway>, notices: Arc<NoticeBoard>) -> Self {
        let state = state::shared();
        let controller = ExchangeController::new(Arc::clone(&gateway), Arc::clone(&state));
        let poller = StatusPoller::new(gateway, Arc::clone(&state), notices.clone());
        Self {
            state,
            notices,
            controller: Arc::new(controller),
            poller: Arc::new(poller),
        }
    }

    /// Connect to the service described by `config` over HTTP.
    pub fn connect(config: &AppConfig) -> Self {
        let notices = Arc::new(NoticeBoard::new(config.notices.ttl()));
        let gateway = HttpGateway::new(&config.server.url, notices.clone());
        Self::new(Arc::new(gateway), notices)
    }

    pub async fn dispatch(&self, action: Action) -> ActionOutcome {
        match action {
            Action::Ask(question) => ActionOutcome::Ask(self.controller.submit(&question).await),
            Action::CheckHealth => ActionOutcome::Health(self.poller.check_health().await),
            Action::RefreshStats => ActionOutcome::Stats(self.poller.refresh_stats().await),
            Action::RebuildIndex => ActionOutcome::Rebuild(self.poller.rebuild_index().await),
            Action::Upload(file) => ActionOutcome::Upload(self.poller.upload_document(file).await),
        }
    }

    /// Initial view: health and stats are fetched concurrently.
    pub async fn initialize(&self) -> (Health, bool) {
        tokio::join!(self.poller.check_health(), self.poller.refresh_stats())
    }

    pub fn ask_in_flight(&self) -> bool {
        self.controller.is_busy()
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        self.state
            .read()
            .await
            .snapshot(self.controller.is_busy(), self.notices.active())
    }
}
