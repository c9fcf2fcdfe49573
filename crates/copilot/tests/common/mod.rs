//! Test utilities and common setup.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use copilot::app::Copilot;
use copilot::gateway::{Endpoint, Failure, Gateway, GatewayResult, Payload, Request};
use copilot::notify::NoticeBoard;
use serde_json::Value;
use tokio::sync::Notify;

/// Gateway that replays scripted responses per endpoint and records calls.
///
/// Endpoints can be held: calls to a held endpoint park until released, which
/// lets tests observe state while a request is in flight.
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<HashMap<Endpoint, VecDeque<GatewayResult<Payload>>>>,
    calls: Mutex<Vec<Request>>,
    holds: Mutex<HashMap<Endpoint, Arc<Notify>>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, endpoint: Endpoint, result: GatewayResult<Payload>) {
        self.responses
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push_back(result);
    }

    pub fn respond_json(&self, endpoint: Endpoint, value: Value) {
        self.respond(endpoint, Ok(Payload::Json(value)));
    }

    pub fn respond_failure(&self, endpoint: Endpoint, message: &str) {
        self.respond(endpoint, Err(Failure::transport(message)));
    }

    /// Park calls to `endpoint` until [`release`](Self::release) is called.
    pub fn hold(&self, endpoint: Endpoint) {
        self.holds
            .lock()
            .unwrap()
            .insert(endpoint, Arc::new(Notify::new()));
    }

    pub fn release(&self, endpoint: Endpoint) {
        if let Some(notify) = self.holds.lock().unwrap().get(&endpoint) {
            notify.notify_one();
        }
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.endpoint == endpoint)
            .count()
    }

    /// Yield until `endpoint` has been called `count` times.
    pub async fn wait_for_calls(&self, endpoint: Endpoint, count: usize) {
        while self.calls_to(endpoint) < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn call(&self, request: Request) -> GatewayResult<Payload> {
        let endpoint = request.endpoint;
        self.calls.lock().unwrap().push(request);

        let hold = self.holds.lock().unwrap().get(&endpoint).cloned();
        if let Some(notify) = hold {
            notify.notified().await;
        }

        self.responses
            .lock()
            .unwrap()
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(Failure::transport(format!("no scripted {endpoint} response"))))
    }
}

/// Notice board that keeps notices long enough for any test to inspect them.
pub fn test_board() -> Arc<NoticeBoard> {
    Arc::new(NoticeBoard::new(Duration::from_secs(600)))
}

/// A copilot wired to a scripted gateway.
pub fn test_copilot() -> (Copilot, Arc<ScriptedGateway>) {
    let gateway = ScriptedGateway::new();
    let copilot = Copilot::new(gateway.clone(), test_board());
    (copilot, gateway)
}
