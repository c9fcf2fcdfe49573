//! Status poller: health, statistics, index rebuilds and uploads.
//!
//! Results land in [`Status`](crate::state::Status), never in the history.
//! Gateway failures have already been surfaced by the gateway, so the poller
//! only adds notices for outcomes the gateway cannot know about.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::gateway::{Attachment, Endpoint, Gateway, Payload, Request};
use crate::notify::{NotificationSink, Severity};
use crate::state::{Health, SharedState};

pub const UNEXPECTED_HEALTH: &str = "Health endpoint returned unexpected payload";
pub const REBUILD_STARTED: &str = "Rebuild started";
pub const UPLOAD_COMPLETE: &str = "Upload complete";
pub const CHOOSE_FILE: &str = "Please choose a PDF first";
pub const UPLOADING: &str = "Uploading…";

/// Number of chunks the service reported for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkCount {
    Known(u64),
    Unknown,
}

impl ChunkCount {
    /// `chunk_count` if numeric, else the length of a `chunks` sequence,
    /// else unknown.
    pub fn from_payload(payload: &Payload) -> Self {
        if let Some(count) = payload.field("chunk_count").and_then(Value::as_u64) {
            return Self::Known(count);
        }
        match payload.field("chunks") {
            Some(Value::Array(chunks)) => Self::Known(chunks.len() as u64),
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ChunkCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(count) => write!(f, "{count}"),
            Self::Unknown => write!(f, "?"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// No file was supplied; no request was made.
    NoFile,
    Uploaded(ChunkCount),
    Failed,
}

pub struct StatusPoller {
    gateway: Arc<dyn Gateway>,
    state: SharedState,
    sink: Arc<dyn NotificationSink>,
}

impl StatusPoller {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        state: SharedState,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            gateway,
            state,
            sink,
        }
    }

    pub async fn check_health(&self) -> Health {
        let health = match self.gateway.call(Request::get(Endpoint::Health)).await {
            Ok(payload) if is_ok(&payload) => Health::Up,
            Ok(payload) => {
                debug!(?payload, "unexpected health payload");
                self.sink.error(UNEXPECTED_HEALTH);
                Health::Down
            }
            Err(_) => Health::Down,
        };
        info!(%health, "health checked");
        self.state.write().await.status.health = health;
        health
    }

    /// Fetch statistics. Prior stats survive a failed refresh.
    pub async fn refresh_stats(&self) -> bool {
        match self.gateway.call(Request::get(Endpoint::Stats)).await {
            Ok(payload) => {
                self.state.write().await.status.stats = Some(payload.into_value());
                debug!("stats refreshed");
                true
            }
            Err(_) => false,
        }
    }

    /// Rebuild the server-side index, then refresh stats once on success.
    pub async fn rebuild_index(&self) -> bool {
        self.state.write().await.status.rebuilds_in_flight += 1;
        let result = self.gateway.call(Request::post(Endpoint::Rebuild)).await;
        self.state.write().await.status.rebuilds_in_flight -= 1;

        let Ok(payload) = result else {
            return false;
        };
        let message = text_field(&payload, "message").unwrap_or(REBUILD_STARTED);
        self.sink.notify(message, Severity::Success);
        info!("index rebuilt");
        self.refresh_stats().await;
        true
    }

    pub async fn upload_document(&self, file: Option<Attachment>) -> UploadOutcome {
        let Some(file) = file else {
            self.sink.notify(CHOOSE_FILE, Severity::Info);
            return UploadOutcome::NoFile;
        };

        info!(file = %file.file_name, bytes = file.bytes.len(), "uploading document");
        self.state.write().await.status.upload_status = Some(UPLOADING.to_string());

        let request = Request::post(Endpoint::Upload).with_attachment(file);
        match self.gateway.call(request).await {
            Ok(payload) => {
                let chunks = ChunkCount::from_payload(&payload);
                self.state.write().await.status.upload_status =
                    Some(format!("Uploaded successfully ({chunks} chunks)."));
                let message = text_field(&payload, "message").unwrap_or(UPLOAD_COMPLETE);
                self.sink.notify(message, Severity::Success);
                UploadOutcome::Uploaded(chunks)
            }
            Err(_) => {
                self.state.write().await.status.upload_status = None;
                UploadOutcome::Failed
            }
        }
    }
}

fn is_ok(payload: &Payload) -> bool {
    match payload {
        Payload::Text(text) => text.trim() == "ok",
        Payload::Json(Value::String(status)) => status == "ok",
        Payload::Json(value) => value.get("status").and_then(Value::as_str) == Some("ok"),
    }
}

fn text_field<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload
        .field(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}
