//! Remote access gateway.
//!
//! Every outbound call to the document-QA service goes through a [`Gateway`].
//! Implementations normalize all outcomes into `Result<Payload, Failure>` and
//! surface each failure once to the notification sink before returning it.

mod client;
mod error;

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

pub use client::HttpGateway;
pub use error::{Failure, GatewayResult, describe_error};

/// Logical endpoints exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Health,
    Stats,
    Rebuild,
    Upload,
    Ask,
}

impl Endpoint {
    /// Path of the endpoint relative to the service base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Health => "/health",
            Self::Stats => "/stats",
            Self::Rebuild => "/rebuild",
            Self::Upload => "/upload_pdf",
            Self::Ask => "/ask",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Health => write!(f, "health"),
            Self::Stats => write!(f, "stats"),
            Self::Rebuild => write!(f, "rebuild"),
            Self::Upload => write!(f, "upload"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A file to send as the multipart `file` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }
}

/// Optional request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Query-string parameters, URL-encoded by the gateway.
    Query(Vec<(String, String)>),
    Attachment(Attachment),
}

/// A single call against the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub endpoint: Endpoint,
    pub method: Method,
    pub body: Option<RequestBody>,
}

impl Request {
    pub fn get(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            method: Method::Get,
            body: None,
        }
    }

    pub fn post(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            method: Method::Post,
            body: None,
        }
    }

    /// Append a query parameter, replacing any non-query body.
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        let pair = (key.to_string(), value.to_string());
        match &mut self.body {
            Some(RequestBody::Query(params)) => params.push(pair),
            _ => self.body = Some(RequestBody::Query(vec![pair])),
        }
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.body = Some(RequestBody::Attachment(attachment));
        self
    }
}

/// A successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The response declared itself as JSON.
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Look up a top-level field of a JSON object payload.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.as_json().and_then(|value| value.get(key))
    }

    /// Convert into a JSON value; text becomes a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }
}

/// Outbound access to the document-QA service.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Issue exactly one request. Never retries.
    async fn call(&self, request: Request) -> GatewayResult<Payload>;
}
