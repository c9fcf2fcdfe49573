//! HTTP implementation of the gateway.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use super::{
    Attachment, Endpoint, Failure, Gateway, GatewayResult, Method, Payload, Request, RequestBody,
};
use crate::notify::NotificationSink;

/// HTTP client for the document-QA service.
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
    sink: Arc<dyn NotificationSink>,
}

impl HttpGateway {
    pub fn new(base_url: &str, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            sink,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint, body: Option<&RequestBody>) -> String {
        let mut url = format!("{}{}", self.base_url, endpoint.path());
        if let Some(RequestBody::Query(params)) = body {
            let query = params
                .iter()
                .map(|(key, value)| {
                    format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
                })
                .collect::<Vec<_>>()
                .join("&");
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            }
        }
        url
    }

    async fn send(&self, request: Request) -> GatewayResult<Payload> {
        let url = self.url(request.endpoint, request.body.as_ref());
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .header(ACCEPT, "application/json");

        let builder = match request.body {
            None | Some(RequestBody::Query(_)) => builder,
            Some(RequestBody::Attachment(attachment)) => builder.multipart(file_form(attachment)?),
        };

        debug!(endpoint = %request.endpoint, %url, "sending request");
        let response = builder
            .send()
            .await
            .map_err(|err| Failure::transport(format!("Request to {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Failure::from_response(status.as_u16(), &body));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| content_type.contains("application/json"));
        let body = response.text().await.map_err(|err| {
            Failure::transport(format!("Reading {} response failed: {err}", request.endpoint))
        })?;
        debug!(endpoint = %request.endpoint, status = status.as_u16(), is_json, "received response");

        if is_json {
            serde_json::from_str(&body).map(Payload::Json).map_err(|err| Failure {
                message: format!("Invalid JSON from {}: {err}", request.endpoint),
                status: Some(status.as_u16()),
            })
        } else {
            Ok(Payload::Text(body))
        }
    }
}

fn file_form(attachment: Attachment) -> GatewayResult<Form> {
    let part = Part::bytes(attachment.bytes)
        .file_name(attachment.file_name)
        .mime_str(&attachment.mime)
        .map_err(|err| Failure::transport(format!("Invalid attachment type: {err}")))?;
    Ok(Form::new().part("file", part))
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn call(&self, request: Request) -> GatewayResult<Payload> {
        let endpoint = request.endpoint;
        self.send(request).await.inspect_err(|failure| {
            debug!(%endpoint, status = ?failure.status, "request failed: {failure}");
            self.sink.error(&failure.message);
        })
    }
}
