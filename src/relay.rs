use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;

use crate::config::Config;
use crate::domains::chat::{ChatRequest, UpstreamRequest};
use crate::error::{NayaError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared, read-only relay state. Cloned per request.
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
}

impl RelayState {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(config.idle_timeout())
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

pub(crate) fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

pub async fn naya_chat(State(state): State<RelayState>, body: Bytes) -> Response {
    match relay_chat(&state, &body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "naya-chat request failed");
            let detail = err.detail();
            let message = if detail.trim().is_empty() {
                state.config.messages.unknown_error.clone()
            } else {
                detail
            };
            json_error(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

#[tracing::instrument(skip_all, fields(body_len = body.len()))]
async fn relay_chat(state: &RelayState, body: &[u8]) -> Result<Response> {
    let request: ChatRequest = serde_json::from_slice(body)?;
    if request.messages.is_empty() {
        return Err(NayaError::Serialization(
            "messages must contain at least one message".to_string(),
        ));
    }

    let config = &state.config;
    let api_key = config.gateway.api_key()?;
    let payload = UpstreamRequest::with_system_prompt(
        &config.gateway.model,
        &config.persona.system_prompt,
        &request.messages,
    );
    tracing::debug!(
        messages = request.messages.len(),
        model = %config.gateway.model,
        "forwarding conversation to gateway"
    );

    let upstream = state
        .http
        .post(&config.gateway.endpoint)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await
        .map_err(|e| NayaError::Http(format!("gateway request failed: {e}")))?;

    let status = upstream.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!("gateway rate limited the request");
        return Ok(json_error(
            StatusCode::TOO_MANY_REQUESTS,
            config.messages.rate_limited.clone(),
        ));
    }
    if status == StatusCode::PAYMENT_REQUIRED {
        tracing::warn!("gateway quota exhausted");
        return Ok(json_error(
            StatusCode::PAYMENT_REQUIRED,
            config.messages.quota_exceeded.clone(),
        ));
    }
    if !status.is_success() {
        let text = upstream.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %text, "AI gateway error");
        return Ok(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            config.messages.upstream_failure.clone(),
        ));
    }

    let mut chunks = upstream.bytes_stream();
    let stream = async_stream::stream! {
        let mut forwarded = 0usize;
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => {
                    forwarded += bytes.len();
                    yield Ok(bytes);
                }
                Err(err) => {
                    tracing::warn!(error = %err, forwarded, "gateway stream broke mid-response");
                    yield Err(err);
                    break;
                }
            }
        }
        tracing::debug!(forwarded, "gateway stream closed");
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn json_error_has_error_field() {
        let response = json_error(StatusCode::PAYMENT_REQUIRED, "Service temporairement indisponible.");
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Service temporairement indisponible.");
    }

    #[tokio::test]
    async fn malformed_body_is_a_server_error() {
        let state = RelayState::new(Config::convention_defaults()).unwrap();
        let response = naya_chat(State(state), Bytes::from_static(b"not json")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(!value["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn relay_requests_run_inside_a_timed_span() {
        let (_guard, captured) = crate::logging::capture::span_closes();
        let state = RelayState::new(Config::convention_defaults()).unwrap();
        let _ = naya_chat(State(state), Bytes::from_static(b"not json")).await;

        let output = captured.contents();
        assert!(output.contains("relay_chat"), "{output}");
        assert!(output.contains("time.busy"), "{output}");
    }
}
