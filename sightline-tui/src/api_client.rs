//! REST client for query execution and streamed identity resolution.

use crate::config::{AuthConfig, TuiConfig};
use crate::events::TuiEvent;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use sightline_core::{IdentityBatch, QueryResult, ResolutionRequest};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Query failed: {}", .0.message)]
    Query(QueryFailure),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(String),
}

// ============================================================================
// WIRE TYPES
// ============================================================================

/// Upstream query failure, shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub message: String,
    #[serde(default)]
    pub details: Vec<FailureDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub position: Option<SourcePosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl QueryFailure {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

impl From<ApiClientError> for QueryFailure {
    fn from(err: ApiClientError) -> Self {
        match err {
            ApiClientError::Query(failure) => failure,
            other => QueryFailure::from_message(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    scope: &'a str,
}

#[derive(Debug, Serialize)]
struct ResolveBody<'a> {
    identifiers: &'a [String],
}

// ============================================================================
// NDJSON DECODING
// ============================================================================

/// Splits a byte stream into newline-delimited JSON batches.
#[derive(Debug, Default)]
pub struct BatchDecoder {
    buffer: Vec<u8>,
}

impl BatchDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every complete line decoded so far.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<IdentityBatch, serde_json::Error>> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(batch) = decode_line(&line) {
                out.push(batch);
            }
        }
        out
    }

    /// Decode whatever is left after the stream ends without a trailing newline.
    pub fn finish(&mut self) -> Option<Result<IdentityBatch, serde_json::Error>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }
}

fn decode_line(line: &[u8]) -> Option<Result<IdentityBatch, serde_json::Error>> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_slice(trimmed))
}

// ============================================================================
// REST CLIENT
// ============================================================================

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl RestClient {
    pub fn new(config: &TuiConfig) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let auth_header = build_auth_headers(&config.auth)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    pub async fn run_query(&self, text: &str, scope: &str) -> Result<QueryResult, ApiClientError> {
        let body = QueryRequest { query: text, scope };
        self.post_json("/api/v1/query", &body).await
    }

    /// Stream identity batches for `request` into `sender`.
    ///
    /// Always ends the operation: a stream that closes without a final batch
    /// gets a synthetic empty final batch, and a broken stream is reported as
    /// [`TuiEvent::ResolutionFailed`].
    pub async fn resolve_identities(
        &self,
        request: &ResolutionRequest,
        sender: &mpsc::Sender<TuiEvent>,
    ) -> Result<(), ApiClientError> {
        let url = format!("{}/api/v1/identities/resolve", self.base_url);
        let response = self
            .client
            .post(url)
            .headers(self.auth_header.clone())
            .json(&ResolveBody {
                identifiers: &request.identifiers,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(error_from_body(status, &text));
        }

        let mut decoder = BatchDecoder::new();
        let mut stream = std::pin::pin!(response.bytes_stream());
        let mut saw_final = false;
        while let Some(chunk) = stream.next().await {
            for batch in decoder.push(&chunk?) {
                saw_final |= forward(request, batch, sender).await;
            }
        }
        if let Some(batch) = decoder.finish() {
            saw_final |= forward(request, batch, sender).await;
        }
        if !saw_final {
            debug!(operation_id = %request.operation, "stream ended without final batch");
            send_batch(request, IdentityBatch::last(Vec::new()), sender).await;
        }
        Ok(())
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiClientError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(url)
            .headers(self.auth_header.clone())
            .json(body)
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let text = response.text().await?;
            Err(error_from_body(status, &text))
        }
    }
}

fn error_from_body(status: reqwest::StatusCode, text: &str) -> ApiClientError {
    if let Ok(failure) = serde_json::from_str::<QueryFailure>(text) {
        return ApiClientError::Query(failure);
    }
    ApiClientError::InvalidResponse(format!("HTTP {}: {}", status.as_u16(), text))
}

/// Send one decoded line; returns whether it was the final batch.
async fn forward(
    request: &ResolutionRequest,
    decoded: Result<IdentityBatch, serde_json::Error>,
    sender: &mpsc::Sender<TuiEvent>,
) -> bool {
    match decoded {
        Ok(batch) => {
            let is_final = batch.is_final;
            send_batch(request, batch, sender).await;
            is_final
        }
        Err(err) => {
            warn!(operation_id = %request.operation, error = %err, "skipping malformed batch");
            false
        }
    }
}

async fn send_batch(request: &ResolutionRequest, batch: IdentityBatch, sender: &mpsc::Sender<TuiEvent>) {
    let _ = sender
        .send(TuiEvent::ResolutionBatch {
            operation: request.operation,
            generation: request.generation,
            batch,
        })
        .await;
}

pub fn build_auth_headers(auth: &AuthConfig) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    if let Some(jwt) = &auth.jwt {
        let value = format!("Bearer {}", jwt);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    Ok(headers)
}
