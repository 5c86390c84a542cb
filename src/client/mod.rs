//! HTTP client for the VictoriaMetrics Cloud REST API.
//!
//! One [`VmCloudClient`] is built by the provider's configure step and shared
//! by every resource and data source. Each operation lives in a submodule
//! grouped by API area; this module holds the request pipeline:
//!
//! - authentication via the `X-VM-Cloud-Access` header
//! - retries with exponential backoff for transport errors, timeouts,
//!   HTTP 429 and HTTP 502-504; a `POST` may already have created the object,
//!   so it is repeated only on HTTP 429 or when the connection never opened
//! - mapping of non-success statuses into [`ProviderError`]
//!
//! Successful response bodies are never logged. Error bodies are truncated
//! before they reach logs or diagnostics.

mod access_tokens;
mod catalog;
mod deployments;
pub mod models;
mod rule_files;

use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::ResolvedConfig;
use crate::error::ProviderError;

/// Header carrying the API key.
pub const AUTH_HEADER: &str = "X-VM-Cloud-Access";

const API_PREFIX: &str = "/api/v1";

/// Upper bound for a server-provided `Retry-After`.
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Upper bound for computed backoff.
const MAX_BACKOFF_MS: u64 = 10_000;

/// Maximum number of characters of an error body kept for logs and diagnostics.
const TRUNCATE_LIMIT: usize = 256;

/// Client for the VictoriaMetrics Cloud API.
#[derive(Debug, Clone)]
pub struct VmCloudClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

enum Payload {
    Empty,
    Json(Vec<u8>),
    Text(String),
}

/// A failed attempt and whether it is worth repeating.
struct Failure {
    error: ProviderError,
    retryable: bool,
    retry_after: Option<u64>,
}

impl VmCloudClient {
    /// Build a client from resolved provider configuration.
    pub fn new(config: &ResolvedConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.options.timeout)
            .user_agent(concat!(
                "terraform-provider-vmcloud/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.options.max_retries,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let body = self.execute(Method::GET, path, Payload::Empty).await?;
        parse_json(&body)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let payload = Payload::Json(serde_json::to_vec(body)?);
        let body = self.execute(method, path, payload).await?;
        parse_json(&body)
    }

    async fn get_text(&self, path: &str) -> Result<String, ProviderError> {
        self.execute(Method::GET, path, Payload::Empty).await
    }

    async fn send_text(&self, method: Method, path: &str, text: &str) -> Result<(), ProviderError> {
        self.execute(method, path, Payload::Text(text.to_string()))
            .await
            .map(|_| ())
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.execute(Method::DELETE, path, Payload::Empty)
            .await
            .map(|_| ())
    }

    /// Run a request with retries, returning the response body on success.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<String, ProviderError> {
        let url = self.endpoint(path);
        let mut attempt = 0;

        loop {
            match self.send_once(&method, &url, &payload).await {
                Ok(body) => return Ok(body),
                Err(failure) if failure.retryable && attempt < self.max_retries => {
                    let delay = retry_delay(failure.retry_after, attempt);
                    warn!(
                        method = %method,
                        path,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure.error,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        payload: &Payload,
    ) -> Result<String, Failure> {
        debug!(method = %method, url, "Sending API request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTH_HEADER, &self.api_key)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        request = match payload {
            Payload::Empty => request,
            Payload::Json(bytes) => request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(bytes.clone()),
            Payload::Text(text) => request
                .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
                .body(text.clone()),
        };

        let idempotent = is_idempotent(method);
        let response = request.send().await.map_err(|e| Failure {
            retryable: e.is_connect() || (idempotent && !e.is_builder()),
            error: e.into(),
            retry_after: None,
        })?;

        let status = response.status().as_u16();
        debug!(method = %method, url, status, "API response received");

        if response.status().is_success() {
            return response.text().await.map_err(|e| Failure {
                retryable: false,
                error: ProviderError::Unavailable(format!("failed to read response body: {}", e)),
                retry_after: None,
            });
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        let body = truncate_for_log(body.trim());

        if status == 404 {
            debug!(method = %method, url, "API returned not found");
        } else {
            warn!(method = %method, url, status, body = %body, "API request failed");
        }

        Err(Failure {
            error: ProviderError::from_status(status, &body),
            retryable: status == 429 || (idempotent && (502..=504).contains(&status)),
            retry_after,
        })
    }
}

/// Whether repeating `method` after an ambiguous failure is safe.
fn is_idempotent(method: &Method) -> bool {
    *method != Method::POST
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "Failed to parse API response");
        ProviderError::Sdk(format!("failed to parse API response: {}", e))
    })
}

fn retry_delay(retry_after: Option<u64>, attempt: u32) -> Duration {
    match retry_after {
        Some(secs) => Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)),
        None => backoff_delay(attempt),
    }
}

/// 100ms, 200ms, 400ms, ... capped at 10s.
fn backoff_delay(attempt: u32) -> Duration {
    let shift = attempt.min(20);
    let delay_ms = 100_u64.saturating_mul(1_u64 << shift);
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}

/// Truncate a string for safe logging.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        return s.to_string();
    }
    let mut end = TRUNCATE_LIMIT;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated, total {} bytes]", &s[..end], s.len())
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}
