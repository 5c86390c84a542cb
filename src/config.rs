//! Provider configuration.
//!
//! Values set in the provider block win; otherwise `VMCLOUD_API_KEY` and
//! `VMCLOUD_BASE_URL` are consulted.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::schema::{Attribute, Diagnostic, Schema};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "VMCLOUD_API_KEY";

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "VMCLOUD_BASE_URL";

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.victoriametrics.cloud";

/// The provider block as sent by the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// API key; null when not set in configuration.
    #[serde(default)]
    pub api_key: Option<String>,
    /// API base URL; null when not set in configuration.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Fully resolved settings used to build the API client.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// API key sent with every request.
    pub api_key: String,
    /// API base URL.
    pub base_url: Url,
    /// Client behaviour.
    pub options: ClientOptions,
}

/// Tunables for the HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Schema of the provider configuration block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Provider for managing VictoriaMetrics Cloud resources.")
        .with_attribute(
            "api_key",
            Attribute::optional_string()
                .sensitive()
                .with_description(
                    "API key for VictoriaMetrics Cloud authentication. Can also be set via VMCLOUD_API_KEY environment variable.",
                ),
        )
        .with_attribute(
            "base_url",
            Attribute::optional_string().with_description(
                "Base URL for VictoriaMetrics Cloud API. Defaults to https://api.victoriametrics.cloud. Can also be set via VMCLOUD_BASE_URL environment variable.",
            ),
        )
}

impl ProviderConfig {
    /// Parse the host-supplied configuration. `null` is treated as empty.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }

    /// Resolve configuration, looking up fallbacks with `env`.
    ///
    /// An attribute set in configuration always wins, even when empty.
    pub fn resolve<F>(&self, env: F) -> Result<ResolvedConfig, Diagnostic>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = match &self.api_key {
            Some(key) => key.clone(),
            None => env(API_KEY_ENV).unwrap_or_default(),
        };
        if api_key.is_empty() {
            return Err(Diagnostic::error("Missing API Key Configuration")
                .with_detail(
                    "While configuring the provider, the API key was not found in \
                     the VMCLOUD_API_KEY environment variable or provider \
                     configuration block api_key attribute.",
                )
                .with_attribute("api_key"));
        }

        let base_url = match &self.base_url {
            Some(url) => url.clone(),
            None => env(BASE_URL_ENV).unwrap_or_default(),
        };
        let base_url = if base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url
        };
        let base_url = Url::parse(&base_url).map_err(|e| {
            Diagnostic::error("Unable to Create VictoriaMetrics Cloud API Client")
                .with_detail(format!(
                    "An unexpected error occurred when creating the VictoriaMetrics Cloud API client: invalid base URL {:?}: {}",
                    base_url, e
                ))
                .with_attribute("base_url")
        })?;

        Ok(ResolvedConfig {
            api_key,
            base_url,
            options: ClientOptions::default(),
        })
    }
}
