//! VictoriaMetrics Cloud provider
//!
//! An infrastructure-as-code provider plugin that manages VictoriaMetrics
//! Cloud deployments, their access tokens and their alerting/recording rule
//! files through the vendor REST API.
//!
//! # Overview
//!
//! - **Resources**: `victoriametricscloud_deployment`,
//!   `victoriametricscloud_access_token`, `victoriametricscloud_rule_file`
//! - **Data sources**: `victoriametricscloud_cloud_providers`,
//!   `victoriametricscloud_regions`, `victoriametricscloud_tiers`,
//!   `victoriametricscloud_deployment`, `victoriametricscloud_deployments`
//!
//! The host launches the binary, reads the handshake line from stdout and
//! talks to the provider over gRPC. Values are exchanged as JSON; failures
//! travel back as diagnostics.
//!
//! # Handshake Protocol
//!
//! ```text
//! 1|1|tcp|127.0.0.1:50051|grpc
//! ```
//!
//! Format: `<core_version>|<protocol_version>|tcp|<address>|grpc`
//!
//! # Configuration
//!
//! The provider block accepts `api_key` and `base_url`. Each falls back to
//! `VMCLOUD_API_KEY` / `VMCLOUD_BASE_URL`; see [`config`].
//!
//! # Quick Start
//!
//! ```ignore
//! use vmcloud_provider::{init_logging, serve, VmCloudProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(VmCloudProvider::new()).await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use client::VmCloudClient;
pub use config::{ClientOptions, ProviderConfig};
pub use error::ProviderError;
pub use logging::{init_logging, try_init_logging};
pub use provider::VmCloudProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    handshake_line, AttributeChange, ImportedResource, PlanResult, ProviderMetadata,
    ServerCapabilities, CORE_PROTOCOL_VERSION, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
