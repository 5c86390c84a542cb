//! Logging setup for the provider binary.
//!
//! All logs are written to **stderr**; stdout carries only the handshake line.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: full `EnvFilter` directives (e.g. `vmcloud_provider=debug`)
//! - `TF_LOG`: host log level (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`),
//!   used when `RUST_LOG` is not set
//!
//! Without either variable the filter defaults to `info`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

/// Initialize the global logging subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    registry_with_filter(filter_from_env()).init();
}

/// Try to initialize logging, returning false if already initialized.
pub fn try_init_logging() -> bool {
    registry_with_filter(filter_from_env()).try_init().is_ok()
}

fn registry_with_filter(
    filter: EnvFilter,
) -> impl tracing_subscriber::util::SubscriberInitExt {
    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

fn filter_from_env() -> EnvFilter {
    let rust_log = std::env::var("RUST_LOG").ok();
    let tf_log = std::env::var("TF_LOG").ok();
    EnvFilter::try_new(filter_directive(rust_log.as_deref(), tf_log.as_deref()))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Pick the filter directive from `RUST_LOG`, then `TF_LOG`, then the default.
fn filter_directive(rust_log: Option<&str>, tf_log: Option<&str>) -> String {
    if let Some(directive) = rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        return directive.to_string();
    }
    match tf_log.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some(level @ ("trace" | "debug" | "info" | "warn" | "error")) => level.to_string(),
        // TF_LOG=JSON and other truthy values mean "log everything".
        Some("json") | Some("1") | Some("true") => "trace".to_string(),
        _ => DEFAULT_LEVEL.to_string(),
    }
}
