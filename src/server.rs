//! gRPC server for the provider plugin protocol.
//!
//! [`ProviderService`] is the JSON-level interface the provider implements;
//! `ProviderGrpcService` adapts it to the generated `provider.v1.Provider`
//! service. Provider errors never surface as gRPC statuses: they are turned
//! into error diagnostics in the response.
//!
//! # Signal Handling
//!
//! On SIGTERM or SIGINT the server stops accepting connections and waits up
//! to [`ServeOptions::shutdown_timeout`] for in-flight requests before the
//! provider's `stop()` is called.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated;
use crate::schema::{Block, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{handshake_line, ImportedResource, PlanResult, ProviderMetadata};

/// Interface implemented by the provider, expressed in JSON values.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Schemas of the provider configuration, resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Resource and data source names; derived from the schema by default.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        resources.sort();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
            capabilities: Default::default(),
        }
    }

    /// Validate the provider configuration block.
    async fn validate_provider_config(&self, config: Value)
        -> Result<Vec<Diagnostic>, ProviderError>;

    /// Configure the provider; error diagnostics leave it unconfigured.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release resources before the process exits.
    async fn stop(&self) -> Result<(), ProviderError>;

    /// Validate a resource configuration.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Migrate state written under an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError>;

    /// Compute the planned state. A null `proposed_state` plans destruction.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource.
    async fn create(&self, resource_type: &str, planned_state: Value)
        -> Result<Value, ProviderError>;

    /// Refresh a resource; `None` means it no longer exists.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update a resource in place.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import an existing remote object by id.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError>;

    /// Validate a data source configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Read a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError>;
}

/// Adapter from [`ProviderService`] to the generated gRPC trait.
pub(crate) struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

impl<P: ProviderService> ProviderGrpcService<P> {
    pub(crate) fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

/// Parse a JSON value sent by the host. Empty bytes mean `null`.
fn decode(bytes: &[u8], field: &str) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| {
        ProviderError::from(e).with_summary(format!("Invalid JSON in request field {}", field))
    })
}

fn encode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<generated::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| generated::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => generated::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => generated::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

/// Turn a provider error into a single error diagnostic.
///
/// Operation errors keep their summary and carry the cause as detail.
pub(crate) fn error_to_diagnostics(err: ProviderError) -> Vec<generated::Diagnostic> {
    let diagnostic = match err {
        ProviderError::Operation { summary, source } => {
            Diagnostic::error(summary).with_detail(source.to_string())
        }
        other => Diagnostic::error(other.to_string()),
    };
    diagnostics_to_proto(vec![diagnostic])
}

fn log_diagnostics(operation: &str, subject: &str, diagnostics: &[Diagnostic]) {
    if diagnostics.iter().any(Diagnostic::is_error) {
        warn!(
            operation,
            subject,
            diagnostics = diagnostics.len(),
            "Completed with errors"
        );
    } else {
        info!(operation, subject, "Completed successfully");
    }
}

fn schema_to_proto(schema: &Schema) -> generated::Schema {
    generated::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> generated::Block {
    let mut names: Vec<&String> = block.attributes.keys().collect();
    names.sort();
    generated::Block {
        attributes: names
            .into_iter()
            .map(|name| {
                let attr = &block.attributes[name.as_str()];
                generated::Attribute {
                    name: name.clone(),
                    r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                    required: attr.flags.required,
                    optional: attr.flags.optional,
                    computed: attr.flags.computed,
                    sensitive: attr.flags.sensitive,
                    description: attr.description.clone().unwrap_or_default(),
                    force_new: attr.force_new,
                }
            })
            .collect(),
        description: block.description.clone().unwrap_or_default(),
    }
}

#[tonic::async_trait]
impl<P: ProviderService> generated::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: tonic::Request<generated::GetMetadataRequest>,
    ) -> Result<tonic::Response<generated::GetMetadataResponse>, tonic::Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata completed"
        );
        Ok(tonic::Response::new(generated::GetMetadataResponse {
            server_capabilities: Some(generated::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<generated::GetSchemaRequest>,
    ) -> Result<tonic::Response<generated::GetSchemaResponse>, tonic::Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema completed"
        );
        Ok(tonic::Response::new(generated::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<generated::ValidateProviderConfigRequest>,
    ) -> Result<tonic::Response<generated::ValidateProviderConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = async {
            self.provider
                .validate_provider_config(decode(&req.config, "config")?)
                .await
        }
        .await;
        let diagnostics = match result {
            Ok(diagnostics) => {
                log_diagnostics("ValidateProviderConfig", "provider", &diagnostics);
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(error = %e, "ValidateProviderConfig failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(
            generated::ValidateProviderConfigResponse { diagnostics },
        ))
    }

    #[instrument(skip(self, request), name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<generated::ConfigureRequest>,
    ) -> Result<tonic::Response<generated::ConfigureResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = async {
            self.provider
                .configure(decode(&req.config, "config")?)
                .await
        }
        .await;
        let diagnostics = match result {
            Ok(diagnostics) => {
                log_diagnostics("Configure", "provider", &diagnostics);
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(error = %e, "Configure failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(generated::ConfigureResponse {
            diagnostics,
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.stop")]
    async fn stop(
        &self,
        _request: tonic::Request<generated::StopRequest>,
    ) -> Result<tonic::Response<generated::StopResponse>, tonic::Status> {
        info!("Stop called");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            }
        };
        Ok(tonic::Response::new(generated::StopResponse { error }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<generated::ValidateResourceConfigRequest>,
    ) -> Result<tonic::Response<generated::ValidateResourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = async {
            self.provider
                .validate_resource_config(&req.resource_type, decode(&req.config, "config")?)
                .await
        }
        .await;
        let diagnostics = match result {
            Ok(diagnostics) => {
                log_diagnostics("ValidateResourceConfig", &req.resource_type, &diagnostics);
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "ValidateResourceConfig failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(
            generated::ValidateResourceConfigResponse { diagnostics },
        ))
    }

    #[instrument(skip(self, request), name = "grpc.upgrade_resource_state")]
    async fn upgrade_resource_state(
        &self,
        request: tonic::Request<generated::UpgradeResourceStateRequest>,
    ) -> Result<tonic::Response<generated::UpgradeResourceStateResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(resource_type = %req.resource_type, version = req.version, "UpgradeResourceState called");

        let result = async {
            let state = decode(&req.raw_state, "raw_state")?;
            self.provider
                .upgrade_resource_state(&req.resource_type, req.version, state)
                .await
        }
        .await;
        let response = match result {
            Ok(upgraded) => generated::UpgradeResourceStateResponse {
                upgraded_state: encode(&upgraded),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, version = req.version, error = %e, "UpgradeResourceState failed");
                generated::UpgradeResourceStateResponse {
                    upgraded_state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.plan")]
    async fn plan(
        &self,
        request: tonic::Request<generated::PlanRequest>,
    ) -> Result<tonic::Response<generated::PlanResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(resource_type = %req.resource_type, is_create = req.prior_state.is_empty(), "Plan called");

        // A malformed proposed state must not be read as a destroy.
        let result = async {
            let prior_state = Some(decode(&req.prior_state, "prior_state")?).filter(|v| !v.is_null());
            let proposed_state = decode(&req.proposed_state, "proposed_state")?;
            let config = decode(&req.config, "config")?;
            self.provider
                .plan(&req.resource_type, prior_state, proposed_state, config)
                .await
        }
        .await;
        let response = match result {
            Ok(result) => {
                info!(
                    resource_type = %req.resource_type,
                    changes = result.changes.len(),
                    requires_replace = result.requires_replace,
                    "Plan completed"
                );
                generated::PlanResponse {
                    planned_state: encode(&result.planned_state),
                    changes: result.changes.into_iter().map(Into::into).collect(),
                    requires_replace: result.requires_replace,
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Plan failed");
                generated::PlanResponse {
                    planned_state: vec![],
                    changes: vec![],
                    requires_replace: false,
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.create")]
    async fn create(
        &self,
        request: tonic::Request<generated::CreateRequest>,
    ) -> Result<tonic::Response<generated::CreateResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Create called");

        let result = async {
            let planned_state = decode(&req.planned_state, "planned_state")?;
            self.provider.create(&req.resource_type, planned_state).await
        }
        .await;
        let response = match result {
            Ok(state) => {
                info!(resource_type = %req.resource_type, "Create completed successfully");
                generated::CreateResponse {
                    state: encode(&state),
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Create failed");
                generated::CreateResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.read")]
    async fn read(
        &self,
        request: tonic::Request<generated::ReadRequest>,
    ) -> Result<tonic::Response<generated::ReadResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(resource_type = %req.resource_type, "Read called");

        let result = async {
            let current_state = decode(&req.current_state, "current_state")?;
            self.provider.read(&req.resource_type, current_state).await
        }
        .await;
        let response = match result {
            Ok(Some(state)) => generated::ReadResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Ok(None) => {
                info!(resource_type = %req.resource_type, "Resource no longer exists");
                generated::ReadResponse {
                    state: vec![],
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Read failed");
                generated::ReadResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.update")]
    async fn update(
        &self,
        request: tonic::Request<generated::UpdateRequest>,
    ) -> Result<tonic::Response<generated::UpdateResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Update called");

        let result = async {
            let prior_state = decode(&req.prior_state, "prior_state")?;
            let planned_state = decode(&req.planned_state, "planned_state")?;
            self.provider
                .update(&req.resource_type, prior_state, planned_state)
                .await
        }
        .await;
        let response = match result {
            Ok(state) => {
                info!(resource_type = %req.resource_type, "Update completed successfully");
                generated::UpdateResponse {
                    state: encode(&state),
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Update failed");
                generated::UpdateResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.delete")]
    async fn delete(
        &self,
        request: tonic::Request<generated::DeleteRequest>,
    ) -> Result<tonic::Response<generated::DeleteResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Delete called");

        let result = async {
            let current_state = decode(&req.current_state, "current_state")?;
            self.provider.delete(&req.resource_type, current_state).await
        }
        .await;
        let diagnostics = match result {
            Ok(()) => {
                info!(resource_type = %req.resource_type, "Delete completed successfully");
                vec![]
            }
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Delete failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(generated::DeleteResponse { diagnostics }))
    }

    #[instrument(skip(self, request), name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: tonic::Request<generated::ImportResourceStateRequest>,
    ) -> Result<tonic::Response<generated::ImportResourceStateResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, id = %req.id, "ImportResourceState called");

        let response = match self
            .provider
            .import_resource(&req.resource_type, &req.id)
            .await
        {
            Ok(imported) => {
                info!(
                    resource_type = %req.resource_type,
                    id = %req.id,
                    imported_count = imported.len(),
                    "ImportResourceState completed"
                );
                generated::ImportResourceStateResponse {
                    imported: imported.into_iter().map(Into::into).collect(),
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(resource_type = %req.resource_type, id = %req.id, error = %e, "ImportResourceState failed");
                generated::ImportResourceStateResponse {
                    imported: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        request: tonic::Request<generated::ValidateDataSourceConfigRequest>,
    ) -> Result<tonic::Response<generated::ValidateDataSourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = async {
            let config = decode(&req.config, "config")?;
            self.provider
                .validate_data_source_config(&req.data_source_type, config)
                .await
        }
        .await;
        let diagnostics = match result {
            Ok(diagnostics) => {
                log_diagnostics(
                    "ValidateDataSourceConfig",
                    &req.data_source_type,
                    &diagnostics,
                );
                diagnostics_to_proto(diagnostics)
            }
            Err(e) => {
                error!(data_source_type = %req.data_source_type, error = %e, "ValidateDataSourceConfig failed");
                error_to_diagnostics(e)
            }
        };
        Ok(tonic::Response::new(
            generated::ValidateDataSourceConfigResponse { diagnostics },
        ))
    }

    #[instrument(skip(self, request), name = "grpc.read_data_source")]
    async fn read_data_source(
        &self,
        request: tonic::Request<generated::ReadDataSourceRequest>,
    ) -> Result<tonic::Response<generated::ReadDataSourceResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(data_source_type = %req.data_source_type, "ReadDataSource called");

        let result = async {
            let config = decode(&req.config, "config")?;
            self.provider
                .read_data_source(&req.data_source_type, config)
                .await
        }
        .await;
        let response = match result {
            Ok(state) => {
                info!(data_source_type = %req.data_source_type, "ReadDataSource completed successfully");
                generated::ReadDataSourceResponse {
                    state: encode(&state),
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                error!(data_source_type = %req.data_source_type, error = %e, "ReadDataSource failed");
                generated::ReadDataSourceResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            }
        };
        Ok(tonic::Response::new(response))
    }
}

/// Options for running the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Address to listen on. Port 0 picks a free port.
    /// Default: `127.0.0.1:0`.
    pub bind_addr: SocketAddr,
    /// How long in-flight requests may run after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Create new serve options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listen address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for SIGTERM or SIGINT (CTRL+C elsewhere).
///
/// If the handlers cannot be installed this never resolves, so the server
/// keeps running until the host kills it.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!(error = %e, "Failed to install signal handlers");
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received CTRL+C, initiating graceful shutdown"),
            Err(e) => {
                error!(error = %e, "Failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Serve a provider with default options until a shutdown signal arrives.
///
/// Prints the handshake line `1|1|tcp|<addr>|grpc` on stdout once listening.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve a provider with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(options.bind_addr).await?;
    let addr = listener.local_addr()?;

    println!("{}", handshake_line(addr));
    info!(address = %addr, "Provider server starting");

    serve_on_listener(
        provider,
        listener,
        wait_for_shutdown_signal(),
        options.shutdown_timeout,
    )
    .await
}

/// Serve on an already-bound listener until `signal` resolves, then give
/// in-flight requests `shutdown_timeout` to finish and stop the provider.
pub(crate) async fn serve_on_listener<P, S>(
    provider: P,
    listener: TcpListener,
    signal: S,
    shutdown_timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>>
where
    P: ProviderService,
    S: Future<Output = ()> + Send + 'static,
{
    let provider = Arc::new(provider);
    let service = generated::provider_server::ProviderServer::new(ProviderGrpcService::new(
        Arc::clone(&provider),
    ));

    let (drain_tx, drain_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(
        Server::builder()
            .add_service(service)
            .serve_with_incoming_shutdown(
                tokio_stream::wrappers::TcpListenerStream::new(listener),
                async move {
                    let _ = drain_rx.await;
                },
            ),
    );

    // The timeout only starts once shutdown has been requested.
    tokio::select! {
        result = &mut server => {
            result??;
            info!("Server exited");
        }
        _ = signal => {
            let _ = drain_tx.send(());
            match tokio::time::timeout(shutdown_timeout, &mut server).await {
                Ok(result) => {
                    result??;
                    info!("Server shutdown complete");
                }
                Err(_) => {
                    warn!(timeout = ?shutdown_timeout, "Shutdown timeout exceeded, forcing shutdown");
                    server.abort();
                }
            }
        }
    }

    debug!("Calling provider stop()");
    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }

    info!("Provider shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generated::provider_server::Provider;
    use crate::schema::Attribute;
    use crate::types::AttributeChange;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FakeProvider {
        stopped: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl ProviderService for FakeProvider {
        fn schema(&self) -> ProviderSchema {
            ProviderSchema::new().with_resource(
                "fake_thing",
                Schema::v0()
                    .with_attribute("name", Attribute::required_string().with_force_new())
                    .with_attribute("id", Attribute::computed_string()),
            )
        }

        async fn validate_provider_config(
            &self,
            _config: Value,
        ) -> Result<Vec<Diagnostic>, ProviderError> {
            Ok(vec![Diagnostic::warning("deprecated").with_attribute("old")])
        }

        async fn configure(&self, _config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
            Err(ProviderError::Configuration("boom".to_string()))
        }

        async fn stop(&self) -> Result<(), ProviderError> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn validate_resource_config(
            &self,
            _resource_type: &str,
            _config: Value,
        ) -> Result<Vec<Diagnostic>, ProviderError> {
            Ok(vec![])
        }

        async fn upgrade_resource_state(
            &self,
            _resource_type: &str,
            _version: i64,
            state: Value,
        ) -> Result<Value, ProviderError> {
            Ok(state)
        }

        async fn plan(
            &self,
            _resource_type: &str,
            prior_state: Option<Value>,
            proposed_state: Value,
            _config: Value,
        ) -> Result<PlanResult, ProviderError> {
            Ok(PlanResult::with_changes(
                proposed_state,
                vec![AttributeChange::added("name", json!("x"))],
                prior_state.is_some(),
            ))
        }

        async fn create(
            &self,
            _resource_type: &str,
            planned_state: Value,
        ) -> Result<Value, ProviderError> {
            Ok(planned_state)
        }

        async fn read(
            &self,
            _resource_type: &str,
            current_state: Value,
        ) -> Result<Option<Value>, ProviderError> {
            if current_state["id"] == "gone" {
                Ok(None)
            } else {
                Ok(Some(current_state))
            }
        }

        async fn update(
            &self,
            _resource_type: &str,
            _prior_state: Value,
            _planned_state: Value,
        ) -> Result<Value, ProviderError> {
            Err(ProviderError::NotFound("HTTP 404".to_string()).with_summary("Error updating thing"))
        }

        async fn delete(
            &self,
            _resource_type: &str,
            _current_state: Value,
        ) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn import_resource(
            &self,
            resource_type: &str,
            id: &str,
        ) -> Result<Vec<ImportedResource>, ProviderError> {
            Ok(vec![ImportedResource::new(resource_type, json!({"id": id}))])
        }

        async fn validate_data_source_config(
            &self,
            data_source_type: &str,
            _config: Value,
        ) -> Result<Vec<Diagnostic>, ProviderError> {
            Err(ProviderError::UnknownResource(data_source_type.to_string()))
        }

        async fn read_data_source(
            &self,
            _data_source_type: &str,
            config: Value,
        ) -> Result<Value, ProviderError> {
            Ok(json!({"echo": config}))
        }
    }

    fn service() -> ProviderGrpcService<FakeProvider> {
        ProviderGrpcService::new(Arc::new(FakeProvider::default()))
    }

    #[test]
    fn test_operation_error_becomes_summary_and_detail() {
        let err = ProviderError::Unavailable("HTTP 503".to_string())
            .with_summary("Error creating deployment");
        let diagnostics = error_to_diagnostics(err);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Error creating deployment");
        assert_eq!(diagnostics[0].detail, "Service unavailable: HTTP 503");
        assert_eq!(
            diagnostics[0].severity,
            generated::diagnostic::Severity::Error as i32
        );
    }

    #[test]
    fn test_plain_error_becomes_summary() {
        let diagnostics = error_to_diagnostics(ProviderError::Validation("bad".to_string()));
        assert_eq!(diagnostics[0].summary, "Validation error: bad");
        assert!(diagnostics[0].detail.is_empty());
    }

    #[test]
    fn test_schema_to_proto_sorts_attributes() {
        let schema = FakeProvider::default().schema();
        let proto = schema_to_proto(&schema.resources["fake_thing"]);
        let block = proto.block.unwrap();
        let names: Vec<_> = block.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert!(block.attributes[1].force_new);
        assert_eq!(block.attributes[1].r#type, b"\"string\"".to_vec());
    }

    #[test]
    fn test_decode() {
        assert!(decode(&[], "config").unwrap().is_null());
        assert_eq!(decode(b"{\"a\":1}", "config").unwrap(), json!({"a": 1}));

        let err = decode(b"not json", "config").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Invalid JSON in request field config: Serialization error"));
    }

    #[tokio::test]
    async fn test_get_metadata_is_sorted() {
        let response = service()
            .get_metadata(tonic::Request::new(generated::GetMetadataRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.resources, vec!["fake_thing"]);
        assert!(response.data_sources.is_empty());
    }

    #[tokio::test]
    async fn test_configure_error_is_diagnostic() {
        let response = service()
            .configure(tonic::Request::new(generated::ConfigureRequest {
                config: b"{}".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Configuration error: boom");
    }

    #[tokio::test]
    async fn test_validate_provider_config_passes_warnings() {
        let response = service()
            .validate_provider_config(tonic::Request::new(
                generated::ValidateProviderConfigRequest { config: vec![] },
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].severity,
            generated::diagnostic::Severity::Warning as i32
        );
        assert_eq!(response.diagnostics[0].attribute, "old");
    }

    #[tokio::test]
    async fn test_plan_empty_prior_is_create() {
        let response = service()
            .plan(tonic::Request::new(generated::PlanRequest {
                resource_type: "fake_thing".to_string(),
                prior_state: vec![],
                proposed_state: b"{\"name\":\"x\"}".to_vec(),
                config: b"{\"name\":\"x\"}".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(!response.requires_replace);
        assert_eq!(response.changes.len(), 1);
        assert_eq!(response.changes[0].after, b"\"x\"".to_vec());
    }

    #[tokio::test]
    async fn test_plan_truncated_proposed_state_is_error() {
        let response = service()
            .plan(tonic::Request::new(generated::PlanRequest {
                resource_type: "fake_thing".to_string(),
                prior_state: b"{\"id\":\"abc\",\"name\":\"x\"}".to_vec(),
                proposed_state: b"{\"name\": \"x\",".to_vec(),
                config: b"{\"name\":\"x\"}".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.planned_state.is_empty());
        assert!(response.changes.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].summary,
            "Invalid JSON in request field proposed_state"
        );
        assert_eq!(
            response.diagnostics[0].severity,
            generated::diagnostic::Severity::Error as i32
        );
    }

    #[tokio::test]
    async fn test_create_malformed_planned_state_is_error() {
        let response = service()
            .create(tonic::Request::new(generated::CreateRequest {
                resource_type: "fake_thing".to_string(),
                planned_state: b"{".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.state.is_empty());
        assert_eq!(
            response.diagnostics[0].summary,
            "Invalid JSON in request field planned_state"
        );
    }

    #[tokio::test]
    async fn test_read_gone_returns_empty_state() {
        let response = service()
            .read(tonic::Request::new(generated::ReadRequest {
                resource_type: "fake_thing".to_string(),
                current_state: b"{\"id\":\"gone\"}".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.state.is_empty());
        assert!(response.diagnostics.is_empty());

        let response = service()
            .read(tonic::Request::new(generated::ReadRequest {
                resource_type: "fake_thing".to_string(),
                current_state: b"{\"id\":\"here\"}".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(decode(&response.state, "state").unwrap(), json!({"id": "here"}));
    }

    #[tokio::test]
    async fn test_update_failure_keeps_summary() {
        let response = service()
            .update(tonic::Request::new(generated::UpdateRequest {
                resource_type: "fake_thing".to_string(),
                prior_state: b"{}".to_vec(),
                planned_state: b"{}".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.state.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Error updating thing");
        assert_eq!(response.diagnostics[0].detail, "Resource not found: HTTP 404");
    }

    #[tokio::test]
    async fn test_import_resource_state() {
        let response = service()
            .import_resource_state(tonic::Request::new(generated::ImportResourceStateRequest {
                resource_type: "fake_thing".to_string(),
                id: "abc".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.imported.len(), 1);
        assert_eq!(
            decode(&response.imported[0].state, "state").unwrap(),
            json!({"id": "abc"})
        );
    }

    #[tokio::test]
    async fn test_validate_data_source_error_is_diagnostic() {
        let response = service()
            .validate_data_source_config(tonic::Request::new(
                generated::ValidateDataSourceConfigRequest {
                    data_source_type: "nope".to_string(),
                    config: vec![],
                },
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.diagnostics[0].summary, "Unknown resource type: nope");
    }

    #[test]
    fn test_serve_options_builder() {
        let options = ServeOptions::new()
            .with_bind_addr("127.0.0.1:4000".parse().unwrap())
            .with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(options.bind_addr.port(), 4000);
        assert_eq!(options.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(ServeOptions::default().bind_addr.port(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_provider() {
        let stopped = Arc::new(AtomicBool::new(false));
        let provider = FakeProvider {
            stopped: Arc::clone(&stopped),
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        serve_on_listener(
            provider,
            listener,
            async {},
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert!(stopped.load(Ordering::SeqCst));
    }
}
