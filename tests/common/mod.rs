//! Shared harness for driving the provider against a mock VictoriaMetrics
//! Cloud API.
//!
//! `ProviderHarness` calls the `ProviderService` methods directly, without a
//! gRPC server, and turns error diagnostics into `TestError`.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use vmcloud_provider::schema::{Diagnostic, DiagnosticSeverity};
use vmcloud_provider::{
    ClientOptions, ImportedResource, PlanResult, ProviderError, ProviderService, VmCloudProvider,
};
use wiremock::MockServer;

pub const API_KEY: &str = "test-key";

/// A provider wired to a wiremock server.
pub struct ProviderHarness {
    provider: VmCloudProvider,
    pub server: MockServer,
}

impl ProviderHarness {
    /// Start a mock server and configure the provider against it.
    pub async fn start() -> Self {
        let harness = Self::unconfigured().await;
        harness
            .configure(json!({"api_key": API_KEY, "base_url": harness.server.uri()}))
            .await
            .expect("configure against mock server");
        harness
    }

    /// Start a mock server without configuring the provider.
    pub async fn unconfigured() -> Self {
        let server = MockServer::start().await;
        let provider = VmCloudProvider::new()
            .with_env(|_| None)
            .with_client_options(ClientOptions {
                timeout: Duration::from_secs(5),
                max_retries: 2,
            });
        Self { provider, server }
    }

    pub fn provider(&self) -> &VmCloudProvider {
        &self.provider
    }

    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan a resource update where the configuration is the proposed state.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    pub async fn create(&self, resource_type: &str, planned: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned).await
    }

    pub async fn read(
        &self,
        resource_type: &str,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current).await
    }

    pub async fn update(
        &self,
        resource_type: &str,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior, planned).await
    }

    pub async fn delete(&self, resource_type: &str, current: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current).await
    }

    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Plan a create, apply it, then read it back.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }
}

/// Error type for harness operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    Diagnostics(Vec<Diagnostic>),
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

impl TestError {
    /// Error diagnostics, or an empty slice for a provider error.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TestError::Diagnostics(diags) => diags,
            TestError::Provider(_) => &[],
        }
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// A deployment as returned by list, create and update calls.
pub fn deployment_info(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": "single_node",
        "cloud_provider": "aws",
        "region": "us-east-2",
        "tier": 21,
        "version": "v1.102.0",
        "status": "running",
        "created_at": "2025-01-02T03:04:05.678Z",
        "access_endpoint": "https://gw-c15-1c.cloud.victoriametrics.com"
    })
}

/// A deployment as returned by the details endpoint.
pub fn deployment_details(id: &str, name: &str) -> Value {
    let mut details = deployment_info(id, name);
    let extra = json!({
        "storage_size_gb": 2048,
        "retention_value": 30,
        "retention_unit": "d",
        "deduplication_value": 10,
        "deduplication_unit": "s",
        "maintenance_window": "Sat-Sun 3-4am",
        "price": {"compute_cost": 190.0, "storage_cost": 10.5, "total_cost": 200.5}
    });
    if let (Some(target), Some(source)) = (details.as_object_mut(), extra.as_object()) {
        target.extend(source.clone());
    }
    details
}

/// Configuration of a deployment resource.
pub fn deployment_config(name: &str) -> Value {
    json!({
        "name": name,
        "type": "single_node",
        "cloud_provider": "aws",
        "region": "us-east-2",
        "tier": 21,
        "storage_size": 2,
        "storage_size_unit": "TB",
        "retention": 30,
        "retention_unit": "d",
        "deduplication": 10,
        "deduplication_unit": "s",
        "maintenance_window": "Sat-Sun 3-4am"
    })
}

/// An access token as returned by create and reveal.
pub fn access_token(id: &str) -> Value {
    json!({
        "id": id,
        "type": "rw",
        "description": "ci token",
        "tenant_id": "",
        "secret": "s3cr3t",
        "created_by": "ops@example.com",
        "created_at": "2025-03-04T05:06:07Z",
        "last_used_at": null
    })
}

pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Panics unless exactly the given attribute paths change.
pub fn assert_plan_changes_only(plan: &PlanResult, paths: &[&str]) {
    let mut changed: Vec<&str> = plan.changes.iter().map(|c| c.path.as_str()).collect();
    changed.sort();
    let mut expected = paths.to_vec();
    expected.sort();
    assert_eq!(changed, expected, "unexpected set of changed attributes");
}
