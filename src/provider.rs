//! The VictoriaMetrics Cloud provider.
//!
//! [`VmCloudProvider`] owns the resource and data source registries and the
//! API client created by `Configure`. Every resource and data source shares
//! that single client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::VmCloudClient;
use crate::config::{provider_schema, ClientOptions, ProviderConfig};
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::plan;
use crate::resources::{self, Resource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Provider type name; resource and data source names are prefixed with it.
pub const TYPE_NAME: &str = "victoriametricscloud";

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Provider implementation served over the plugin protocol.
pub struct VmCloudProvider {
    client: RwLock<Option<Arc<VmCloudClient>>>,
    resources: HashMap<&'static str, Box<dyn Resource>>,
    data_sources: HashMap<&'static str, Box<dyn DataSource>>,
    env: Box<EnvLookup>,
    options: ClientOptions,
}

impl Default for VmCloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VmCloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut resources: Vec<_> = self.resources.keys().collect();
        resources.sort();
        let mut data_sources: Vec<_> = self.data_sources.keys().collect();
        data_sources.sort();
        f.debug_struct("VmCloudProvider")
            .field("resources", &resources)
            .field("data_sources", &data_sources)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl VmCloudProvider {
    /// Create a provider reading fallbacks from the process environment.
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            env: Box::new(|name| std::env::var(name).ok()),
            options: ClientOptions::default(),
        }
    }

    /// Replace the environment lookup used during `Configure`.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    /// Override HTTP client timeout and retry settings.
    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// True once `Configure` has produced a client.
    pub async fn is_configured(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn client(&self) -> Result<Arc<VmCloudClient>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "provider is not configured; Configure must succeed before resources are used"
                    .to_string(),
            )
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|d| d.as_ref())
            .ok_or_else(|| {
                ProviderError::UnknownResource(format!("data source {}", data_source_type))
            })
    }
}

#[async_trait]
impl ProviderService for VmCloudProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(provider_schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(*name, resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(*name, data_source.schema());
        }
        schema
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&provider_schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = ProviderConfig::from_value(config)?;
        let mut resolved = match config.resolve(|name| (self.env)(name)) {
            Ok(resolved) => resolved,
            Err(diagnostic) => return Ok(vec![diagnostic]),
        };
        resolved.options = self.options;

        let client = match VmCloudClient::new(&resolved) {
            Ok(client) => client,
            Err(e) => {
                return Ok(vec![Diagnostic::error(
                    "Unable to Create VictoriaMetrics Cloud API Client",
                )
                .with_detail(format!(
                    "An unexpected error occurred when creating the VictoriaMetrics Cloud API client: {}",
                    e
                ))]);
            }
        };

        *self.client.write().await = Some(Arc::new(client));
        info!(base_url = %resolved.base_url, "Configured VictoriaMetrics Cloud client");
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        debug!("Released API client");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        Ok(validate(&resource.schema(), &config))
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let schema = self.resource(resource_type)?.schema();
        if version > schema.version as i64 {
            return Err(ProviderError::FailedPrecondition(format!(
                "state of {} was written by a newer provider (schema version {}, supported {})",
                resource_type, version, schema.version
            )));
        }
        // Every resource is still at its first schema version.
        Ok(state)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource(resource_type)?.schema();
        Ok(plan::plan(
            &schema,
            prior_state.as_ref(),
            &proposed_state,
            &config,
        ))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.create(&client, planned_state).await
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.read(&client, current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.update(&client, prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.delete(&client, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let state = resource.import_state(id)?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        Ok(validate(&data_source.schema(), &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(&client, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> VmCloudProvider {
        VmCloudProvider::new().with_env(|_| None)
    }

    #[test]
    fn test_schema_lists_everything() {
        let schema = provider().schema();
        assert_eq!(schema.resources.len(), 3);
        assert_eq!(schema.data_sources.len(), 5);
        assert!(schema.resources.contains_key("victoriametricscloud_deployment"));
        assert!(schema
            .data_sources
            .contains_key("victoriametricscloud_deployment"));
        assert!(schema.provider.attribute("api_key").is_some());
    }

    #[test]
    fn test_names_carry_provider_prefix() {
        let metadata = provider().metadata();
        for name in metadata.resources.iter().chain(&metadata.data_sources) {
            assert!(name.starts_with(&format!("{}_", TYPE_NAME)), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_configure_missing_key() {
        let provider = provider();
        let diagnostics = provider.configure(json!({})).await.unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Missing API Key Configuration");
        assert!(!provider.is_configured().await);
    }

    #[tokio::test]
    async fn test_configure_from_env() {
        let provider = VmCloudProvider::new().with_env(|name| match name {
            "VMCLOUD_API_KEY" => Some("env-key".to_string()),
            _ => None,
        });
        let diagnostics = provider.configure(Value::Null).await.unwrap();
        assert!(diagnostics.is_empty());
        assert!(provider.is_configured().await);

        provider.stop().await.unwrap();
        assert!(!provider.is_configured().await);
    }

    #[tokio::test]
    async fn test_operations_require_configure() {
        let provider = provider();
        let err = provider
            .read_data_source("victoriametricscloud_tiers", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let provider = provider();
        let err = provider
            .validate_resource_config("victoriametricscloud_nope", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = provider
            .read_data_source("victoriametricscloud_nope", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_validate_resource_config_reports_missing_fields() {
        let diagnostics = provider()
            .validate_resource_config(
                "victoriametricscloud_rule_file",
                json!({"deployment_id": "dep-1", "file_name": "alerts.yml"}),
            )
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("content"));
    }

    #[tokio::test]
    async fn test_upgrade_rejects_newer_state() {
        let provider = provider();
        let state = json!({"id": "dep-1"});
        let upgraded = provider
            .upgrade_resource_state("victoriametricscloud_deployment", 0, state.clone())
            .await
            .unwrap();
        assert_eq!(upgraded, state);

        let err = provider
            .upgrade_resource_state("victoriametricscloud_deployment", 3, state)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_plan_access_token_change_replaces() {
        let prior = json!({
            "id": "tok-1",
            "deployment_id": "dep-1",
            "type": "r",
            "description": "ci",
            "tenant_id": null,
            "secret": "s3cr3t",
            "created_by": "ops@example.com",
            "created_at": "2025-01-01T00:00:00Z",
            "last_used_at": null
        });
        let proposed = json!({
            "deployment_id": "dep-1",
            "type": "rw",
            "description": "ci"
        });
        let result = provider()
            .plan(
                "victoriametricscloud_access_token",
                Some(prior),
                proposed.clone(),
                proposed,
            )
            .await
            .unwrap();
        assert!(result.requires_replace);
        assert!(result.planned_state["secret"].is_null());
    }

    #[tokio::test]
    async fn test_import_through_provider() {
        let imported = provider()
            .import_resource("victoriametricscloud_rule_file", "dep-1/alerts.yml")
            .await
            .unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, "victoriametricscloud_rule_file");
        assert_eq!(imported[0].state["file_name"], "alerts.yml");
    }
}
