//! `victoriametricscloud_rule_file` resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{decode_state, encode_state, require, split_import_id, Resource};
use crate::client::VmCloudClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "victoriametricscloud_rule_file";

/// Manages an alerting or recording rule file of a deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleFileResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct RuleFileState {
    id: Option<String>,
    deployment_id: Option<String>,
    file_name: Option<String>,
    content: Option<String>,
}

impl RuleFileState {
    fn location(&self) -> Result<(&str, &str), ProviderError> {
        Ok((
            require(&self.deployment_id, "deployment_id")?,
            require(&self.file_name, "file_name")?,
        ))
    }
}

fn composite_id(deployment_id: &str, file_name: &str) -> String {
    format!("{}/{}", deployment_id, file_name)
}

#[async_trait]
impl Resource for RuleFileResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(
                "Manages an alerting or recording rules file for a VictoriaMetrics Cloud deployment.",
            )
            .with_attribute(
                "id",
                Attribute::computed_string()
                    .with_description("Composite identifier in format 'deployment_id/file_name'.")
                    .with_use_state_for_unknown(),
            )
            .with_attribute(
                "deployment_id",
                Attribute::required_string()
                    .with_description("ID of the deployment this rule file belongs to.")
                    .with_force_new(),
            )
            .with_attribute(
                "file_name",
                Attribute::required_string()
                    .with_description("Name of the rule file (e.g., 'alerting-rules.yaml').")
                    .with_force_new(),
            )
            .with_attribute(
                "content",
                Attribute::required_string()
                    .with_description("YAML content of the alerting or recording rules file."),
            )
    }

    async fn create(&self, client: &VmCloudClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: RuleFileState = decode_state(planned)?;
        let (deployment_id, file_name) = state.location()?;
        let content = require(&state.content, "content")?;

        client
            .create_rule_file_content(deployment_id, file_name, content)
            .await
            .map_err(|e| e.with_summary("Error creating rule file"))?;
        info!(deployment_id = %deployment_id, file_name = %file_name, "Created rule file");

        state.id = Some(composite_id(deployment_id, file_name));
        encode_state(&state)
    }

    async fn read(
        &self,
        client: &VmCloudClient,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: RuleFileState = decode_state(current)?;
        let (deployment_id, file_name) = state.location()?;

        let content = match client.get_rule_file_content(deployment_id, file_name).await {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                warn!(deployment_id = %deployment_id, file_name = %file_name, "Rule file no longer exists, removing from state");
                return Ok(None);
            }
            Err(e) => return Err(e.with_summary("Error Reading Rule File")),
        };
        debug!(deployment_id = %deployment_id, file_name = %file_name, "Refreshed rule file");

        state.id = Some(composite_id(deployment_id, file_name));
        state.content = Some(content);
        encode_state(&state).map(Some)
    }

    async fn update(
        &self,
        client: &VmCloudClient,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let mut state: RuleFileState = decode_state(planned)?;
        let (deployment_id, file_name) = state.location()?;
        let content = require(&state.content, "content")?;

        client
            .update_rule_file_content(deployment_id, file_name, content)
            .await
            .map_err(|e| e.with_summary("Error updating rule file"))?;
        info!(deployment_id = %deployment_id, file_name = %file_name, "Updated rule file");

        state.id = Some(composite_id(deployment_id, file_name));
        encode_state(&state)
    }

    async fn delete(&self, client: &VmCloudClient, current: Value) -> Result<(), ProviderError> {
        let state: RuleFileState = decode_state(current)?;
        let (deployment_id, file_name) = state.location()?;

        match client.delete_rule_file(deployment_id, file_name).await {
            Ok(()) => {
                info!(deployment_id = %deployment_id, file_name = %file_name, "Deleted rule file");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(deployment_id = %deployment_id, file_name = %file_name, "Rule file already deleted");
                Ok(())
            }
            Err(e) => Err(e.with_summary("Error deleting rule file")),
        }
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        let (deployment_id, file_name) = split_import_id(id, "deployment_id/file_name")?;
        encode_state(&RuleFileState {
            id: Some(id.to_string()),
            deployment_id: Some(deployment_id.to_string()),
            file_name: Some(file_name.to_string()),
            content: None,
        })
    }
}
