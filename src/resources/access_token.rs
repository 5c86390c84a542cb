//! `victoriametricscloud_access_token` resource.
//!
//! Tokens are immutable: every configurable attribute forces replacement and
//! update is rejected. Reads go through the reveal endpoint so the secret
//! stays in state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{decode_state, encode_state, require, split_import_id, Resource};
use crate::client::models::{format_timestamp, AccessToken, AccessTokenCreateRequest};
use crate::client::VmCloudClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "victoriametricscloud_access_token";

/// Manages a deployment access token.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessTokenResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct AccessTokenState {
    id: Option<String>,
    deployment_id: Option<String>,
    #[serde(rename = "type")]
    access_type: Option<String>,
    description: Option<String>,
    tenant_id: Option<String>,
    secret: Option<String>,
    created_by: Option<String>,
    created_at: Option<String>,
    last_used_at: Option<String>,
}

impl AccessTokenState {
    fn apply_token(&mut self, token: &AccessToken) {
        self.id = Some(token.id.clone());
        self.access_type = Some(token.access_type.clone());
        self.description = Some(token.description.clone());
        self.secret = Some(token.secret.clone());
        self.created_by = Some(token.created_by.clone());
        self.created_at = Some(format_timestamp(&token.created_at));
        self.last_used_at = token.last_used_at.as_ref().map(format_timestamp);
        if !token.tenant_id.is_empty() {
            self.tenant_id = Some(token.tenant_id.clone());
        }
    }
}

#[async_trait]
impl Resource for AccessTokenResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages an access token for a VictoriaMetrics Cloud deployment.")
            .with_attribute(
                "id",
                Attribute::computed_string()
                    .with_description("Unique identifier of the access token.")
                    .with_use_state_for_unknown(),
            )
            .with_attribute(
                "deployment_id",
                Attribute::required_string()
                    .with_description("ID of the deployment this token belongs to.")
                    .with_force_new(),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_description(
                        "Access mode of the token. Valid values: 'r' (read-only), 'w' (write-only), 'rw' (read-write).",
                    )
                    .with_force_new(),
            )
            .with_attribute(
                "description",
                Attribute::required_string()
                    .with_description("Human-readable description of the access token.")
                    .with_force_new(),
            )
            .with_attribute(
                "tenant_id",
                Attribute::optional_string()
                    .with_description(
                        "Optional tenant ID for cluster deployments (format: accountID or accountID:projectID).",
                    )
                    .with_force_new(),
            )
            .with_attribute(
                "secret",
                Attribute::computed_string()
                    .sensitive()
                    .with_description(
                        "Secret value of the access token. Only available after creation.",
                    )
                    .with_use_state_for_unknown(),
            )
            .with_attribute(
                "created_by",
                Attribute::computed_string()
                    .with_description("Email of the user who created the token."),
            )
            .with_attribute(
                "created_at",
                Attribute::computed_string()
                    .with_description("Timestamp of token creation.")
                    .with_use_state_for_unknown(),
            )
            .with_attribute(
                "last_used_at",
                Attribute::computed_string()
                    .with_description("Timestamp of last token usage (within the last 7 days)."),
            )
    }

    async fn create(&self, client: &VmCloudClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: AccessTokenState = decode_state(planned)?;
        let deployment_id = require(&state.deployment_id, "deployment_id")?.clone();
        let request = AccessTokenCreateRequest {
            access_type: require(&state.access_type, "type")?.clone(),
            description: require(&state.description, "description")?.clone(),
            tenant_id: state.tenant_id.clone().unwrap_or_default(),
        };

        let token = client
            .create_access_token(&deployment_id, &request)
            .await
            .map_err(|e| e.with_summary("Error creating access token"))?;
        info!(id = %token.id, deployment_id = %deployment_id, "Created access token");

        state.apply_token(&token);
        encode_state(&state)
    }

    async fn read(
        &self,
        client: &VmCloudClient,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: AccessTokenState = decode_state(current)?;
        let deployment_id = require(&state.deployment_id, "deployment_id")?.clone();
        let id = require(&state.id, "id")?.clone();

        let token = match client.reveal_access_token(&deployment_id, &id).await {
            Ok(token) => token,
            Err(e) if e.is_not_found() => {
                warn!(id = %id, deployment_id = %deployment_id, "Access token no longer exists, removing from state");
                return Ok(None);
            }
            Err(e) => return Err(e.with_summary("Error Reading Access Token")),
        };

        state.apply_token(&token);
        debug!(id = %id, deployment_id = %deployment_id, "Refreshed access token");
        encode_state(&state).map(Some)
    }

    async fn update(
        &self,
        _client: &VmCloudClient,
        _prior: Value,
        _planned: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::Unimplemented(
            "Access tokens cannot be updated. Any changes require replacement.".to_string(),
        )
        .with_summary("Update not supported"))
    }

    async fn delete(&self, client: &VmCloudClient, current: Value) -> Result<(), ProviderError> {
        let state: AccessTokenState = decode_state(current)?;
        let deployment_id = require(&state.deployment_id, "deployment_id")?;
        let id = require(&state.id, "id")?;

        match client.delete_access_token(deployment_id, id).await {
            Ok(()) => {
                info!(id = %id, deployment_id = %deployment_id, "Deleted access token");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(id = %id, deployment_id = %deployment_id, "Access token already deleted");
                Ok(())
            }
            Err(e) => Err(e.with_summary("Error deleting access token")),
        }
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        let (deployment_id, token_id) = split_import_id(id, "deployment_id/token_id")?;
        encode_state(&AccessTokenState {
            id: Some(token_id.to_string()),
            deployment_id: Some(deployment_id.to_string()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token(tenant_id: &str, last_used_at: Option<&str>) -> AccessToken {
        serde_json::from_value(json!({
            "id": "tok-1",
            "type": "rw",
            "description": "ci",
            "tenant_id": tenant_id,
            "secret": "s3cr3t",
            "created_by": "ops@example.com",
            "created_at": "2025-03-04T05:06:07.123Z",
            "last_used_at": last_used_at
        }))
        .unwrap()
    }

    #[test]
    fn test_apply_token_keeps_configured_tenant_when_api_omits_it() {
        let mut state = AccessTokenState {
            tenant_id: Some("1:2".to_string()),
            last_used_at: Some("2025-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        state.apply_token(&token("", None));

        assert_eq!(state.tenant_id.as_deref(), Some("1:2"));
        assert_eq!(state.secret.as_deref(), Some("s3cr3t"));
        assert_eq!(state.created_at.as_deref(), Some("2025-03-04T05:06:07Z"));
        assert_eq!(state.last_used_at, None);
    }

    #[test]
    fn test_apply_token_overwrites_tenant_from_api() {
        let mut state = AccessTokenState::default();
        state.apply_token(&token("7", Some("2025-03-05T00:00:00Z")));
        assert_eq!(state.tenant_id.as_deref(), Some("7"));
        assert_eq!(state.last_used_at.as_deref(), Some("2025-03-05T00:00:00Z"));
    }

    #[test]
    fn test_import_state() {
        let state = AccessTokenResource.import_state("dep-1/tok-1").unwrap();
        assert_eq!(state["deployment_id"], "dep-1");
        assert_eq!(state["id"], "tok-1");

        let err = AccessTokenResource.import_state("tok-1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid Import ID: Validation error: Expected import identifier with format: deployment_id/token_id. Got: \"tok-1\""
        );
    }

    #[test]
    fn test_every_configurable_attribute_forces_replacement() {
        let schema = AccessTokenResource.schema();
        for (name, attr) in &schema.block.attributes {
            if !attr.flags.is_computed_only() {
                assert!(attr.force_new, "{} should force replacement", name);
            }
        }
        assert!(schema.attribute("secret").unwrap().flags.sensitive);
    }
}
