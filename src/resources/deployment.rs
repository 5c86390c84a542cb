//! `victoriametricscloud_deployment` resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{decode_state, encode_state, require, to_u32, to_u64, Resource};
use crate::client::models::{
    format_timestamp, DeploymentCreationRequest, DeploymentDetails, DeploymentFlags,
    DeploymentInfo, DeploymentUpdateRequest,
};
use crate::client::VmCloudClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "victoriametricscloud_deployment";

/// Manages a deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentResource;

/// Deployment state as stored by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct DeploymentState {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "type")]
    deployment_type: Option<String>,
    cloud_provider: Option<String>,
    region: Option<String>,
    tier: Option<i64>,
    storage_size: Option<i64>,
    storage_size_unit: Option<String>,
    retention: Option<i64>,
    retention_unit: Option<String>,
    deduplication: Option<i64>,
    deduplication_unit: Option<String>,
    maintenance_window: Option<String>,
    single_flags: Option<Vec<String>>,
    select_flags: Option<Vec<String>>,
    storage_flags: Option<Vec<String>>,
    insert_flags: Option<Vec<String>>,
    version: Option<String>,
    status: Option<String>,
    created_at: Option<String>,
    access_endpoint: Option<String>,
}

impl DeploymentState {
    fn creation_request(&self) -> Result<DeploymentCreationRequest, ProviderError> {
        Ok(DeploymentCreationRequest {
            name: require(&self.name, "name")?.clone(),
            deployment_type: require(&self.deployment_type, "type")?.clone(),
            provider: require(&self.cloud_provider, "cloud_provider")?.clone(),
            region: require(&self.region, "region")?.clone(),
            tier: to_u32(*require(&self.tier, "tier")?, "tier")?,
            storage_size: to_u64(*require(&self.storage_size, "storage_size")?, "storage_size")?,
            storage_size_unit: require(&self.storage_size_unit, "storage_size_unit")?.clone(),
            retention: to_u32(*require(&self.retention, "retention")?, "retention")?,
            retention_unit: require(&self.retention_unit, "retention_unit")?.clone(),
            deduplication: to_u32(
                *require(&self.deduplication, "deduplication")?,
                "deduplication",
            )?,
            deduplication_unit: require(&self.deduplication_unit, "deduplication_unit")?.clone(),
            maintenance_window: require(&self.maintenance_window, "maintenance_window")?.clone(),
        })
    }

    fn update_request(&self) -> Result<DeploymentUpdateRequest, ProviderError> {
        let create = self.creation_request()?;
        Ok(DeploymentUpdateRequest {
            name: create.name,
            tier: create.tier,
            storage_size: create.storage_size,
            storage_size_unit: create.storage_size_unit,
            retention: create.retention,
            retention_unit: create.retention_unit,
            deduplication: create.deduplication,
            deduplication_unit: create.deduplication_unit,
            maintenance_window: create.maintenance_window,
            flags: self.flags(),
        })
    }

    /// Flags to send; unset lists are sent empty.
    fn flags(&self) -> DeploymentFlags {
        DeploymentFlags {
            single_flags: self.single_flags.clone().unwrap_or_default(),
            select_flags: self.select_flags.clone().unwrap_or_default(),
            storage_flags: self.storage_flags.clone().unwrap_or_default(),
            insert_flags: self.insert_flags.clone().unwrap_or_default(),
        }
    }

    fn apply_info(&mut self, info: &DeploymentInfo) {
        self.id = Some(info.id.clone());
        self.version = Some(info.version.clone());
        self.status = Some(info.status.clone());
        self.access_endpoint = Some(info.access_endpoint.clone());
        if self.created_at.is_none() {
            self.created_at = Some(format_timestamp(&info.created_at));
        }
    }

    fn apply_details(&mut self, details: &DeploymentDetails) {
        let info = &details.info;
        self.id = Some(info.id.clone());
        self.name = Some(info.name.clone());
        self.deployment_type = Some(info.deployment_type.clone());
        self.cloud_provider = Some(info.cloud_provider.clone());
        self.region = Some(info.region.clone());
        self.tier = Some(i64::from(info.tier));
        self.retention = Some(i64::from(details.retention_value));
        self.retention_unit = Some(details.retention_unit.clone());
        self.deduplication = Some(i64::from(details.deduplication_value));
        self.deduplication_unit = Some(details.deduplication_unit.clone());
        self.maintenance_window = Some(details.maintenance_window.clone());
        self.version = Some(info.version.clone());
        self.status = Some(info.status.clone());
        self.created_at = Some(format_timestamp(&info.created_at));
        self.access_endpoint = Some(info.access_endpoint.clone());

        if let Some(size) = storage_size_in_unit(
            details.storage_size_gb,
            self.storage_size_unit.as_deref(),
        ) {
            self.storage_size = Some(size);
        }

        if let Some(flags) = &details.flags {
            refresh_flags(&mut self.single_flags, &flags.single_flags);
            refresh_flags(&mut self.select_flags, &flags.select_flags);
            refresh_flags(&mut self.storage_flags, &flags.storage_flags);
            refresh_flags(&mut self.insert_flags, &flags.insert_flags);
        }
    }
}

/// Convert the API's storage size in GB into the unit kept in state.
///
/// Returns `None` for an unknown unit, leaving the stored value untouched.
fn storage_size_in_unit(storage_size_gb: u64, unit: Option<&str>) -> Option<i64> {
    let size = match unit? {
        "GB" => storage_size_gb,
        "TB" => storage_size_gb / 1024,
        _ => return None,
    };
    i64::try_from(size).ok()
}

/// An unset list stays unset while the API reports no flags for it.
fn refresh_flags(current: &mut Option<Vec<String>>, remote: &[String]) {
    if current.is_some() || !remote.is_empty() {
        *current = Some(remote.to_vec());
    }
}

#[async_trait]
impl Resource for DeploymentResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a VictoriaMetrics Cloud deployment.")
            .with_attribute(
                "id",
                Attribute::computed_string()
                    .with_description("Unique identifier of the deployment.")
                    .with_use_state_for_unknown(),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Human-readable name of the deployment."),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_description(
                        "Type of the deployment. Valid values: 'single_node', 'cluster'.",
                    )
                    .with_force_new(),
            )
            .with_attribute(
                "cloud_provider",
                Attribute::required_string()
                    .with_description("Cloud provider for the deployment. Valid values: 'aws'.")
                    .with_force_new(),
            )
            .with_attribute(
                "region",
                Attribute::required_string()
                    .with_description("Region of the deployment in the cloud provider.")
                    .with_force_new(),
            )
            .with_attribute(
                "tier",
                Attribute::required_int64().with_description("Tier identifier for the deployment."),
            )
            .with_attribute(
                "storage_size",
                Attribute::required_int64()
                    .with_description("Storage size in units specified in storage_size_unit."),
            )
            .with_attribute(
                "storage_size_unit",
                Attribute::required_string()
                    .with_description("Storage size unit. Valid values: 'GB', 'TB'."),
            )
            .with_attribute(
                "retention",
                Attribute::required_int64().with_description("Retention period for metrics."),
            )
            .with_attribute(
                "retention_unit",
                Attribute::required_string().with_description(
                    "Retention period unit. Valid values: 'd' (days), 'm' (months).",
                ),
            )
            .with_attribute(
                "deduplication",
                Attribute::required_int64()
                    .with_description("Deduplication window for the deployment."),
            )
            .with_attribute(
                "deduplication_unit",
                Attribute::required_string().with_description(
                    "Deduplication window unit. Valid values: 'ms' (milliseconds), 's' (seconds).",
                ),
            )
            .with_attribute(
                "maintenance_window",
                Attribute::required_string().with_description(
                    "Maintenance window for the deployment. Valid values: 'Sat-Sun 3-4am', 'Mon-Fri 4-5am'.",
                ),
            )
            .with_attribute(
                "single_flags",
                Attribute::optional_string_list()
                    .with_description("Custom command-line flags for the vmsingle component."),
            )
            .with_attribute(
                "select_flags",
                Attribute::optional_string_list()
                    .with_description("Custom command-line flags for the vmselect component."),
            )
            .with_attribute(
                "storage_flags",
                Attribute::optional_string_list()
                    .with_description("Custom command-line flags for the vmstorage component."),
            )
            .with_attribute(
                "insert_flags",
                Attribute::optional_string_list()
                    .with_description("Custom command-line flags for the vminsert component."),
            )
            .with_attribute(
                "version",
                Attribute::computed_string()
                    .with_description("Version of VictoriaMetrics used in the deployment."),
            )
            .with_attribute(
                "status",
                Attribute::computed_string().with_description("Current status of the deployment."),
            )
            .with_attribute(
                "created_at",
                Attribute::computed_string()
                    .with_description("Timestamp of deployment creation.")
                    .with_use_state_for_unknown(),
            )
            .with_attribute(
                "access_endpoint",
                Attribute::computed_string()
                    .with_description("API endpoint URL for the deployment."),
            )
    }

    async fn create(&self, client: &VmCloudClient, planned: Value) -> Result<Value, ProviderError> {
        const SUMMARY: &str = "Error creating deployment";

        let mut state: DeploymentState = decode_state(planned)?;
        let request = state.creation_request()?;

        let mut deployment = client
            .create_deployment(&request)
            .await
            .map_err(|e| e.with_summary(SUMMARY))?;
        info!(id = %deployment.id, name = %deployment.name, "Created deployment");

        // Flags are not part of the creation request.
        if !state.flags().is_empty() {
            let update = state.update_request()?;
            deployment = client
                .update_deployment(&deployment.id, &update)
                .await
                .map_err(|e| e.with_summary(SUMMARY))?;
            debug!(id = %deployment.id, "Applied deployment flags");
        }

        state.created_at = None;
        state.apply_info(&deployment);
        encode_state(&state)
    }

    async fn read(
        &self,
        client: &VmCloudClient,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: DeploymentState = decode_state(current)?;
        let id = require(&state.id, "id")?.clone();

        let details = match client.get_deployment_details(&id).await {
            Ok(details) => details,
            Err(e) if e.is_not_found() => {
                warn!(id = %id, "Deployment no longer exists, removing from state");
                return Ok(None);
            }
            Err(e) => return Err(e.with_summary("Error Reading Deployment")),
        };

        state.apply_details(&details);
        debug!(id = %id, status = %details.info.status, "Refreshed deployment");
        encode_state(&state).map(Some)
    }

    async fn update(
        &self,
        client: &VmCloudClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: DeploymentState = decode_state(prior)?;
        let mut state: DeploymentState = decode_state(planned)?;
        if state.id.is_none() {
            state.id = prior.id.clone();
        }
        let id = require(&state.id, "id")?.clone();
        let request = state.update_request()?;

        let deployment = client
            .update_deployment(&id, &request)
            .await
            .map_err(|e| e.with_summary("Error updating deployment"))?;
        info!(id = %id, "Updated deployment");

        state.apply_info(&deployment);
        encode_state(&state)
    }

    async fn delete(&self, client: &VmCloudClient, current: Value) -> Result<(), ProviderError> {
        let state: DeploymentState = decode_state(current)?;
        let id = require(&state.id, "id")?;

        match client.delete_deployment(id).await {
            Ok(()) => {
                info!(id = %id, "Deleted deployment");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(id = %id, "Deployment already deleted");
                Ok(())
            }
            Err(e) => Err(e.with_summary("Error deleting deployment")),
        }
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        // The API reports storage in GB only.
        let state = DeploymentState {
            id: Some(id.to_string()),
            storage_size_unit: Some("GB".to_string()),
            ..Default::default()
        };
        encode_state(&state)
    }
}
