//! `victoriametricscloud_deployment` data source.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::models::{format_timestamp, DeploymentDetails};
use crate::client::VmCloudClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Data source type name.
pub const TYPE_NAME: &str = "victoriametricscloud_deployment";

/// Looks up a single deployment by id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentDataSource;

#[derive(Debug, Deserialize)]
struct DeploymentLookup {
    id: String,
}

#[derive(Debug, Serialize)]
struct DeploymentDetailsState {
    id: String,
    name: String,
    #[serde(rename = "type")]
    deployment_type: String,
    cloud_provider: String,
    region: String,
    tier: u32,
    retention: u32,
    retention_unit: String,
    deduplication: u32,
    deduplication_unit: String,
    maintenance_window: String,
    version: String,
    status: String,
    created_at: String,
    access_endpoint: String,
    storage_size_gb: u64,
    compute_cost: f64,
    storage_cost: f64,
    total_cost: f64,
}

impl From<DeploymentDetails> for DeploymentDetailsState {
    fn from(details: DeploymentDetails) -> Self {
        let info = details.info;
        Self {
            created_at: format_timestamp(&info.created_at),
            id: info.id,
            name: info.name,
            deployment_type: info.deployment_type,
            cloud_provider: info.cloud_provider,
            region: info.region,
            tier: info.tier,
            retention: details.retention_value,
            retention_unit: details.retention_unit,
            deduplication: details.deduplication_value,
            deduplication_unit: details.deduplication_unit,
            maintenance_window: details.maintenance_window,
            version: info.version,
            status: info.status,
            access_endpoint: info.access_endpoint,
            storage_size_gb: details.storage_size_gb,
            compute_cost: details.price.compute_cost,
            storage_cost: details.price.storage_cost,
            total_cost: details.price.total_cost,
        }
    }
}

#[async_trait]
impl DataSource for DeploymentDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Fetches details of a specific VictoriaMetrics Cloud deployment.")
            .with_attribute(
                "id",
                Attribute::required_string().with_description("Unique identifier of the deployment."),
            )
            .with_attribute(
                "name",
                Attribute::computed_string().with_description("Human-readable name of the deployment."),
            )
            .with_attribute(
                "type",
                Attribute::computed_string().with_description("Type of the deployment."),
            )
            .with_attribute(
                "cloud_provider",
                Attribute::computed_string().with_description("Cloud provider for the deployment."),
            )
            .with_attribute(
                "region",
                Attribute::computed_string().with_description("Region of the deployment."),
            )
            .with_attribute(
                "tier",
                Attribute::computed_int64().with_description("Tier identifier for the deployment."),
            )
            .with_attribute(
                "retention",
                Attribute::computed_int64().with_description("Retention period for metrics."),
            )
            .with_attribute(
                "retention_unit",
                Attribute::computed_string().with_description("Retention period unit."),
            )
            .with_attribute(
                "deduplication",
                Attribute::computed_int64().with_description("Deduplication window."),
            )
            .with_attribute(
                "deduplication_unit",
                Attribute::computed_string().with_description("Deduplication window unit."),
            )
            .with_attribute(
                "maintenance_window",
                Attribute::computed_string().with_description("Maintenance window for the deployment."),
            )
            .with_attribute(
                "version",
                Attribute::computed_string().with_description("Version of VictoriaMetrics."),
            )
            .with_attribute(
                "status",
                Attribute::computed_string().with_description("Current status of the deployment."),
            )
            .with_attribute(
                "created_at",
                Attribute::computed_string().with_description("Timestamp of deployment creation."),
            )
            .with_attribute(
                "access_endpoint",
                Attribute::computed_string().with_description("API endpoint URL for the deployment."),
            )
            .with_attribute(
                "storage_size_gb",
                Attribute::computed_int64().with_description("Storage size in GB."),
            )
            .with_attribute(
                "compute_cost",
                Attribute::computed_float64().with_description("Monthly compute cost in USD."),
            )
            .with_attribute(
                "storage_cost",
                Attribute::computed_float64().with_description("Monthly storage cost in USD."),
            )
            .with_attribute(
                "total_cost",
                Attribute::computed_float64().with_description("Total monthly cost in USD."),
            )
    }

    async fn read(&self, client: &VmCloudClient, config: Value) -> Result<Value, ProviderError> {
        let lookup: DeploymentLookup = serde_json::from_value(config).map_err(|e| {
            ProviderError::Validation(format!("invalid data source configuration: {}", e))
                .with_summary("Unable to Read Deployment")
        })?;

        let details = client
            .get_deployment_details(&lookup.id)
            .await
            .map_err(|e| e.with_summary("Unable to Read Deployment"))?;
        debug!(id = %lookup.id, "Fetched deployment details");

        Ok(serde_json::to_value(DeploymentDetailsState::from(details))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_details_state_flattens_price() {
        let details: DeploymentDetails = serde_json::from_value(json!({
            "id": "dep-1",
            "name": "prod",
            "type": "cluster",
            "cloud_provider": "aws",
            "region": "us-east-2",
            "tier": 7,
            "version": "v1.102.0",
            "status": "running",
            "created_at": "2025-01-02T03:04:05Z",
            "access_endpoint": "https://gw.example.com",
            "storage_size_gb": 100,
            "retention_value": 3,
            "retention_unit": "m",
            "deduplication_value": 500,
            "deduplication_unit": "ms",
            "maintenance_window": "Mon-Fri 4-5am",
            "price": {"compute_cost": 100.0, "storage_cost": 2.5, "total_cost": 102.5}
        }))
        .unwrap();

        let state = serde_json::to_value(DeploymentDetailsState::from(details)).unwrap();
        assert_eq!(state["type"], "cluster");
        assert_eq!(state["retention"], 3);
        assert_eq!(state["deduplication"], 500);
        assert_eq!(state["storage_size_gb"], 100);
        assert_eq!(state["total_cost"], 102.5);
        assert_eq!(state["created_at"], "2025-01-02T03:04:05Z");
    }

    #[test]
    fn test_schema_covers_state_fields() {
        let schema = DeploymentDataSource.schema();
        assert_eq!(schema.block.attributes.len(), 19);
        assert!(schema.attribute("id").unwrap().flags.required);
    }
}
