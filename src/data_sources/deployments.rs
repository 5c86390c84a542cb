//! `victoriametricscloud_deployments` data source.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::models::{format_timestamp, DeploymentInfo};
use crate::client::VmCloudClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};

/// Data source type name.
pub const TYPE_NAME: &str = "victoriametricscloud_deployments";

/// Lists all deployments of the account.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentsDataSource;

#[derive(Debug, Serialize)]
struct DeploymentsState {
    deployments: Vec<DeploymentSummary>,
}

#[derive(Debug, Serialize)]
struct DeploymentSummary {
    id: String,
    name: String,
    #[serde(rename = "type")]
    deployment_type: String,
    tier: u32,
    version: String,
    cloud_provider: String,
    region: String,
    status: String,
    created_at: String,
}

impl From<DeploymentInfo> for DeploymentSummary {
    fn from(info: DeploymentInfo) -> Self {
        Self {
            created_at: format_timestamp(&info.created_at),
            id: info.id,
            name: info.name,
            deployment_type: info.deployment_type,
            tier: info.tier,
            version: info.version,
            cloud_provider: info.cloud_provider,
            region: info.region,
            status: info.status,
        }
    }
}

#[async_trait]
impl DataSource for DeploymentsDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let summary = AttributeType::object([
            ("id", AttributeType::String),
            ("name", AttributeType::String),
            ("type", AttributeType::String),
            ("tier", AttributeType::Int64),
            ("version", AttributeType::String),
            ("cloud_provider", AttributeType::String),
            ("region", AttributeType::String),
            ("status", AttributeType::String),
            ("created_at", AttributeType::String),
        ]);

        Schema::v0()
            .with_description("Fetches the list of VictoriaMetrics Cloud deployments.")
            .with_attribute(
                "deployments",
                Attribute::computed_object_list(summary).with_description("List of deployments."),
            )
    }

    async fn read(&self, client: &VmCloudClient, _config: Value) -> Result<Value, ProviderError> {
        let deployments = client
            .list_deployments()
            .await
            .map_err(|e| e.with_summary("Unable to Read Deployments"))?;
        debug!(count = deployments.len(), "Fetched deployments");

        let state = DeploymentsState {
            deployments: deployments.into_iter().map(DeploymentSummary::from).collect(),
        };
        Ok(serde_json::to_value(state)?)
    }
}
