//! `victoriametricscloud_cloud_providers` data source.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::VmCloudClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};

/// Data source type name.
pub const TYPE_NAME: &str = "victoriametricscloud_cloud_providers";

/// Lists the cloud providers deployments can run on.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudProvidersDataSource;

#[derive(Debug, Serialize)]
struct CloudProvidersState {
    cloud_providers: Vec<CloudProviderModel>,
}

#[derive(Debug, Serialize)]
struct CloudProviderModel {
    id: String,
    url: String,
}

#[async_trait]
impl DataSource for CloudProvidersDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(
                "Fetches the list of available cloud providers for VictoriaMetrics Cloud deployments.",
            )
            .with_attribute(
                "cloud_providers",
                Attribute::computed_object_list(AttributeType::object([
                    ("id", AttributeType::String),
                    ("url", AttributeType::String),
                ]))
                .with_description("List of available cloud providers."),
            )
    }

    async fn read(&self, client: &VmCloudClient, _config: Value) -> Result<Value, ProviderError> {
        let providers = client
            .list_cloud_providers()
            .await
            .map_err(|e| e.with_summary("Unable to Read Cloud Providers"))?;
        debug!(count = providers.len(), "Fetched cloud providers");

        let state = CloudProvidersState {
            cloud_providers: providers
                .into_iter()
                .map(|p| CloudProviderModel { id: p.id, url: p.url })
                .collect(),
        };
        Ok(serde_json::to_value(state)?)
    }
}
