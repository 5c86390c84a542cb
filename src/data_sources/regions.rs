//! `victoriametricscloud_regions` data source.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::VmCloudClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};

/// Data source type name.
pub const TYPE_NAME: &str = "victoriametricscloud_regions";

/// Lists regions across cloud providers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionsDataSource;

#[derive(Debug, Serialize)]
struct RegionsState {
    regions: Vec<RegionModel>,
}

#[derive(Debug, Serialize)]
struct RegionModel {
    name: String,
    cloud_provider: String,
}

#[async_trait]
impl DataSource for RegionsDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(
                "Fetches the list of available regions for VictoriaMetrics Cloud deployments.",
            )
            .with_attribute(
                "regions",
                Attribute::computed_object_list(AttributeType::object([
                    ("name", AttributeType::String),
                    ("cloud_provider", AttributeType::String),
                ]))
                .with_description("List of available regions."),
            )
    }

    async fn read(&self, client: &VmCloudClient, _config: Value) -> Result<Value, ProviderError> {
        let regions = client
            .list_regions()
            .await
            .map_err(|e| e.with_summary("Unable to Read Regions"))?;
        debug!(count = regions.len(), "Fetched regions");

        let state = RegionsState {
            regions: regions
                .into_iter()
                .map(|r| RegionModel {
                    name: r.name,
                    cloud_provider: r.cloud_provider,
                })
                .collect(),
        };
        Ok(serde_json::to_value(state)?)
    }
}
