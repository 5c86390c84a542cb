//! `victoriametricscloud_tiers` data source.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::models::Tier;
use crate::client::VmCloudClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};

/// Data source type name.
pub const TYPE_NAME: &str = "victoriametricscloud_tiers";

/// Lists deployment tiers with their limits and price.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiersDataSource;

#[derive(Debug, Serialize)]
struct TiersState {
    tiers: Vec<TierModel>,
}

#[derive(Debug, PartialEq, Serialize)]
struct TierModel {
    id: u32,
    #[serde(rename = "type")]
    deployment_type: String,
    cloud_provider: String,
    name: String,
    compute_cost_per_hour: f64,
    ingestion_rate: u64,
    active_time_series: u64,
    new_series_over_24h: u64,
    datapoints_read_rate: u64,
    series_read_per_query: u64,
    access_token_concurrent_requests: u32,
}

impl From<Tier> for TierModel {
    fn from(tier: Tier) -> Self {
        Self {
            id: tier.id,
            deployment_type: tier.deployment_type,
            cloud_provider: tier.cloud_provider,
            name: tier.name,
            compute_cost_per_hour: tier.compute_cost_per_hour,
            ingestion_rate: tier.ingestion_rate,
            active_time_series: tier.active_time_series,
            new_series_over_24h: tier.new_series_over_24h,
            datapoints_read_rate: tier.datapoints_read_rate,
            series_read_per_query: tier.series_read_per_query,
            access_token_concurrent_requests: tier.access_token_concurrent_requests,
        }
    }
}

#[async_trait]
impl DataSource for TiersDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let tier = AttributeType::object([
            ("id", AttributeType::Int64),
            ("type", AttributeType::String),
            ("cloud_provider", AttributeType::String),
            ("name", AttributeType::String),
            ("compute_cost_per_hour", AttributeType::Float64),
            ("ingestion_rate", AttributeType::Int64),
            ("active_time_series", AttributeType::Int64),
            ("new_series_over_24h", AttributeType::Int64),
            ("datapoints_read_rate", AttributeType::Int64),
            ("series_read_per_query", AttributeType::Int64),
            ("access_token_concurrent_requests", AttributeType::Int64),
        ]);

        Schema::v0()
            .with_description(
                "Fetches the list of available tiers for VictoriaMetrics Cloud deployments.",
            )
            .with_attribute(
                "tiers",
                Attribute::computed_object_list(tier).with_description("List of available tiers."),
            )
    }

    async fn read(&self, client: &VmCloudClient, _config: Value) -> Result<Value, ProviderError> {
        let tiers = client
            .list_tiers()
            .await
            .map_err(|e| e.with_summary("Unable to Read Tiers"))?;
        debug!(count = tiers.len(), "Fetched tiers");

        let state = TiersState {
            tiers: tiers.into_iter().map(TierModel::from).collect(),
        };
        Ok(serde_json::to_value(state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tier_model_renames_type() {
        let tier: Tier = serde_json::from_value(json!({
            "id": 7,
            "type": "cluster",
            "cloud_provider": "aws",
            "name": "c.medium",
            "compute_cost_per_hour": 0.55,
            "ingestion_rate": 100000,
            "active_time_series": 2000000,
            "new_series_over_24h": 4000000,
            "datapoints_read_rate": 50000000,
            "series_read_per_query": 300000,
            "access_token_concurrent_requests": 60
        }))
        .unwrap();

        let value = serde_json::to_value(TierModel::from(tier)).unwrap();
        assert_eq!(value["type"], "cluster");
        assert_eq!(value["id"], 7);
        assert_eq!(value["compute_cost_per_hour"], 0.55);
        assert!(value.get("deployment_type").is_none());
    }
}
