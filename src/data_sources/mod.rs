//! Read-only data sources.

mod cloud_providers;
mod deployment;
mod deployments;
mod regions;
mod tiers;

pub use cloud_providers::CloudProvidersDataSource;
pub use deployment::DeploymentDataSource;
pub use deployments::DeploymentsDataSource;
pub use regions::RegionsDataSource;
pub use tiers::TiersDataSource;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::VmCloudClient;
use crate::error::ProviderError;
use crate::schema::Schema;

/// A data source backed by the VictoriaMetrics Cloud API.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Full data source type name, e.g. `victoriametricscloud_tiers`.
    fn type_name(&self) -> &'static str;

    /// Schema of the data source.
    fn schema(&self) -> Schema;

    /// Fetch the data and return the resulting state.
    async fn read(&self, client: &VmCloudClient, config: Value) -> Result<Value, ProviderError>;
}

/// All data sources served by the provider.
pub fn all() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(CloudProvidersDataSource),
        Box::new(RegionsDataSource),
        Box::new(TiersDataSource),
        Box::new(DeploymentDataSource),
        Box::new(DeploymentsDataSource),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_names() {
        let mut names: Vec<_> = all().iter().map(|d| d.type_name()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "victoriametricscloud_cloud_providers",
                "victoriametricscloud_deployment",
                "victoriametricscloud_deployments",
                "victoriametricscloud_regions",
                "victoriametricscloud_tiers",
            ]
        );
    }

    #[test]
    fn test_list_data_sources_take_no_arguments() {
        for data_source in all() {
            let schema = data_source.schema();
            let configurable: Vec<_> = schema
                .block
                .attributes
                .iter()
                .filter(|(_, attr)| !attr.flags.is_computed_only())
                .map(|(name, _)| name.as_str())
                .collect();
            if data_source.type_name() == "victoriametricscloud_deployment" {
                assert_eq!(configurable, vec!["id"]);
            } else {
                assert!(configurable.is_empty(), "{}", data_source.type_name());
            }
        }
    }
}
