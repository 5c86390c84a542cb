//! Catalog lookups: cloud providers, regions and tiers.

use super::models::{CloudProvider, Region, Tier};
use super::VmCloudClient;
use crate::error::ProviderError;

impl VmCloudClient {
    /// List the cloud providers deployments can run on.
    pub async fn list_cloud_providers(&self) -> Result<Vec<CloudProvider>, ProviderError> {
        self.get_json("/cloud_providers").await
    }

    /// List the regions available across cloud providers.
    pub async fn list_regions(&self) -> Result<Vec<Region>, ProviderError> {
        self.get_json("/regions").await
    }

    /// List the deployment tiers.
    pub async fn list_tiers(&self) -> Result<Vec<Tier>, ProviderError> {
        self.get_json("/tiers").await
    }
}
