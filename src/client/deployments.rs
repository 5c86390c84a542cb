//! Deployment lifecycle endpoints.

use reqwest::Method;

use super::models::{
    DeploymentCreationRequest, DeploymentDetails, DeploymentInfo, DeploymentUpdateRequest,
};
use super::{encode, VmCloudClient};
use crate::error::ProviderError;

impl VmCloudClient {
    /// List all deployments of the account.
    pub async fn list_deployments(&self) -> Result<Vec<DeploymentInfo>, ProviderError> {
        self.get_json("/deployments").await
    }

    /// Fetch the full description of one deployment.
    pub async fn get_deployment_details(
        &self,
        deployment_id: &str,
    ) -> Result<DeploymentDetails, ProviderError> {
        self.get_json(&format!("/deployments/{}", encode(deployment_id)))
            .await
    }

    /// Create a deployment.
    pub async fn create_deployment(
        &self,
        request: &DeploymentCreationRequest,
    ) -> Result<DeploymentInfo, ProviderError> {
        self.send_json(Method::POST, "/deployments", request).await
    }

    /// Update the mutable settings of a deployment.
    pub async fn update_deployment(
        &self,
        deployment_id: &str,
        request: &DeploymentUpdateRequest,
    ) -> Result<DeploymentInfo, ProviderError> {
        self.send_json(
            Method::PUT,
            &format!("/deployments/{}", encode(deployment_id)),
            request,
        )
        .await
    }

    /// Delete a deployment.
    pub async fn delete_deployment(&self, deployment_id: &str) -> Result<(), ProviderError> {
        self.delete(&format!("/deployments/{}", encode(deployment_id)))
            .await
    }
}
