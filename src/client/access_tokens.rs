//! Deployment access token endpoints.

use reqwest::Method;

use super::models::{AccessToken, AccessTokenCreateRequest};
use super::{encode, VmCloudClient};
use crate::error::ProviderError;

impl VmCloudClient {
    /// Create an access token for a deployment. The response carries the secret.
    pub async fn create_access_token(
        &self,
        deployment_id: &str,
        request: &AccessTokenCreateRequest,
    ) -> Result<AccessToken, ProviderError> {
        self.send_json(
            Method::POST,
            &format!("/deployments/{}/access_tokens", encode(deployment_id)),
            request,
        )
        .await
    }

    /// Fetch an access token including its secret.
    pub async fn reveal_access_token(
        &self,
        deployment_id: &str,
        token_id: &str,
    ) -> Result<AccessToken, ProviderError> {
        self.get_json(&format!(
            "/deployments/{}/access_tokens/{}/reveal",
            encode(deployment_id),
            encode(token_id)
        ))
        .await
    }

    /// Revoke an access token.
    pub async fn delete_access_token(
        &self,
        deployment_id: &str,
        token_id: &str,
    ) -> Result<(), ProviderError> {
        self.delete(&format!(
            "/deployments/{}/access_tokens/{}",
            encode(deployment_id),
            encode(token_id)
        ))
        .await
    }
}
