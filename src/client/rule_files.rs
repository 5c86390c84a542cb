//! Alerting and recording rule file endpoints. Content travels as raw text.

use reqwest::Method;

use super::{encode, VmCloudClient};
use crate::error::ProviderError;

fn rule_file_path(deployment_id: &str, file_name: &str) -> String {
    format!(
        "/deployments/{}/rule-sets/files/{}",
        encode(deployment_id),
        encode(file_name)
    )
}

impl VmCloudClient {
    /// Download the content of a rule file.
    pub async fn get_rule_file_content(
        &self,
        deployment_id: &str,
        file_name: &str,
    ) -> Result<String, ProviderError> {
        self.get_text(&rule_file_path(deployment_id, file_name))
            .await
    }

    /// Upload a new rule file.
    pub async fn create_rule_file_content(
        &self,
        deployment_id: &str,
        file_name: &str,
        content: &str,
    ) -> Result<(), ProviderError> {
        self.send_text(
            Method::POST,
            &rule_file_path(deployment_id, file_name),
            content,
        )
        .await
    }

    /// Replace the content of an existing rule file.
    pub async fn update_rule_file_content(
        &self,
        deployment_id: &str,
        file_name: &str,
        content: &str,
    ) -> Result<(), ProviderError> {
        self.send_text(
            Method::PUT,
            &rule_file_path(deployment_id, file_name),
            content,
        )
        .await
    }

    /// Remove a rule file.
    pub async fn delete_rule_file(
        &self,
        deployment_id: &str,
        file_name: &str,
    ) -> Result<(), ProviderError> {
        self.delete(&rule_file_path(deployment_id, file_name))
            .await
    }
}
