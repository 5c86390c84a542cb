//! Managed resources.
//!
//! Each resource maps its state onto a typed model with `serde`, calls one or
//! two [`VmCloudClient`] methods and maps the response back into state.

mod access_token;
mod deployment;
mod rule_file;

pub use access_token::AccessTokenResource;
pub use deployment::DeploymentResource;
pub use rule_file::RuleFileResource;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::VmCloudClient;
use crate::error::ProviderError;
use crate::schema::Schema;

/// A resource managed through the VictoriaMetrics Cloud API.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Full resource type name, e.g. `victoriametricscloud_deployment`.
    fn type_name(&self) -> &'static str;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Create the remote object and return the new state.
    async fn create(&self, client: &VmCloudClient, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. `None` means the remote object is gone.
    async fn read(
        &self,
        client: &VmCloudClient,
        current: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Apply an in-place update and return the new state.
    async fn update(
        &self,
        client: &VmCloudClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, client: &VmCloudClient, current: Value) -> Result<(), ProviderError>;

    /// Build the initial state for an import; a read completes it.
    fn import_state(&self, id: &str) -> Result<Value, ProviderError>;
}

/// All resources served by the provider.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(DeploymentResource),
        Box::new(AccessTokenResource),
        Box::new(RuleFileResource),
    ]
}

pub(crate) fn decode_state<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    if value.is_null() {
        return Err(ProviderError::Validation("state is null".to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn encode_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Borrow an attribute that must be known at this point.
pub(crate) fn require<'a, T>(value: &'a Option<T>, name: &str) -> Result<&'a T, ProviderError> {
    value
        .as_ref()
        .ok_or_else(|| ProviderError::Validation(format!("attribute '{}' must be set", name)))
}

pub(crate) fn to_u32(value: i64, name: &str) -> Result<u32, ProviderError> {
    u32::try_from(value).map_err(|_| {
        ProviderError::Validation(format!("attribute '{}' is out of range: {}", name, value))
    })
}

pub(crate) fn to_u64(value: i64, name: &str) -> Result<u64, ProviderError> {
    u64::try_from(value).map_err(|_| {
        ProviderError::Validation(format!("attribute '{}' is out of range: {}", name, value))
    })
}

/// Split an import id of the form `<first>/<second>`.
///
/// `format` names the two parts for the error message, e.g.
/// `deployment_id/token_id`.
pub(crate) fn split_import_id<'a>(
    id: &'a str,
    format: &str,
) -> Result<(&'a str, &'a str), ProviderError> {
    let parts: Vec<&str> = id.split('/').collect();
    match parts.as_slice() {
        [first, second] if !first.is_empty() && !second.is_empty() => Ok((*first, *second)),
        _ => Err(ProviderError::Validation(format!(
            "Expected import identifier with format: {}. Got: {:?}",
            format, id
        ))
        .with_summary("Invalid Import ID")),
    }
}
