//! Request and response bodies of the VictoriaMetrics Cloud REST API.
//!
//! Enum-like fields (deployment type, units, status, access mode) are kept as
//! plain strings and passed through unchanged; the API is the authority on
//! which values are accepted.

#![allow(missing_docs)]

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

/// A cloud provider deployments can run on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloudProvider {
    pub id: String,
    #[serde(default)]
    pub url: String,
}

/// A region offered by a cloud provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Region {
    pub name: String,
    pub cloud_provider: String,
}

/// A capacity and pricing class.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tier {
    pub id: u32,
    #[serde(rename = "type")]
    pub deployment_type: String,
    pub cloud_provider: String,
    pub name: String,
    #[serde(default)]
    pub compute_cost_per_hour: f64,
    #[serde(default)]
    pub ingestion_rate: u64,
    #[serde(default)]
    pub active_time_series: u64,
    #[serde(default)]
    pub new_series_over_24h: u64,
    #[serde(default)]
    pub datapoints_read_rate: u64,
    #[serde(default)]
    pub series_read_per_query: u64,
    #[serde(default)]
    pub access_token_concurrent_requests: u32,
}

/// Deployment fields returned by list, create and update calls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeploymentInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub deployment_type: String,
    pub cloud_provider: String,
    pub region: String,
    pub tier: u32,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub status: String,
    pub created_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub access_endpoint: String,
}

/// Full deployment description returned by the details endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeploymentDetails {
    #[serde(flatten)]
    pub info: DeploymentInfo,
    pub storage_size_gb: u64,
    pub retention_value: u32,
    pub retention_unit: String,
    pub deduplication_value: u32,
    pub deduplication_unit: String,
    #[serde(default)]
    pub maintenance_window: String,
    #[serde(default)]
    pub price: DeploymentPrice,
    #[serde(default)]
    pub flags: Option<DeploymentFlags>,
}

/// Monthly cost estimate in USD.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct DeploymentPrice {
    #[serde(default)]
    pub compute_cost: f64,
    #[serde(default)]
    pub storage_cost: f64,
    #[serde(default)]
    pub total_cost: f64,
}

/// Extra command-line flags per deployment component.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeploymentFlags {
    #[serde(default)]
    pub single_flags: Vec<String>,
    #[serde(default)]
    pub select_flags: Vec<String>,
    #[serde(default)]
    pub storage_flags: Vec<String>,
    #[serde(default)]
    pub insert_flags: Vec<String>,
}

impl DeploymentFlags {
    /// True if no component has any flag.
    pub fn is_empty(&self) -> bool {
        self.single_flags.is_empty()
            && self.select_flags.is_empty()
            && self.storage_flags.is_empty()
            && self.insert_flags.is_empty()
    }
}

/// Body of `POST /api/v1/deployments`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentCreationRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub deployment_type: String,
    pub provider: String,
    pub region: String,
    pub tier: u32,
    pub storage_size: u64,
    pub storage_size_unit: String,
    pub retention: u32,
    pub retention_unit: String,
    pub deduplication: u32,
    pub deduplication_unit: String,
    pub maintenance_window: String,
}

/// Body of `PUT /api/v1/deployments/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentUpdateRequest {
    pub name: String,
    pub tier: u32,
    pub storage_size: u64,
    pub storage_size_unit: String,
    pub retention: u32,
    pub retention_unit: String,
    pub deduplication: u32,
    pub deduplication_unit: String,
    pub maintenance_window: String,
    pub flags: DeploymentFlags,
}

/// Body of `POST /api/v1/deployments/{id}/access_tokens`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessTokenCreateRequest {
    #[serde(rename = "type")]
    pub access_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tenant_id: String,
}

/// An access token as returned by the create and reveal endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessToken {
    pub id: String,
    #[serde(rename = "type")]
    pub access_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub created_by: String,
    pub created_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<FixedOffset>>,
}

/// Render a timestamp the way it is stored in state (RFC 3339, seconds).
///
/// The offset reported by the API is kept; UTC renders as `Z`.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deployment_details_flatten() {
        let details: DeploymentDetails = serde_json::from_value(json!({
            "id": "dep-1",
            "name": "prod",
            "type": "single_node",
            "cloud_provider": "aws",
            "region": "us-east-2",
            "tier": 21,
            "version": "v1.102.0",
            "status": "running",
            "created_at": "2025-01-02T03:04:05.678Z",
            "access_endpoint": "https://gw-c15-1c.cloud.victoriametrics.com",
            "storage_size_gb": 2048,
            "retention_value": 30,
            "retention_unit": "d",
            "deduplication_value": 10,
            "deduplication_unit": "s",
            "maintenance_window": "Sat-Sun 3-4am",
            "price": {"compute_cost": 190.0, "storage_cost": 10.5, "total_cost": 200.5}
        }))
        .unwrap();

        assert_eq!(details.info.id, "dep-1");
        assert_eq!(details.info.deployment_type, "single_node");
        assert_eq!(details.storage_size_gb, 2048);
        assert_eq!(details.price.total_cost, 200.5);
        assert!(details.flags.is_none());
        assert_eq!(
            format_timestamp(&details.info.created_at),
            "2025-01-02T03:04:05Z"
        );
    }

    #[test]
    fn test_creation_request_uses_provider_key() {
        let request = DeploymentCreationRequest {
            name: "prod".into(),
            deployment_type: "cluster".into(),
            provider: "aws".into(),
            region: "us-east-2".into(),
            tier: 7,
            storage_size: 1,
            storage_size_unit: "TB".into(),
            retention: 3,
            retention_unit: "m".into(),
            deduplication: 10,
            deduplication_unit: "s".into(),
            maintenance_window: "Mon-Fri 4-5am".into(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["provider"], "aws");
        assert_eq!(body["type"], "cluster");
        assert!(body.get("cloud_provider").is_none());
    }

    #[test]
    fn test_access_token_create_omits_empty_tenant() {
        let request = AccessTokenCreateRequest {
            access_type: "rw".into(),
            description: "ci".into(),
            tenant_id: String::new(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, json!({"type": "rw", "description": "ci"}));
    }

    #[test]
    fn test_flags_is_empty() {
        assert!(DeploymentFlags::default().is_empty());
        let flags = DeploymentFlags {
            insert_flags: vec!["-maxLabelsPerTimeseries=40".into()],
            ..Default::default()
        };
        assert!(!flags.is_empty());
    }

    #[test]
    fn test_format_timestamp_keeps_offset() {
        let token: AccessToken = serde_json::from_value(json!({
            "id": "tok-1",
            "type": "r",
            "created_at": "2025-03-04T07:06:07.5+02:00",
            "last_used_at": "2025-03-05T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(
            format_timestamp(&token.created_at),
            "2025-03-04T07:06:07+02:00"
        );
        assert_eq!(
            token.last_used_at.as_ref().map(format_timestamp).as_deref(),
            Some("2025-03-05T10:00:00Z")
        );
    }
}
