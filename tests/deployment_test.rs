mod common;

use common::{
    assert_plan_changes_only, assert_plan_replaces, assert_plan_updates_in_place,
    deployment_config, deployment_details, deployment_info, ProviderHarness, API_KEY,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const DEPLOYMENT: &str = "victoriametricscloud_deployment";

fn with(mut base: Value, extra: Value) -> Value {
    if let (Some(target), Some(source)) = (base.as_object_mut(), extra.as_object()) {
        target.extend(source.clone());
    }
    base
}

#[tokio::test]
async fn test_create_then_read() {
    let harness = ProviderHarness::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/deployments"))
        .and(header("X-VM-Cloud-Access", API_KEY))
        .and(body_partial_json(json!({
            "name": "prod",
            "provider": "aws",
            "storage_size": 2,
            "storage_size_unit": "TB"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(deployment_info("dep-1", "prod")))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/deployments/dep-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(deployment_details("dep-1", "prod")),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    let state = harness
        .lifecycle_create(DEPLOYMENT, deployment_config("prod"))
        .await
        .unwrap()
        .expect("deployment exists");

    assert_eq!(state["id"], "dep-1");
    assert_eq!(state["storage_size"], 2);
    assert_eq!(state["storage_size_unit"], "TB");
    assert_eq!(state["status"], "running");
    assert_eq!(state["created_at"], "2025-01-02T03:04:05Z");
    assert!(state["single_flags"].is_null());
}

#[tokio::test]
async fn test_create_with_flags_applies_them_by_update() {
    let harness = ProviderHarness::start().await;
    let flags = json!(["-search.maxUniqueTimeseries=100000"]);

    Mock::given(method("POST"))
        .and(path("/api/v1/deployments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(deployment_info("dep-1", "prod")))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/deployments/dep-1"))
        .and(body_partial_json(json!({
            "flags": {"single_flags": flags, "select_flags": []}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(with(
            deployment_info("dep-1", "prod"),
            json!({"status": "updating"}),
        )))
        .expect(1)
        .mount(&harness.server)
        .await;

    let config = with(deployment_config("prod"), json!({"single_flags": flags}));
    let plan = harness.plan_create(DEPLOYMENT, config).await.unwrap();
    let state = harness.create(DEPLOYMENT, plan.planned_state).await.unwrap();

    assert_eq!(state["status"], "updating");
    assert_eq!(state["single_flags"], flags);
}

#[tokio::test]
async fn test_create_failure_carries_summary() {
    let harness = ProviderHarness::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/deployments"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid tier"))
        .mount(&harness.server)
        .await;

    let plan = harness
        .plan_create(DEPLOYMENT, deployment_config("prod"))
        .await
        .unwrap();
    let err = harness
        .create(DEPLOYMENT, plan.planned_state)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Error creating deployment: Invalid request: HTTP 400: invalid tier"
    );
}

#[tokio::test]
async fn test_read_missing_deployment_removes_it() {
    let harness = ProviderHarness::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/deployments/dep-gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&harness.server)
        .await;

    let state = harness
        .read(DEPLOYMENT, json!({"id": "dep-gone", "storage_size_unit": "GB"}))
        .await
        .unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn test_update_keeps_identity() {
    let harness = ProviderHarness::start().await;

    let prior = with(
        deployment_config("prod"),
        json!({
            "id": "dep-1",
            "version": "v1.102.0",
            "status": "running",
            "created_at": "2025-01-02T03:04:05Z",
            "access_endpoint": "https://gw-c15-1c.cloud.victoriametrics.com"
        }),
    );

    Mock::given(method("PUT"))
        .and(path("/api/v1/deployments/dep-1"))
        .and(body_partial_json(json!({"name": "prod-renamed", "tier": 21})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(deployment_info("dep-1", "prod-renamed")),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    let plan = harness
        .plan_update(DEPLOYMENT, prior.clone(), deployment_config("prod-renamed"))
        .await
        .unwrap();
    assert_plan_updates_in_place(&plan);
    assert_plan_changes_only(&plan, &["name"]);
    assert_eq!(plan.planned_state["id"], "dep-1");
    assert!(plan.planned_state["status"].is_null());

    let state = harness
        .update(DEPLOYMENT, prior, plan.planned_state)
        .await
        .unwrap();
    assert_eq!(state["id"], "dep-1");
    assert_eq!(state["name"], "prod-renamed");
    assert_eq!(state["status"], "running");
    assert_eq!(state["created_at"], "2025-01-02T03:04:05Z");
}

#[tokio::test]
async fn test_region_change_requires_replace() {
    let harness = ProviderHarness::start().await;
    let prior = with(deployment_config("prod"), json!({"id": "dep-1"}));
    let config = with(deployment_config("prod"), json!({"region": "eu-west-1"}));

    let plan = harness.plan_update(DEPLOYMENT, prior, config).await.unwrap();
    assert_plan_replaces(&plan);
    assert_plan_changes_only(&plan, &["region"]);
    assert!(plan.planned_state["id"].is_null());
}

#[tokio::test]
async fn test_delete_tolerates_missing_deployment() {
    let harness = ProviderHarness::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/deployments/dep-1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness
        .delete(DEPLOYMENT, json!({"id": "dep-1"}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_failure_carries_summary() {
    let harness = ProviderHarness::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/deployments/dep-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&harness.server)
        .await;

    let err = harness
        .delete(DEPLOYMENT, json!({"id": "dep-1"}))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Error deleting deployment: "));
}

#[tokio::test]
async fn test_import_then_read_fills_state() {
    let harness = ProviderHarness::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/deployments/dep-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(with(
                deployment_details("dep-1", "prod"),
                json!({"flags": {"single_flags": ["-dedup.minScrapeInterval=1s"]}}),
            )),
        )
        .mount(&harness.server)
        .await;

    let imported = harness.import_resource(DEPLOYMENT, "dep-1").await.unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].resource_type, DEPLOYMENT);

    let state = harness
        .read(DEPLOYMENT, imported[0].state.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state["name"], "prod");
    assert_eq!(state["storage_size"], 2048);
    assert_eq!(state["storage_size_unit"], "GB");
    assert_eq!(state["retention"], 30);
    assert_eq!(state["single_flags"], json!(["-dedup.minScrapeInterval=1s"]));
    assert!(state["select_flags"].is_null());
}
