//! Schema-driven plan computation.
//!
//! The host sends the prior state, the proposed new state and the raw
//! configuration. [`plan`] merges them into the planned state using the
//! attribute flags of the resource schema:
//!
//! - computed-only attributes are unknown (`null`) on create
//! - optional+computed attributes left unset in configuration keep their
//!   prior value
//! - a change to a `force_new` attribute marks the plan as a replacement
//! - on update, computed-only attributes keep their prior value when nothing
//!   changed or when marked `use_state_for_unknown`; otherwise they become
//!   unknown
//!
//! A `null` proposed state plans destruction.

use serde_json::{Map, Value};

use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};

/// Compute the plan for a resource.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: &Value, config: &Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    if proposed.is_null() {
        return plan_destroy(schema, prior);
    }

    let mut names: Vec<&String> = schema.block.attributes.keys().collect();
    names.sort();

    let mut planned = Map::new();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    // Configurable attributes first; computed values depend on whether
    // anything changed.
    for name in &names {
        let attr = &schema.block.attributes[name.as_str()];
        if attr.flags.is_computed_only() {
            continue;
        }

        let mut value = field(proposed, name);
        if attr.flags.optional && attr.flags.computed && field(config, name).is_null() {
            if let Some(prior) = prior {
                value = field(prior, name);
            }
        }

        match prior {
            None => {
                if !value.is_null() {
                    changes.push(AttributeChange::added(name.as_str(), value.clone()));
                }
            }
            Some(prior) => {
                let before = field(prior, name);
                if before != value {
                    changes.push(diff(name, before, value.clone()));
                    if attr.force_new {
                        requires_replace = true;
                    }
                }
            }
        }

        planned.insert(name.to_string(), value);
    }

    let unchanged = changes.is_empty();
    for name in &names {
        let attr = &schema.block.attributes[name.as_str()];
        if !attr.flags.is_computed_only() {
            continue;
        }
        let value = match prior {
            Some(prior) if !requires_replace && (unchanged || attr.use_state_for_unknown) => {
                field(prior, name)
            }
            _ => Value::Null,
        };
        planned.insert(name.to_string(), value);
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn plan_destroy(schema: &Schema, prior: Option<&Value>) -> PlanResult {
    let Some(prior) = prior else {
        return PlanResult::no_change(Value::Null);
    };

    let mut names: Vec<&String> = schema.block.attributes.keys().collect();
    names.sort();

    let changes = names
        .into_iter()
        .filter_map(|name| {
            let before = field(prior, name);
            (!before.is_null()).then(|| AttributeChange::removed(name.as_str(), before))
        })
        .collect();

    PlanResult::with_changes(Value::Null, changes, false)
}

fn field(value: &Value, name: &str) -> Value {
    value.get(name).cloned().unwrap_or(Value::Null)
}

fn diff(name: &str, before: Value, after: Value) -> AttributeChange {
    match (before.is_null(), after.is_null()) {
        (true, _) => AttributeChange::added(name, after),
        (false, true) => AttributeChange::removed(name, before),
        (false, false) => AttributeChange::modified(name, before, after),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, AttributeType};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string().with_use_state_for_unknown())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("region", Attribute::required_string().with_force_new())
            .with_attribute("status", Attribute::computed_string())
            .with_attribute(
                "label",
                Attribute::new(AttributeType::String, AttributeFlags::optional_computed()),
            )
    }

    #[test]
    fn test_plan_create() {
        let proposed = json!({"name": "prod", "region": "us-east-2", "id": null});
        let result = plan(&schema(), None, &proposed, &proposed);

        assert_eq!(
            result.planned_state,
            json!({
                "id": null,
                "name": "prod",
                "region": "us-east-2",
                "status": null,
                "label": null
            })
        );
        let paths: Vec<_> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "region"]);
        assert!(!result.requires_replace);
    }

    #[test]
    fn test_plan_no_change_keeps_computed() {
        let prior = json!({
            "id": "dep-1",
            "name": "prod",
            "region": "us-east-2",
            "status": "running",
            "label": "x"
        });
        let proposed = json!({"name": "prod", "region": "us-east-2", "label": "x"});
        let result = plan(&schema(), Some(&prior), &proposed, &proposed);

        assert!(!result.has_changes());
        assert_eq!(result.planned_state, prior);
    }

    #[test]
    fn test_plan_update_marks_plain_computed_unknown() {
        let prior = json!({
            "id": "dep-1",
            "name": "prod",
            "region": "us-east-2",
            "status": "running",
            "label": null
        });
        let proposed = json!({"name": "staging", "region": "us-east-2"});
        let result = plan(&schema(), Some(&prior), &proposed, &proposed);

        assert_eq!(result.changes.len(), 1);
        assert_eq!(
            result.changes[0],
            AttributeChange::modified("name", json!("prod"), json!("staging"))
        );
        assert!(!result.requires_replace);
        assert_eq!(result.planned_state["id"], "dep-1");
        assert!(result.planned_state["status"].is_null());
    }

    #[test]
    fn test_plan_force_new_requires_replace() {
        let prior = json!({
            "id": "dep-1",
            "name": "prod",
            "region": "us-east-2",
            "status": "running"
        });
        let proposed = json!({"name": "prod", "region": "eu-west-1"});
        let result = plan(&schema(), Some(&prior), &proposed, &proposed);

        assert!(result.requires_replace);
        assert!(result.planned_state["id"].is_null());
        assert!(result.planned_state["status"].is_null());
    }

    #[test]
    fn test_plan_optional_computed_keeps_prior_when_unset() {
        let prior = json!({
            "id": "dep-1",
            "name": "prod",
            "region": "us-east-2",
            "status": "running",
            "label": "from-api"
        });
        let config = json!({"name": "prod", "region": "us-east-2", "label": null});
        let result = plan(&schema(), Some(&prior), &config, &config);

        assert!(!result.has_changes());
        assert_eq!(result.planned_state["label"], "from-api");
    }

    #[test]
    fn test_plan_destroy() {
        let prior = json!({"id": "dep-1", "name": "prod", "region": "us-east-2", "status": null});
        let result = plan(&schema(), Some(&prior), &Value::Null, &Value::Null);

        assert!(result.planned_state.is_null());
        let paths: Vec<_> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["id", "name", "region"]);
        assert!(result.changes.iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn test_plan_destroy_without_prior() {
        let result = plan(&schema(), None, &Value::Null, &Value::Null);
        assert!(result.planned_state.is_null());
        assert!(!result.has_changes());
    }

    #[test]
    fn test_null_prior_is_create() {
        let proposed = json!({"name": "prod", "region": "us-east-2"});
        let result = plan(&schema(), Some(&Value::Null), &proposed, &proposed);
        assert!(result.planned_state["id"].is_null());
        assert_eq!(result.changes.len(), 2);
    }
}
