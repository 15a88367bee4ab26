//! Plan and apply a declared [`ResourceSet`] against recorded state.

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::error::{CloudError, Result};
use crate::provider::{ResourceConfig, ResourceRegistry, ResourceSet};
use crate::state::{ProjectState, ResourceState};
use std::collections::BTreeSet;
use std::time::Instant;

/// Attributes whose declared value differs between two configurations
pub fn changed_attributes(old: &serde_json::Value, new: &serde_json::Value) -> Vec<String> {
    let empty = serde_json::Map::new();
    let old = old.as_object().unwrap_or(&empty);
    let new = new.as_object().unwrap_or(&empty);

    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|k| {
            let before = old.get(*k).unwrap_or(&serde_json::Value::Null);
            let after = new.get(*k).unwrap_or(&serde_json::Value::Null);
            before != after
        })
        .cloned()
        .collect()
}

/// Compute the actions needed to converge `state` onto `desired`.
///
/// With `refresh`, every recorded resource is read back first; one that no
/// longer exists is planned for creation again.
pub async fn plan(
    registry: &ResourceRegistry,
    desired: &ResourceSet,
    state: &ProjectState,
    refresh: bool,
) -> Result<Plan> {
    let mut actions = Vec::new();

    for resource in desired.iter() {
        let key = resource.key();
        let module = registry.get(&resource.resource_type)?;

        let Some(recorded) = state.get_resource(&key) else {
            actions.push(Action::new(ActionType::Create, &resource.resource_type, &key));
            continue;
        };

        if refresh && module.refresh(recorded).await?.is_none() {
            tracing::warn!("{key} ({}) not found, planning re-creation", recorded.id);
            actions.push(
                Action::new(ActionType::Create, &resource.resource_type, &key)
                    .with_detail("reason", serde_json::json!("resource disappeared")),
            );
            continue;
        }

        let changed = changed_attributes(&recorded.config, &resource.config);
        if changed.is_empty() {
            actions.push(Action::new(ActionType::NoOp, &resource.resource_type, &key));
            continue;
        }

        let force_new = module.force_new_attributes();
        let action_type = if changed.iter().any(|c| force_new.contains(&c.as_str())) {
            ActionType::Replace
        } else {
            ActionType::Update
        };

        let mut action = Action::new(action_type, &resource.resource_type, &key);
        for attr in changed {
            let before = recorded.config.get(&attr).cloned().unwrap_or_default();
            let after = resource.config.get(&attr).cloned().unwrap_or_default();
            action = action.with_change(attr, before, after);
        }
        actions.push(action);
    }

    for (key, recorded) in &state.resources {
        if desired.get(key).is_none() {
            actions.push(Action::new(ActionType::Delete, &recorded.resource_type, key));
        }
    }

    Ok(Plan::new(actions))
}

/// Execute a plan, recording every outcome into `state`.
///
/// Failures do not stop the remaining actions.
pub async fn apply(
    registry: &ResourceRegistry,
    plan: &Plan,
    desired: &ResourceSet,
    state: &mut ProjectState,
) -> ApplyResult {
    let mut result = ApplyResult::new();
    let start = Instant::now();

    for action in &plan.actions {
        if action.action_type == ActionType::NoOp {
            continue;
        }

        match apply_action(registry, action, desired, state).await {
            Ok(id) => {
                tracing::info!("{}: {} done [id={id}]", action.resource_key, action.action_type);
                result.record(action, Ok(id));
            }
            Err(e) => {
                tracing::error!("{} failed: {e}", action.description());
                result.record(action, Err(e.to_string()));
            }
        }
    }

    result.elapsed = start.elapsed();
    result
}

async fn apply_action(
    registry: &ResourceRegistry,
    action: &Action,
    desired: &ResourceSet,
    state: &mut ProjectState,
) -> Result<String> {
    // Ok carries the resource id after the action, or the removed id.
    let module = registry.get(&action.resource_type)?;
    let key = action.resource_key.as_str();

    match action.action_type {
        ActionType::Create => {
            let config = declared(desired, key)?;
            let created = module.create(config).await?;
            let id = created.id.clone();
            state.set_resource(key, created.with_config(config.config.clone()));
            Ok(id)
        }
        ActionType::Update => {
            let config = declared(desired, key)?;
            let prior = recorded(state, key)?;
            let updated = module.update(&prior, config).await?;
            let id = updated.id.clone();
            state.set_resource(key, updated.with_config(config.config.clone()));
            Ok(id)
        }
        ActionType::Replace => {
            let config = declared(desired, key)?;
            let prior = recorded(state, key)?;
            module.delete(&prior).await?;
            state.remove_resource(key);
            let created = module.create(config).await?;
            let id = created.id.clone();
            state.set_resource(key, created.with_config(config.config.clone()));
            Ok(id)
        }
        ActionType::Delete => {
            let prior = recorded(state, key)?;
            module.delete(&prior).await?;
            state.remove_resource(key);
            Ok(prior.id)
        }
        ActionType::NoOp => recorded(state, key).map(|r| r.id),
    }
}

/// Delete every recorded resource, newest key last-in first-out.
pub async fn destroy_all(registry: &ResourceRegistry, state: &mut ProjectState) -> ApplyResult {
    let keys: Vec<(String, String)> = state
        .resources
        .iter()
        .rev()
        .map(|(k, s)| (k.clone(), s.resource_type.clone()))
        .collect();

    let actions = keys
        .iter()
        .map(|(key, resource_type)| Action::new(ActionType::Delete, resource_type, key))
        .collect();

    apply(registry, &Plan::new(actions), &ResourceSet::new(), state).await
}

fn declared<'a>(desired: &'a ResourceSet, key: &str) -> Result<&'a ResourceConfig> {
    desired
        .get(key)
        .ok_or_else(|| CloudError::InvalidConfig(format!("{key} is not declared")))
}

fn recorded(state: &ProjectState, key: &str) -> Result<ResourceState> {
    state
        .get_resource(key)
        .cloned()
        .ok_or_else(|| CloudError::StateError(format!("{key} is not recorded in state")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryModule;
    use serde_json::json;
    use std::sync::Arc;

    fn registry(module: Arc<MemoryModule>) -> ResourceRegistry {
        let mut registry = ResourceRegistry::new();
        registry.register(module);
        registry
    }

    fn workflow(name: &str, runs: i64) -> ResourceConfig {
        ResourceConfig::new(
            "test_workflow",
            "test",
            json!({"name": name, "max_concurrent_runs": runs}),
        )
    }

    #[test]
    fn test_changed_attributes() {
        let old = json!({"a": 1, "b": "x", "c": [1]});
        let new = json!({"a": 1, "b": "y", "d": true});
        assert_eq!(changed_attributes(&old, &new), vec!["b", "c", "d"]);
        assert!(changed_attributes(&old, &old).is_empty());
    }

    #[tokio::test]
    async fn test_plan_lifecycle() {
        let module = Arc::new(MemoryModule::new("test_workflow").force_new(&["name"]));
        let registry = registry(module.clone());
        let mut state = ProjectState::new();

        let desired = ResourceSet::new().with(workflow("wf", 1));
        let plan1 = plan(&registry, &desired, &state, true).await.unwrap();
        assert_eq!(plan1.summary().create, 1);

        let result = apply(&registry, &plan1, &desired, &mut state).await;
        assert!(result.is_success(), "{:?}", result.first_error());
        assert_eq!(module.len(), 1);

        // re-applying the same configuration is a no-op
        let plan2 = plan(&registry, &desired, &state, true).await.unwrap();
        assert!(!plan2.has_changes());

        // in-place update
        let desired = ResourceSet::new().with(workflow("wf", 2));
        let plan3 = plan(&registry, &desired, &state, true).await.unwrap();
        assert_eq!(plan3.summary().update, 1);
        let details = &plan3.actions[0].details["max_concurrent_runs"];
        assert_eq!(details["old"], json!(1));
        assert_eq!(details["new"], json!(2));
        apply(&registry, &plan3, &desired, &mut state).await;

        // force-new attribute
        let desired = ResourceSet::new().with(workflow("wf2", 2));
        let plan4 = plan(&registry, &desired, &state, true).await.unwrap();
        assert_eq!(plan4.summary().replace, 1);
        let before = state.get_resource("test_workflow.test").unwrap().id.clone();
        apply(&registry, &plan4, &desired, &mut state).await;
        let after = state.get_resource("test_workflow.test").unwrap().id.clone();
        assert_ne!(before, after);
        assert_eq!(module.len(), 1);

        // removal from the declaration
        let plan5 = plan(&registry, &ResourceSet::new(), &state, true).await.unwrap();
        assert_eq!(plan5.summary().delete, 1);
        apply(&registry, &plan5, &ResourceSet::new(), &mut state).await;
        assert!(state.resources.is_empty());
        assert_eq!(module.len(), 0);
    }

    #[tokio::test]
    async fn test_plan_recreates_disappeared_resource() {
        let module = Arc::new(MemoryModule::new("test_workflow"));
        let registry = registry(module.clone());
        let mut state = ProjectState::new();
        let desired = ResourceSet::new().with(workflow("wf", 1));

        let p = plan(&registry, &desired, &state, false).await.unwrap();
        apply(&registry, &p, &desired, &mut state).await;

        let id = state.get_resource("test_workflow.test").unwrap().id.clone();
        module.remove(&id);

        let p = plan(&registry, &desired, &state, true).await.unwrap();
        assert_eq!(p.summary().create, 1);
        // without refresh the recorded state is trusted
        let p = plan(&registry, &desired, &state, false).await.unwrap();
        assert!(!p.has_changes());
    }

    #[tokio::test]
    async fn test_unsupported_resource_type() {
        let registry = ResourceRegistry::new();
        let desired = ResourceSet::new().with(workflow("wf", 1));
        let err = plan(&registry, &desired, &ProjectState::new(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::UnsupportedResource(t) if t == "test_workflow"));
    }

    #[tokio::test]
    async fn test_destroy_all() {
        let module = Arc::new(MemoryModule::new("test_workflow"));
        let registry = registry(module.clone());
        let mut state = ProjectState::new();
        let desired = ResourceSet::new()
            .with(workflow("a", 1))
            .with(ResourceConfig::new("test_workflow", "other", json!({"name": "b"})));

        let p = plan(&registry, &desired, &state, false).await.unwrap();
        apply(&registry, &p, &desired, &mut state).await;
        assert_eq!(module.len(), 2);

        let result = destroy_all(&registry, &mut state).await;
        assert!(result.is_success());
        assert_eq!(result.succeeded().count(), 2);
        assert!(
            result
                .outcomes
                .iter()
                .all(|o| o.action_type == ActionType::Delete)
        );
        assert!(state.resources.is_empty());
        assert_eq!(module.len(), 0);
    }
}
