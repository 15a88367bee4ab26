//! Planned changes and what applying them did.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;

/// What apply does to one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    /// Delete, then create again: a force-new attribute changed
    Replace,
    Delete,
    NoOp,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Replace => "replace",
            ActionType::Delete => "delete",
            ActionType::NoOp => "no-op",
        }
    }

    fn planned(self) -> &'static str {
        match self {
            ActionType::Create => "will be created",
            ActionType::Update => "will be updated in-place",
            ActionType::Replace => "must be replaced",
            ActionType::Delete => "will be destroyed",
            ActionType::NoOp => "is up to date",
        }
    }

    fn completed(self) -> &'static str {
        match self {
            ActionType::Create => "creation complete",
            ActionType::Update => "modifications complete",
            ActionType::Replace => "replacement complete",
            ActionType::Delete => "destruction complete",
            ActionType::NoOp => "no changes",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a [`Plan`], addressed by the resource's `type.name` key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,
    pub resource_type: String,
    pub resource_key: String,

    /// Changed attributes as `{"old": .., "new": ..}`, plus free-form notes
    /// such as `reason`
    pub details: BTreeMap<String, Value>,
}

impl Action {
    pub fn new(action_type: ActionType, resource_type: &str, resource_key: &str) -> Self {
        Self {
            action_type,
            resource_type: resource_type.to_string(),
            resource_key: resource_key.to_string(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    pub fn with_change(self, attribute: impl Into<String>, old: Value, new: Value) -> Self {
        self.with_detail(attribute, json!({"old": old, "new": new}))
    }

    /// `aws_glue_workflow.etl must be replaced`
    pub fn description(&self) -> String {
        format!("{} {}", self.resource_key, self.action_type.planned())
    }
}

/// Ordered actions converging recorded state onto a declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn has_changes(&self) -> bool {
        self.actions.iter().any(|a| a.action_type != ActionType::NoOp)
    }

    /// Actions that would change something
    pub fn changes(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type != ActionType::NoOp)
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            let counter = match action.action_type {
                ActionType::Create => &mut summary.create,
                ActionType::Update => &mut summary.update,
                ActionType::Replace => &mut summary.replace,
                ActionType::Delete => &mut summary.delete,
                ActionType::NoOp => &mut summary.no_change,
            };
            *counter += 1;
        }
        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}

/// What happened to one resource during apply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub resource_key: String,
    pub action_type: ActionType,

    /// Resource id after the action; for a delete, the id that was removed
    pub id: Option<String>,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// `aws_glue_workflow.etl: creation complete [id=nightly-etl]`
    pub fn message(&self) -> String {
        match (&self.error, &self.id) {
            (Some(error), _) => format!("{}: {error}", self.resource_key),
            (None, Some(id)) => format!(
                "{}: {} [id={id}]",
                self.resource_key,
                self.action_type.completed()
            ),
            (None, None) => format!("{}: {}", self.resource_key, self.action_type.completed()),
        }
    }
}

/// Every outcome of one apply, in plan order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    pub outcomes: Vec<ActionOutcome>,
    pub elapsed: Duration,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, action: &Action, outcome: Result<String, String>) {
        let (id, error) = match outcome {
            Ok(id) => (Some(id), None),
            Err(error) => (None, Some(error)),
        };
        self.outcomes.push(ActionOutcome {
            resource_key: action.resource_key.clone(),
            action_type: action.action_type,
            id,
            error,
        });
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(|o| o.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ActionOutcome::is_ok)
    }

    pub fn first_error(&self) -> Option<&str> {
        self.outcomes.iter().find_map(|o| o.error.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_every_action() {
        let plan = Plan::new(vec![
            Action::new(ActionType::Create, "aws_glue_workflow", "aws_glue_workflow.a"),
            Action::new(ActionType::NoOp, "aws_glue_workflow", "aws_glue_workflow.b"),
            Action::new(
                ActionType::Replace,
                "aws_ecs_task_definition",
                "aws_ecs_task_definition.web",
            ),
        ]);

        assert!(plan.has_changes());
        assert_eq!(plan.changes().count(), 2);
        assert_eq!(
            plan.summary().to_string(),
            "1 to create, 0 to update, 1 to replace, 0 to delete, 1 unchanged"
        );
        assert!(!Plan::default().has_changes());
    }

    #[test]
    fn test_apply_result_messages() {
        let workflow = |action, key| Action::new(action, "aws_glue_workflow", key);
        let create = workflow(ActionType::Create, "aws_glue_workflow.etl");
        let delete = workflow(ActionType::Delete, "aws_glue_workflow.old");

        let mut result = ApplyResult::new();
        result.record(&create, Ok("nightly-etl".to_string()));
        result.record(&delete, Err("AccessDeniedException: denied".to_string()));

        assert!(!result.is_success());
        assert_eq!(result.first_error(), Some("AccessDeniedException: denied"));
        let succeeded: Vec<String> = result.succeeded().map(ActionOutcome::message).collect();
        assert_eq!(
            succeeded,
            vec!["aws_glue_workflow.etl: creation complete [id=nightly-etl]"]
        );
        assert_eq!(result.failed().count(), 1);
    }
}
