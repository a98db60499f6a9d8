//! Planned actions and apply results

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One step of a plan, addressed by resource key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// `<action>-<resource key>`, unique within a plan
    pub id: String,

    pub action_type: ActionType,

    /// Resource key (type:id)
    pub resource_key: String,

    pub resource_type: String,

    /// Logical resource identifier
    pub resource_id: String,

    /// Human readable form, e.g. `create s3-object index.html`
    pub description: String,

    /// Declared provider, digest and redacted config
    pub details: HashMap<String, serde_json::Value>,
}

impl Action {
    pub fn new(
        action_type: ActionType,
        resource_key: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        let resource_key = resource_key.into();
        let resource_type = resource_type.into();
        let resource_id = resource_id.into();
        Self {
            id: format!("{}-{}", action_type, resource_key),
            description: format!("{} {} {}", action_type, resource_type, resource_id),
            action_type,
            resource_key,
            resource_type,
            resource_id,
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Not in state yet
    Create,
    /// Recorded digest differs from the declaration
    Update,
    /// Recorded but no longer declared
    Delete,
    /// Recorded digest matches
    NoOp,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Delete => "delete",
            ActionType::NoOp => "no-op",
        }
    }

    /// Prefix used when listing a plan
    pub fn symbol(&self) -> &'static str {
        match self {
            ActionType::Create => "+",
            ActionType::Update => "~",
            ActionType::Delete => "-",
            ActionType::NoOp => " ",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one action
///
/// `message` is the action description on success, the provider error on
/// failure and the reason the action never started when skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: String,
    pub message: String,
}

/// Outcome of applying a plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    pub succeeded: Vec<ActionResult>,
    pub failed: Vec<ActionResult>,
    /// Actions never started because an earlier wave failed
    pub skipped: Vec<ActionResult>,
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every action ran and none failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn add_success(&mut self, action: &Action) {
        self.succeeded.push(result(action, action.description.clone()));
    }

    pub fn add_failure(&mut self, action: &Action, error: impl Into<String>) {
        self.failed.push(result(action, error.into()));
    }

    pub fn add_skipped(&mut self, action: &Action, reason: impl Into<String>) {
        self.skipped.push(result(action, reason.into()));
    }
}

fn result(action: &Action, message: String) -> ActionResult {
    ActionResult {
        action_id: action.id.clone(),
        message,
    }
}

/// Ordered list of actions
///
/// Create/update/no-op actions are listed in dependency order; deletions
/// follow in reverse dependency order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Find the action planned for a resource
    pub fn action_for(&self, resource_key: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.resource_key == resource_key)
    }

    pub fn summary(&self) -> PlanSummary {
        self.actions
            .iter()
            .fold(PlanSummary::default(), |mut summary, action| {
                match action.action_type {
                    ActionType::Create => summary.create += 1,
                    ActionType::Update => summary.update += 1,
                    ActionType::Delete => summary.delete += 1,
                    ActionType::NoOp => summary.no_change += 1,
                }
                summary
            })
    }
}

/// Action counts per type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_summary() {
        let plan = Plan::new(vec![
            Action::new(ActionType::Create, "s3-bucket:b", "s3-bucket", "b"),
            Action::new(ActionType::NoOp, "s3-object:a.css", "s3-object", "a.css"),
            Action::new(ActionType::Delete, "s3-object:old.js", "s3-object", "old.js"),
        ]);

        assert!(plan.has_changes);
        assert_eq!(
            plan.summary().to_string(),
            "1 to create, 0 to update, 1 to delete, 1 unchanged"
        );
        let delete = plan.action_for("s3-object:old.js").unwrap();
        assert_eq!(delete.id, "delete-s3-object:old.js");
        assert_eq!(delete.description, "delete s3-object old.js");
        assert_eq!(delete.action_type.symbol(), "-");
    }

    #[test]
    fn test_noop_plan_has_no_changes() {
        let plan = Plan::new(vec![Action::new(
            ActionType::NoOp,
            "s3-bucket:b",
            "s3-bucket",
            "b",
        )]);
        assert!(!plan.has_changes);
        assert!(!Plan::new(Vec::new()).has_changes);
    }

    #[test]
    fn test_apply_result_messages() {
        let create = Action::new(ActionType::Create, "s3-bucket:b", "s3-bucket", "b");
        let update = Action::new(ActionType::Update, "s3-object:a.css", "s3-object", "a.css");

        let mut result = ApplyResult::new();
        result.add_success(&create);
        assert!(result.is_success());

        result.add_skipped(&update, "dependency failed");
        assert!(!result.is_success());
        assert_eq!(result.succeeded[0].message, "create s3-bucket b");
        assert_eq!(result.skipped[0].action_id, "update-s3-object:a.css");
    }
}
