//! Reconciliation engine
//!
//! Compares a desired [`ResourceSet`] with the recorded [`GlobalState`] and
//! realizes the difference through a [`CloudProvider`], in dependency order.

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::error::{CloudError, Result};
use crate::graph::DependencyGraph;
use crate::input;
use crate::provider::{CloudProvider, ResolvedResource, ResourceConfig, ResourceSet};
use crate::state::{GlobalState, ResourceState, ResourceStatus};
use futures_util::future::join_all;
use std::collections::BTreeSet;
use std::time::Instant;

/// Drives one provider through plan and apply
pub struct Reconciler<'a> {
    provider: &'a dyn CloudProvider,
}

impl<'a> Reconciler<'a> {
    pub fn new(provider: &'a dyn CloudProvider) -> Self {
        Self { provider }
    }

    /// Calculate the diff between desired and recorded state
    pub fn plan(&self, desired: &ResourceSet, state: &GlobalState) -> Result<Plan> {
        let graph = DependencyGraph::from_resources(desired)?;
        let mut actions = Vec::new();

        for key in graph.order()? {
            let resource = desired
                .get_by_key(&key)
                .ok_or_else(|| CloudError::ResourceNotFound(key.clone()))?;
            let digest = resource.digest()?;

            let action_type = match state.get_resource(&key) {
                None => ActionType::Create,
                Some(current)
                    if current.digest == digest && current.status == ResourceStatus::Available =>
                {
                    ActionType::NoOp
                }
                Some(_) => ActionType::Update,
            };

            actions.push(
                Action::new(action_type, &key, &resource.resource_type, &resource.id)
                    .with_detail("provider", serde_json::json!(resource.provider))
                    .with_detail("digest", serde_json::json!(digest))
                    .with_detail("config", resource.redacted_config()),
            );
        }

        // Resources that are recorded but no longer declared, dependents first
        let recorded = DependencyGraph::from_state(state);
        let mut doomed: Vec<String> = recorded
            .order()?
            .into_iter()
            .filter(|k| !desired.contains_key(k))
            .collect();
        doomed.reverse();

        for key in doomed {
            if let Some(current) = state.get_resource(&key) {
                actions.push(
                    Action::new(ActionType::Delete, &key, &current.resource_type, &current.name)
                        .with_detail("provider", serde_json::json!(current.provider)),
                );
            }
        }

        let plan = Plan::new(actions);
        tracing::debug!(summary = %plan.summary(), "Planned changes");
        Ok(plan)
    }

    /// Apply a plan produced by [`Reconciler::plan`]
    ///
    /// Resources are realized wave by wave; members of one wave run
    /// concurrently. After a failure no further wave is started, but the
    /// rest of the failing wave is allowed to finish. `state` is updated
    /// for every resource that did realize, whether or not the whole apply
    /// succeeded.
    pub async fn apply(
        &self,
        desired: &ResourceSet,
        plan: &Plan,
        state: &mut GlobalState,
    ) -> Result<ApplyResult> {
        let start = Instant::now();
        let mut result = ApplyResult::new();
        let graph = DependencyGraph::from_resources(desired)?;
        let mut failed: BTreeSet<String> = BTreeSet::new();

        for wave in graph.waves()? {
            let pending: Vec<(&Action, &ResourceConfig)> = wave
                .iter()
                .filter_map(|key| {
                    let action = plan.action_for(key)?;
                    let resource = desired.get_by_key(key)?;
                    matches!(action.action_type, ActionType::Create | ActionType::Update)
                        .then_some((action, resource))
                })
                .collect();

            if !failed.is_empty() {
                for (action, _) in pending {
                    result.add_skipped(action, skip_reason(&graph, &failed, action));
                }
                continue;
            }

            let mut ready = Vec::new();
            for (action, resource) in pending {
                match resolve_resource(resource, state) {
                    Ok(resolved) => {
                        let current = state.get_resource(&action.resource_key).cloned();
                        ready.push((action, resource, resolved, current));
                    }
                    Err(e) => {
                        result.add_failure(action, e.to_string());
                        failed.insert(action.resource_key.clone());
                    }
                }
            }

            let outcomes = join_all(ready.iter().map(|(action, _, resolved, current)| async move {
                tracing::info!(
                    resource = %action.resource_key,
                    action = %action.action_type,
                    "Realizing resource"
                );
                match (action.action_type, current) {
                    (ActionType::Update, Some(current)) => {
                        self.provider.update(resolved, current).await
                    }
                    _ => self.provider.create(resolved).await,
                }
            }))
            .await;

            for ((action, resource, _, current), outcome) in ready.iter().zip(outcomes) {
                match outcome {
                    Ok(attributes) => {
                        let provider_id = attributes
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or(&resource.id)
                            .to_string();
                        let mut realized =
                            ResourceState::new(provider_id, &resource.id, &resource.resource_type)
                                .with_status(ResourceStatus::Available)
                                .with_provider(&resource.provider)
                                .with_digest(resource.digest()?)
                                .with_depends_on(resource.dependencies()?.into_iter().collect());
                        realized.attributes = attributes;
                        if let Some(current) = current {
                            realized.created_at = current.created_at;
                        }
                        state.set_resource(action.resource_key.clone(), realized);
                        result.add_success(action);
                    }
                    Err(e) => {
                        tracing::error!(
                            resource = %action.resource_key,
                            error = %e,
                            "Failed to realize resource"
                        );
                        result.add_failure(action, e.to_string());
                        failed.insert(action.resource_key.clone());
                    }
                }
            }
        }

        for action in plan.actions_by_type(ActionType::Delete) {
            if !failed.is_empty() {
                result.add_skipped(action, "not started: deployment halted after a failure");
                continue;
            }
            let Some(current) = state.get_resource(&action.resource_key).cloned() else {
                continue;
            };

            tracing::info!(resource = %action.resource_key, "Deleting resource");
            match self.provider.delete(&current).await {
                Ok(()) => {
                    state.remove_resource(&action.resource_key);
                    result.add_success(action);
                }
                Err(e) => {
                    result.add_failure(action, e.to_string());
                    failed.insert(action.resource_key.clone());
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Plan the removal of everything recorded in state
    pub fn plan_destroy(&self, state: &GlobalState) -> Result<Plan> {
        self.plan(&ResourceSet::new(), state)
    }
}

/// Substitute references with attributes recorded in state
fn resolve_resource(resource: &ResourceConfig, state: &GlobalState) -> Result<ResolvedResource> {
    let config = input::resolve(&resource.config, &|r| state.attribute(r))?;
    Ok(ResolvedResource {
        key: resource.key(),
        resource_type: resource.resource_type.clone(),
        id: resource.id.clone(),
        config,
    })
}

fn skip_reason(graph: &DependencyGraph, failed: &BTreeSet<String>, action: &Action) -> String {
    match failed
        .iter()
        .find(|f| graph.depends_on(&action.resource_key, f))
    {
        Some(dep) => CloudError::AttributeResolution(format!(
            "dependency {} failed, its attributes never resolved",
            dep
        ))
        .to_string(),
        None => "not started: deployment halted after a failure".to_string(),
    }
}
