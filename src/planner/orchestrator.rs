//! Drives the seven-stage planning pipeline end to end (spec §2).

use std::collections::HashMap;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::types::ResourceSet;
use crate::dag::{cross_planner, graph, toposort};
use crate::error::{Error, Result};
use crate::external_tool::deck::DeckRunner;
use crate::identity::resolver::resolve_identities;
use crate::planner::protection::ProtectionGuard;
use crate::planner::types::{positional_change_id, Metadata, Mode, Plan, PlannedChange, Summary};
use crate::planner::{apis, auth_strategies, catalog_services, control_planes, event_gateways, gateway_services, portals};
use crate::refs::binder;
use crate::state::client::StateClient;

/// Everything the orchestrator needs beyond the `ResourceSet` and
/// `StateClient` already threaded through every stage.
pub struct PlanRequest<'a> {
    pub mode: Mode,
    pub konnect_token: &'a str,
    pub konnect_address: &'a str,
    pub generator: &'a str,
}

pub async fn run_plan(
    mut resource_set: ResourceSet,
    client: &dyn StateClient,
    deck_runner: &dyn DeckRunner,
    request: PlanRequest<'_>,
    cancel: &CancellationToken,
) -> Result<Plan> {
    // Stage 1: Identity Resolver.
    resolve_identities(&mut resource_set, client, cancel).await?;
    if cancel.is_cancelled() {
        return Err(Error::external_tool("plan generation cancelled"));
    }

    // Stage 2: Namespace Enumerator.
    let namespace_filter = namespace_filter(&resource_set, request.mode);

    // Stage 3: Per-Type Planners, fixed order (spec §5 "Ordering guarantees").
    let mut counter = 0usize;
    let mut changes: Vec<PlannedChange> = Vec::new();
    let mut guard = ProtectionGuard::new();

    macro_rules! run_stage {
        ($result:expr) => {{
            let (stage_changes, stage_guard) = $result;
            changes.extend(stage_changes);
            guard.extend(stage_guard);
        }};
    }

    run_stage!(auth_strategies::plan(&resource_set, client, request.mode, &namespace_filter, cancel, &mut counter).await?);
    if cancel.is_cancelled() {
        return Err(Error::external_tool("plan generation cancelled"));
    }
    run_stage!(control_planes::plan(&resource_set, client, request.mode, &namespace_filter, cancel, &mut counter).await?);
    if cancel.is_cancelled() {
        return Err(Error::external_tool("plan generation cancelled"));
    }
    run_stage!(portals::plan(&resource_set, client, request.mode, &namespace_filter, cancel, &mut counter).await?);
    if cancel.is_cancelled() {
        return Err(Error::external_tool("plan generation cancelled"));
    }
    run_stage!(catalog_services::plan(&resource_set, client, request.mode, &namespace_filter, cancel, &mut counter).await?);
    if cancel.is_cancelled() {
        return Err(Error::external_tool("plan generation cancelled"));
    }
    run_stage!(
        gateway_services::plan(
            &resource_set,
            client,
            deck_runner,
            request.mode,
            request.konnect_token,
            request.konnect_address,
            cancel,
            &mut counter,
        )
        .await?
    );
    if cancel.is_cancelled() {
        return Err(Error::external_tool("plan generation cancelled"));
    }
    run_stage!(apis::plan(&resource_set, client, request.mode, &namespace_filter, cancel, &mut counter).await?);
    if cancel.is_cancelled() {
        return Err(Error::external_tool("plan generation cancelled"));
    }
    run_stage!(event_gateways::plan(&resource_set, client, request.mode, &namespace_filter, cancel, &mut counter).await?);

    // Protection enforcement (spec §4.2, §9): report every violation together.
    if !guard.is_empty() {
        return Err(Error::Protection {
            violations: guard.into_violations(),
        });
    }

    // Stage 4: Reference Binder.
    let mut warnings = binder::bind(&mut changes);

    // Stage 5: Cross-Planner Dependency Adjuster.
    cross_planner::adjust(&mut changes);

    // Stage 6: Topological Ordering.
    let dag = graph::build(&changes);
    let temp_order = toposort::order(&dag)?;

    // Stage 7: ID Reassignment & Summary.
    let (changes, execution_order) = reassign_ids(changes, &temp_order, &mut warnings);
    let summary = Summary::compute(&changes);

    Ok(Plan {
        metadata: Metadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            generator: request.generator.to_string(),
            mode: request.mode,
        },
        changes,
        execution_order,
        summary,
        warnings,
    })
}

fn namespace_filter(resource_set: &ResourceSet, mode: Mode) -> String {
    if !resource_set.defaults.namespaces.is_empty() {
        return resource_set.defaults.namespaces.join(",");
    }
    if mode == Mode::Sync {
        return "*".to_string();
    }
    resource_set.top_level_namespaces().join(",")
}

/// Rewrite every `temp-<k>:...` change ID into its final positional form and
/// apply the same rewrite to `DependsOn`, the execution order, and every
/// warning's `change_id` (spec §4.5).
fn reassign_ids(
    mut changes: Vec<PlannedChange>,
    temp_order: &[String],
    warnings: &mut [crate::planner::types::Warning],
) -> (Vec<PlannedChange>, Vec<String>) {
    let position: HashMap<&str, usize> = temp_order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i + 1))
        .collect();

    let rewrite: HashMap<String, String> = changes
        .iter()
        .map(|c| {
            let pos = position[c.id.as_str()];
            let new_id = positional_change_id(pos, c.action, c.resource_type, &c.resource_ref);
            (c.id.clone(), new_id)
        })
        .collect();

    for change in &mut changes {
        change.id = rewrite[&change.id].clone();
        change.depends_on = change
            .depends_on
            .iter()
            .map(|d| rewrite.get(d).cloned().unwrap_or_else(|| d.clone()))
            .collect();
    }
    for warning in warnings.iter_mut() {
        if let Some(new_id) = rewrite.get(&warning.change_id) {
            warning.change_id = new_id.clone();
        }
    }

    let execution_order: Vec<String> = temp_order.iter().map(|id| rewrite[id].clone()).collect();
    (changes, execution_order)
}
