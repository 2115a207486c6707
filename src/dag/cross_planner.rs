//! Cross-Planner Dependency Adjuster (spec §2 stage 5): adds `DependsOn`
//! edges that span per-type planners and therefore can't be known by any
//! single planner in isolation.

use crate::config::types::ResourceKind;
use crate::planner::types::{Action, PlannedChange};

/// Mutates `changes` in place, adding edges that span planners:
/// - auth-strategy DELETEs depend on every API/publication DELETE that
///   referenced them,
/// - portal-team-role CREATEs depend on the CREATE of the API they target
///   (when that API is created in the same plan).
pub fn adjust(changes: &mut [PlannedChange]) {
    wire_auth_strategy_deletes(changes);
    wire_team_role_api_dependency(changes);
    wire_implementations_to_external_tool(changes);
}

/// Every `api_implementation` CREATE whose resolved `service.id` points at a
/// gateway service depends on that service's EXTERNAL_TOOL change, if one
/// was emitted (spec §4.2 "Deck external-tool step").
fn wire_implementations_to_external_tool(changes: &mut [PlannedChange]) {
    let external_tool_ids: Vec<(String, String)> = changes
        .iter()
        .filter(|c| c.action == Action::ExternalTool)
        .filter_map(|c| {
            c.external_tool
                .as_ref()
                .map(|t| (t.gateway_service_ref.clone(), c.id.clone()))
        })
        .collect();
    if external_tool_ids.is_empty() {
        return;
    }

    for change in changes.iter_mut() {
        if change.action != Action::Create || change.resource_type != ResourceKind::ApiImplementation {
            continue;
        }
        let Some(service_ref) = change
            .references
            .get("service.id")
            .and_then(|r| r.ref_.clone())
        else {
            continue;
        };
        for (gs_ref, tool_id) in &external_tool_ids {
            if gs_ref == &service_ref && !change.depends_on.contains(tool_id) {
                change.depends_on.push(tool_id.clone());
            }
        }
    }
}

fn wire_auth_strategy_deletes(changes: &mut [PlannedChange]) {
    let referencing_deletes: Vec<(String, String)> = changes
        .iter()
        .filter(|c| c.action == Action::Delete)
        .filter(|c| matches!(c.resource_type, ResourceKind::Api | ResourceKind::ApiPublication))
        .flat_map(|c| {
            let scalar = c.references.values().filter_map(|r| r.ref_.clone());
            let array = c.references.values().flat_map(|r| r.refs.clone());
            scalar.chain(array).map(move |ref_| (c.id.clone(), ref_))
        })
        .collect();

    for change in changes.iter_mut() {
        if change.action != Action::Delete || change.resource_type != ResourceKind::ApplicationAuthStrategy {
            continue;
        }
        for (dep_id, ref_) in &referencing_deletes {
            if ref_ == &change.resource_ref && !change.depends_on.contains(dep_id) {
                change.depends_on.push(dep_id.clone());
            }
        }
    }
}

fn wire_team_role_api_dependency(changes: &mut [PlannedChange]) {
    let api_creates: Vec<(String, String)> = changes
        .iter()
        .filter(|c| c.action == Action::Create && c.resource_type == ResourceKind::Api)
        .map(|c| (c.resource_ref.clone(), c.id.clone()))
        .collect();

    for change in changes.iter_mut() {
        if change.action != Action::Create || change.resource_type != ResourceKind::PortalTeamRole {
            continue;
        }
        let Some(key) = &change.team_role_entity_ref else {
            continue;
        };
        if let Some((_, create_id)) = api_creates.iter().find(|(ref_, _)| ref_ == key) {
            if !change.depends_on.contains(create_id) {
                change.depends_on.push(create_id.clone());
            }
        }
    }
}
