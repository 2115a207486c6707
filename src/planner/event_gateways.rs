//! Event-gateway planner (spec §4.2 "Event-gateway listeners and backend
//! clusters"): the control plane itself is a flat kind; its six child kinds
//! are two-phase — full diff when the parent already exists, CREATE-only
//! with a runtime-bound reference when the parent is created in this plan.

use serde_json::{json, Value as Json};
use tokio_util::sync::CancellationToken;

use crate::config::types::{DesiredResource, ResourceKind, ResourceSet};
use crate::error::Result;
use crate::planner::common::{create_change, delete_change, diff_existing, index_by_name, plan_flat_kind};
use crate::planner::protection::ProtectionGuard;
use crate::planner::types::{Action, Mode, ParentRef, PlannedChange, ReferenceInfo};
use crate::state::client::StateClient;

const CHILD_KINDS: &[ResourceKind] = &[
    ResourceKind::EventGatewayListener,
    ResourceKind::EventGatewayListenerPolicy,
    ResourceKind::EventGatewayBackendCluster,
    ResourceKind::EventGatewayVirtualCluster,
    ResourceKind::EventGatewayRoute,
    ResourceKind::EventGatewayPlugin,
];

pub async fn plan(
    resource_set: &ResourceSet,
    client: &dyn StateClient,
    mode: Mode,
    namespace_filter: &str,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<(Vec<PlannedChange>, ProtectionGuard)> {
    let (mut changes, mut guard) = plan_flat_kind(
        ResourceKind::EventGatewayControlPlane,
        resource_set,
        client,
        mode,
        namespace_filter,
        &["name"],
        cancel,
        counter,
    )
    .await?;

    let created_ids: std::collections::HashMap<String, String> = changes
        .iter()
        .filter(|c| c.resource_type == ResourceKind::EventGatewayControlPlane && c.action == Action::Create)
        .map(|c| (c.resource_ref.clone(), c.id.clone()))
        .collect();

    for egw in resource_set.by_kind(ResourceKind::EventGatewayControlPlane) {
        let egw_id = egw.envelope.konnect_id.clone();
        let being_created = created_ids.contains_key(&egw.envelope.ref_);
        let create_id = created_ids.get(&egw.envelope.ref_).cloned();

        for &kind in CHILD_KINDS {
            changes.extend(
                plan_child_kind(
                    kind,
                    resource_set,
                    egw,
                    egw_id.as_deref(),
                    being_created,
                    create_id.as_deref(),
                    client,
                    mode,
                    &mut guard,
                    cancel,
                    counter,
                )
                .await?,
            );
        }
    }

    Ok((changes, guard))
}

fn find_children<'a>(resource_set: &'a ResourceSet, kind: ResourceKind, egw_ref: &str) -> Vec<&'a DesiredResource> {
    resource_set
        .by_kind(kind)
        .filter(|r| r.parent_ref.as_deref() == Some(egw_ref))
        .collect()
}

/// A child's natural key: listener ports are normalized to a string
/// (supporting integer, string, and range forms — spec §4.2), everything
/// else keys on `name`.
fn natural_key(kind: ResourceKind, resource: &DesiredResource) -> String {
    if kind == ResourceKind::EventGatewayListener {
        if let Some(port) = resource.fields.get("port") {
            return normalize_port(port);
        }
    }
    resource.envelope.name.clone()
}

fn normalize_port(value: &Json) -> String {
    match value {
        Json::Number(n) => n.to_string(),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn plan_child_kind(
    kind: ResourceKind,
    resource_set: &ResourceSet,
    egw: &DesiredResource,
    egw_id: Option<&str>,
    being_created: bool,
    egw_create_id: Option<&str>,
    client: &dyn StateClient,
    mode: Mode,
    guard: &mut ProtectionGuard,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<Vec<PlannedChange>> {
    let desired_children = find_children(resource_set, kind, &egw.envelope.ref_);
    if desired_children.is_empty() {
        return Ok(Vec::new());
    }

    if being_created {
        // Phase 2 (create-only): carry a runtime-bound reference instead of
        // a parent ID, since the event gateway control plane doesn't exist
        // yet (spec §4.2).
        let mut changes = Vec::new();
        for child in &desired_children {
            let mut change = create_change(kind, child, counter)?;
            change.parent = Some(ParentRef {
                ref_: egw.envelope.ref_.clone(),
                id: String::new(),
            });
            if let Some(id) = egw_create_id {
                change.depends_on.push(id.to_string());
            }
            let mut reference = ReferenceInfo::scalar(egw.envelope.ref_.clone());
            reference.lookup_fields.insert("name".to_string(), json!(egw.envelope.name));
            change.references.insert("event_gateway_id".to_string(), reference);
            changes.push(change);
        }
        return Ok(changes);
    }

    // Phase 1 (parent already exists): full diff against currently listed
    // children.
    let current = client.list_children(kind, egw_id.unwrap(), cancel).await?;
    let by_key: std::collections::HashMap<String, &crate::state::client::StateResource> = current
        .iter()
        .map(|c| {
            let key = if kind == ResourceKind::EventGatewayListener {
                c.fields.get("port").map(normalize_port).unwrap_or_default()
            } else {
                c.name.clone()
            };
            (key, c)
        })
        .collect();

    let mut changes = Vec::new();
    for child in &desired_children {
        let key = natural_key(kind, child);
        match by_key.get(&key) {
            None => {
                let mut change = create_change(kind, child, counter)?;
                change.parent = Some(ParentRef {
                    ref_: egw.envelope.ref_.clone(),
                    id: egw_id.unwrap_or_default().to_string(),
                });
                changes.push(change);
            }
            Some(state) => {
                let identifying_key: &str = if kind == ResourceKind::EventGatewayListener {
                    "port"
                } else {
                    "name"
                };
                if let Some(mut change) = diff_existing(kind, child, state, &[identifying_key], guard, counter)? {
                    change.parent = Some(ParentRef {
                        ref_: egw.envelope.ref_.clone(),
                        id: egw_id.unwrap_or_default().to_string(),
                    });
                    changes.push(change);
                }
            }
        }
    }

    if mode == Mode::Sync {
        for state in &current {
            let key = if kind == ResourceKind::EventGatewayListener {
                state.fields.get("port").map(normalize_port).unwrap_or_default()
            } else {
                state.name.clone()
            };
            let still_desired = desired_children.iter().any(|c| natural_key(kind, c) == key);
            if !still_desired {
                guard.check(kind, state.name.clone(), state.name.clone(), Action::Delete, state.protected, None);
                changes.push(delete_change(kind, state, counter));
            }
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_integer_and_string_ports_the_same_way() {
        assert_eq!(normalize_port(&json!(8080)), "8080");
        assert_eq!(normalize_port(&json!("8080")), "8080");
        assert_eq!(normalize_port(&json!("8000-8010")), "8000-8010");
    }
}
