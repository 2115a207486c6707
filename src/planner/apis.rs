//! API planner (spec §4.2): APIs plus their versions, publications,
//! implementations and documents.

use std::collections::{HashMap, HashSet};

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::config::types::{DesiredResource, ResourceKind, ResourceSet};
use crate::error::Result;
use crate::identity::placeholder::RefPlaceholder;
use crate::planner::common::{create_change, delete_change, diff_existing, index_by_name, next, plan_flat_kind};
use crate::planner::protection::ProtectionGuard;
use crate::planner::types::{temp_change_id, Action, Mode, ParentRef, PlannedChange, ReferenceInfo};
use crate::state::client::{StateClient, StateResource};

pub async fn plan(
    resource_set: &ResourceSet,
    client: &dyn StateClient,
    mode: Mode,
    namespace_filter: &str,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<(Vec<PlannedChange>, ProtectionGuard)> {
    let (mut changes, mut guard) = plan_flat_kind(
        ResourceKind::Api,
        resource_set,
        client,
        mode,
        namespace_filter,
        &["name"],
        cancel,
        counter,
    )
    .await?;

    let api_create_ids: HashMap<String, String> = changes
        .iter()
        .filter(|c| c.resource_type == ResourceKind::Api && c.action == Action::Create)
        .map(|c| (c.resource_ref.clone(), c.id.clone()))
        .collect();

    for api in resource_set.by_kind(ResourceKind::Api) {
        let api_id = api.envelope.konnect_id.clone();
        let being_created = api_create_ids.contains_key(&api.envelope.ref_);
        let api_create_id = api_create_ids.get(&api.envelope.ref_).cloned();

        changes.extend(
            plan_named_children(
                ResourceKind::ApiVersion,
                resource_set,
                api,
                api_id.as_deref(),
                being_created,
                api_create_id.as_deref(),
                client,
                mode,
                &mut guard,
                cancel,
                counter,
            )
            .await?,
        );

        changes.extend(
            plan_named_children(
                ResourceKind::ApiDocument,
                resource_set,
                api,
                api_id.as_deref(),
                being_created,
                api_create_id.as_deref(),
                client,
                mode,
                &mut guard,
                cancel,
                counter,
            )
            .await?,
        );

        changes.extend(
            plan_publications(
                resource_set,
                api,
                api_id.as_deref(),
                being_created,
                api_create_id.as_deref(),
                client,
                mode,
                &mut guard,
                cancel,
                counter,
            )
            .await?,
        );

        changes.extend(
            plan_implementations(
                resource_set,
                api,
                api_id.as_deref(),
                being_created,
                api_create_id.as_deref(),
                client,
                mode,
                &mut guard,
                cancel,
                counter,
            )
            .await?,
        );
    }

    Ok((changes, guard))
}

fn find_children<'a>(resource_set: &'a ResourceSet, kind: ResourceKind, api_ref: &str) -> Vec<&'a DesiredResource> {
    resource_set
        .by_kind(kind)
        .filter(|r| r.parent_ref.as_deref() == Some(api_ref))
        .collect()
}

fn wire_parent(change: &mut PlannedChange, api: &DesiredResource, api_id: Option<&str>, being_created: bool, api_create_id: Option<&str>) {
    if being_created {
        change.parent = Some(ParentRef {
            ref_: api.envelope.ref_.clone(),
            id: String::new(),
        });
        if let Some(id) = api_create_id {
            change.depends_on.push(id.to_string());
        }
    } else {
        change.parent = Some(ParentRef {
            ref_: api.envelope.ref_.clone(),
            id: api_id.unwrap_or_default().to_string(),
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn plan_named_children(
    kind: ResourceKind,
    resource_set: &ResourceSet,
    api: &DesiredResource,
    api_id: Option<&str>,
    being_created: bool,
    api_create_id: Option<&str>,
    client: &dyn StateClient,
    mode: Mode,
    guard: &mut ProtectionGuard,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<Vec<PlannedChange>> {
    let desired_children = find_children(resource_set, kind, &api.envelope.ref_);
    let current: Vec<StateResource> = if being_created {
        Vec::new()
    } else {
        client.list_children(kind, api_id.unwrap(), cancel).await?
    };
    let by_name = index_by_name(&current);
    let mut changes = Vec::new();

    for desired in &desired_children {
        match by_name.get(desired.envelope.name.as_str()) {
            None => {
                let mut change = create_change(kind, desired, counter)?;
                wire_parent(&mut change, api, api_id, being_created, api_create_id);
                changes.push(change);
            }
            Some(state) => {
                if let Some(mut change) = diff_existing(kind, desired, state, &["name"], guard, counter)? {
                    wire_parent(&mut change, api, api_id, false, None);
                    changes.push(change);
                }
            }
        }
    }

    if mode == Mode::Sync {
        for state in &current {
            if !desired_children.iter().any(|d| d.envelope.name == state.name) {
                guard.check(kind, state.name.clone(), state.name.clone(), Action::Delete, state.protected, None);
                changes.push(delete_change(kind, state, counter));
            }
        }
    }

    Ok(changes)
}

/// Ref name if `raw` is a placeholder or a bare ref pointing at `kind`,
/// otherwise `None` (mirrors `identity::resolver::extract_ref_name` but
/// this planner only needs it for attaching a display-friendly reference,
/// not for resolving an ID).
fn extract_ref_name(raw: &str, kind: ResourceKind, resource_set: &ResourceSet) -> Option<String> {
    if let Ok(Some(placeholder)) = RefPlaceholder::parse(raw) {
        return Some(placeholder.ref_);
    }
    if resource_set.find_by_ref_and_kind(raw, kind).is_some() {
        return Some(raw.to_string());
    }
    None
}

#[allow(clippy::too_many_arguments)]
async fn plan_publications(
    resource_set: &ResourceSet,
    api: &DesiredResource,
    api_id: Option<&str>,
    being_created: bool,
    api_create_id: Option<&str>,
    client: &dyn StateClient,
    mode: Mode,
    guard: &mut ProtectionGuard,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<Vec<PlannedChange>> {
    let desired_pubs = find_children(resource_set, ResourceKind::ApiPublication, &api.envelope.ref_);
    let current: Vec<StateResource> = if being_created {
        Vec::new()
    } else {
        client.list_children(ResourceKind::ApiPublication, api_id.unwrap(), cancel).await?
    };
    // Natural key: the portal a publication targets.
    let by_portal: HashMap<&str, &StateResource> = current
        .iter()
        .map(|p| (p.fields.get("portal_id").and_then(|v| v.as_str()).unwrap_or(""), p))
        .collect();

    let mut changes = Vec::new();
    for pub_ in &desired_pubs {
        let portal_raw = pub_.fields.get("portal_id").and_then(|v| v.as_str()).unwrap_or("");
        let existing = by_portal.get(portal_raw).copied();

        let auth_strategy_refs: Vec<String> = pub_
            .fields
            .get("auth_strategy_ids")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        match existing {
            None => {
                let mut change = create_change(ResourceKind::ApiPublication, pub_, counter)?;
                wire_parent(&mut change, api, api_id, being_created, api_create_id);
                attach_auth_strategy_refs(&mut change, &auth_strategy_refs, resource_set);
                changes.push(change);
            }
            Some(state) => {
                if let Some(mut change) = diff_existing(ResourceKind::ApiPublication, pub_, state, &["portal_id"], guard, counter)? {
                    wire_parent(&mut change, api, api_id, false, None);
                    attach_auth_strategy_refs(&mut change, &auth_strategy_refs, resource_set);
                    changes.push(change);
                }
            }
        }
    }

    if mode == Mode::Sync {
        for state in &current {
            let portal_id = state.fields.get("portal_id").and_then(|v| v.as_str()).unwrap_or("");
            if !desired_pubs
                .iter()
                .any(|p| p.fields.get("portal_id").and_then(|v| v.as_str()).unwrap_or("") == portal_id)
            {
                guard.check(
                    ResourceKind::ApiPublication,
                    state.name.clone(),
                    state.name.clone(),
                    Action::Delete,
                    state.protected,
                    None,
                );
                changes.push(delete_change(ResourceKind::ApiPublication, state, counter));
            }
        }
    }

    Ok(changes)
}

fn attach_auth_strategy_refs(change: &mut PlannedChange, refs: &[String], resource_set: &ResourceSet) {
    if refs.is_empty() {
        return;
    }
    let mut info = ReferenceInfo {
        is_array: true,
        ..Default::default()
    };
    for raw in refs {
        let ref_name = extract_ref_name(raw, ResourceKind::ApplicationAuthStrategy, resource_set).unwrap_or_else(|| raw.clone());
        info.refs.push(ref_name.clone());
        let resolved = resource_set
            .find_by_ref_and_kind(&ref_name, ResourceKind::ApplicationAuthStrategy)
            .and_then(|r| r.envelope.konnect_id.clone());
        info.resolved_ids.push(resolved);
        let mut lookup = indexmap::IndexMap::new();
        lookup.insert("name".to_string(), json!(ref_name));
        info.lookup_arrays.push(lookup);
    }
    change.references.insert("auth_strategy_ids".to_string(), info);
}

#[allow(clippy::too_many_arguments)]
async fn plan_implementations(
    resource_set: &ResourceSet,
    api: &DesiredResource,
    api_id: Option<&str>,
    being_created: bool,
    api_create_id: Option<&str>,
    client: &dyn StateClient,
    mode: Mode,
    guard: &mut ProtectionGuard,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<Vec<PlannedChange>> {
    let desired_impls = find_children(resource_set, ResourceKind::ApiImplementation, &api.envelope.ref_);
    let current: Vec<StateResource> = if being_created {
        Vec::new()
    } else {
        client.list_children(ResourceKind::ApiImplementation, api_id.unwrap(), cancel).await?
    };

    let mut changes = Vec::new();
    let mut matched_states = HashSet::new();

    for impl_ in &desired_impls {
        let resolved_service_id = impl_.fields.get("service.id").and_then(|v| v.as_str());
        let existing = resolved_service_id.and_then(|sid| {
            current
                .iter()
                .find(|s| s.fields.get("service.id").and_then(|v| v.as_str()) == Some(sid))
        });

        match existing {
            None => {
                let mut change = create_change(ResourceKind::ApiImplementation, impl_, counter)?;
                wire_parent(&mut change, api, api_id, being_created, api_create_id);
                if resolved_service_id.is_none() {
                    if let Some(service_ref) = &impl_.service_ref {
                        if let Some(ref_name) = extract_ref_name(&service_ref.service_id_raw, ResourceKind::GatewayService, resource_set) {
                            let mut info = ReferenceInfo::scalar(ref_name.clone());
                            info.lookup_fields.insert("name".to_string(), json!(ref_name));
                            change.references.insert("service.id".to_string(), info);
                        }
                    }
                }
                changes.push(change);
            }
            Some(state) => {
                matched_states.insert(state.id.clone());
                if let Some(mut change) = diff_existing(ResourceKind::ApiImplementation, impl_, state, &["service.id"], guard, counter)? {
                    wire_parent(&mut change, api, api_id, false, None);
                    changes.push(change);
                }
            }
        }
    }

    if mode == Mode::Sync {
        for state in &current {
            if matched_states.contains(&state.id) {
                continue;
            }
            guard.check(
                ResourceKind::ApiImplementation,
                state.id.clone(),
                state.name.clone(),
                Action::Delete,
                state.protected,
                None,
            );
            let id = temp_change_id(next(counter), Action::Delete, ResourceKind::ApiImplementation, &state.id);
            let mut change = PlannedChange::new(id, ResourceKind::ApiImplementation, state.id.clone(), Action::Delete, state.namespace.clone());
            change.resource_id = state.id.clone();
            changes.push(change);
        }
    }

    Ok(changes)
}
