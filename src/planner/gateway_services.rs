//! Gateway service planner (spec §4.2 "Deck external-tool step"): ordinary
//! CRUD diff for services that don't require the external `deck` tool, and
//! a single EXTERNAL_TOOL change per deck-managed service.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::config::types::{DeckRequirement, DesiredResource, ResourceKind, ResourceSet};
use crate::error::Result;
use crate::external_tool::deck::{parse_diff_summary, DeckRunOptions, DeckRunner};
use crate::planner::common::{create_change, delete_change, diff_existing, index_by_name, next};
use crate::planner::protection::ProtectionGuard;
use crate::planner::types::{temp_change_id, Action, ExternalToolPayload, Mode, PlannedChange, ReferenceInfo};
use crate::state::cache::GatewayServiceCache;
use crate::state::client::StateClient;

#[allow(clippy::too_many_arguments)]
pub async fn plan(
    resource_set: &ResourceSet,
    client: &dyn StateClient,
    deck_runner: &dyn DeckRunner,
    mode: Mode,
    konnect_token: &str,
    konnect_address: &str,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<(Vec<PlannedChange>, ProtectionGuard)> {
    let mut changes = Vec::new();
    let mut guard = ProtectionGuard::new();
    let cache = GatewayServiceCache::new();

    let cp_refs: HashSet<String> = resource_set
        .by_kind(ResourceKind::GatewayService)
        .filter_map(|gs| gs.parent_ref.clone())
        .collect();

    for cp_ref in cp_refs {
        let cp = resource_set.find_by_ref_and_kind(&cp_ref, ResourceKind::ControlPlane);
        let cp_id = cp.and_then(|c| c.envelope.konnect_id.clone());
        let cp_being_created = cp_id.is_none();

        let desired_services: Vec<&DesiredResource> = resource_set
            .by_kind(ResourceKind::GatewayService)
            .filter(|gs| gs.parent_ref.as_deref() == Some(cp_ref.as_str()))
            .collect();

        let current = match &cp_id {
            Some(id) => cache.list(client, id, cancel).await?,
            None => Vec::new(),
        };
        let by_name = index_by_name(&current);

        for gs in &desired_services {
            if let Some(req) = &gs.deck_requirement {
                changes.extend(
                    plan_deck_service(
                        gs,
                        cp,
                        cp_id.as_deref(),
                        cp_being_created,
                        req,
                        deck_runner,
                        client,
                        mode,
                        konnect_token,
                        konnect_address,
                        cancel,
                        counter,
                    )
                    .await?,
                );
                continue;
            }

            match by_name.get(gs.envelope.name.as_str()) {
                None => {
                    let mut change = create_change(ResourceKind::GatewayService, gs, counter)?;
                    attach_control_plane_reference(&mut change, &cp_ref, cp_id.as_deref());
                    changes.push(change);
                }
                Some(state) => {
                    if let Some(mut change) = diff_existing(ResourceKind::GatewayService, gs, state, &["name"], &mut guard, counter)? {
                        attach_control_plane_reference(&mut change, &cp_ref, cp_id.as_deref());
                        changes.push(change);
                    }
                }
            }
        }

        if mode == Mode::Sync && cp_id.is_some() {
            for state in &current {
                if !desired_services.iter().any(|d| d.envelope.name == state.name) {
                    guard.check(
                        ResourceKind::GatewayService,
                        state.name.clone(),
                        state.name.clone(),
                        Action::Delete,
                        state.protected,
                        None,
                    );
                    changes.push(delete_change(ResourceKind::GatewayService, state, counter));
                }
            }
        }
    }

    Ok((changes, guard))
}

/// Wire the control-plane dependency through the implicit reference-edge
/// mechanism (spec §4.4): gateway services aren't in the parent→child kind
/// map, so this is how a CP created in the same plan gets ordered first.
fn attach_control_plane_reference(change: &mut PlannedChange, cp_ref: &str, cp_id: Option<&str>) {
    let mut info = ReferenceInfo::scalar(cp_ref.to_string());
    if let Some(id) = cp_id {
        info = info.with_id(id.to_string());
    }
    change.references.insert("control_plane".to_string(), info);
}

#[allow(clippy::too_many_arguments)]
async fn plan_deck_service(
    gs: &DesiredResource,
    cp: Option<&DesiredResource>,
    cp_id: Option<&str>,
    cp_being_created: bool,
    req: &DeckRequirement,
    deck_runner: &dyn DeckRunner,
    client: &dyn StateClient,
    mode: Mode,
    konnect_token: &str,
    konnect_address: &str,
    cancel: &CancellationToken,
    counter: &mut usize,
) -> Result<Vec<PlannedChange>> {
    if cp_being_created {
        // Open Question resolution (spec §9): skip the diff and emit the
        // external-tool change unconditionally when the control plane is
        // being created in the same plan.
        return Ok(vec![build_external_tool_change(gs, cp, None, req, counter)]);
    }

    let cp_id = cp_id.expect("cp_id present when not being created");
    let cp_name = client
        .control_plane_name(cp_id, cancel)
        .await?
        .or_else(|| cp.map(|c| c.envelope.name.clone()))
        .unwrap_or_default();

    let mut args = req.flags.clone();
    args.extend(req.files.clone());
    let options = DeckRunOptions {
        args,
        mode,
        konnect_token: konnect_token.to_string(),
        konnect_control_plane_name: cp_name,
        konnect_address: konnect_address.to_string(),
        work_dir: req.deck_base_dir.clone(),
    };

    let output = deck_runner.run(options, cancel).await?;
    let summary = parse_diff_summary(&output)?;
    if !summary.has_changes(mode) {
        return Ok(Vec::new());
    }

    Ok(vec![build_external_tool_change(gs, cp, Some(cp_id.to_string()), req, counter)])
}

fn build_external_tool_change(
    gs: &DesiredResource,
    cp: Option<&DesiredResource>,
    cp_id: Option<String>,
    req: &DeckRequirement,
    counter: &mut usize,
) -> PlannedChange {
    let id = temp_change_id(next(counter), Action::ExternalTool, ResourceKind::GatewayService, &gs.envelope.ref_);
    let mut change = PlannedChange::new(
        id,
        ResourceKind::GatewayService,
        gs.envelope.ref_.clone(),
        Action::ExternalTool,
        gs.envelope.namespace.clone(),
    );
    if let Some(cp_ref) = &gs.parent_ref {
        attach_control_plane_reference(&mut change, cp_ref, cp_id.as_deref());
    }
    change.external_tool = Some(ExternalToolPayload {
        gateway_service_ref: gs.envelope.ref_.clone(),
        control_plane_ref: gs.parent_ref.clone(),
        control_plane_id: cp_id,
        control_plane_name: cp.map(|c| c.envelope.name.clone()),
        deck_base_dir: req.deck_base_dir.clone(),
        selector_match_name: gs.envelope.name.clone(),
        files: req.files.clone(),
        flags: req.flags.clone(),
    });
    change
}
