//! The Identity Resolver (spec §4.1): assigns `KonnectID` to every desired
//! resource that already exists remotely, distinguishing managed from
//! external resources.

use tokio_util::sync::CancellationToken;

use crate::config::types::{DesiredResource, ExternalRef, ResourceKind, ResourceSet};
use crate::error::{Error, Result};
use crate::identity::moniker;
use crate::identity::placeholder::RefPlaceholder;
use crate::state::client::{Selector, StateClient};

/// Resolve `KonnectID`s for every resource in `resource_set`, mutating it
/// in place. Never touches semantic fields — only `envelope.konnect_id`
/// and, for external resources, `envelope.name` (to adopt the canonical
/// server name and avoid later drift, per spec §4.1).
pub async fn resolve_identities(
    resource_set: &mut ResourceSet,
    client: &dyn StateClient,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut order: Vec<usize> = (0..resource_set.resources.len()).collect();
    // Resolve in the same fixed stage order per-type planners run in (spec
    // §5), so a gateway service's control plane is already resolved by the
    // time the gateway service itself is resolved.
    order.sort_by_key(|&i| resource_set.resources[i].kind.planner_stage());

    for idx in order {
        let snapshot = resource_set.clone();
        let resource = &mut resource_set.resources[idx];
        resolve_one(resource, &snapshot, client, cancel).await?;
    }
    Ok(())
}

async fn resolve_one(
    resource: &mut DesiredResource,
    snapshot: &ResourceSet,
    client: &dyn StateClient,
    cancel: &CancellationToken,
) -> Result<()> {
    if let Some(external) = resource.envelope.external.clone() {
        return resolve_external(resource, &external, client, cancel).await;
    }

    match resource.kind {
        ResourceKind::GatewayService => resolve_gateway_service(resource, snapshot, client, cancel).await,
        ResourceKind::ApiImplementation => {
            resolve_api_implementation(resource, snapshot, client, cancel).await
        }
        _ => resolve_managed_generic(resource, client, cancel).await,
    }
}

async fn resolve_managed_generic(
    resource: &mut DesiredResource,
    client: &dyn StateClient,
    cancel: &CancellationToken,
) -> Result<()> {
    let filter = moniker::managed_filter(resource);
    if let Some(state) = client.get_by_filter(resource.kind, &filter, cancel).await? {
        resource.envelope.konnect_id = Some(state.id);
    }
    Ok(())
}

async fn resolve_external(
    resource: &mut DesiredResource,
    external: &ExternalRef,
    client: &dyn StateClient,
    cancel: &CancellationToken,
) -> Result<()> {
    match external {
        ExternalRef::Id(id) => {
            let all = client.list_all(resource.kind, cancel).await?;
            match all.into_iter().find(|r| &r.id == id) {
                Some(state) => {
                    resource.envelope.konnect_id = Some(state.id);
                    resource.envelope.name = state.name;
                    Ok(())
                }
                None => Err(Error::resolution(format!(
                    "external {} {:?} with id {:?} was not found",
                    resource.kind, resource.envelope.ref_, id
                ))),
            }
        }
        ExternalRef::Selector { match_fields } => {
            let unsupported: Vec<&str> = match_fields
                .keys()
                .map(String::as_str)
                .filter(|k| *k != "name")
                .collect();
            if !unsupported.is_empty() {
                return Err(Error::config(format!(
                    "unsupported external selector field(s) {:?} for {} {:?}: only \"name\" is supported",
                    unsupported, resource.kind, resource.envelope.ref_
                )));
            }
            let selector = Selector {
                match_fields: match_fields.clone(),
            };
            let matches = client
                .get_by_selector(resource.kind, &selector, cancel)
                .await?;
            match matches.len() {
                0 => Err(Error::resolution(format!(
                    "external {} {:?} selector matched zero resources",
                    resource.kind, resource.envelope.ref_
                ))),
                1 => {
                    let state = matches.into_iter().next().unwrap();
                    resource.envelope.konnect_id = Some(state.id);
                    resource.envelope.name = state.name;
                    Ok(())
                }
                n => Err(Error::resolution(format!(
                    "external {} {:?} selector matched {} resources, expected exactly one",
                    resource.kind, resource.envelope.ref_, n
                ))),
            }
        }
    }
}

/// Resolve a raw identifier that may be a ref placeholder, a bare ref name,
/// or a literal Konnect ID, against resources already planned in this run.
async fn resolve_raw_id(
    raw: &str,
    kind: ResourceKind,
    snapshot: &ResourceSet,
) -> Result<Option<String>> {
    if let Some(placeholder) = RefPlaceholder::parse(raw)? {
        return Ok(snapshot
            .find_by_ref_and_kind(&placeholder.ref_, kind)
            .and_then(|r| r.envelope.konnect_id.clone()));
    }
    if let Some(r) = snapshot.find_by_ref_and_kind(raw, kind) {
        return Ok(r.envelope.konnect_id.clone());
    }
    Ok(Some(raw.to_string()))
}

fn extract_ref_name(raw: &str, kind: ResourceKind, snapshot: &ResourceSet) -> Result<Option<String>> {
    if let Some(placeholder) = RefPlaceholder::parse(raw)? {
        return Ok(Some(placeholder.ref_));
    }
    if snapshot.find_by_ref_and_kind(raw, kind).is_some() {
        return Ok(Some(raw.to_string()));
    }
    Ok(None)
}

async fn resolve_gateway_service(
    resource: &mut DesiredResource,
    snapshot: &ResourceSet,
    client: &dyn StateClient,
    cancel: &CancellationToken,
) -> Result<()> {
    let cp_raw = resource
        .fields
        .get("control_plane")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            Error::config(format!(
                "gateway_service {:?} is missing required field \"control_plane\"",
                resource.envelope.ref_
            ))
        })?
        .to_string();

    resource.parent_ref = extract_ref_name(&cp_raw, ResourceKind::ControlPlane, snapshot)?;

    let cp_id = resolve_raw_id(&cp_raw, ResourceKind::ControlPlane, snapshot).await?;
    let Some(cp_id) = cp_id else {
        // Control plane not yet known — being created in this same plan.
        // Leave KonnectID empty; the deck step (planner::gateway_services)
        // handles this per spec §9's Open Question resolution.
        return Ok(());
    };

    let services = client
        .list_children(ResourceKind::GatewayService, &cp_id, cancel)
        .await?;
    if let Some(found) = services.into_iter().find(|s| s.name == resource.envelope.name) {
        resource.envelope.konnect_id = Some(found.id);
    }
    Ok(())
}

async fn resolve_api_implementation(
    resource: &mut DesiredResource,
    snapshot: &ResourceSet,
    client: &dyn StateClient,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(service_ref) = resource.service_ref.clone() else {
        return Ok(());
    };

    let service_ref_name = extract_ref_name(&service_ref.service_id_raw, ResourceKind::GatewayService, snapshot)?;
    let requires_deck = service_ref_name
        .as_deref()
        .and_then(|r| snapshot.find_by_ref_and_kind(r, ResourceKind::GatewayService))
        .map(|svc| svc.deck_requirement.is_some())
        .unwrap_or(false);

    if requires_deck {
        // Runtime-resolved by the executor once the deck step completes.
        return Ok(());
    }

    if let Some(cp_raw) = &service_ref.control_plane_id_raw {
        resolve_raw_id(cp_raw, ResourceKind::ControlPlane, snapshot).await?;
    }

    if let Some(id) = resolve_raw_id(&service_ref.service_id_raw, ResourceKind::GatewayService, snapshot).await? {
        resource.fields.insert(
            "service.id".to_string(),
            serde_json::Value::String(id),
        );
    }
    let _ = client; // reserved for future direct verification of literal IDs
    Ok(())
}
